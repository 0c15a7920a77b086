//! Gas metering

use crate::error::AdmissionError;
use serde::Serialize;

pub type Gas = u64;

/// Monotonic gas counter with a ceiling.
///
/// Consumption never decreases. Crossing the limit or overflowing `u64` is a
/// terminal error for the transaction; the meter keeps the consumed amount so
/// callers can still charge for the work done up to the failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasMeter {
    limit: Gas,
    consumed: Gas,
    infinite: bool,
}

impl GasMeter {
    pub fn new(limit: Gas) -> Self {
        GasMeter {
            limit,
            consumed: 0,
            infinite: false,
        }
    }

    /// Meter without a ceiling, used for simulation and genesis.
    pub fn infinite() -> Self {
        GasMeter {
            limit: Gas::MAX,
            consumed: 0,
            infinite: true,
        }
    }

    pub fn limit(&self) -> Gas {
        self.limit
    }

    pub fn consumed(&self) -> Gas {
        self.consumed
    }

    pub fn is_infinite(&self) -> bool {
        self.infinite
    }

    pub fn remaining(&self) -> Gas {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn is_out_of_gas(&self) -> bool {
        !self.infinite && self.consumed >= self.limit
    }

    pub fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> Result<(), AdmissionError> {
        let consumed = match self.consumed.checked_add(amount) {
            Some(consumed) => consumed,
            None => {
                self.consumed = Gas::MAX;
                return Err(AdmissionError::GasOverflow(descriptor.to_string()));
            }
        };
        self.consumed = consumed;

        if !self.infinite && consumed > self.limit {
            return Err(AdmissionError::OutOfGas(format!(
                "out of gas in location: {}; gasWanted: {}, gasUsed: {}",
                descriptor, self.limit, consumed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consume_within_limit() {
        let mut meter = GasMeter::new(100);
        meter.consume_gas(40, "a").unwrap();
        meter.consume_gas(60, "b").unwrap();
        assert_eq!(meter.consumed(), 100);
        assert_eq!(meter.remaining(), 0);
        assert!(meter.is_out_of_gas());
    }

    #[test]
    fn test_out_of_gas_keeps_consumption() {
        let mut meter = GasMeter::new(100);
        meter.consume_gas(90, "a").unwrap();
        let err = meter.consume_gas(20, "txSize").unwrap_err();
        assert!(matches!(err, AdmissionError::OutOfGas(ref msg) if msg.contains("txSize")));
        assert_eq!(meter.consumed(), 110);
    }

    #[test]
    fn test_overflow_is_terminal() {
        let mut meter = GasMeter::infinite();
        meter.consume_gas(Gas::MAX - 1, "big").unwrap();
        assert!(matches!(
            meter.consume_gas(2, "more"),
            Err(AdmissionError::GasOverflow(_))
        ));
        assert_eq!(meter.consumed(), Gas::MAX);
    }
}
