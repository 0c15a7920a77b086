//! Per-transaction execution context threaded through the pipeline
//!
//! A context is created fresh for each transaction and is exclusively owned by
//! the pipeline run processing it. Stages communicate only through it: the
//! setup stage installs the gas meter, the fee stage writes the priority once,
//! the public-key stage attaches resolved signer keys for the signature stages,
//! and events accumulate in a deferred log that the caller publishes only when
//! the transaction is accepted.

use crate::coins::DecCoin;
use crate::crypto::{Address, PubKey};
use crate::error::AdmissionError;
use crate::gas::{Gas, GasMeter};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Why the transaction is being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecMode {
    /// First admission into the mempool.
    Check,
    /// Re-validation of a mempool entry after a block commit.
    ReCheck,
    /// Execution inside a block.
    Deliver,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Event {
            kind: kind.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.push((key.to_string(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A governance vote cast by a currently bonded validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidatorVote {
    pub voter: Address,
    pub proposal_id: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    pub chain_id: String,
    pub block_height: u64,
    pub block_time: DateTime<Utc>,
    pub mode: ExecMode,
    /// Consensus-level gas ceiling for a whole block, if any.
    pub max_block_gas: Option<Gas>,
    /// Node-local minimum gas prices, applied only in `Check` mode.
    pub min_gas_prices: Vec<DecCoin>,
    pub extension_options_checked: bool,
    pub validator_vote_tagged: bool,
    pub validator_votes: Vec<ValidatorVote>,
    gas_meter: Option<GasMeter>,
    priority: Option<i64>,
    signer_pubkeys: Option<Vec<PubKey>>,
    events: Vec<Event>,
}

impl ExecutionContext {
    pub fn new(chain_id: &str, block_height: u64) -> Self {
        ExecutionContext {
            chain_id: chain_id.to_string(),
            block_height,
            block_time: Utc::now(),
            mode: ExecMode::Check,
            max_block_gas: None,
            min_gas_prices: Vec::new(),
            extension_options_checked: false,
            validator_vote_tagged: false,
            validator_votes: Vec::new(),
            gas_meter: None,
            priority: None,
            signer_pubkeys: None,
            events: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_block_time(mut self, time: DateTime<Utc>) -> Self {
        self.block_time = time;
        self
    }

    pub fn with_max_block_gas(mut self, gas: Gas) -> Self {
        self.max_block_gas = Some(gas);
        self
    }

    pub fn with_min_gas_prices(mut self, prices: Vec<DecCoin>) -> Self {
        self.min_gas_prices = prices;
        self
    }

    pub fn is_check_tx(&self) -> bool {
        matches!(self.mode, ExecMode::Check | ExecMode::ReCheck)
    }

    pub fn is_recheck_tx(&self) -> bool {
        self.mode == ExecMode::ReCheck
    }

    // ------------------------------------------------------------------
    // Gas
    // ------------------------------------------------------------------

    /// Installs the transaction's gas meter. Only one meter may ever be installed.
    pub fn install_gas_meter(&mut self, meter: GasMeter) -> Result<(), AdmissionError> {
        if self.gas_meter.is_some() {
            return Err(AdmissionError::Internal(
                "gas meter already installed for this transaction".to_string(),
            ));
        }
        self.gas_meter = Some(meter);
        Ok(())
    }

    pub fn gas_meter(&self) -> Option<&GasMeter> {
        self.gas_meter.as_ref()
    }

    pub fn gas_meter_mut(&mut self) -> Result<&mut GasMeter, AdmissionError> {
        self.gas_meter
            .as_mut()
            .ok_or_else(|| AdmissionError::Internal("gas meter not installed".to_string()))
    }

    pub fn consume_gas(&mut self, amount: Gas, descriptor: &str) -> Result<(), AdmissionError> {
        self.gas_meter_mut()?.consume_gas(amount, descriptor)
    }

    pub fn gas_consumed(&self) -> Gas {
        self.gas_meter.as_ref().map_or(0, GasMeter::consumed)
    }

    // ------------------------------------------------------------------
    // Priority
    // ------------------------------------------------------------------

    pub fn priority(&self) -> Option<i64> {
        self.priority
    }

    /// Records the mempool priority. Written exactly once per transaction.
    pub fn set_priority(&mut self, priority: i64) -> Result<(), AdmissionError> {
        if self.priority.is_some() {
            return Err(AdmissionError::Internal(
                "priority already set for this transaction".to_string(),
            ));
        }
        self.priority = Some(priority);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Signer keys
    // ------------------------------------------------------------------

    pub fn bind_signer_pubkeys(&mut self, keys: Vec<PubKey>) -> Result<(), AdmissionError> {
        if self.signer_pubkeys.is_some() {
            return Err(AdmissionError::Internal(
                "signer public keys already bound".to_string(),
            ));
        }
        self.signer_pubkeys = Some(keys);
        Ok(())
    }

    /// Keys resolved by the public-key stage, in signer order.
    pub fn signer_pubkeys(&self) -> Result<&[PubKey], AdmissionError> {
        self.signer_pubkeys.as_deref().ok_or_else(|| {
            AdmissionError::Internal("signer public keys have not been bound".to_string())
        })
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_meter_installed_once() {
        let mut ctx = ExecutionContext::new("test-chain", 1);
        assert!(ctx.consume_gas(1, "early").is_err());
        ctx.install_gas_meter(GasMeter::new(10)).unwrap();
        assert!(matches!(
            ctx.install_gas_meter(GasMeter::new(10)),
            Err(AdmissionError::Internal(_))
        ));
        ctx.consume_gas(4, "x").unwrap();
        assert_eq!(ctx.gas_consumed(), 4);
    }

    #[test]
    fn test_priority_is_write_once() {
        let mut ctx = ExecutionContext::new("test-chain", 1);
        assert_eq!(ctx.priority(), None);
        ctx.set_priority(7).unwrap();
        assert!(ctx.set_priority(8).is_err());
        assert_eq!(ctx.priority(), Some(7));
    }

    #[test]
    fn test_check_modes() {
        let ctx = ExecutionContext::new("c", 1).with_mode(ExecMode::ReCheck);
        assert!(ctx.is_check_tx());
        assert!(ctx.is_recheck_tx());
        let ctx = ctx.with_mode(ExecMode::Deliver);
        assert!(!ctx.is_check_tx());
    }

    #[test]
    fn test_event_attributes() {
        let event = Event::new("tx").attr("fee", "10uatone");
        assert_eq!(event.get("fee"), Some("10uatone"));
        assert_eq!(event.get("missing"), None);
    }
}
