use crate::context::ExecutionContext;
use crate::error::AdmissionError;
use crate::gas::GasMeter;
use crate::pipeline::{Next, Stage, StageKind};
use crate::transaction::Tx;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Outermost stage. Installs the gas meter and turns panics below it into rejections.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetUpContextStage;

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Stage for SetUpContextStage {
    fn kind(&self) -> StageKind {
        StageKind::SetUpContext
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let gas = tx.gas();
        // Genesis transactions and simulations run unmetered.
        let meter = if simulate || ctx.block_height == 0 {
            GasMeter::infinite()
        } else {
            GasMeter::new(gas)
        };
        ctx.install_gas_meter(meter)?;

        if let Some(max) = ctx.max_block_gas {
            if gas > max {
                return Err(AdmissionError::InvalidRequest(format!(
                    "tx gas limit {} exceeds block max gas {}",
                    gas, max
                )));
            }
        }

        match catch_unwind(AssertUnwindSafe(|| next.run(ctx, tx, simulate))) {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(
                    tx = %tx.hash_str(),
                    gas_used = ctx.gas_consumed(),
                    "recovered panic in admission pipeline: {}",
                    message
                );
                Err(AdmissionError::Internal(format!(
                    "panic in admission pipeline: {}",
                    message
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use std::sync::Arc;

    struct Burn(u64);

    impl Stage for Burn {
        fn kind(&self) -> StageKind {
            StageKind::Custom("burn")
        }

        fn handle(
            &self,
            ctx: &mut ExecutionContext,
            tx: &Tx,
            simulate: bool,
            next: Next<'_>,
        ) -> Result<(), AdmissionError> {
            ctx.consume_gas(self.0, "burn")?;
            next.run(ctx, tx, simulate)
        }
    }

    struct Explode;

    impl Stage for Explode {
        fn kind(&self) -> StageKind {
            StageKind::Custom("explode")
        }

        fn handle(
            &self,
            _ctx: &mut ExecutionContext,
            _tx: &Tx,
            _simulate: bool,
            _next: Next<'_>,
        ) -> Result<(), AdmissionError> {
            panic!("stage exploded");
        }
    }

    fn tx_with_gas(gas: u64) -> Tx {
        let mut tx = Tx::default();
        tx.auth_info.fee.gas_limit = gas;
        tx
    }

    #[test]
    fn test_meter_limited_by_tx_gas() {
        let pipeline =
            Pipeline::from_stages(vec![Arc::new(SetUpContextStage), Arc::new(Burn(30))]).unwrap();
        let admission = pipeline.run(ExecutionContext::new("c", 5), &tx_with_gas(20), false);
        assert!(matches!(admission.result, Err(AdmissionError::OutOfGas(_))));
        assert_eq!(admission.gas_wanted(), 20);
        assert_eq!(admission.gas_used(), 30);
    }

    #[test]
    fn test_simulate_and_genesis_are_unmetered() {
        let pipeline =
            Pipeline::from_stages(vec![Arc::new(SetUpContextStage), Arc::new(Burn(30))]).unwrap();
        let sim = pipeline.run(ExecutionContext::new("c", 5), &tx_with_gas(20), true);
        assert!(sim.is_accepted());
        assert_eq!(sim.gas_used(), 30);

        let genesis = pipeline.run(ExecutionContext::new("c", 0), &tx_with_gas(20), false);
        assert!(genesis.is_accepted());
    }

    #[test]
    fn test_block_gas_ceiling() {
        let pipeline = Pipeline::from_stages(vec![Arc::new(SetUpContextStage)]).unwrap();
        let ctx = ExecutionContext::new("c", 5).with_max_block_gas(100);
        let admission = pipeline.run(ctx, &tx_with_gas(101), false);
        assert!(matches!(admission.result, Err(AdmissionError::InvalidRequest(_))));
    }

    #[test]
    fn test_panic_recovered_with_gas_preserved() {
        let pipeline = Pipeline::from_stages(vec![
            Arc::new(SetUpContextStage),
            Arc::new(Burn(7)),
            Arc::new(Explode),
        ])
        .unwrap();
        let admission = pipeline.run(ExecutionContext::new("c", 5), &tx_with_gas(100), false);
        let err = admission.error().unwrap();
        assert!(err.is_internal());
        assert!(err.to_string().contains("stage exploded"));
        assert_eq!(admission.gas_used(), 7);
    }
}
