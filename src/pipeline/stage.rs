//! The `Stage` contract and the `Next` continuation
use crate::context::ExecutionContext;
use crate::error::AdmissionError;
use crate::transaction::Tx;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Identity of a stage, used to check ordering constraints at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    SetUpContext,
    ExtensionOptions,
    ValidateBasic,
    TxTimeoutHeight,
    ValidateMemo,
    ConsumeTxSizeGas,
    GovVoteInspector,
    GlobalFee,
    DeductFee,
    SetPubKey,
    ValidateSigCount,
    SigGasConsume,
    SigVerification,
    IncrementSequence,
    RedundantRelay,
    /// Application-specific stage with no built-in ordering constraints.
    Custom(&'static str),
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StageKind::Custom(name) => write!(f, "custom:{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// One link in the admission chain.
///
/// A stage reads and writes only the context of the transaction it is handed.
/// To continue, it calls `next.run(..)`; returning without doing so (with an
/// error) stops the chain and no later stage observes anything. A stage may
/// also wrap behaviour around the rest of the chain, as the setup stage does
/// for panic recovery.
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError>;
}

/// The remainder of the chain after the current stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Stage>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(stages: &'a [Arc<dyn Stage>]) -> Self {
        Next { stages }
    }

    /// Terminal continuation, handy when unit testing a single stage.
    pub fn end() -> Next<'static> {
        Next { stages: &[] }
    }

    pub fn run(
        self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
    ) -> Result<(), AdmissionError> {
        let Some((stage, rest)) = self.stages.split_first() else {
            return Ok(());
        };
        trace!(stage = %stage.kind(), gas_used = ctx.gas_consumed(), "entering stage");
        let result = stage.handle(ctx, tx, simulate, Next::new(rest));
        if let Err(ref e) = result {
            trace!(stage = %stage.kind(), error = %e, "stage returned error");
        }
        result
    }

    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}
