//! Chain-of-responsibility runner
use crate::context::{Event, ExecutionContext};
use crate::error::AdmissionError;
use crate::gas::Gas;
use crate::pipeline::stage::{Next, Stage, StageKind};
use crate::transaction::Tx;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Immutable ordered list of stages, shared read-only across concurrent runs.
#[derive(Clone)]
pub struct Pipeline {
    stages: Arc<[Arc<dyn Stage>]>,
}

/// Outcome of one pipeline run: the final context and the decision.
#[derive(Debug)]
pub struct Admission {
    pub context: ExecutionContext,
    pub result: Result<(), AdmissionError>,
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&AdmissionError> {
        self.result.as_ref().err()
    }

    /// Gas consumed up to acceptance or rejection. Never refunded.
    pub fn gas_used(&self) -> Gas {
        self.context.gas_consumed()
    }

    pub fn gas_wanted(&self) -> Gas {
        self.context.gas_meter().map_or(0, |m| m.limit())
    }

    pub fn priority(&self) -> Option<i64> {
        self.context.priority()
    }

    /// Events to publish. Empty for rejected transactions.
    pub fn events(&self) -> &[Event] {
        if self.is_accepted() {
            self.context.events()
        } else {
            &[]
        }
    }
}

impl Pipeline {
    /// Wraps an already validated stage list.
    pub(crate) fn from_validated(stages: Vec<Arc<dyn Stage>>) -> Self {
        Pipeline {
            stages: stages.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages.iter().map(|s| s.kind()).collect()
    }

    /// Runs `tx` through every stage in order, stopping at the first rejection.
    pub fn run(&self, mut ctx: ExecutionContext, tx: &Tx, simulate: bool) -> Admission {
        let result = Next::new(&self.stages).run(&mut ctx, tx, simulate);
        match &result {
            Ok(()) => debug!(
                tx = %tx.hash_str(),
                gas_used = ctx.gas_consumed(),
                simulate,
                "transaction admitted"
            ),
            Err(e) => debug!(
                tx = %tx.hash_str(),
                gas_used = ctx.gas_consumed(),
                code = e.code(),
                simulate,
                "transaction rejected: {}",
                e
            ),
        }
        Admission {
            context: ctx,
            result,
        }
    }

    /// Validates independent transactions in parallel against this pipeline.
    pub fn run_batch(&self, batch: Vec<(ExecutionContext, Tx)>, simulate: bool) -> Vec<Admission> {
        batch
            .into_par_iter()
            .map(|(ctx, tx)| self.run(ctx, &tx, simulate))
            .collect()
    }
}
