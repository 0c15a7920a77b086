//! Network-wide minimum fee floor set by governance
use crate::coins::required_fees;
use crate::context::ExecutionContext;
use crate::error::AdmissionError;
use crate::keepers::{GlobalFeeParamSource, GlobalFeeParams, ValidatorSet, ValidatorSnapshot};
use crate::pipeline::{Next, Stage, StageKind};
use crate::transaction::Tx;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

/// Decides whether the fee floor applies for the current validator set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FloorActivation {
    #[default]
    Always,
    /// Lifted while total bonded tokens are below the threshold.
    MinBondedTokens(u128),
}

impl FloorActivation {
    pub fn is_active(&self, snapshot: &ValidatorSnapshot) -> bool {
        match self {
            FloorActivation::Always => true,
            FloorActivation::MinBondedTokens(min) => snapshot.total_bonded_tokens() >= *min,
        }
    }
}

fn is_bypass_tx(params: &GlobalFeeParams, tx: &Tx) -> bool {
    !tx.body.messages.is_empty()
        && tx.gas() <= params.max_total_bypass_min_fee_msg_gas_usage
        && tx.body.messages.iter().all(|msg| {
            params
                .bypass_min_fee_msg_types
                .iter()
                .any(|t| t == msg.type_url())
        })
}

/// Checks the transaction fee against the governance floor.
///
/// No parameters, or an empty price list, means there is no floor.
pub fn check_fee_floor(params: Option<&GlobalFeeParams>, tx: &Tx) -> Result<(), AdmissionError> {
    let Some(params) = params else {
        return Ok(());
    };
    if params.minimum_gas_prices.is_empty() || is_bypass_tx(params, tx) {
        return Ok(());
    }

    let fee = tx.fee();
    let allowed: BTreeSet<&str> = params
        .minimum_gas_prices
        .iter()
        .map(|p| p.denom.as_str())
        .collect();
    if let Some(denom) = fee.denoms().find(|d| !allowed.contains(d)) {
        return Err(AdmissionError::InvalidFeeDenom(format!(
            "fee denom {} is not accepted; allowed denoms: {}",
            denom,
            allowed.into_iter().collect::<Vec<_>>().join(",")
        )));
    }

    // A denom priced at zero for this gas is met by any fee in it, or by no fee at all.
    let zero_priced: BTreeSet<&str> = params
        .minimum_gas_prices
        .iter()
        .filter(|p| p.fee_for_gas(tx.gas()).is_some_and(|c| c.amount == 0))
        .map(|p| p.denom.as_str())
        .collect();
    let pays_zero_priced = fee.is_zero() || fee.denoms().any(|d| zero_priced.contains(d));
    if !zero_priced.is_empty() && pays_zero_priced {
        return Ok(());
    }

    let required = required_fees(&params.minimum_gas_prices, tx.gas())?;
    if required.is_zero() || fee.is_any_gte(&required) {
        return Ok(());
    }
    Err(AdmissionError::InsufficientFee {
        got: fee.to_string(),
        required: required.to_string(),
    })
}

pub struct GlobalFeeStage {
    params: Arc<dyn GlobalFeeParamSource>,
    validators: Arc<dyn ValidatorSet>,
    activation: FloorActivation,
}

impl GlobalFeeStage {
    pub fn new(
        params: Arc<dyn GlobalFeeParamSource>,
        validators: Arc<dyn ValidatorSet>,
        activation: FloorActivation,
    ) -> Self {
        GlobalFeeStage {
            params,
            validators,
            activation,
        }
    }
}

impl Stage for GlobalFeeStage {
    fn kind(&self) -> StageKind {
        StageKind::GlobalFee
    }

    /// Runs in every mode, simulation included, and consumes no gas.
    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let active = match self.activation {
            FloorActivation::Always => true,
            activation => activation.is_active(&self.validators.snapshot()),
        };
        if active {
            check_fee_floor(self.params.params().as_ref(), tx)?;
        } else {
            warn!(
                activation = ?self.activation,
                "bonded stake below threshold, global fee floor lifted"
            );
        }
        next.run(ctx, tx, simulate)
    }
}
