//! Pipeline construction: collaborator checks and stage ordering
use crate::error::ConfigError;
use crate::keepers::{
    AccountKeeper, BankKeeper, FeegrantKeeper, GlobalFeeParamSource, MsgCodec, RelayKeeper,
    SignModeHandler, ValidatorSet,
};
use crate::pipeline::executor::Pipeline;
use crate::pipeline::stage::{Stage, StageKind};
use crate::stages::basic::{
    ConsumeTxSizeGasStage, ExtensionOptionChecker, ExtensionOptionsStage, TxTimeoutHeightStage,
    ValidateBasicStage, ValidateMemoStage,
};
use crate::stages::fee::{check_tx_fee_with_validator_min_gas_prices, DeductFeeStage, TxFeeChecker};
use crate::stages::global_fee::{FloorActivation, GlobalFeeStage};
use crate::stages::gov_vote::{GovVoteInspectorStage, VotePolicy};
use crate::stages::relay::RedundantRelayStage;
use crate::stages::setup::SetUpContextStage;
use crate::stages::sigverify::{
    default_sig_verification_gas_consumer, IncrementSequenceStage, SetPubKeyStage,
    SigGasConsumeStage, SigGasConsumer, SigVerificationStage, ValidateSigCountStage,
};
use crate::transaction::JsonCodec;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Pairs `(before, after, reason)`: when both stages are present, `before` must run first.
pub const ORDERING_CONSTRAINTS: &[(StageKind, StageKind, &str)] = &[
    (
        StageKind::ExtensionOptions,
        StageKind::ConsumeTxSizeGas,
        "unknown extension options are rejected before any gas is charged",
    ),
    (
        StageKind::ValidateMemo,
        StageKind::ConsumeTxSizeGas,
        "oversized memos are rejected before size gas is charged",
    ),
    (
        StageKind::ValidateBasic,
        StageKind::DeductFee,
        "malformed transactions never pay fees",
    ),
    (
        StageKind::TxTimeoutHeight,
        StageKind::DeductFee,
        "timed out transactions never pay fees",
    ),
    (
        StageKind::ConsumeTxSizeGas,
        StageKind::DeductFee,
        "size gas is charged before fees move",
    ),
    (
        StageKind::GovVoteInspector,
        StageKind::DeductFee,
        "rejected validator votes never pay fees",
    ),
    (
        StageKind::GlobalFee,
        StageKind::DeductFee,
        "the fee floor is enforced before fees move",
    ),
    (
        StageKind::DeductFee,
        StageKind::SigGasConsume,
        "signature gas is charged to a fee that was already paid",
    ),
    (
        StageKind::DeductFee,
        StageKind::SigVerification,
        "signature verification runs after the fee is paid",
    ),
    (
        StageKind::DeductFee,
        StageKind::IncrementSequence,
        "sequences advance only for transactions that paid",
    ),
    (
        StageKind::SetPubKey,
        StageKind::ValidateSigCount,
        "signature count needs the resolved signer keys",
    ),
    (
        StageKind::SetPubKey,
        StageKind::SigGasConsume,
        "signature gas needs the resolved signer keys",
    ),
    (
        StageKind::SetPubKey,
        StageKind::SigVerification,
        "signature verification needs the resolved signer keys",
    ),
    (
        StageKind::SetPubKey,
        StageKind::IncrementSequence,
        "sequences advance after keys are bound",
    ),
    (
        StageKind::ValidateSigCount,
        StageKind::SigGasConsume,
        "signature count is bounded before gas is charged per signature",
    ),
    (
        StageKind::SigGasConsume,
        StageKind::SigVerification,
        "signature gas is charged before verification work",
    ),
    (
        StageKind::SigVerification,
        StageKind::IncrementSequence,
        "sequence is checked before it is incremented",
    ),
    (
        StageKind::SigVerification,
        StageKind::RedundantRelay,
        "relay redundancy is judged for authenticated transactions only",
    ),
];

/// Every capability the admission pipeline may need.
#[derive(Clone, Default)]
pub struct HandlerOptions {
    pub account_keeper: Option<Arc<dyn AccountKeeper>>,
    pub bank_keeper: Option<Arc<dyn BankKeeper>>,
    pub sign_mode_handler: Option<Arc<dyn SignModeHandler>>,
    pub relay_keeper: Option<Arc<dyn RelayKeeper>>,
    pub feegrant_keeper: Option<Arc<dyn FeegrantKeeper>>,
    pub extension_option_checker: Option<ExtensionOptionChecker>,
    pub tx_fee_checker: Option<TxFeeChecker>,
    pub global_fee_params: Option<Arc<dyn GlobalFeeParamSource>>,
    pub validator_set: Option<Arc<dyn ValidatorSet>>,
    pub codec: Option<Arc<dyn MsgCodec>>,
    pub sig_gas_consumer: Option<SigGasConsumer>,
    pub vote_policy: VotePolicy,
    pub floor_activation: FloorActivation,
}

fn required<T: ?Sized>(
    value: &Option<Arc<T>>,
    name: &'static str,
) -> Result<Arc<T>, ConfigError> {
    value
        .clone()
        .ok_or(ConfigError::MissingCollaborator(name))
}

impl Pipeline {
    /// Validates the options and assembles the standard fifteen-stage pipeline.
    pub fn build(opts: HandlerOptions) -> Result<Pipeline, ConfigError> {
        let accounts = required(&opts.account_keeper, "account keeper")?;
        let bank = required(&opts.bank_keeper, "bank keeper")?;
        let sign_mode_handler = required(&opts.sign_mode_handler, "sign mode handler")?;
        let relay = required(&opts.relay_keeper, "relay keeper")?;

        let global_fee_params = match &opts.global_fee_params {
            Some(source) if !source.subspace_name().is_empty() => Arc::clone(source),
            _ => return Err(ConfigError::NotFound("global fee param store")),
        };
        let validators = opts
            .validator_set
            .clone()
            .ok_or(ConfigError::NotFound("validator set"))?;

        let codec = opts
            .codec
            .clone()
            .unwrap_or_else(|| Arc::new(JsonCodec) as Arc<dyn MsgCodec>);
        let fee_checker = opts
            .tx_fee_checker
            .clone()
            .unwrap_or_else(|| Arc::new(check_tx_fee_with_validator_min_gas_prices) as TxFeeChecker);
        let sig_gas_consumer = opts
            .sig_gas_consumer
            .unwrap_or(default_sig_verification_gas_consumer);

        let stages: Vec<Arc<dyn Stage>> = vec![
            Arc::new(SetUpContextStage),
            Arc::new(ExtensionOptionsStage::new(opts.extension_option_checker.clone())),
            Arc::new(ValidateBasicStage),
            Arc::new(TxTimeoutHeightStage),
            Arc::new(ValidateMemoStage::new(Arc::clone(&accounts))),
            Arc::new(ConsumeTxSizeGasStage::new(Arc::clone(&accounts))),
            Arc::new(GovVoteInspectorStage::new(
                Arc::clone(&validators),
                codec,
                opts.vote_policy,
            )),
            Arc::new(GlobalFeeStage::new(
                global_fee_params,
                validators,
                opts.floor_activation,
            )),
            Arc::new(DeductFeeStage::new(
                Arc::clone(&accounts),
                bank,
                opts.feegrant_keeper.clone(),
                fee_checker,
            )),
            Arc::new(SetPubKeyStage::new(Arc::clone(&accounts))),
            Arc::new(ValidateSigCountStage::new(Arc::clone(&accounts))),
            Arc::new(SigGasConsumeStage::new(Arc::clone(&accounts), sig_gas_consumer)),
            Arc::new(SigVerificationStage::new(Arc::clone(&accounts), sign_mode_handler)),
            Arc::new(IncrementSequenceStage::new(accounts)),
            Arc::new(RedundantRelayStage::new(relay)),
        ];

        let pipeline = Pipeline::from_stages(stages)?;
        info!(
            stages = pipeline.len(),
            vote_policy = ?opts.vote_policy,
            floor_activation = ?opts.floor_activation,
            "admission pipeline built"
        );
        Ok(pipeline)
    }

    /// Builds a pipeline from a custom stage list, checking ordering preconditions.
    pub fn from_stages(stages: Vec<Arc<dyn Stage>>) -> Result<Pipeline, ConfigError> {
        validate_ordering(&stages.iter().map(|s| s.kind()).collect::<Vec<_>>())?;
        Ok(Pipeline::from_validated(stages))
    }
}

/// Checks a stage order against the setup-first rule and [`ORDERING_CONSTRAINTS`].
pub fn validate_ordering(kinds: &[StageKind]) -> Result<(), ConfigError> {
    match kinds.first() {
        Some(StageKind::SetUpContext) => {}
        Some(other) => {
            return Err(ConfigError::Ordering(format!(
                "{} must be the first stage, found {}",
                StageKind::SetUpContext,
                other
            )))
        }
        None => {
            return Err(ConfigError::Ordering(
                "a pipeline needs at least the setup stage".to_string(),
            ))
        }
    }

    let mut seen = HashSet::new();
    for kind in kinds {
        if matches!(kind, StageKind::Custom(_)) {
            continue;
        }
        if !seen.insert(*kind) {
            return Err(ConfigError::Ordering(format!("{} appears more than once", kind)));
        }
    }

    let position = |kind: StageKind| kinds.iter().position(|k| *k == kind);
    for (before, after, reason) in ORDERING_CONSTRAINTS {
        if let (Some(b), Some(a)) = (position(*before), position(*after)) {
            if b > a {
                return Err(ConfigError::Ordering(format!(
                    "{} must run before {}: {}",
                    before, after, reason
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STANDARD: [StageKind; 15] = [
        StageKind::SetUpContext,
        StageKind::ExtensionOptions,
        StageKind::ValidateBasic,
        StageKind::TxTimeoutHeight,
        StageKind::ValidateMemo,
        StageKind::ConsumeTxSizeGas,
        StageKind::GovVoteInspector,
        StageKind::GlobalFee,
        StageKind::DeductFee,
        StageKind::SetPubKey,
        StageKind::ValidateSigCount,
        StageKind::SigGasConsume,
        StageKind::SigVerification,
        StageKind::IncrementSequence,
        StageKind::RedundantRelay,
    ];

    #[test]
    fn test_standard_order_is_valid() {
        validate_ordering(&STANDARD).unwrap();
    }

    #[test]
    fn test_setup_must_be_first() {
        let mut kinds = STANDARD.to_vec();
        kinds.swap(0, 1);
        let err = validate_ordering(&kinds).unwrap_err();
        assert!(err.to_string().contains("must be the first stage"));
        assert!(validate_ordering(&[]).is_err());
    }

    #[test]
    fn test_signature_stage_before_pubkey_rejected() {
        let kinds = vec![
            StageKind::SetUpContext,
            StageKind::SigVerification,
            StageKind::SetPubKey,
        ];
        let err = validate_ordering(&kinds).unwrap_err();
        assert!(matches!(err, ConfigError::Ordering(ref m) if m.contains("SetPubKey must run before SigVerification")));
    }

    #[test]
    fn test_fee_floor_after_deduction_rejected() {
        let kinds = vec![
            StageKind::SetUpContext,
            StageKind::DeductFee,
            StageKind::GlobalFee,
        ];
        assert!(validate_ordering(&kinds).is_err());
    }

    #[test]
    fn test_duplicates_rejected_but_custom_allowed() {
        let dup = vec![
            StageKind::SetUpContext,
            StageKind::ValidateBasic,
            StageKind::ValidateBasic,
        ];
        assert!(validate_ordering(&dup).is_err());

        let custom = vec![
            StageKind::SetUpContext,
            StageKind::Custom("audit"),
            StageKind::Custom("audit"),
            StageKind::ValidateBasic,
        ];
        validate_ordering(&custom).unwrap();
    }

    #[test]
    fn test_subset_respects_present_pairs_only() {
        let kinds = vec![
            StageKind::SetUpContext,
            StageKind::SetPubKey,
            StageKind::SigVerification,
            StageKind::IncrementSequence,
        ];
        validate_ordering(&kinds).unwrap();
    }
}
