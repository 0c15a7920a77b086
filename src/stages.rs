//! Built-in admission stages, in pipeline order

pub mod setup;
pub mod basic;
pub mod gov_vote;
pub mod global_fee;
pub mod fee;
pub mod sigverify;
pub mod relay;

pub use basic::{
    ConsumeTxSizeGasStage, ExtensionOptionChecker, ExtensionOptionsStage, TxTimeoutHeightStage,
    ValidateBasicStage, ValidateMemoStage,
};
pub use fee::{check_tx_fee_with_validator_min_gas_prices, tx_priority, DeductFeeStage, TxFeeChecker};
pub use global_fee::{check_fee_floor, FloorActivation, GlobalFeeStage};
pub use gov_vote::{inspect_votes, GovVoteInspectorStage, VotePolicy, MAX_NESTED_MSG_DEPTH};
pub use relay::RedundantRelayStage;
pub use setup::SetUpContextStage;
pub use sigverify::{
    default_sig_verification_gas_consumer, IncrementSequenceStage, SetPubKeyStage,
    SigGasConsumeStage, SigGasConsumer, SigVerificationStage, ValidateSigCountStage,
};
