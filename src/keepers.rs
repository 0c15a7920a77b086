//! Capabilities the pipeline consumes from the rest of the node
//!
//! The pipeline never owns ledger state. Everything it reads or writes goes
//! through these traits. Implementations are shared by every concurrent
//! pipeline run and are responsible for their own synchronisation.

use crate::coins::{Coins, DecCoin};
use crate::crypto::{Address, PubKey};
use crate::error::AdmissionError;
use crate::transaction::{Msg, PacketId, SignMode, Tx};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use crate::transaction::MsgCodec;

/// Module account receiving deducted fees.
pub const FEE_COLLECTOR: &str = "fee_collector";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseAccount {
    pub address: Address,
    pub pub_key: Option<PubKey>,
    pub account_number: u64,
    pub sequence: u64,
}

/// Auth module parameters consulted by the size, memo and signature stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub max_memo_characters: u64,
    pub tx_sig_limit: u64,
    pub tx_size_cost_per_byte: u64,
    pub sig_verify_cost_ed25519: u64,
    pub sig_verify_cost_secp256k1: u64,
}

impl Default for AuthParams {
    fn default() -> Self {
        AuthParams {
            max_memo_characters: 256,
            tx_sig_limit: 7,
            tx_size_cost_per_byte: 10,
            sig_verify_cost_ed25519: 590,
            sig_verify_cost_secp256k1: 1000,
        }
    }
}

pub trait AccountKeeper: Send + Sync {
    fn account(&self, addr: &Address) -> Option<BaseAccount>;
    fn set_account(&self, account: BaseAccount);
    /// Advances the sequence from `expected` to `expected + 1` as one atomic step.
    ///
    /// Fails with `WrongSequence` if the stored sequence is not `expected`, so of two
    /// transactions signed at the same sequence only one can advance it.
    fn increment_sequence(&self, addr: &Address, expected: u64) -> Result<u64, AdmissionError>;
    fn params(&self) -> AuthParams;
}

pub trait BankKeeper: Send + Sync {
    fn spendable_coins(&self, addr: &Address) -> Coins;
    /// Moves `amount` from an account to the named module account.
    fn send_coins_to_module(
        &self,
        from: &Address,
        module: &str,
        amount: &Coins,
    ) -> Result<(), AdmissionError>;
}

pub trait FeegrantKeeper: Send + Sync {
    /// Checks the allowance `granter` gave `grantee` covers `fee`, without consuming it.
    fn check_granted_fees(
        &self,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
        msgs: &[Msg],
    ) -> Result<(), AdmissionError>;

    /// Consumes `fee` from the allowance `granter` gave `grantee`, failing if it does not cover it.
    fn use_granted_fees(
        &self,
        granter: &Address,
        grantee: &Address,
        fee: &Coins,
        msgs: &[Msg],
    ) -> Result<(), AdmissionError>;
}

/// Everything a signer commits to besides the transaction itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerData {
    pub address: Address,
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
    pub pub_key: PubKey,
}

pub trait SignModeHandler: Send + Sync {
    fn default_mode(&self) -> SignMode;
    fn sign_bytes(
        &self,
        mode: SignMode,
        data: &SignerData,
        tx: &Tx,
    ) -> Result<Vec<u8>, AdmissionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondStatus {
    Bonded,
    Unbonding,
    Unbonded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Account address of the validator operator.
    pub operator: Address,
    pub tokens: u128,
    pub status: BondStatus,
}

/// Point-in-time view of the validator set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorSnapshot {
    validators: BTreeMap<Address, Validator>,
}

impl ValidatorSnapshot {
    pub fn new<I: IntoIterator<Item = Validator>>(validators: I) -> Self {
        ValidatorSnapshot {
            validators: validators.into_iter().map(|v| (v.operator, v)).collect(),
        }
    }

    pub fn get(&self, operator: &Address) -> Option<&Validator> {
        self.validators.get(operator)
    }

    pub fn is_bonded(&self, operator: &Address) -> bool {
        self.get(operator)
            .is_some_and(|v| v.status == BondStatus::Bonded)
    }

    pub fn total_bonded_tokens(&self) -> u128 {
        self.validators
            .values()
            .filter(|v| v.status == BondStatus::Bonded)
            .map(|v| v.tokens)
            .fold(0u128, u128::saturating_add)
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

pub trait ValidatorSet: Send + Sync {
    fn snapshot(&self) -> ValidatorSnapshot;
}

/// Global minimum-fee parameters, changeable by governance at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalFeeParams {
    pub minimum_gas_prices: Vec<DecCoin>,
    #[serde(default)]
    pub bypass_min_fee_msg_types: Vec<String>,
    #[serde(default)]
    pub max_total_bypass_min_fee_msg_gas_usage: u64,
}

pub trait GlobalFeeParamSource: Send + Sync {
    /// Name of the parameter subspace. Empty means the store is not wired.
    fn subspace_name(&self) -> &str;
    /// Current parameters; `None` when governance has not configured any.
    fn params(&self) -> Option<GlobalFeeParams>;
}

pub trait RelayKeeper: Send + Sync {
    /// True when the packet was already received, acknowledged or timed out.
    fn is_redundant(&self, packet: &PacketId) -> bool;
    /// True when an update for this client would change its state.
    fn update_client_valid(&self, client_id: &str) -> bool;
}
