//! Stateless and parameter-driven checks that run before any fee moves
use crate::context::ExecutionContext;
use crate::crypto::PubKey;
use crate::error::AdmissionError;
use crate::gas::Gas;
use crate::keepers::AccountKeeper;
use crate::pipeline::{Next, Stage, StageKind};
use crate::stages::sigverify::{is_incomplete_signature, simulated_secp256k1_pubkey};
use crate::transaction::{Any, Tx};
use std::sync::Arc;

/// Decides whether an extension option is understood by this node.
pub type ExtensionOptionChecker = Arc<dyn Fn(&Any) -> bool + Send + Sync>;

/// Length in bytes of a compact secp256k1 signature, charged for signers that
/// have not signed yet during simulation.
const SIMULATED_SIGNATURE_LEN: Gas = 64;
/// Framing overhead of one encoded signature entry.
const SIGNATURE_ENTRY_OVERHEAD: Gas = 6;

pub struct ExtensionOptionsStage {
    checker: Option<ExtensionOptionChecker>,
}

impl ExtensionOptionsStage {
    /// With no checker, every extension option is rejected.
    pub fn new(checker: Option<ExtensionOptionChecker>) -> Self {
        ExtensionOptionsStage { checker }
    }
}

impl Stage for ExtensionOptionsStage {
    fn kind(&self) -> StageKind {
        StageKind::ExtensionOptions
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        for opt in &tx.body.extension_options {
            let accepted = self.checker.as_ref().is_some_and(|check| check(opt));
            if !accepted {
                return Err(AdmissionError::UnknownExtensionOptions(opt.type_url.clone()));
            }
        }
        ctx.extension_options_checked = true;
        next.run(ctx, tx, simulate)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateBasicStage;

impl Stage for ValidateBasicStage {
    fn kind(&self) -> StageKind {
        StageKind::ValidateBasic
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        // Shape cannot change between check and recheck.
        if !ctx.is_recheck_tx() {
            tx.validate_basic()?;
        }
        next.run(ctx, tx, simulate)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TxTimeoutHeightStage;

impl Stage for TxTimeoutHeightStage {
    fn kind(&self) -> StageKind {
        StageKind::TxTimeoutHeight
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let timeout = tx.body.timeout_height;
        if timeout > 0 && ctx.block_height > timeout {
            return Err(AdmissionError::TxTimeoutHeight {
                timeout,
                current: ctx.block_height,
            });
        }
        next.run(ctx, tx, simulate)
    }
}

pub struct ValidateMemoStage {
    accounts: Arc<dyn AccountKeeper>,
}

impl ValidateMemoStage {
    pub fn new(accounts: Arc<dyn AccountKeeper>) -> Self {
        ValidateMemoStage { accounts }
    }
}

impl Stage for ValidateMemoStage {
    fn kind(&self) -> StageKind {
        StageKind::ValidateMemo
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let len = tx.body.memo.len();
        if len > 0 {
            let max = self.accounts.params().max_memo_characters;
            if len as u64 > max {
                return Err(AdmissionError::MemoTooLarge { max, got: len });
            }
        }
        next.run(ctx, tx, simulate)
    }
}

/// Charges gas proportional to the encoded transaction size.
pub struct ConsumeTxSizeGasStage {
    accounts: Arc<dyn AccountKeeper>,
}

impl ConsumeTxSizeGasStage {
    pub fn new(accounts: Arc<dyn AccountKeeper>) -> Self {
        ConsumeTxSizeGasStage { accounts }
    }

    /// Size of the signature entry an unsigned signer will eventually add.
    fn simulated_entry_cost(
        &self,
        pub_key: &PubKey,
        tx_sig_limit: u64,
    ) -> Result<Gas, AdmissionError> {
        let key_len = bincode::serialized_size(pub_key)?;
        let cost = SIMULATED_SIGNATURE_LEN + key_len + SIGNATURE_ENTRY_OVERHEAD;
        // A multisig signer is estimated at the maximum number of signatures.
        if matches!(pub_key, PubKey::Multisig { .. }) {
            return cost.checked_mul(tx_sig_limit).ok_or_else(|| {
                AdmissionError::GasOverflow("simulated multisig size".to_string())
            });
        }
        Ok(cost)
    }
}

impl Stage for ConsumeTxSizeGasStage {
    fn kind(&self) -> StageKind {
        StageKind::ConsumeTxSizeGas
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let params = self.accounts.params();
        let size = tx.to_bytes()?.len() as Gas;
        let cost = params
            .tx_size_cost_per_byte
            .checked_mul(size)
            .ok_or_else(|| AdmissionError::GasOverflow("txSize".to_string()))?;
        ctx.consume_gas(cost, "txSize")?;

        if simulate {
            for (i, signer) in tx.signers().iter().enumerate() {
                let signed = tx
                    .signatures
                    .get(i)
                    .is_some_and(|sig| !is_incomplete_signature(sig));
                if signed {
                    continue;
                }
                let pub_key = self
                    .accounts
                    .account(signer)
                    .and_then(|acc| acc.pub_key)
                    .unwrap_or_else(simulated_secp256k1_pubkey);
                let entry = self.simulated_entry_cost(&pub_key, params.tx_sig_limit)?;
                let cost = params
                    .tx_size_cost_per_byte
                    .checked_mul(entry)
                    .ok_or_else(|| AdmissionError::GasOverflow("txSize".to_string()))?;
                ctx.consume_gas(cost, "txSize")?;
            }
        }

        next.run(ctx, tx, simulate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::{Coin, Coins};
    use crate::crypto::address_from_string;
    use crate::gas::GasMeter;
    use crate::memstore::InMemoryAccounts;
    use crate::keepers::{AuthParams, BaseAccount};
    use crate::transaction::{Fee, Msg, SignMode, SignatureData, SignerInfo};

    fn send_tx() -> Tx {
        let from = address_from_string("alice");
        let mut tx = Tx::new(
            vec![Msg::Send {
                from_address: from,
                to_address: address_from_string("bob"),
                amount: Coins::single(Coin::new("uatone", 1)),
            }],
            Fee {
                amount: Coins::single(Coin::new("uatone", 100)),
                gas_limit: 100_000,
                ..Fee::default()
            },
        );
        tx.auth_info.signer_infos = vec![SignerInfo {
            public_key: None,
            sequence: 0,
        }];
        tx.signatures = vec![SignatureData::Single {
            mode: SignMode::Direct,
            signature: Vec::new(),
        }];
        tx
    }

    fn metered_ctx() -> ExecutionContext {
        let mut ctx = ExecutionContext::new("c", 3);
        ctx.install_gas_meter(GasMeter::infinite()).unwrap();
        ctx
    }

    #[test]
    fn test_extension_options_rejected_by_default() {
        let mut tx = send_tx();
        tx.body.extension_options.push(Any {
            type_url: "/ext.Option".to_string(),
            value: vec![],
        });
        let mut ctx = metered_ctx();
        let err = ExtensionOptionsStage::new(None)
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap_err();
        assert!(matches!(err, AdmissionError::UnknownExtensionOptions(ref u) if u == "/ext.Option"));
        assert!(!ctx.extension_options_checked);

        let accept: ExtensionOptionChecker = Arc::new(|any: &Any| any.type_url == "/ext.Option");
        ExtensionOptionsStage::new(Some(accept))
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap();
        assert!(ctx.extension_options_checked);
    }

    #[test]
    fn test_timeout_height() {
        let tx = send_tx().with_timeout_height(2);
        let mut ctx = metered_ctx();
        assert!(matches!(
            TxTimeoutHeightStage.handle(&mut ctx, &tx, false, Next::end()),
            Err(AdmissionError::TxTimeoutHeight { timeout: 2, current: 3 })
        ));
        let tx = send_tx().with_timeout_height(3);
        TxTimeoutHeightStage
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap();
    }

    #[test]
    fn test_validate_basic_skipped_on_recheck() {
        let tx = Tx::default();
        let mut ctx = metered_ctx();
        assert!(ValidateBasicStage
            .handle(&mut ctx, &tx, false, Next::end())
            .is_err());
        let mut ctx = ctx.with_mode(crate::context::ExecMode::ReCheck);
        ValidateBasicStage
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap();
    }

    #[test]
    fn test_memo_limit_from_params() {
        let accounts = Arc::new(InMemoryAccounts::with_params(AuthParams {
            max_memo_characters: 4,
            ..AuthParams::default()
        }));
        let stage = ValidateMemoStage::new(accounts);
        let mut ctx = metered_ctx();
        stage
            .handle(&mut ctx, &send_tx().with_memo("abcd"), false, Next::end())
            .unwrap();
        assert!(matches!(
            stage.handle(&mut ctx, &send_tx().with_memo("abcde"), false, Next::end()),
            Err(AdmissionError::MemoTooLarge { max: 4, got: 5 })
        ));
    }

    #[test]
    fn test_size_gas_and_simulated_signature() {
        let accounts = Arc::new(InMemoryAccounts::new());
        accounts.set_account(BaseAccount {
            address: address_from_string("alice"),
            pub_key: None,
            account_number: 1,
            sequence: 0,
        });
        let stage = ConsumeTxSizeGasStage::new(accounts);
        let tx = send_tx();
        let size = tx.to_bytes().unwrap().len() as u64;

        let mut ctx = metered_ctx();
        stage.handle(&mut ctx, &tx, false, Next::end()).unwrap();
        assert_eq!(ctx.gas_consumed(), size * 10);

        let mut sim = metered_ctx();
        stage.handle(&mut sim, &tx, true, Next::end()).unwrap();
        assert!(sim.gas_consumed() > size * 10);
    }
}
