//! Public-key binding, signature metering and verification, sequence increment
use crate::context::{Event, ExecutionContext};
use crate::crypto::{address_to_hex, verify_secp256k1, Address, PubKey};
use crate::error::AdmissionError;
use crate::gas::GasMeter;
use crate::keepers::{AccountKeeper, AuthParams, BaseAccount, SignModeHandler, SignerData};
use crate::pipeline::{Next, Stage, StageKind};
use crate::transaction::{SignMode, SignatureData, Tx};
use std::sync::Arc;
use tracing::{debug, trace};

/// Charges gas for verifying one signature against its public key.
pub type SigGasConsumer =
    fn(&mut GasMeter, &SignatureData, &PubKey, &AuthParams) -> Result<(), AdmissionError>;

/// Stand-in key for signers whose key is not yet known during simulation.
pub fn simulated_secp256k1_pubkey() -> PubKey {
    PubKey::Secp256k1(vec![0x02; 33])
}

/// Stand-in signature data sized for the largest verification cost of `pub_key`.
fn simulated_signature(pub_key: &PubKey) -> SignatureData {
    match pub_key {
        PubKey::Multisig { keys, .. } => SignatureData::Multi {
            bitarray: vec![true; keys.len()],
            signatures: keys.iter().map(simulated_signature).collect(),
        },
        _ => SignatureData::Single {
            mode: SignMode::Direct,
            signature: vec![0; 64],
        },
    }
}

/// True when the signer has not produced (all of) its signature yet.
pub fn is_incomplete_signature(sig: &SignatureData) -> bool {
    match sig {
        SignatureData::Single { signature, .. } => signature.is_empty(),
        SignatureData::Multi { signatures, .. } => {
            signatures.is_empty() || signatures.iter().any(is_incomplete_signature)
        }
    }
}

fn signer_account(
    accounts: &dyn AccountKeeper,
    addr: &Address,
) -> Result<BaseAccount, AdmissionError> {
    accounts.account(addr).ok_or_else(|| {
        AdmissionError::UnknownAddress(format!("account {} does not exist", address_to_hex(addr)))
    })
}

fn signer_key<'a>(keys: &'a [PubKey], index: usize) -> Result<&'a PubKey, AdmissionError> {
    keys.get(index).ok_or_else(|| {
        AdmissionError::Unauthorized(format!("no public key bound for signature {}", index))
    })
}

// ----------------------------------------------------------------------
// SetPubKey
// ----------------------------------------------------------------------

/// Resolves each signer's public key and binds it to the account on first use.
pub struct SetPubKeyStage {
    accounts: Arc<dyn AccountKeeper>,
}

impl SetPubKeyStage {
    pub fn new(accounts: Arc<dyn AccountKeeper>) -> Self {
        SetPubKeyStage { accounts }
    }
}

impl Stage for SetPubKeyStage {
    fn kind(&self) -> StageKind {
        StageKind::SetPubKey
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let signers = tx.signers();
        let mut keys = Vec::with_capacity(signers.len());

        for (i, signer) in signers.iter().enumerate() {
            let mut account = signer_account(self.accounts.as_ref(), signer)?;
            let supplied = tx
                .auth_info
                .signer_infos
                .get(i)
                .and_then(|info| info.public_key.clone());

            let key = match (supplied, &account.pub_key) {
                (Some(pk), _) => {
                    if pk.address() != *signer {
                        return Err(AdmissionError::InvalidPubKey(format!(
                            "pubkey does not match signer address {} with signer index: {}",
                            address_to_hex(signer),
                            i
                        )));
                    }
                    pk
                }
                (None, Some(existing)) => existing.clone(),
                (None, None) if simulate => simulated_secp256k1_pubkey(),
                (None, None) => {
                    return Err(AdmissionError::InvalidPubKey(format!(
                        "pubkey on account {} is not set",
                        address_to_hex(signer)
                    )))
                }
            };

            if account.pub_key.is_none() && !simulate {
                account.pub_key = Some(key.clone());
                self.accounts.set_account(account.clone());
            }

            ctx.emit(Event::new("tx").attr(
                "acc_seq",
                format!("{}/{}", address_to_hex(signer), account.sequence),
            ));
            keys.push(key);
        }

        for sig in &tx.signatures {
            if is_incomplete_signature(sig) {
                continue;
            }
            let encoded = match sig {
                SignatureData::Single { signature, .. } => hex::encode(signature),
                multi => hex::encode(bincode::serialize(multi)?),
            };
            ctx.emit(Event::new("tx").attr("signature", encoded));
        }

        ctx.bind_signer_pubkeys(keys)?;
        next.run(ctx, tx, simulate)
    }
}

// ----------------------------------------------------------------------
// ValidateSigCount
// ----------------------------------------------------------------------

pub struct ValidateSigCountStage {
    accounts: Arc<dyn AccountKeeper>,
}

impl ValidateSigCountStage {
    pub fn new(accounts: Arc<dyn AccountKeeper>) -> Self {
        ValidateSigCountStage { accounts }
    }
}

impl Stage for ValidateSigCountStage {
    fn kind(&self) -> StageKind {
        StageKind::ValidateSigCount
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let limit = self.accounts.params().tx_sig_limit;
        let mut count: u64 = 0;
        for key in ctx.signer_pubkeys()? {
            count = count.saturating_add(key.key_count());
            if count > limit {
                return Err(AdmissionError::TooManySignatures { got: count, limit });
            }
        }
        next.run(ctx, tx, simulate)
    }
}

// ----------------------------------------------------------------------
// SigGasConsume
// ----------------------------------------------------------------------

pub struct SigGasConsumeStage {
    accounts: Arc<dyn AccountKeeper>,
    consumer: SigGasConsumer,
}

impl SigGasConsumeStage {
    pub fn new(accounts: Arc<dyn AccountKeeper>, consumer: SigGasConsumer) -> Self {
        SigGasConsumeStage { accounts, consumer }
    }
}

impl Stage for SigGasConsumeStage {
    fn kind(&self) -> StageKind {
        StageKind::SigGasConsume
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let params = self.accounts.params();
        let keys = ctx.signer_pubkeys()?.to_vec();

        for (i, sig) in tx.signatures.iter().enumerate() {
            let key = signer_key(&keys, i)?;
            let placeholder;
            let sig = if simulate && is_incomplete_signature(sig) {
                placeholder = simulated_signature(key);
                &placeholder
            } else {
                sig
            };
            (self.consumer)(ctx.gas_meter_mut()?, sig, key, &params)?;
        }

        next.run(ctx, tx, simulate)
    }
}

/// Charges the per-algorithm verification cost. Ed25519 keys are charged, then rejected.
pub fn default_sig_verification_gas_consumer(
    meter: &mut GasMeter,
    sig: &SignatureData,
    pub_key: &PubKey,
    params: &AuthParams,
) -> Result<(), AdmissionError> {
    match pub_key {
        PubKey::Ed25519(_) => {
            meter.consume_gas(params.sig_verify_cost_ed25519, "ante verify: ed25519")?;
            Err(AdmissionError::InvalidPubKey(
                "ED25519 public keys are unsupported".to_string(),
            ))
        }
        PubKey::Secp256k1(_) => {
            meter.consume_gas(params.sig_verify_cost_secp256k1, "ante verify: secp256k1")
        }
        PubKey::Multisig { keys, .. } => match sig {
            SignatureData::Multi {
                bitarray,
                signatures,
            } => consume_multisignature_verification_gas(meter, bitarray, signatures, keys, params),
            SignatureData::Single { .. } => Err(AdmissionError::InvalidPubKey(
                "expected multisignature data for a multisig key".to_string(),
            )),
        },
    }
}

/// Charges each sub-key whose bit is set.
pub fn consume_multisignature_verification_gas(
    meter: &mut GasMeter,
    bitarray: &[bool],
    signatures: &[SignatureData],
    keys: &[PubKey],
    params: &AuthParams,
) -> Result<(), AdmissionError> {
    let mut sig_index = 0;
    for (i, key) in keys.iter().enumerate() {
        if !bitarray.get(i).copied().unwrap_or(false) {
            continue;
        }
        let sig = signatures.get(sig_index).ok_or_else(|| {
            AdmissionError::Unauthorized(format!("multisignature is missing the entry for key {}", i))
        })?;
        default_sig_verification_gas_consumer(meter, sig, key, params)?;
        sig_index += 1;
    }
    Ok(())
}

// ----------------------------------------------------------------------
// SigVerification
// ----------------------------------------------------------------------

/// Checks sequences and verifies every signature over the mode's sign bytes.
pub struct SigVerificationStage {
    accounts: Arc<dyn AccountKeeper>,
    handler: Arc<dyn SignModeHandler>,
}

impl SigVerificationStage {
    pub fn new(accounts: Arc<dyn AccountKeeper>, handler: Arc<dyn SignModeHandler>) -> Self {
        SigVerificationStage { accounts, handler }
    }
}

/// Verifies `sig` made by `pub_key`, descending into multisig keys.
pub fn verify_signature_data(
    handler: &dyn SignModeHandler,
    pub_key: &PubKey,
    data: &SignerData,
    sig: &SignatureData,
    tx: &Tx,
) -> Result<(), AdmissionError> {
    match (pub_key, sig) {
        (PubKey::Secp256k1(key), SignatureData::Single { mode, signature }) => {
            let sign_bytes = handler.sign_bytes(*mode, data, tx)?;
            verify_secp256k1(key, &sign_bytes, signature)
        }
        (PubKey::Multisig { threshold, keys }, SignatureData::Multi { bitarray, signatures }) => {
            if bitarray.len() != keys.len() {
                return Err(AdmissionError::Unauthorized(format!(
                    "bit array size is incorrect, expected {} got {}",
                    keys.len(),
                    bitarray.len()
                )));
            }
            let set = bitarray.iter().filter(|signed| **signed).count();
            if set == 0 || set < *threshold as usize {
                return Err(AdmissionError::Unauthorized(format!(
                    "not enough signatures: {} of threshold {}",
                    set, threshold
                )));
            }
            if signatures.len() != set {
                return Err(AdmissionError::Unauthorized(format!(
                    "signature count {} does not match bit array ({} set)",
                    signatures.len(),
                    set
                )));
            }
            let mut sub_sigs = signatures.iter();
            for (key, signed) in keys.iter().zip(bitarray) {
                if !*signed {
                    continue;
                }
                let sub = sub_sigs.next().ok_or_else(|| {
                    AdmissionError::Unauthorized("multisignature ended early".to_string())
                })?;
                verify_signature_data(handler, key, data, sub, tx)?;
            }
            Ok(())
        }
        (PubKey::Ed25519(_), _) => Err(AdmissionError::InvalidPubKey(
            "ED25519 public keys are unsupported".to_string(),
        )),
        _ => Err(AdmissionError::Unauthorized(
            "signature data does not match public key type".to_string(),
        )),
    }
}

impl Stage for SigVerificationStage {
    fn kind(&self) -> StageKind {
        StageKind::SigVerification
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        let keys = ctx.signer_pubkeys()?.to_vec();
        let signers = tx.signers();
        if tx.signatures.len() != signers.len() {
            return Err(AdmissionError::Unauthorized(format!(
                "invalid number of signers; expected: {}, got {}",
                signers.len(),
                tx.signatures.len()
            )));
        }

        for (i, (signer, sig)) in signers.iter().zip(&tx.signatures).enumerate() {
            let account = signer_account(self.accounts.as_ref(), signer)?;
            let key = signer_key(&keys, i)?;
            let sequence = tx
                .auth_info
                .signer_infos
                .get(i)
                .map(|info| info.sequence)
                .ok_or_else(|| {
                    AdmissionError::Unauthorized(format!("missing signer info for signer {}", i))
                })?;

            if sequence != account.sequence {
                return Err(AdmissionError::WrongSequence {
                    expected: account.sequence,
                    got: sequence,
                });
            }

            // Recheck already verified this signature; simulation has none to verify.
            if simulate || ctx.is_recheck_tx() {
                continue;
            }

            let account_number = if ctx.block_height == 0 {
                0
            } else {
                account.account_number
            };
            let data = SignerData {
                address: *signer,
                chain_id: ctx.chain_id.clone(),
                account_number,
                sequence: account.sequence,
                pub_key: key.clone(),
            };
            if let Err(e) = verify_signature_data(self.handler.as_ref(), key, &data, sig, tx) {
                debug!(signer = %address_to_hex(signer), error = %e, "signature rejected");
                if matches!(e, AdmissionError::InvalidPubKey(_)) {
                    return Err(e);
                }
                return Err(AdmissionError::Unauthorized(format!(
                    "signature verification failed; please verify account number ({}), sequence ({}) and chain-id ({})",
                    account_number, account.sequence, ctx.chain_id
                )));
            }
        }

        next.run(ctx, tx, simulate)
    }
}

// ----------------------------------------------------------------------
// IncrementSequence
// ----------------------------------------------------------------------

pub struct IncrementSequenceStage {
    accounts: Arc<dyn AccountKeeper>,
}

impl IncrementSequenceStage {
    pub fn new(accounts: Arc<dyn AccountKeeper>) -> Self {
        IncrementSequenceStage { accounts }
    }
}

impl Stage for IncrementSequenceStage {
    fn kind(&self) -> StageKind {
        StageKind::IncrementSequence
    }

    fn handle(
        &self,
        ctx: &mut ExecutionContext,
        tx: &Tx,
        simulate: bool,
        next: Next<'_>,
    ) -> Result<(), AdmissionError> {
        if !simulate {
            for (i, signer) in tx.signers().iter().enumerate() {
                let signed_at = tx
                    .auth_info
                    .signer_infos
                    .get(i)
                    .map(|info| info.sequence)
                    .ok_or_else(|| {
                        AdmissionError::Unauthorized(format!("missing signer info for signer {}", i))
                    })?;
                let next_seq = self.accounts.increment_sequence(signer, signed_at)?;
                trace!(signer = %address_to_hex(signer), sequence = next_seq, "sequence advanced");
            }
        }
        next.run(ctx, tx, simulate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::{Coin, Coins};
    use crate::crypto::{address_from_string, KeyPair};
    use crate::memstore::InMemoryAccounts;
    use crate::signing::{sign_tx, DefaultSignModeHandler, SignerKey};
    use crate::transaction::{Fee, Msg, SignerInfo};

    fn setup(kp: &KeyPair, pub_key: Option<PubKey>, sequence: u64) -> Arc<InMemoryAccounts> {
        let accounts = Arc::new(InMemoryAccounts::new());
        accounts.set_account(BaseAccount {
            address: kp.address(),
            pub_key,
            account_number: 4,
            sequence,
        });
        accounts
    }

    fn send_from(addr: Address) -> Tx {
        Tx::new(
            vec![Msg::Send {
                from_address: addr,
                to_address: address_from_string("bob"),
                amount: Coins::single(Coin::new("uatone", 1)),
            }],
            Fee {
                amount: Coins::single(Coin::new("uatone", 50)),
                gas_limit: 200_000,
                ..Fee::default()
            },
        )
    }

    fn signed(kp: &KeyPair, sequence: u64, chain_id: &str) -> Tx {
        let mut tx = send_from(kp.address());
        let key = SignerKey {
            keypair: kp,
            account_number: 4,
            sequence,
        };
        sign_tx(&mut tx, &[key], chain_id, SignMode::Direct, &DefaultSignModeHandler).unwrap();
        tx
    }

    fn ctx_with_meter() -> ExecutionContext {
        let mut ctx = ExecutionContext::new("test-chain", 10);
        ctx.install_gas_meter(GasMeter::new(1_000_000)).unwrap();
        ctx
    }

    #[test]
    fn test_set_pubkey_persists_and_binds() {
        let kp = KeyPair::generate().unwrap();
        let accounts = setup(&kp, None, 0);
        let tx = signed(&kp, 0, "test-chain");
        let mut ctx = ctx_with_meter();
        SetPubKeyStage::new(accounts.clone())
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap();
        assert_eq!(ctx.signer_pubkeys().unwrap(), &[kp.pub_key()]);
        assert_eq!(accounts.account(&kp.address()).unwrap().pub_key, Some(kp.pub_key()));
        assert!(ctx.events().iter().any(|e| e.get("acc_seq").is_some()));
    }

    #[test]
    fn test_set_pubkey_rejects_foreign_key() {
        let kp = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();
        let accounts = setup(&kp, None, 0);
        let mut tx = send_from(kp.address());
        tx.auth_info.signer_infos = vec![SignerInfo {
            public_key: Some(other.pub_key()),
            sequence: 0,
        }];
        let mut ctx = ctx_with_meter();
        let err = SetPubKeyStage::new(accounts.clone())
            .handle(&mut ctx, &tx, false, Next::end())
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidPubKey(_)));
        assert_eq!(accounts.account(&kp.address()).unwrap().pub_key, None);
    }

    #[test]
    fn test_simulated_key_not_persisted() {
        let kp = KeyPair::generate().unwrap();
        let accounts = setup(&kp, None, 0);
        let mut tx = send_from(kp.address());
        tx.auth_info.signer_infos = vec![SignerInfo {
            public_key: None,
            sequence: 0,
        }];
        let mut ctx = ctx_with_meter();
        SetPubKeyStage::new(accounts.clone())
            .handle(&mut ctx, &tx, true, Next::end())
            .unwrap();
        assert_eq!(ctx.signer_pubkeys().unwrap(), &[simulated_secp256k1_pubkey()]);
        assert_eq!(accounts.account(&kp.address()).unwrap().pub_key, None);
    }

    #[test]
    fn test_sig_count_limit() {
        let keys: Vec<PubKey> = (0..4).map(|_| KeyPair::generate().unwrap().pub_key()).collect();
        let multi = PubKey::Multisig {
            threshold: 2,
            keys,
        };
        let accounts = Arc::new(InMemoryAccounts::with_params(AuthParams {
            tx_sig_limit: 3,
            ..AuthParams::default()
        }));
        let mut ctx = ctx_with_meter();
        ctx.bind_signer_pubkeys(vec![multi]).unwrap();
        let err = ValidateSigCountStage::new(accounts)
            .handle(&mut ctx, &Tx::default(), false, Next::end())
            .unwrap_err();
        assert!(matches!(err, AdmissionError::TooManySignatures { got: 4, limit: 3 }));
    }

    #[test]
    fn test_default_gas_consumer_costs() {
        let params = AuthParams::default();
        let single = SignatureData::Single {
            mode: SignMode::Direct,
            signature: vec![1; 64],
        };

        let mut meter = GasMeter::new(10_000);
        default_sig_verification_gas_consumer(
            &mut meter,
            &single,
            &KeyPair::generate().unwrap().pub_key(),
            &params,
        )
        .unwrap();
        assert_eq!(meter.consumed(), 1000);

        let mut meter = GasMeter::new(10_000);
        let err = default_sig_verification_gas_consumer(
            &mut meter,
            &single,
            &PubKey::Ed25519(vec![0; 32]),
            &params,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ED25519 public keys are unsupported"));
        assert_eq!(meter.consumed(), 590);

        let keys: Vec<PubKey> = (0..3).map(|_| KeyPair::generate().unwrap().pub_key()).collect();
        let multi_key = PubKey::Multisig { threshold: 2, keys };
        let multi_sig = SignatureData::Multi {
            bitarray: vec![true, false, true],
            signatures: vec![single.clone(), single],
        };
        let mut meter = GasMeter::new(10_000);
        default_sig_verification_gas_consumer(&mut meter, &multi_sig, &multi_key, &params).unwrap();
        assert_eq!(meter.consumed(), 2000);
    }

    #[test]
    fn test_verification_checks_sequence_and_chain() {
        let kp = KeyPair::generate().unwrap();
        let accounts = setup(&kp, Some(kp.pub_key()), 2);
        let stage = SigVerificationStage::new(accounts, Arc::new(DefaultSignModeHandler));

        let good = signed(&kp, 2, "test-chain");
        let mut ctx = ctx_with_meter();
        ctx.bind_signer_pubkeys(vec![kp.pub_key()]).unwrap();
        stage.handle(&mut ctx, &good, false, Next::end()).unwrap();

        let stale = signed(&kp, 1, "test-chain");
        let mut ctx = ctx_with_meter();
        ctx.bind_signer_pubkeys(vec![kp.pub_key()]).unwrap();
        assert!(matches!(
            stage.handle(&mut ctx, &stale, false, Next::end()),
            Err(AdmissionError::WrongSequence { expected: 2, got: 1 })
        ));

        let wrong_chain = signed(&kp, 2, "other-chain");
        let mut ctx = ctx_with_meter();
        ctx.bind_signer_pubkeys(vec![kp.pub_key()]).unwrap();
        let err = stage
            .handle(&mut ctx, &wrong_chain, false, Next::end())
            .unwrap_err();
        assert!(err.to_string().contains("signature verification failed"));

        // Simulation checks the sequence but not the signature.
        let mut ctx = ctx_with_meter();
        ctx.bind_signer_pubkeys(vec![kp.pub_key()]).unwrap();
        stage.handle(&mut ctx, &wrong_chain, true, Next::end()).unwrap();
    }

    #[test]
    fn test_multisig_threshold() {
        let kps: Vec<KeyPair> = (0..3).map(|_| KeyPair::generate().unwrap()).collect();
        let multi = PubKey::Multisig {
            threshold: 2,
            keys: kps.iter().map(KeyPair::pub_key).collect(),
        };
        let addr = multi.address();
        let tx = send_from(addr);
        let data = SignerData {
            address: addr,
            chain_id: "test-chain".to_string(),
            account_number: 4,
            sequence: 0,
            pub_key: multi.clone(),
        };
        let handler = DefaultSignModeHandler;
        let bytes = handler.sign_bytes(SignMode::Direct, &data, &tx).unwrap();
        let sign = |kp: &KeyPair| SignatureData::Single {
            mode: SignMode::Direct,
            signature: kp.sign(&bytes).unwrap().to_vec(),
        };

        let enough = SignatureData::Multi {
            bitarray: vec![true, false, true],
            signatures: vec![sign(&kps[0]), sign(&kps[2])],
        };
        verify_signature_data(&handler, &multi, &data, &enough, &tx).unwrap();

        let short = SignatureData::Multi {
            bitarray: vec![false, true, false],
            signatures: vec![sign(&kps[1])],
        };
        assert!(verify_signature_data(&handler, &multi, &data, &short, &tx).is_err());

        let swapped = SignatureData::Multi {
            bitarray: vec![true, true, false],
            signatures: vec![sign(&kps[1]), sign(&kps[0])],
        };
        assert!(verify_signature_data(&handler, &multi, &data, &swapped, &tx).is_err());
    }

    #[test]
    fn test_increment_sequence_skipped_in_simulation() {
        let kp = KeyPair::generate().unwrap();
        let accounts = setup(&kp, Some(kp.pub_key()), 5);
        let stage = IncrementSequenceStage::new(accounts.clone());
        let tx = signed(&kp, 5, "test-chain");

        stage.handle(&mut ctx_with_meter(), &tx, true, Next::end()).unwrap();
        assert_eq!(accounts.account(&kp.address()).unwrap().sequence, 5);

        stage.handle(&mut ctx_with_meter(), &tx, false, Next::end()).unwrap();
        assert_eq!(accounts.account(&kp.address()).unwrap().sequence, 6);
    }

    #[test]
    fn test_increment_sequence_refuses_stale_sequence() {
        let kp = KeyPair::generate().unwrap();
        let accounts = setup(&kp, Some(kp.pub_key()), 5);
        let stage = IncrementSequenceStage::new(accounts.clone());
        let first = signed(&kp, 5, "test-chain");
        let replay = signed(&kp, 5, "test-chain");

        stage.handle(&mut ctx_with_meter(), &first, false, Next::end()).unwrap();
        let err = stage
            .handle(&mut ctx_with_meter(), &replay, false, Next::end())
            .unwrap_err();
        assert!(matches!(err, AdmissionError::WrongSequence { expected: 6, got: 5 }));
        assert_eq!(accounts.account(&kp.address()).unwrap().sequence, 6);
    }
}
