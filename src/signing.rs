//! Sign-byte construction for the supported sign modes, plus a signing helper
//! used by wallets, the CLI and tests.

use crate::crypto::KeyPair;
use crate::error::AdmissionError;
use crate::keepers::{SignModeHandler, SignerData};
use crate::transaction::{AuthInfo, Fee, Msg, SignMode, SignatureData, SignerInfo, Tx, TxBody};
use serde::Serialize;

#[derive(Serialize)]
struct DirectSignDoc<'a> {
    body: &'a TxBody,
    auth_info: &'a AuthInfo,
    chain_id: &'a str,
    account_number: u64,
}

#[derive(Serialize)]
struct LegacySignDoc<'a> {
    account_number: u64,
    chain_id: &'a str,
    fee: &'a Fee,
    memo: &'a str,
    msgs: &'a [Msg],
    sequence: u64,
    timeout_height: u64,
}

/// Handles `Direct` (bincode) and `LegacyJson` (serde_json) sign modes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSignModeHandler;

impl SignModeHandler for DefaultSignModeHandler {
    fn default_mode(&self) -> SignMode {
        SignMode::Direct
    }

    fn sign_bytes(
        &self,
        mode: SignMode,
        data: &SignerData,
        tx: &Tx,
    ) -> Result<Vec<u8>, AdmissionError> {
        match mode {
            SignMode::Direct => Ok(bincode::serialize(&DirectSignDoc {
                body: &tx.body,
                auth_info: &tx.auth_info,
                chain_id: &data.chain_id,
                account_number: data.account_number,
            })?),
            SignMode::LegacyJson => Ok(serde_json::to_vec(&LegacySignDoc {
                account_number: data.account_number,
                chain_id: &data.chain_id,
                fee: &tx.auth_info.fee,
                memo: &tx.body.memo,
                msgs: &tx.body.messages,
                sequence: data.sequence,
                timeout_height: tx.body.timeout_height,
            })?),
        }
    }
}

/// A key about to sign, with the account state it signs against.
pub struct SignerKey<'a> {
    pub keypair: &'a KeyPair,
    pub account_number: u64,
    pub sequence: u64,
}

/// Fills signer infos and single signatures for every signer, in order.
///
/// `signers` must follow [`Tx::signers`] order.
pub fn sign_tx(
    tx: &mut Tx,
    signers: &[SignerKey<'_>],
    chain_id: &str,
    mode: SignMode,
    handler: &dyn SignModeHandler,
) -> Result<(), AdmissionError> {
    tx.auth_info.signer_infos = signers
        .iter()
        .map(|s| SignerInfo {
            public_key: Some(s.keypair.pub_key()),
            sequence: s.sequence,
        })
        .collect();
    tx.signatures.clear();

    let mut signatures = Vec::with_capacity(signers.len());
    for signer in signers {
        let data = SignerData {
            address: signer.keypair.address(),
            chain_id: chain_id.to_string(),
            account_number: signer.account_number,
            sequence: signer.sequence,
            pub_key: signer.keypair.pub_key(),
        };
        let bytes = handler.sign_bytes(mode, &data, tx)?;
        signatures.push(SignatureData::Single {
            mode,
            signature: signer.keypair.sign(&bytes)?.to_vec(),
        });
    }
    tx.signatures = signatures;
    Ok(())
}
