//! Addresses, signer keys and secp256k1 verification

use crate::error::AdmissionError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

static SECP: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Account address: SHA-256 over the signer's public key material.
pub type Address = [u8; 32];

/// Address of a named account with no key, such as a module account.
pub fn address_from_string(s: &str) -> Address {
    Sha256::digest(s.as_bytes()).into()
}

pub fn address_to_hex(addr: &Address) -> String {
    hex::encode(addr)
}

pub fn address_from_hex(hex_str: &str) -> Result<Address, AdmissionError> {
    let bytes = hex::decode(hex_str)
        .map_err(|e| AdmissionError::Crypto(format!("invalid hex address: {}", e)))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| AdmissionError::Crypto(format!("address must be 32 bytes, got {}", len)))
}

/// Public key attached to a signer.
///
/// Only secp256k1 keys (and multisig keys built from them) can sign transactions.
/// Ed25519 keys are recognised so that they can be rejected with a precise reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PubKey {
    Secp256k1(Vec<u8>),
    Ed25519(Vec<u8>),
    Multisig { threshold: u32, keys: Vec<PubKey> },
}

impl PubKey {
    pub fn address(&self) -> Address {
        let mut hasher = Sha256::new();
        match self {
            PubKey::Secp256k1(bytes) => hasher.update(bytes),
            PubKey::Ed25519(bytes) => {
                hasher.update(b"ed25519");
                hasher.update(bytes);
            }
            PubKey::Multisig { threshold, keys } => {
                hasher.update(b"multisig");
                hasher.update(threshold.to_le_bytes());
                for key in keys {
                    hasher.update(key.address());
                }
            }
        }
        hasher.finalize().into()
    }

    /// Number of individual keys this key stands for.
    pub fn key_count(&self) -> u64 {
        match self {
            PubKey::Multisig { keys, .. } => keys.iter().map(PubKey::key_count).sum(),
            _ => 1,
        }
    }
}

/// A secp256k1 signing key held by a wallet or test harness.
#[derive(Debug, Clone)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Result<Self, AdmissionError> {
        Ok(Self::from_secret(SecretKey::new(&mut OsRng)))
    }

    /// Restores a key from 32 secret bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, AdmissionError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| AdmissionError::Crypto(format!("invalid secret key: {}", e)))?;
        Ok(Self::from_secret(secret))
    }

    fn from_secret(secret: SecretKey) -> Self {
        KeyPair {
            public: PublicKey::from_secret_key(&SECP, &secret),
            secret,
        }
    }

    pub fn pub_key(&self) -> PubKey {
        PubKey::Secp256k1(self.public.serialize().to_vec())
    }

    pub fn address(&self) -> Address {
        self.pub_key().address()
    }

    /// Compact ECDSA signature over `SHA-256(sign_bytes)`.
    pub fn sign(&self, sign_bytes: &[u8]) -> Result<[u8; COMPACT_SIGNATURE_SIZE], AdmissionError> {
        let msg = digest_message(sign_bytes)?;
        Ok(SECP.sign_ecdsa(&msg, &self.secret).serialize_compact())
    }
}

fn digest_message(sign_bytes: &[u8]) -> Result<Message, AdmissionError> {
    Message::from_digest_slice(&Sha256::digest(sign_bytes))
        .map_err(|e| AdmissionError::Crypto(format!("bad digest: {}", e)))
}

/// Checks a compact secp256k1 signature over `SHA-256(sign_bytes)` against a compressed key.
pub fn verify_secp256k1(
    key: &[u8],
    sign_bytes: &[u8],
    signature: &[u8],
) -> Result<(), AdmissionError> {
    if key.len() != PUBLIC_KEY_SIZE {
        return Err(AdmissionError::Crypto(format!(
            "secp256k1 key must be {} bytes, got {}",
            PUBLIC_KEY_SIZE,
            key.len()
        )));
    }
    if signature.len() != COMPACT_SIGNATURE_SIZE {
        return Err(AdmissionError::Crypto(format!(
            "signature must be {} bytes, got {}",
            COMPACT_SIGNATURE_SIZE,
            signature.len()
        )));
    }
    let key = PublicKey::from_slice(key)
        .map_err(|e| AdmissionError::Crypto(format!("invalid secp256k1 key: {}", e)))?;
    let signature = Signature::from_compact(signature)
        .map_err(|e| AdmissionError::Crypto(format!("malformed signature: {}", e)))?;
    SECP.verify_ecdsa(&digest_message(sign_bytes)?, &signature, &key)
        .map_err(|_| AdmissionError::Crypto("signature does not match key".to_string()))
}
