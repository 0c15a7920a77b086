//! Error types for the admission pipeline
//!
//! Two classes exist. [`ConfigError`] is raised while building a pipeline and is
//! fatal to node startup. [`AdmissionError`] is raised per transaction and is
//! reported back to the submitter as the rejection reason.

use thiserror::Error;

/// Startup-time failure: a collaborator is missing or the configuration is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A mandatory collaborator was not supplied (logic error in node wiring).
    #[error("{0} is required for the admission pipeline")]
    MissingCollaborator(&'static str),

    /// A required parameter source is absent or unreachable.
    #[error("{0} is required for the admission pipeline but was not found")]
    NotFound(&'static str),

    /// A custom stage list breaks an ordering constraint.
    #[error("invalid stage ordering: {0}")]
    Ordering(String),

    /// A configuration value failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Per-transaction rejection reason.
#[derive(Debug, Clone, Error)]
pub enum AdmissionError {
    #[error("tx decode error: {0}")]
    TxDecode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown extension options: {0}")]
    UnknownExtensionOptions(String),

    #[error("tx has timed out: timeout height {timeout}, current height {current}")]
    TxTimeoutHeight { timeout: u64, current: u64 },

    #[error("memo too large: maximum number of characters is {max} but received {got} characters")]
    MemoTooLarge { max: u64, got: usize },

    #[error("out of gas: {0}")]
    OutOfGas(String),

    #[error("gas overflow: {0}")]
    GasOverflow(String),

    #[error("insufficient fees; got: {got} required: {required}")]
    InsufficientFee { got: String, required: String },

    #[error("invalid fee denom: {0}")]
    InvalidFeeDenom(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("unknown address: {0}")]
    UnknownAddress(String),

    #[error("invalid pubkey: {0}")]
    InvalidPubKey(String),

    #[error("too many signatures: {got} (limit {limit})")]
    TooManySignatures { got: u64, limit: u64 },

    #[error("no signatures supplied")]
    NoSignatures,

    #[error("account sequence mismatch, expected {expected}, got {got}")]
    WrongSequence { expected: u64, got: u64 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("vote cast by bonded validator {0} rejected by policy")]
    ValidatorVote(String),

    #[error("redundant relay: {0}")]
    RedundantTx(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    /// A stage misbehaved (panic or broken internal invariant), not a bad transaction.
    #[error("internal fault: {0}")]
    Internal(String),
}

impl AdmissionError {
    /// Stable numeric code surfaced to submitters alongside the message.
    pub fn code(&self) -> u32 {
        match self {
            AdmissionError::TxDecode(_) => 2,
            AdmissionError::InvalidRequest(_) => 18,
            AdmissionError::UnknownExtensionOptions(_) => 31,
            AdmissionError::TxTimeoutHeight { .. } => 30,
            AdmissionError::MemoTooLarge { .. } => 12,
            AdmissionError::OutOfGas(_) => 11,
            AdmissionError::GasOverflow(_) => 36,
            AdmissionError::InsufficientFee { .. } => 13,
            AdmissionError::InvalidFeeDenom(_) => 14,
            AdmissionError::InsufficientFunds(_) => 5,
            AdmissionError::UnknownAddress(_) => 9,
            AdmissionError::InvalidPubKey(_) => 8,
            AdmissionError::TooManySignatures { .. } => 15,
            AdmissionError::NoSignatures => 16,
            AdmissionError::WrongSequence { .. } => 32,
            AdmissionError::Unauthorized(_) => 4,
            AdmissionError::ValidatorVote(_) => 40,
            AdmissionError::RedundantTx(_) => 41,
            AdmissionError::Crypto(_) => 42,
            AdmissionError::Internal(_) => 1,
        }
    }

    /// True when the rejection came from a misbehaving stage rather than an invalid transaction.
    pub fn is_internal(&self) -> bool {
        matches!(self, AdmissionError::Internal(_))
    }
}

impl From<Box<bincode::ErrorKind>> for AdmissionError {
    fn from(err: Box<bincode::ErrorKind>) -> Self {
        AdmissionError::TxDecode(err.to_string())
    }
}

impl From<serde_json::Error> for AdmissionError {
    fn from(err: serde_json::Error) -> Self {
        AdmissionError::TxDecode(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, AdmissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_collaborator_names_dependency() {
        let err = ConfigError::MissingCollaborator("account keeper");
        assert_eq!(
            err.to_string(),
            "account keeper is required for the admission pipeline"
        );
    }

    #[test]
    fn test_internal_is_distinguished() {
        assert!(AdmissionError::Internal("boom".to_string()).is_internal());
        assert!(!AdmissionError::NoSignatures.is_internal());
        assert_eq!(AdmissionError::NoSignatures.code(), 16);
    }
}
