//! TrinityChain admission - the ordered pipeline every transaction passes before it may touch state
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Pipeline
//! - [`pipeline`] - Stage contract, continuation executor and builder
//! - [`stages`] - The fifteen built-in admission stages
//!
//! ## Transaction Model
//! - [`transaction`] - Transactions, messages and the embedded-message codec
//! - [`coins`] - Coin sets and decimal gas prices
//! - [`gas`] - Gas metering
//! - [`context`] - Per-transaction execution context
//!
//! ## Cryptography
//! - [`crypto`] - Addresses, keys and secp256k1 verification
//! - [`signing`] - Sign modes and transaction signing
//!
//! ## Collaborators
//! - [`keepers`] - Capability traits consumed by the stages
//! - [`memstore`] - In-memory implementations of those traits
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//! - [`telemetry`] - Logging setup

#![forbid(unsafe_code)]

// ============================================================================
// Pipeline
// ============================================================================
pub mod pipeline;
pub mod stages;

// ============================================================================
// Transaction Model
// ============================================================================
pub mod coins;
pub mod context;
pub mod gas;
pub mod transaction;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;
pub mod signing;

// ============================================================================
// Collaborators
// ============================================================================
pub mod keepers;
pub mod memstore;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
pub mod telemetry;

pub use context::{ExecMode, ExecutionContext};
pub use error::{AdmissionError, ConfigError};
pub use pipeline::{Admission, HandlerOptions, Pipeline};
