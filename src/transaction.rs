//! Transaction module split into types, embedded-message codec and validation

pub mod codec;
pub mod types;
pub mod validation;

pub use codec::{JsonCodec, MsgCodec};
pub use types::*;
