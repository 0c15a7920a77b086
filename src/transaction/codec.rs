/// Encoding of embedded messages (authz payloads, proposal messages, extension options)
use crate::error::AdmissionError;
use crate::transaction::types::{Any, Msg};

/// Decodes messages carried inside other messages.
pub trait MsgCodec: Send + Sync {
    fn decode(&self, any: &Any) -> Result<Msg, AdmissionError>;
    fn encode(&self, msg: &Msg) -> Result<Any, AdmissionError>;
}

/// JSON payloads tagged with the message type URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl MsgCodec for JsonCodec {
    fn decode(&self, any: &Any) -> Result<Msg, AdmissionError> {
        let msg: Msg = serde_json::from_slice(&any.value)?;
        if msg.type_url() != any.type_url {
            return Err(AdmissionError::TxDecode(format!(
                "type url {} does not match payload {}",
                any.type_url,
                msg.type_url()
            )));
        }
        Ok(msg)
    }

    fn encode(&self, msg: &Msg) -> Result<Any, AdmissionError> {
        Ok(Any {
            type_url: msg.type_url().to_string(),
            value: serde_json::to_vec(msg)?,
        })
    }
}
