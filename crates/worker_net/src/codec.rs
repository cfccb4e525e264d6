//! MessagePack framing for worker messages.

use serde::{Deserialize, Serialize};
use worker_interop::WorkerMessage;

use crate::error::NetError;
use crate::subjects;

/// Encode a value to MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Encode`] if serialisation fails.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, NetError> {
    rmp_serde::to_vec(value).map_err(NetError::Encode)
}

/// Decode a value from MessagePack bytes.
///
/// # Errors
///
/// Returns [`NetError::Decode`] if deserialisation fails.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, NetError> {
    rmp_serde::from_slice(bytes).map_err(NetError::Decode)
}

/// A message ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub subject: String,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Frame `message` from `worker_id`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] if the message cannot be serialized.
    pub fn new(worker_id: &str, message: &WorkerMessage<'_>) -> Result<Self, NetError> {
        Ok(Self {
            subject: subjects::for_message(worker_id, message),
            payload: encode(message)?,
        })
    }

    /// Decode the payload back into a message.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Decode`] if the payload is not a worker message.
    pub fn message(&self) -> Result<WorkerMessage<'static>, NetError> {
        decode(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use worker_interop::LogMessageAbi;

    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let message = WorkerMessage::LogMessage(LogMessageAbi {
            level: 2,
            logger_name: Cow::Borrowed(&b"net\0"[..]),
            message: Cow::Borrowed(&b"hello\0"[..]),
            entity_id: None,
        });
        let frame = Frame::new("w1", &message).unwrap();
        assert_eq!(frame.subject, "worker.w1.log");
        assert_eq!(frame.message().unwrap(), message);
    }

    #[test]
    fn test_decode_invalid_bytes() {
        let result: Result<WorkerMessage<'static>, _> = decode(&[0xFF, 0xFF]);
        assert!(result.is_err());
    }
}
