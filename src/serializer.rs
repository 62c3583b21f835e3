//! Record encoding contract between the caller and the engine.
//!
//! The engine never looks inside a record. It hands the serializer a
//! [`BytesMut`] to append to while spilling, and a byte slice positioned at
//! the next record while merging. A serializer must consume exactly the bytes
//! it wrote for a record and must report malformed input as a
//! [`DecodeError`] instead of guessing.

use bytes::{Buf, BytesMut};
use thiserror::Error;

pub trait Serializer<T>: Send + Sync {
    /// Append the encoding of `record` to `buf`.
    ///
    /// The encoding must be between 1 and `max_record_size` bytes.
    fn write(&self, record: &T, buf: &mut BytesMut);

    /// Decode one record from the front of `buf`, advancing it past the bytes
    /// that were consumed.
    fn read(&self, buf: &mut &[u8]) -> Result<T, DecodeError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DecodeError {
    message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<bytes::TryGetError> for DecodeError {
    fn from(e: bytes::TryGetError) -> Self {
        DecodeError::new(format!(
            "truncated record: needed {} bytes, {} available",
            e.requested, e.available
        ))
    }
}

/// Fail unless at least `needed` bytes remain in `buf`.
pub fn ensure_remaining(buf: &[u8], needed: usize) -> Result<(), DecodeError> {
    if buf.remaining() < needed {
        return Err(DecodeError::new(format!(
            "truncated record: needed {} bytes, {} available",
            needed,
            buf.remaining()
        )));
    }
    Ok(())
}

/// Decode a single record from `bytes` and return it with the number of bytes
/// the serializer consumed.
pub(crate) fn decode_one<T>(
    serializer: &dyn Serializer<T>,
    bytes: &[u8],
) -> Result<(T, usize), DecodeError> {
    let mut cursor = bytes;
    let record = serializer.read(&mut cursor)?;
    let consumed = bytes.len() - cursor.len();
    if consumed == 0 {
        return Err(DecodeError::new("serializer consumed no bytes"));
    }
    Ok((record, consumed))
}
