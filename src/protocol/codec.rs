//! One-shot encode/decode
//!
//! Convenience wrappers over [`MessageEncoder`] and the decode engine for
//! callers that hold the whole message in memory.

use bytes::Buf;

use super::reader::decode_once;
use super::{CodecConfig, Message, MessageEncoder, MessageFactory, Result, WriteStatus};

/// Encode a message into a fresh buffer
///
/// # Format
///
/// ```text
/// [TYPE TAG (1 byte)] [FIELD 0] [FIELD 1] ... [FIELD n]
/// ```
///
/// Nested messages repeat the same layout in place of the field.
pub fn encode(message: &dyn Message) -> Result<Vec<u8>> {
    encode_with(message, CodecConfig::default())
}

/// Encode a message into a fresh buffer using explicit limits
pub fn encode_with(message: &dyn Message, config: CodecConfig) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut encoder = MessageEncoder::with_config(message, config);
    // A `Vec` grows on demand, so a single call always completes.
    while encoder.encode(&mut bytes)? == WriteStatus::Suspended {}
    Ok(bytes)
}

/// Decode one message from the front of `buf`
///
/// Returns `Ok(None)` if `buf` ends before the message does. Bytes after the
/// message are left in `buf`.
///
/// # Errors
///
/// Returns an error if:
/// - The type tag (or a nested type tag) is not registered
/// - A length, boolean or enum ordinal is malformed
/// - A field exceeds the default limits
/// - The decoded message fails its own validation
pub fn decode<B: Buf>(buf: &mut B, factory: &MessageFactory) -> Result<Option<Box<dyn Message>>> {
    decode_once(factory, &CodecConfig::default(), buf)
}
