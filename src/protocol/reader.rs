//! Resumable message decoder
//!
//! Mirror image of the encoder: bytes are consumed as they arrive and a
//! message instance is populated field by field. Partially read values are
//! kept in the decoder, never in the message, so a message is handed to the
//! caller only once every field has been assigned.
//!
//! A message rejected for its content (an out-of-range ordinal or a broken
//! invariant) is still read to its last byte before the error is returned,
//! so the stream stays aligned on the next type tag.

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, instrument, trace};
use uuid::Uuid;

use super::metrics::{Direction, Metrics};
use super::wire::{
    EXTERNAL_UUID_LEN, PREFIX_LEN, SCRATCH_LEN, UUID_LEN, array, decode_length, element_type,
    flattened_len,
};
use super::{
    CodecConfig, Error, ErrorKind, ExternalUuid, FieldDescriptor, FieldType, FieldValue, Message,
    MessageFactory, NULL_MESSAGE_TYPE, Result,
};

/// Collections are pre-sized up to this many elements; the rest grows on demand.
const PRESIZE_LIMIT: usize = 4096;

/// Decode state for a stream of messages
///
/// One decoder serves one byte stream. It yields messages one at a time;
/// after a message is returned the decoder is ready for the next type tag.
/// On error the partially decoded message is discarded. Ordinal and value
/// errors are reported only after the whole message has been consumed, so
/// the decoder can keep going on the same stream; schema errors leave the
/// stream position undefined.
#[derive(Debug)]
pub struct MessageDecoder {
    factory: Arc<MessageFactory>,
    config: CodecConfig,
    root: Option<ReadFrame>,
}

struct ReadContext<'a> {
    factory: &'a MessageFactory,
    config: &'a CodecConfig,
}

#[derive(Debug)]
struct ReadFrame {
    message: Box<dyn Message>,
    step: usize,
    progress: ReadProgress,
    /// First content error; remaining fields are read but not assigned
    rejected: Option<Error>,
}

#[derive(Debug)]
enum ReadProgress {
    Fresh,
    /// Fixed-width item (scalar, prefix, presence byte) partially read
    Fixed {
        scratch: [u8; SCRATCH_LEN],
        filled: usize,
    },
    /// Length prefix read; body partially read
    Body { len: usize, data: BytesMut },
    Nested(Box<ReadFrame>),
    Elements(Box<ElementReader>),
}

#[derive(Debug)]
struct ElementReader {
    total: usize,
    items: Vec<FieldValue>,
    progress: ReadProgress,
}

impl ReadFrame {
    fn new(message: Box<dyn Message>) -> Self {
        Self {
            message,
            step: 0,
            progress: ReadProgress::Fresh,
            rejected: None,
        }
    }
}

/// Keep the first content error and carry on; anything else aborts the read
fn reject(rejected: &mut Option<Error>, err: Error) -> Result<()> {
    if !matches!(err.kind(), ErrorKind::Ordinal | ErrorKind::Value) {
        return Err(err);
    }
    debug!(error = %err, "message rejected, skipping to its end");
    rejected.get_or_insert(err);
    Ok(())
}

impl MessageDecoder {
    /// Create a decoder with default limits
    #[must_use]
    pub fn new(factory: Arc<MessageFactory>) -> Self {
        Self::with_config(factory, CodecConfig::default())
    }

    /// Create a decoder with explicit limits
    #[must_use]
    pub fn with_config(factory: Arc<MessageFactory>, config: CodecConfig) -> Self {
        Self {
            factory,
            config,
            root: None,
        }
    }

    /// Check whether no message is partially decoded
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.root.is_none()
    }

    /// Drop any partially decoded message
    pub fn reset(&mut self) {
        self.root = None;
    }

    /// Consume bytes from `buf` until a message completes or `buf` runs dry
    ///
    /// Returns `Ok(None)` when more bytes are needed; the bytes consumed so
    /// far are kept and the next call continues where this one stopped.
    /// Bytes after a completed message are left in `buf`.
    #[instrument(level = "trace", skip_all)]
    pub fn decode<B: Buf>(&mut self, buf: &mut B) -> Result<Option<Box<dyn Message>>> {
        let cx = ReadContext {
            factory: &self.factory,
            config: &self.config,
        };
        drive(&cx, &mut self.root, buf)
    }
}

/// Decode one message from `buf` without keeping state across calls
///
/// `Ok(None)` means `buf` ended before the message did.
pub(crate) fn decode_once<B: Buf>(
    factory: &MessageFactory,
    config: &CodecConfig,
    buf: &mut B,
) -> Result<Option<Box<dyn Message>>> {
    let cx = ReadContext { factory, config };
    drive(&cx, &mut None, buf)
}

fn drive<B: Buf>(
    cx: &ReadContext<'_>,
    root: &mut Option<ReadFrame>,
    buf: &mut B,
) -> Result<Option<Box<dyn Message>>> {
    let before = buf.remaining();
    let result = advance(cx, root, buf);
    Metrics::record_bytes(Direction::Decode, before.saturating_sub(buf.remaining()));

    match result {
        Ok(Some(message)) => {
            Metrics::record_complete(Direction::Decode);
            debug!(message_type = message.message_type(), "message decoded");
            Ok(Some(message))
        }
        Ok(None) => {
            if root.is_some() {
                Metrics::record_suspension(Direction::Decode);
            }
            Ok(None)
        }
        Err(err) => {
            *root = None;
            Metrics::record_error();
            debug!(error = %err, kind = ?err.kind(), "decode failed");
            Err(err)
        }
    }
}

fn advance<B: Buf>(
    cx: &ReadContext<'_>,
    root: &mut Option<ReadFrame>,
    buf: &mut B,
) -> Result<Option<Box<dyn Message>>> {
    if root.is_none() {
        if !buf.has_remaining() {
            return Ok(None);
        }
        let message = cx.factory.create(buf.get_u8())?;
        *root = Some(ReadFrame::new(message));
    }

    let Some(frame) = root.as_mut() else {
        return Ok(None);
    };
    if !read_frame(cx, buf, frame, 0)? {
        return Ok(None);
    }
    match root.take() {
        Some(ReadFrame {
            rejected: Some(err),
            ..
        }) => Err(err),
        frame => Ok(frame.map(|frame| frame.message)),
    }
}

/// Drive one message frame; `Ok(false)` means the input ran dry
fn read_frame<B: Buf>(
    cx: &ReadContext<'_>,
    buf: &mut B,
    frame: &mut ReadFrame,
    depth: usize,
) -> Result<bool> {
    let schema = frame.message.schema();

    while let Some(desc) = schema.get(frame.step) {
        let Some(value) = read_value(
            cx,
            buf,
            desc,
            &mut frame.progress,
            &mut frame.rejected,
            depth,
        )?
        else {
            trace!(
                message_type = frame.message.message_type(),
                step = frame.step,
                depth,
                "decode suspended"
            );
            return Ok(false);
        };

        if frame.rejected.is_none() {
            frame
                .message
                .set_field(frame.step, value)
                .or_else(|err| reject(&mut frame.rejected, err))?;
        }
        frame.progress = ReadProgress::Fresh;
        frame.step += 1;
    }

    if frame.rejected.is_none() {
        frame
            .message
            .finish_read()
            .or_else(|err| reject(&mut frame.rejected, err))?;
    }
    Ok(true)
}

fn read_value<B: Buf>(
    cx: &ReadContext<'_>,
    buf: &mut B,
    desc: &FieldDescriptor,
    progress: &mut ReadProgress,
    rejected: &mut Option<Error>,
    depth: usize,
) -> Result<Option<FieldValue>> {
    let field = desc.name();

    match desc.field_type() {
        FieldType::Bool => fill(buf, progress, 1)
            .map(|s| match s[0] {
                0 => Ok(FieldValue::Bool(false)),
                1 => Ok(FieldValue::Bool(true)),
                byte => Err(Error::InvalidBool { field, byte }),
            })
            .transpose(),
        FieldType::Byte => Ok(fill(buf, progress, 1).map(|s| FieldValue::Byte(s[0] as i8))),
        FieldType::Int => {
            Ok(fill(buf, progress, 4).map(|s| FieldValue::Int(i32::from_le_bytes(array(&s)))))
        }
        FieldType::Long => {
            Ok(fill(buf, progress, 8).map(|s| FieldValue::Long(i64::from_le_bytes(array(&s)))))
        }
        FieldType::EnumOrdinal => {
            let Some(scratch) = fill(buf, progress, 1) else {
                return Ok(None);
            };
            let value = match scratch[0] as i8 {
                -1 => None,
                ordinal @ 0.. => Some(ordinal as u8),
                ordinal => {
                    reject(rejected, Error::InvalidOrdinal { field, ordinal })?;
                    None
                }
            };
            Ok(Some(FieldValue::Ordinal(value)))
        }
        FieldType::Uuid => Ok(read_present(field, buf, progress, UUID_LEN)?
            .map(|s| FieldValue::Uuid(s.map(|s| Uuid::from_bytes(array(&s[1..])))))),
        FieldType::ExternalUuid => Ok(read_present(field, buf, progress, EXTERNAL_UUID_LEN)?
            .map(|s| {
                FieldValue::ExternalUuid(s.map(|s| ExternalUuid::from_bytes(&array(&s[1..]))))
            })),
        FieldType::String => read_blob(cx, buf, field, progress)?
            .map(|data| {
                data.map(|bytes| {
                    String::from_utf8(bytes.to_vec())
                        .map_err(|source| Error::InvalidUtf8 { field, source })
                })
                .transpose()
                .map(FieldValue::String)
            })
            .transpose(),
        FieldType::ByteArray => Ok(read_blob(cx, buf, field, progress)?.map(FieldValue::ByteArray)),
        FieldType::Message => read_nested(cx, buf, progress, rejected, depth),
        FieldType::Array | FieldType::Map => {
            read_sequence(cx, buf, desc, progress, rejected, depth)
        }
    }
}

/// Accumulate a fixed-width item until `need` bytes are present
///
/// `need` may grow between calls for the same item (presence byte first,
/// then the payload); bytes already read are kept.
fn fill<B: Buf>(buf: &mut B, progress: &mut ReadProgress, need: usize) -> Option<[u8; SCRATCH_LEN]> {
    if !matches!(progress, ReadProgress::Fixed { .. }) {
        *progress = ReadProgress::Fixed {
            scratch: [0u8; SCRATCH_LEN],
            filled: 0,
        };
    }
    let ReadProgress::Fixed { scratch, filled } = progress else {
        return None;
    };

    let n = buf.remaining().min(need.saturating_sub(*filled));
    buf.copy_to_slice(&mut scratch[*filled..*filled + n]);
    *filled += n;
    (*filled >= need).then_some(*scratch)
}

/// Read a presence byte and, when present, the remaining `len - 1` bytes
///
/// Outer `None`: input ran dry. Inner `None`: value absent.
fn read_present<B: Buf>(
    field: &'static str,
    buf: &mut B,
    progress: &mut ReadProgress,
    len: usize,
) -> Result<Option<Option<[u8; SCRATCH_LEN]>>> {
    let Some(scratch) = fill(buf, progress, 1) else {
        return Ok(None);
    };
    match scratch[0] {
        0 => Ok(Some(None)),
        1 => Ok(fill(buf, progress, len).map(Some)),
        byte => Err(Error::InvalidBool { field, byte }),
    }
}

/// Outer `None`: input ran dry. Inner `None`: value absent.
fn read_blob<B: Buf>(
    cx: &ReadContext<'_>,
    buf: &mut B,
    field: &'static str,
    progress: &mut ReadProgress,
) -> Result<Option<Option<Bytes>>> {
    if !matches!(progress, ReadProgress::Body { .. }) {
        let Some(scratch) = fill(buf, progress, PREFIX_LEN) else {
            return Ok(None);
        };
        let raw = i32::from_le_bytes(array(&scratch));
        let Some(len) = decode_length(field, raw, cx.config.max_field_len)? else {
            return Ok(Some(None));
        };
        if buf.remaining() >= len {
            // Zero-copy when the source is `Bytes`.
            return Ok(Some(Some(buf.copy_to_bytes(len))));
        }
        *progress = ReadProgress::Body {
            len,
            data: BytesMut::with_capacity(len),
        };
    }

    let ReadProgress::Body { len, data } = progress else {
        return Ok(None);
    };
    while data.len() < *len && buf.has_remaining() {
        let chunk = buf.chunk();
        let take = chunk.len().min(*len - data.len());
        if take == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..take]);
        buf.advance(take);
    }

    if data.len() < *len {
        return Ok(None);
    }
    Ok(Some(Some(std::mem::take(data).freeze())))
}

fn read_nested<B: Buf>(
    cx: &ReadContext<'_>,
    buf: &mut B,
    progress: &mut ReadProgress,
    rejected: &mut Option<Error>,
    depth: usize,
) -> Result<Option<FieldValue>> {
    if !matches!(progress, ReadProgress::Nested(_)) {
        let Some(scratch) = fill(buf, progress, 1) else {
            return Ok(None);
        };
        let type_byte = scratch[0];
        if type_byte == NULL_MESSAGE_TYPE {
            return Ok(Some(FieldValue::Message(None)));
        }

        let child_depth = depth + 1;
        if child_depth > cx.config.max_depth {
            return Err(Error::NestingTooDeep {
                depth: child_depth,
                max: cx.config.max_depth,
            });
        }
        let message = cx.factory.create(type_byte)?;
        *progress = ReadProgress::Nested(Box::new(ReadFrame::new(message)));
    }

    let ReadProgress::Nested(frame) = &mut *progress else {
        return Ok(None);
    };
    if !read_frame(cx, buf, frame, depth + 1)? {
        return Ok(None);
    }

    let ReadProgress::Nested(frame) = std::mem::replace(progress, ReadProgress::Fresh) else {
        return Ok(None);
    };
    let ReadFrame {
        message,
        rejected: nested,
        ..
    } = *frame;
    if let Some(err) = nested {
        reject(rejected, err)?;
        return Ok(Some(FieldValue::Message(None)));
    }
    Ok(Some(FieldValue::Message(Some(message))))
}

fn read_sequence<B: Buf>(
    cx: &ReadContext<'_>,
    buf: &mut B,
    desc: &FieldDescriptor,
    progress: &mut ReadProgress,
    rejected: &mut Option<Error>,
    depth: usize,
) -> Result<Option<FieldValue>> {
    let field = desc.name();
    let is_map = desc.field_type() == FieldType::Map;

    if !matches!(progress, ReadProgress::Elements(_)) {
        let Some(scratch) = fill(buf, progress, PREFIX_LEN) else {
            return Ok(None);
        };
        let raw = i32::from_le_bytes(array(&scratch));
        let Some(count) = decode_length(field, raw, cx.config.max_collection_len)? else {
            return Ok(Some(if is_map {
                FieldValue::Map(None)
            } else {
                FieldValue::Array(None)
            }));
        };
        let total = flattened_len(field, is_map, count, cx.config.max_collection_len)?;
        *progress = ReadProgress::Elements(Box::new(ElementReader {
            total,
            items: Vec::with_capacity(total.min(PRESIZE_LIMIT)),
            progress: ReadProgress::Fresh,
        }));
    }

    let ReadProgress::Elements(reader) = progress else {
        return Ok(None);
    };
    while reader.items.len() < reader.total {
        let element = FieldDescriptor::new(field, element_type(desc, reader.items.len())?);
        let Some(value) = read_value(cx, buf, &element, &mut reader.progress, rejected, depth)?
        else {
            return Ok(None);
        };
        reader.items.push(value);
        reader.progress = ReadProgress::Fresh;
    }

    let items = std::mem::take(&mut reader.items);
    if !is_map {
        return Ok(Some(FieldValue::Array(Some(items))));
    }

    let mut entries = Vec::with_capacity(items.len() / 2);
    let mut iter = items.into_iter();
    while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
        entries.push((key, value));
    }
    Ok(Some(FieldValue::Map(Some(entries))))
}
