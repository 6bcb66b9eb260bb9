//! Resumable message encoder
//!
//! The encoder writes as many bytes as the destination buffer accepts and
//! records exactly where it stopped: the schema step of every message on
//! the nesting path, the element cursor of an in-progress collection and the
//! byte offset inside an in-progress value. Each call resumes from there.

use bytes::BufMut;
use tracing::{debug, instrument, trace};

use super::metrics::{Direction, Metrics};
use super::wire::{SCRATCH_LEN, UUID_LEN, check_type, element_type, length_prefix};
use super::{
    CodecConfig, Error, FieldDescriptor, FieldRef, Message, NULL_MESSAGE_TYPE, Result, WriteStatus,
};

/// Encode state for one in-flight message
///
/// The encoder borrows the message for its whole lifetime, so the message
/// cannot change between suspensions.
#[derive(Debug)]
pub struct MessageEncoder<'m> {
    config: CodecConfig,
    root: WriteFrame<'m>,
    complete: bool,
}

/// Per-message state; nested messages hang off `progress`
#[derive(Debug)]
struct WriteFrame<'m> {
    message: &'m dyn Message,
    type_written: bool,
    step: usize,
    current: Option<FieldRef<'m>>,
    progress: Progress<'m>,
}

/// Partial progress inside the value currently being written
#[derive(Debug)]
enum Progress<'m> {
    Fresh,
    /// Bytes of a fixed-width item (scalar or prefix) already written
    Fixed(usize),
    /// Prefix written; bytes of the body already written
    Body(usize),
    Nested(Box<WriteFrame<'m>>),
    Elements(Box<ElementCursor<'m>>),
}

#[derive(Debug)]
struct ElementCursor<'m> {
    index: usize,
    progress: Progress<'m>,
}

/// Array elements or map entries, addressed by flattened index
#[derive(Clone, Copy)]
enum Sequence<'v, 'm> {
    Array(&'v [FieldRef<'m>]),
    Map(&'v [(FieldRef<'m>, FieldRef<'m>)]),
}

impl<'v, 'm> Sequence<'v, 'm> {
    const fn count(self) -> usize {
        match self {
            Self::Array(items) => items.len(),
            Self::Map(entries) => entries.len(),
        }
    }

    const fn flattened_len(self) -> usize {
        match self {
            Self::Array(items) => items.len(),
            Self::Map(entries) => entries.len() * 2,
        }
    }

    fn item(self, index: usize) -> &'v FieldRef<'m> {
        match self {
            Self::Array(items) => &items[index],
            Self::Map(entries) if index % 2 == 0 => &entries[index / 2].0,
            Self::Map(entries) => &entries[index / 2].1,
        }
    }
}

impl<'m> WriteFrame<'m> {
    fn new(message: &'m dyn Message) -> Self {
        Self {
            message,
            type_written: false,
            step: 0,
            current: None,
            progress: Progress::Fresh,
        }
    }
}

impl<'m> MessageEncoder<'m> {
    /// Create an encoder with default limits
    #[must_use]
    pub fn new(message: &'m dyn Message) -> Self {
        Self::with_config(message, CodecConfig::default())
    }

    /// Create an encoder with explicit limits
    #[must_use]
    pub fn with_config(message: &'m dyn Message, config: CodecConfig) -> Self {
        Self {
            config,
            root: WriteFrame::new(message),
            complete: false,
        }
    }

    /// Type tag of the message being encoded
    #[must_use]
    pub fn message_type(&self) -> u8 {
        self.root.message.message_type()
    }

    /// Check whether every byte of the message has been written
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Write as much of the message as `buf` accepts
    ///
    /// Returns [`WriteStatus::Suspended`] when the buffer fills up; call again
    /// with fresh capacity. Once complete, further calls write nothing and
    /// return [`WriteStatus::Complete`] again. After an error the encoder
    /// must be dropped.
    #[instrument(level = "trace", skip_all, fields(message_type = self.message_type()))]
    pub fn encode<B: BufMut>(&mut self, buf: &mut B) -> Result<WriteStatus> {
        if self.complete {
            return Ok(WriteStatus::Complete);
        }

        let before = buf.remaining_mut();
        let result = write_frame(&self.config, buf, &mut self.root, 0);
        Metrics::record_bytes(
            Direction::Encode,
            before.saturating_sub(buf.remaining_mut()),
        );

        match result {
            Ok(true) => {
                self.complete = true;
                Metrics::record_complete(Direction::Encode);
                debug!(message_type = self.message_type(), "message encoded");
                Ok(WriteStatus::Complete)
            }
            Ok(false) => {
                Metrics::record_suspension(Direction::Encode);
                Ok(WriteStatus::Suspended)
            }
            Err(err) => {
                Metrics::record_error();
                debug!(error = %err, "encode failed");
                Err(err)
            }
        }
    }
}

/// Drive one message frame; `Ok(false)` means the buffer is full
fn write_frame<'m, B: BufMut>(
    config: &CodecConfig,
    buf: &mut B,
    frame: &mut WriteFrame<'m>,
    depth: usize,
) -> Result<bool> {
    let message = frame.message;

    if !frame.type_written {
        if !buf.has_remaining_mut() {
            return Ok(false);
        }
        buf.put_u8(message.message_type());
        frame.type_written = true;
    }

    let schema = message.schema();
    while let Some(desc) = schema.get(frame.step) {
        let value = match frame.current.take() {
            Some(value) => value,
            None => {
                let value = message.field(frame.step).ok_or(Error::UnknownField {
                    message_type: message.message_type(),
                    index: frame.step,
                })?;
                check_type(desc.name(), desc.field_type(), value.field_type())?;
                value
            }
        };

        if !write_value(config, buf, desc, &value, &mut frame.progress, depth)? {
            trace!(
                message_type = message.message_type(),
                step = frame.step,
                depth,
                "encode suspended"
            );
            frame.current = Some(value);
            return Ok(false);
        }

        frame.progress = Progress::Fresh;
        frame.step += 1;
    }

    Ok(true)
}

fn write_value<'m, B: BufMut>(
    config: &CodecConfig,
    buf: &mut B,
    desc: &FieldDescriptor,
    value: &FieldRef<'m>,
    progress: &mut Progress<'m>,
    depth: usize,
) -> Result<bool> {
    let field = desc.name();
    let done = match value {
        FieldRef::Bool(v) => write_fixed(buf, &[u8::from(*v)], progress),
        FieldRef::Byte(v) => write_fixed(buf, &v.to_le_bytes(), progress),
        FieldRef::Int(v) => write_fixed(buf, &v.to_le_bytes(), progress),
        FieldRef::Long(v) => write_fixed(buf, &v.to_le_bytes(), progress),
        FieldRef::Ordinal(ordinal) => {
            let byte = match ordinal {
                None => -1,
                Some(ordinal) => i8::try_from(*ordinal).map_err(|_| Error::InvalidOrdinal {
                    field,
                    ordinal: *ordinal as i8,
                })?,
            };
            write_fixed(buf, &byte.to_le_bytes(), progress)
        }
        FieldRef::Uuid(None) | FieldRef::ExternalUuid(None) => write_fixed(buf, &[0], progress),
        FieldRef::Uuid(Some(id)) => {
            let mut scratch = [0u8; SCRATCH_LEN];
            scratch[0] = 1;
            scratch[1..UUID_LEN].copy_from_slice(id.as_bytes());
            write_fixed(buf, &scratch[..UUID_LEN], progress)
        }
        FieldRef::ExternalUuid(Some(id)) => {
            let mut scratch = [0u8; SCRATCH_LEN];
            scratch[0] = 1;
            scratch[1..].copy_from_slice(&id.to_bytes());
            write_fixed(buf, &scratch, progress)
        }
        FieldRef::String(s) => write_blob(config, buf, field, s.map(str::as_bytes), progress)?,
        FieldRef::ByteArray(bytes) => write_blob(config, buf, field, *bytes, progress)?,
        FieldRef::Message(None) => write_fixed(buf, &[NULL_MESSAGE_TYPE], progress),
        FieldRef::Message(Some(nested)) => write_nested(config, buf, *nested, progress, depth)?,
        FieldRef::Array(items) => write_sequence(
            config,
            buf,
            desc,
            items.as_deref().map(Sequence::Array),
            progress,
            depth,
        )?,
        FieldRef::Map(entries) => write_sequence(
            config,
            buf,
            desc,
            entries.as_deref().map(Sequence::Map),
            progress,
            depth,
        )?,
    };
    Ok(done)
}

/// Write as much of `src` as fits, starting at `*written`
fn put_partial<B: BufMut>(buf: &mut B, src: &[u8], written: &mut usize) -> bool {
    let n = buf.remaining_mut().min(src.len() - *written);
    buf.put_slice(&src[*written..*written + n]);
    *written += n;
    *written == src.len()
}

fn write_fixed<B: BufMut>(buf: &mut B, bytes: &[u8], progress: &mut Progress<'_>) -> bool {
    let mut written = match progress {
        Progress::Fixed(written) => *written,
        _ => 0,
    };
    let done = put_partial(buf, bytes, &mut written);
    *progress = Progress::Fixed(written);
    done
}

fn write_blob<B: BufMut>(
    config: &CodecConfig,
    buf: &mut B,
    field: &'static str,
    data: Option<&[u8]>,
    progress: &mut Progress<'_>,
) -> Result<bool> {
    if !matches!(progress, Progress::Body(_)) {
        let len = length_prefix(field, data.map(<[u8]>::len), config.max_field_len)?;
        if !write_fixed(buf, &len.to_le_bytes(), progress) {
            return Ok(false);
        }
        *progress = Progress::Body(0);
    }

    let (Some(data), Progress::Body(written)) = (data, progress) else {
        return Ok(true);
    };
    Ok(put_partial(buf, data, written))
}

fn write_nested<'m, B: BufMut>(
    config: &CodecConfig,
    buf: &mut B,
    nested: &'m dyn Message,
    progress: &mut Progress<'m>,
    depth: usize,
) -> Result<bool> {
    let Progress::Nested(frame) = &mut *progress else {
        let child_depth = depth + 1;
        if child_depth > config.max_depth {
            return Err(Error::NestingTooDeep {
                depth: child_depth,
                max: config.max_depth,
            });
        }
        let mut frame = Box::new(WriteFrame::new(nested));
        let done = write_frame(config, buf, &mut frame, child_depth)?;
        *progress = Progress::Nested(frame);
        return Ok(done);
    };
    write_frame(config, buf, frame, depth + 1)
}

fn write_sequence<'m, B: BufMut>(
    config: &CodecConfig,
    buf: &mut B,
    desc: &FieldDescriptor,
    sequence: Option<Sequence<'_, 'm>>,
    progress: &mut Progress<'m>,
    depth: usize,
) -> Result<bool> {
    let field = desc.name();

    if !matches!(progress, Progress::Elements(_)) {
        let count = length_prefix(
            field,
            sequence.map(Sequence::count),
            config.max_collection_len,
        )?;
        if !write_fixed(buf, &count.to_le_bytes(), progress) {
            return Ok(false);
        }
        *progress = Progress::Elements(Box::new(ElementCursor {
            index: 0,
            progress: Progress::Fresh,
        }));
    }

    let (Some(sequence), Progress::Elements(cursor)) = (sequence, progress) else {
        return Ok(true);
    };

    while cursor.index < sequence.flattened_len() {
        let item = sequence.item(cursor.index);
        let ty = element_type(desc, cursor.index)?;
        if matches!(cursor.progress, Progress::Fresh) {
            check_type(field, ty, item.field_type())?;
        }

        let element = FieldDescriptor::new(field, ty);
        if !write_value(config, buf, &element, item, &mut cursor.progress, depth)? {
            return Ok(false);
        }

        cursor.progress = Progress::Fresh;
        cursor.index += 1;
    }

    Ok(true)
}
