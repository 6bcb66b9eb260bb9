//! Field values exchanged between message variants and the engines

use bytes::Bytes;
use uuid::Uuid;

use super::{Error, ExternalUuid, FieldType, Message, Result};

/// Enums carried on the wire as a one-byte ordinal
///
/// `from_ordinal` must be total: every ordinal outside the enum's range
/// returns `None`, never a default variant.
pub trait WireEnum: Sized + Copy {
    /// Ordinal written to the wire (0..=127)
    fn ordinal(self) -> u8;

    /// Reverse of [`ordinal`](Self::ordinal)
    fn from_ordinal(ordinal: u8) -> Option<Self>;
}

/// Borrowed view of one field, produced by a message for the encoder
///
/// The encoder asks for each field once and keeps the value until the
/// field is fully written, so collections are iterated exactly once per
/// encode even across suspensions.
#[derive(Debug)]
pub enum FieldRef<'a> {
    /// Boolean
    Bool(bool),
    /// Signed byte
    Byte(i8),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Optional UTF-8 string
    String(Option<&'a str>),
    /// Optional byte blob
    ByteArray(Option<&'a [u8]>),
    /// Optional UUID
    Uuid(Option<Uuid>),
    /// Optional external UUID
    ExternalUuid(Option<ExternalUuid>),
    /// Optional enum ordinal
    Ordinal(Option<u8>),
    /// Optional nested message
    Message(Option<&'a dyn Message>),
    /// Optional array of elements
    Array(Option<Vec<FieldRef<'a>>>),
    /// Optional map as key/value pairs
    Map(Option<Vec<(FieldRef<'a>, FieldRef<'a>)>>),
}

impl<'a> FieldRef<'a> {
    /// Wire type of the value
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::Byte(_) => FieldType::Byte,
            Self::Int(_) => FieldType::Int,
            Self::Long(_) => FieldType::Long,
            Self::String(_) => FieldType::String,
            Self::ByteArray(_) => FieldType::ByteArray,
            Self::Uuid(_) => FieldType::Uuid,
            Self::ExternalUuid(_) => FieldType::ExternalUuid,
            Self::Ordinal(_) => FieldType::EnumOrdinal,
            Self::Message(_) => FieldType::Message,
            Self::Array(_) => FieldType::Array,
            Self::Map(_) => FieldType::Map,
        }
    }

    /// Enum field from an optional value
    #[must_use]
    pub fn ordinal<E: WireEnum>(value: Option<E>) -> Self {
        Self::Ordinal(value.map(WireEnum::ordinal))
    }

    /// Nested message field
    #[must_use]
    pub fn message(value: Option<&'a dyn Message>) -> Self {
        Self::Message(value)
    }
}

/// Owned value of one field, produced by the decoder for a message
#[derive(Debug)]
pub enum FieldValue {
    /// Boolean
    Bool(bool),
    /// Signed byte
    Byte(i8),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// Optional UTF-8 string
    String(Option<String>),
    /// Optional byte blob
    ByteArray(Option<Bytes>),
    /// Optional UUID
    Uuid(Option<Uuid>),
    /// Optional external UUID
    ExternalUuid(Option<ExternalUuid>),
    /// Optional enum ordinal
    Ordinal(Option<u8>),
    /// Optional nested message
    Message(Option<Box<dyn Message>>),
    /// Optional array
    Array(Option<Vec<FieldValue>>),
    /// Optional map as key/value pairs in wire order
    Map(Option<Vec<(FieldValue, FieldValue)>>),
}

impl FieldValue {
    /// Wire type of the value
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::Byte(_) => FieldType::Byte,
            Self::Int(_) => FieldType::Int,
            Self::Long(_) => FieldType::Long,
            Self::String(_) => FieldType::String,
            Self::ByteArray(_) => FieldType::ByteArray,
            Self::Uuid(_) => FieldType::Uuid,
            Self::ExternalUuid(_) => FieldType::ExternalUuid,
            Self::Ordinal(_) => FieldType::EnumOrdinal,
            Self::Message(_) => FieldType::Message,
            Self::Array(_) => FieldType::Array,
            Self::Map(_) => FieldType::Map,
        }
    }

    fn mismatch(&self, field: &'static str, expected: FieldType) -> Error {
        Error::FieldTypeMismatch {
            field,
            expected,
            found: self.field_type(),
        }
    }

    /// Take a boolean
    pub fn into_bool(self, field: &'static str) -> Result<bool> {
        match self {
            Self::Bool(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Bool)),
        }
    }

    /// Take a signed byte
    pub fn into_byte(self, field: &'static str) -> Result<i8> {
        match self {
            Self::Byte(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Byte)),
        }
    }

    /// Take a 32-bit integer
    pub fn into_int(self, field: &'static str) -> Result<i32> {
        match self {
            Self::Int(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Int)),
        }
    }

    /// Take a 64-bit integer
    pub fn into_long(self, field: &'static str) -> Result<i64> {
        match self {
            Self::Long(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Long)),
        }
    }

    /// Take an optional string
    pub fn into_string(self, field: &'static str) -> Result<Option<String>> {
        match self {
            Self::String(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::String)),
        }
    }

    /// Take an optional blob
    pub fn into_bytes(self, field: &'static str) -> Result<Option<Bytes>> {
        match self {
            Self::ByteArray(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::ByteArray)),
        }
    }

    /// Take an optional UUID
    pub fn into_uuid(self, field: &'static str) -> Result<Option<Uuid>> {
        match self {
            Self::Uuid(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Uuid)),
        }
    }

    /// Take an optional external UUID
    pub fn into_external_uuid(self, field: &'static str) -> Result<Option<ExternalUuid>> {
        match self {
            Self::ExternalUuid(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::ExternalUuid)),
        }
    }

    /// Take an optional enum value, rejecting unknown ordinals
    pub fn into_enum<E: WireEnum>(self, field: &'static str) -> Result<Option<E>> {
        match self {
            Self::Ordinal(None) => Ok(None),
            Self::Ordinal(Some(ordinal)) => E::from_ordinal(ordinal).map(Some).ok_or(
                Error::InvalidOrdinal {
                    field,
                    ordinal: ordinal as i8,
                },
            ),
            other => Err(other.mismatch(field, FieldType::EnumOrdinal)),
        }
    }

    /// Take an optional nested message
    pub fn into_message(self, field: &'static str) -> Result<Option<Box<dyn Message>>> {
        match self {
            Self::Message(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Message)),
        }
    }

    /// Take an optional array
    pub fn into_array(self, field: &'static str) -> Result<Option<Vec<FieldValue>>> {
        match self {
            Self::Array(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Array)),
        }
    }

    /// Take an optional map
    pub fn into_map(self, field: &'static str) -> Result<Option<Vec<(FieldValue, FieldValue)>>> {
        match self {
            Self::Map(v) => Ok(v),
            other => Err(other.mismatch(field, FieldType::Map)),
        }
    }
}
