//! Field type catalog and field schema descriptors

use std::fmt;

use uuid::Uuid;

/// Wire field types
///
/// Tag numbers are part of the wire contract. New types may be appended,
/// existing numbers are never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum FieldType {
    /// One byte, 0 or 1
    Bool = 0,
    /// Signed byte
    Byte = 1,
    /// 32-bit signed integer
    Int = 2,
    /// 64-bit signed integer
    Long = 3,
    /// Length-prefixed UTF-8
    String = 4,
    /// Length-prefixed raw bytes
    ByteArray = 5,
    /// Presence byte + 16 bytes
    Uuid = 6,
    /// Presence byte + 16-byte UUID + 64-bit local id
    ExternalUuid = 7,
    /// Signed byte ordinal, `-1` for no value
    EnumOrdinal = 8,
    /// Nested message, starting with its own type tag
    Message = 9,
    /// Count-prefixed key/value pairs
    Map = 10,
    /// Count-prefixed elements
    Array = 11,
}

impl FieldType {
    /// Convert from byte
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Bool),
            1 => Some(Self::Byte),
            2 => Some(Self::Int),
            3 => Some(Self::Long),
            4 => Some(Self::String),
            5 => Some(Self::ByteArray),
            6 => Some(Self::Uuid),
            7 => Some(Self::ExternalUuid),
            8 => Some(Self::EnumOrdinal),
            9 => Some(Self::Message),
            10 => Some(Self::Map),
            11 => Some(Self::Array),
            _ => None,
        }
    }

    /// Convert to byte
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Encoded width of types whose size never depends on the value
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Byte | Self::EnumOrdinal => Some(1),
            Self::Int => Some(4),
            Self::Long => Some(8),
            _ => None,
        }
    }

    /// Whether the type may be used as a map key or array element
    #[must_use]
    pub const fn is_element_type(self) -> bool {
        !matches!(self, Self::Map | Self::Array)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "BOOL",
            Self::Byte => "BYTE",
            Self::Int => "INT",
            Self::Long => "LONG",
            Self::String => "STRING",
            Self::ByteArray => "BYTE_ARRAY",
            Self::Uuid => "UUID",
            Self::ExternalUuid => "EXTERNAL_UUID",
            Self::EnumOrdinal => "ENUM_ORDINAL",
            Self::Message => "MESSAGE",
            Self::Map => "MAP",
            Self::Array => "ARRAY",
        };
        write!(f, "{name}")
    }
}

/// One entry of a message's ordered field schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: &'static str,
    ty: FieldType,
    key: Option<FieldType>,
    item: Option<FieldType>,
}

impl FieldDescriptor {
    /// Describe a scalar, blob or nested message field
    ///
    /// Collection types must use [`array`](Self::array) or [`map`](Self::map).
    #[must_use]
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        assert!(
            ty.is_element_type(),
            "collection fields need element types"
        );
        Self {
            name,
            ty,
            key: None,
            item: None,
        }
    }

    /// Describe an array field
    #[must_use]
    pub const fn array(name: &'static str, item: FieldType) -> Self {
        assert!(item.is_element_type(), "nested collections are not supported");
        Self {
            name,
            ty: FieldType::Array,
            key: None,
            item: Some(item),
        }
    }

    /// Describe a map field
    #[must_use]
    pub const fn map(name: &'static str, key: FieldType, value: FieldType) -> Self {
        assert!(
            key.is_element_type() && value.is_element_type(),
            "nested collections are not supported"
        );
        Self {
            name,
            ty: FieldType::Map,
            key: Some(key),
            item: Some(value),
        }
    }

    /// Field name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Wire type
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.ty
    }

    /// Map key type
    #[must_use]
    pub const fn key_type(&self) -> Option<FieldType> {
        self.key
    }

    /// Array element type or map value type
    #[must_use]
    pub const fn item_type(&self) -> Option<FieldType> {
        self.item
    }
}

/// Globally unique id qualified by a node-local counter
///
/// Used for class loader ids and loader participant tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExternalUuid {
    global: Uuid,
    local: i64,
}

impl ExternalUuid {
    /// Encoded size without the presence byte
    pub const SIZE: usize = 24;

    /// Create from parts
    #[must_use]
    pub const fn new(global: Uuid, local: i64) -> Self {
        Self { global, local }
    }

    /// Create with a random global part
    #[must_use]
    pub fn random(local: i64) -> Self {
        Self::new(Uuid::new_v4(), local)
    }

    /// Global part
    #[must_use]
    pub const fn global(&self) -> Uuid {
        self.global
    }

    /// Local part
    #[must_use]
    pub const fn local(&self) -> i64 {
        self.local
    }

    pub(crate) fn to_bytes(self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..16].copy_from_slice(self.global.as_bytes());
        bytes[16..24].copy_from_slice(&self.local.to_le_bytes());
        bytes
    }

    pub(crate) fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut global = [0u8; 16];
        global.copy_from_slice(&bytes[0..16]);
        let mut local = [0u8; 8];
        local.copy_from_slice(&bytes[16..24]);
        Self {
            global: Uuid::from_bytes(global),
            local: i64::from_le_bytes(local),
        }
    }
}

impl fmt::Display for ExternalUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.local, self.global)
    }
}

/// Outcome of an encode call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// Every field has been written
    Complete,
    /// Destination buffer is full; call again with more space
    Suspended,
}

impl WriteStatus {
    /// Check if complete
    #[must_use]
    pub const fn is_complete(self) -> bool {
        matches!(self, Self::Complete)
    }
}
