//! Codec error types

use thiserror::Error;

use super::FieldType;

/// Codec errors
///
/// Running out of buffer space (encode) or input bytes (decode) is never an
/// error; it is reported as a pending outcome and the caller resumes later.
#[derive(Error, Debug)]
pub enum Error {
    /// Type tag not present in the receiver's registry
    #[error("unknown message type: {type_byte:#x}")]
    UnknownMessageType {
        /// Tag byte read from the wire
        type_byte: u8,
    },

    /// Message variant has no field at the requested schema index
    #[error("message type {message_type:#x} has no field at index {index}")]
    UnknownField {
        /// Tag of the variant
        message_type: u8,
        /// Schema index
        index: usize,
    },

    /// Value kind disagrees with the field schema
    #[error("field `{field}`: expected {expected}, found {found}")]
    FieldTypeMismatch {
        /// Field name
        field: &'static str,
        /// Type declared by the schema
        expected: FieldType,
        /// Type actually supplied
        found: FieldType,
    },

    /// Negative length or count other than the absent sentinel
    #[error("field `{field}`: invalid length prefix {len}")]
    InvalidLength {
        /// Field name
        field: &'static str,
        /// Raw prefix value
        len: i32,
    },

    /// Enum ordinal outside the known range
    #[error("field `{field}`: ordinal {ordinal} out of range")]
    InvalidOrdinal {
        /// Field name
        field: &'static str,
        /// Raw ordinal byte
        ordinal: i8,
    },

    /// Boolean byte other than 0 or 1
    #[error("field `{field}`: invalid boolean byte {byte:#x}")]
    InvalidBool {
        /// Field name
        field: &'static str,
        /// Raw byte
        byte: u8,
    },

    /// String field is not valid UTF-8
    #[error("field `{field}`: invalid UTF-8: {source}")]
    InvalidUtf8 {
        /// Field name
        field: &'static str,
        /// Underlying conversion error
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// Field can never be encoded or is refused by the configured limits
    #[error("field `{field}` too large: {len} (max {max})")]
    FieldTooLarge {
        /// Field name
        field: &'static str,
        /// Length or element count
        len: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Nested messages exceed the configured depth
    #[error("message nesting too deep: {depth} (max {max})")]
    NestingTooDeep {
        /// Depth reached
        depth: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Message-level invariant violated by decoded data
    #[error("field `{field}`: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// What was wrong
        reason: &'static str,
    },

    /// Two variants registered under the same tag
    #[error("message type {type_byte:#x} already registered")]
    DuplicateMessageType {
        /// Conflicting tag
        type_byte: u8,
    },

    /// Topic could not be resolved after decode
    #[error("unresolvable topic: {0}")]
    UnknownTopic(String),
}

/// Coarse classification used by callers to decide how far an error reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Framing or schema disagreement; the stream can no longer be trusted
    Schema,
    /// Enum ordinal out of range; only the current message is lost
    ///
    /// The decoder reports it once the message's last byte is consumed.
    Ordinal,
    /// Field exceeds what can be encoded or what the limits accept
    Capacity,
    /// Decoded data violates a message invariant; the stream stays aligned
    Value,
    /// Topic resolution failed after a successful decode
    Topic,
}

impl Error {
    /// Classify the error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownMessageType { .. }
            | Self::UnknownField { .. }
            | Self::FieldTypeMismatch { .. }
            | Self::InvalidLength { .. }
            | Self::InvalidBool { .. }
            | Self::InvalidUtf8 { .. }
            | Self::NestingTooDeep { .. }
            | Self::DuplicateMessageType { .. } => ErrorKind::Schema,
            Self::InvalidOrdinal { .. } => ErrorKind::Ordinal,
            Self::FieldTooLarge { .. } => ErrorKind::Capacity,
            Self::InvalidValue { .. } => ErrorKind::Value,
            Self::UnknownTopic(_) => ErrorKind::Topic,
        }
    }

    /// Whether the connection's framing must be considered corrupt
    #[must_use]
    pub const fn is_connection_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Schema)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        let err = Error::UnknownMessageType { type_byte: 0x7f };
        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.is_connection_fatal());

        let err = Error::InvalidOrdinal {
            field: "plc",
            ordinal: 42,
        };
        assert_eq!(err.kind(), ErrorKind::Ordinal);
        assert!(!err.is_connection_fatal());

        let err = Error::FieldTooLarge {
            field: "colBytes",
            len: 10,
            max: 5,
        };
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(!err.is_connection_fatal());
    }

    #[test]
    fn test_display() {
        let err = Error::FieldTypeMismatch {
            field: "timeout",
            expected: FieldType::Long,
            found: FieldType::Int,
        };
        assert_eq!(err.to_string(), "field `timeout`: expected LONG, found INT");
    }
}
