//! Gridwire protocol core implementation
//!
//! This module provides the field catalog, the message contract and the
//! resumable encoder and decoder.

mod codec;
mod config;
mod error;
mod message;
pub mod metrics;
mod reader;
mod types;
mod value;
mod wire;
mod writer;

pub use codec::{decode, encode};
pub use config::{CodecConfig, DEFAULT_MAX_COLLECTION_LEN, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FIELD_LEN};
pub use error::{Error, ErrorKind, Result};
pub use message::{Message, MessageConstructor, MessageFactory};
pub use reader::MessageDecoder;
pub use types::{ExternalUuid, FieldDescriptor, FieldType, WriteStatus};
pub use value::{FieldRef, FieldValue, WireEnum};
pub use writer::MessageEncoder;

/// Tag written in place of an absent nested message
pub const NULL_MESSAGE_TYPE: u8 = 0x80;

/// Length or count prefix marking an absent value
pub const ABSENT_LENGTH: i32 = -1;
