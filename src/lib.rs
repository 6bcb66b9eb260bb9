//! Gridwire - resumable binary codec for grid node messages
//!
//! This library encodes typed, nested messages into caller-supplied buffers of
//! any capacity and decodes them from bytes arriving in arbitrary chunks.
//! Either side may stop when its buffer is exhausted and resume later from
//! exactly the same position, which makes it usable directly on top of
//! non-blocking sockets.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gridwire::messages::{BatchRequest, DeploymentMode};
//! use gridwire::{MessageDecoder, MessageEncoder, MessageFactory};
//!
//! let request = BatchRequest::builder(42)
//!     .cache_name("partitioned")
//!     .collection_bytes(vec![0u8; 64])
//!     .deployment_mode(DeploymentMode::Shared)
//!     .build();
//!
//! // Encode through an 8-byte window
//! let mut encoder = MessageEncoder::new(&request);
//! let mut wire = Vec::new();
//! loop {
//!     let mut window = [0u8; 8];
//!     let mut dst = &mut window[..];
//!     let status = encoder.encode(&mut dst)?;
//!     let written = 8 - dst.len();
//!     wire.extend_from_slice(&window[..written]);
//!     if status.is_complete() {
//!         break;
//!     }
//! }
//!
//! // Decode from 5-byte chunks
//! let mut decoder = MessageDecoder::new(Arc::new(MessageFactory::standard()));
//! let mut decoded = None;
//! for mut chunk in wire.chunks(5) {
//!     decoded = decoder.decode(&mut chunk)?;
//! }
//!
//! let decoded = decoded.unwrap().downcast::<BatchRequest>().unwrap();
//! assert_eq!(decoded.request_id(), 42);
//! # Ok::<(), gridwire::Error>(())
//! ```
//!
//! # Features
//!
//! - **Resumable encode/decode** - suspend on any byte boundary, including
//!   inside nested messages and collections
//! - **Schema-driven messages** - variants declare an ordered field list and
//!   the engines do the rest
//! - **Zero-copy blobs** - byte arrays decoded from [`bytes::Bytes`] share
//!   the source allocation
//! - **Tag registry** - unknown type tags are rejected, never defaulted

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod messages;
pub mod protocol;

pub use protocol::{
    CodecConfig, Error, ErrorKind, ExternalUuid, FieldDescriptor, FieldRef, FieldType, FieldValue,
    Message, MessageDecoder, MessageEncoder, MessageFactory, NULL_MESSAGE_TYPE, Result, WireEnum,
    WriteStatus,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_tracks_package() {
        assert_eq!(VERSION, "0.1.0");
    }
}
