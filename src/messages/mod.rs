//! Built-in message variants
//!
//! - [`Envelope`]: routing wrapper around any other message
//! - [`BatchRequest`]: bulk data-ingestion request

mod batch;
mod envelope;

pub use batch::{BatchRequest, BatchRequestBuilder, DeploymentMode};
pub use envelope::{Envelope, ExecutionPolicy, TopicResolver, WireTopic};

use crate::protocol::{Message, MessageConstructor};

fn new_envelope() -> Box<dyn Message> {
    Box::new(Envelope::default())
}

fn new_batch_request() -> Box<dyn Message> {
    Box::new(BatchRequest::default())
}

/// Variants registered by [`MessageFactory::standard`](crate::protocol::MessageFactory::standard)
pub(crate) const STANDARD_VARIANTS: &[(u8, MessageConstructor)] = &[
    (Envelope::TYPE, new_envelope),
    (BatchRequest::TYPE, new_batch_request),
];
