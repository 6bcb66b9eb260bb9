//! Routing envelope

use bytes::Bytes;

use crate::protocol::{
    Error, FieldDescriptor, FieldRef, FieldType, FieldValue, Message, Result, WireEnum,
};

/// Worker pool a delivered message is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum ExecutionPolicy {
    /// Public pool for user tasks
    Public = 0,
    /// Peer class loading pool
    PeerClassLoading = 1,
    /// System pool for internal messages
    System = 2,
    /// Management pool
    Management = 3,
    /// Affinity calculation pool
    Affinity = 4,
    /// Utility cache pool
    UtilityCache = 5,
}

impl WireEnum for ExecutionPolicy {
    fn ordinal(self) -> u8 {
        self as u8
    }

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Public),
            1 => Some(Self::PeerClassLoading),
            2 => Some(Self::System),
            3 => Some(Self::Management),
            4 => Some(Self::Affinity),
            5 => Some(Self::UtilityCache),
            _ => None,
        }
    }
}

/// Topic as carried on the wire
///
/// Well-known topics travel as a small ordinal, anything else as an opaque
/// blob produced by the topic owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireTopic {
    /// Ordinal of a well-known topic
    Ordinal(u8),
    /// Serialized topic
    Bytes(Bytes),
}

/// Maps a wire topic back to a routable topic after decode
pub trait TopicResolver {
    /// Routable topic type
    type Topic;

    /// Resolve a well-known topic by ordinal
    fn resolve_ordinal(&self, ordinal: u8) -> Option<Self::Topic>;

    /// Resolve a serialized topic
    fn resolve_bytes(&self, bytes: &[u8]) -> Option<Self::Topic>;
}

/// Envelope wrapping a payload message with delivery metadata
///
/// Exactly one of the topic ordinal and the topic bytes is set. The
/// resolved topic is never carried on the wire; see
/// [`resolve_topic`](Self::resolve_topic).
#[derive(Debug)]
pub struct Envelope {
    payload: Option<Box<dyn Message>>,
    ordered: bool,
    policy: Option<ExecutionPolicy>,
    skip_on_timeout: bool,
    timeout: i64,
    topic_bytes: Option<Bytes>,
    topic_ordinal: i32,
}

static SCHEMA: [FieldDescriptor; 7] = [
    FieldDescriptor::new("message", FieldType::Message),
    FieldDescriptor::new("ordered", FieldType::Bool),
    FieldDescriptor::new("policy", FieldType::EnumOrdinal),
    FieldDescriptor::new("skip_on_timeout", FieldType::Bool),
    FieldDescriptor::new("timeout", FieldType::Long),
    FieldDescriptor::new("topic_bytes", FieldType::ByteArray),
    FieldDescriptor::new("topic_ordinal", FieldType::Int),
];

/// Topic ordinal value meaning "topic carried as bytes"
const NO_TOPIC_ORDINAL: i32 = -1;

impl Default for Envelope {
    fn default() -> Self {
        Self {
            payload: None,
            ordered: false,
            policy: None,
            skip_on_timeout: false,
            timeout: 0,
            topic_bytes: None,
            topic_ordinal: NO_TOPIC_ORDINAL,
        }
    }
}

impl Envelope {
    /// Type tag
    pub const TYPE: u8 = 8;

    /// Create an envelope around `payload`
    #[must_use]
    pub fn new(
        policy: ExecutionPolicy,
        topic: WireTopic,
        payload: Box<dyn Message>,
        ordered: bool,
        timeout: i64,
        skip_on_timeout: bool,
    ) -> Self {
        let (topic_bytes, topic_ordinal) = match topic {
            WireTopic::Ordinal(ordinal) => (None, i32::from(ordinal)),
            WireTopic::Bytes(bytes) => (Some(bytes), NO_TOPIC_ORDINAL),
        };

        Self {
            payload: Some(payload),
            ordered,
            policy: Some(policy),
            skip_on_timeout,
            timeout,
            topic_bytes,
            topic_ordinal,
        }
    }

    /// Get the wrapped message
    #[must_use]
    pub fn payload(&self) -> Option<&dyn Message> {
        self.payload.as_deref()
    }

    /// Take ownership of the wrapped message
    #[must_use]
    pub fn into_payload(self) -> Option<Box<dyn Message>> {
        self.payload
    }

    /// Check if delivery must preserve send order
    #[must_use]
    pub const fn is_ordered(&self) -> bool {
        self.ordered
    }

    /// Get the execution policy
    #[must_use]
    pub const fn policy(&self) -> Option<ExecutionPolicy> {
        self.policy
    }

    /// Check if the message may be dropped once the timeout elapses
    #[must_use]
    pub const fn skip_on_timeout(&self) -> bool {
        self.skip_on_timeout
    }

    /// Get the timeout in milliseconds
    #[must_use]
    pub const fn timeout(&self) -> i64 {
        self.timeout
    }

    /// Get the topic as carried on the wire
    #[must_use]
    pub fn topic(&self) -> Option<WireTopic> {
        match (&self.topic_bytes, u8::try_from(self.topic_ordinal)) {
            (None, Ok(ordinal)) => Some(WireTopic::Ordinal(ordinal)),
            (Some(bytes), Err(_)) => Some(WireTopic::Bytes(bytes.clone())),
            _ => None,
        }
    }

    /// Resolve the routable topic through its owner
    pub fn resolve_topic<R: TopicResolver>(&self, resolver: &R) -> Result<R::Topic> {
        match self.topic() {
            Some(WireTopic::Ordinal(ordinal)) => resolver
                .resolve_ordinal(ordinal)
                .ok_or_else(|| Error::UnknownTopic(format!("ordinal {ordinal}"))),
            Some(WireTopic::Bytes(bytes)) => resolver
                .resolve_bytes(&bytes)
                .ok_or_else(|| Error::UnknownTopic(format!("{} topic bytes", bytes.len()))),
            None => Err(Error::UnknownTopic("no topic".to_string())),
        }
    }
}

impl Message for Envelope {
    fn message_type(&self) -> u8 {
        Self::TYPE
    }

    fn schema(&self) -> &'static [FieldDescriptor] {
        &SCHEMA
    }

    fn field(&self, index: usize) -> Option<FieldRef<'_>> {
        let value = match index {
            0 => FieldRef::message(self.payload.as_deref()),
            1 => FieldRef::Bool(self.ordered),
            2 => FieldRef::ordinal(self.policy),
            3 => FieldRef::Bool(self.skip_on_timeout),
            4 => FieldRef::Long(self.timeout),
            5 => FieldRef::ByteArray(self.topic_bytes.as_deref()),
            6 => FieldRef::Int(self.topic_ordinal),
            _ => return None,
        };
        Some(value)
    }

    fn set_field(&mut self, index: usize, value: FieldValue) -> Result<()> {
        match index {
            0 => self.payload = value.into_message("message")?,
            1 => self.ordered = value.into_bool("ordered")?,
            2 => self.policy = value.into_enum("policy")?,
            3 => self.skip_on_timeout = value.into_bool("skip_on_timeout")?,
            4 => self.timeout = value.into_long("timeout")?,
            5 => self.topic_bytes = value.into_bytes("topic_bytes")?,
            6 => self.topic_ordinal = value.into_int("topic_ordinal")?,
            _ => {
                return Err(Error::UnknownField {
                    message_type: Self::TYPE,
                    index,
                });
            }
        }
        Ok(())
    }

    fn finish_read(&mut self) -> Result<()> {
        if self.topic_ordinal != NO_TOPIC_ORDINAL && u8::try_from(self.topic_ordinal).is_err() {
            return Err(Error::InvalidValue {
                field: "topic_ordinal",
                reason: "ordinal out of range",
            });
        }
        match (self.topic_bytes.is_some(), self.topic_ordinal != NO_TOPIC_ORDINAL) {
            (true, false) | (false, true) => Ok(()),
            (true, true) => Err(Error::InvalidValue {
                field: "topic_ordinal",
                reason: "topic carried both as ordinal and as bytes",
            }),
            (false, false) => Err(Error::InvalidValue {
                field: "topic_bytes",
                reason: "envelope without topic",
            }),
        }
    }
}
