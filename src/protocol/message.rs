//! Message contract and type tag registry

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use super::{Error, FieldDescriptor, FieldRef, FieldValue, NULL_MESSAGE_TYPE, Result};

/// Upcast helper so `dyn Message` can be downcast to its concrete variant
pub trait AsAny: Any {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;

    /// Convert into a boxed `Any`
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A message that can be carried by the codec
///
/// The field schema is the wire contract: field order must never change
/// for an existing type tag, new fields may only be appended. The encoder
/// and decoder walk the schema by index and call [`field`](Self::field) and
/// [`set_field`](Self::set_field) exactly once per index, so variants hold no
/// codec state of their own.
///
/// Messages deliberately do not implement `PartialEq` or `Hash`.
pub trait Message: AsAny + fmt::Debug + Send + Sync + 'static {
    /// Stable one-byte type tag
    fn message_type(&self) -> u8;

    /// Ordered field schema
    fn schema(&self) -> &'static [FieldDescriptor];

    /// Value of the field at `index`, `None` if the index is out of range
    fn field(&self, index: usize) -> Option<FieldRef<'_>>;

    /// Assign a decoded value to the field at `index`
    fn set_field(&mut self, index: usize, value: FieldValue) -> Result<()>;

    /// Called once after the last field has been assigned
    fn finish_read(&mut self) -> Result<()> {
        Ok(())
    }
}

impl dyn Message {
    /// Borrow as a concrete variant
    #[must_use]
    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Check the concrete variant
    #[must_use]
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Convert into a concrete variant
    #[must_use]
    pub fn downcast<T: Message>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }
}

/// Constructor of an empty instance, populated field by field while decoding
pub type MessageConstructor = fn() -> Box<dyn Message>;

/// Registry mapping type tags to message constructors
#[derive(Clone, Default)]
pub struct MessageFactory {
    constructors: HashMap<u8, MessageConstructor>,
}

impl MessageFactory {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in variants
    #[must_use]
    pub fn standard() -> Self {
        let constructors = crate::messages::STANDARD_VARIANTS
            .iter()
            .copied()
            .collect();
        Self { constructors }
    }

    /// Register a constructor under a tag
    pub fn register(&mut self, type_byte: u8, constructor: MessageConstructor) -> Result<()> {
        if type_byte == NULL_MESSAGE_TYPE {
            return Err(Error::InvalidValue {
                field: "type",
                reason: "tag is reserved for absent messages",
            });
        }
        if self.constructors.contains_key(&type_byte) {
            return Err(Error::DuplicateMessageType { type_byte });
        }
        self.constructors.insert(type_byte, constructor);
        Ok(())
    }

    /// Register a variant through its `Default` instance
    pub fn register_default<T: Message + Default>(&mut self) -> Result<()> {
        let type_byte = T::default().message_type();
        self.register(type_byte, || Box::new(T::default()) as Box<dyn Message>)
    }

    /// Create an empty instance for a tag read from the wire
    pub fn create(&self, type_byte: u8) -> Result<Box<dyn Message>> {
        self.constructors
            .get(&type_byte)
            .map(|constructor| constructor())
            .ok_or(Error::UnknownMessageType { type_byte })
    }

    /// Check if a tag is registered
    #[must_use]
    pub fn contains(&self, type_byte: u8) -> bool {
        self.constructors.contains_key(&type_byte)
    }

    /// Number of registered variants
    #[must_use]
    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    /// Check whether no variant is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

impl fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<u8> = self.constructors.keys().copied().collect();
        tags.sort_unstable();
        f.debug_struct("MessageFactory").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::{BatchRequest, Envelope};

    #[test]
    fn test_standard_registry() {
        let factory = MessageFactory::standard();
        assert_eq!(factory.len(), 2);
        assert!(factory.contains(Envelope::TYPE));
        assert!(factory.contains(BatchRequest::TYPE));

        let msg = factory.create(BatchRequest::TYPE).unwrap();
        assert!(msg.is::<BatchRequest>());
        assert!(msg.downcast_ref::<Envelope>().is_none());
    }

    #[test]
    fn test_unknown_tag() {
        let factory = MessageFactory::standard();
        assert!(matches!(
            factory.create(0x33),
            Err(Error::UnknownMessageType { type_byte: 0x33 })
        ));
    }

    #[test]
    fn test_duplicate_and_reserved_tags() {
        let mut factory = MessageFactory::standard();
        assert!(matches!(
            factory.register_default::<Envelope>(),
            Err(Error::DuplicateMessageType { .. })
        ));
        assert!(factory
            .register(NULL_MESSAGE_TYPE, || {
                Box::new(Envelope::default()) as Box<dyn Message>
            })
            .is_err());
    }

    #[test]
    fn test_downcast_owned() {
        let msg: Box<dyn Message> = Box::new(BatchRequest::default());
        assert!(msg.downcast::<BatchRequest>().is_some());

        let msg: Box<dyn Message> = Box::new(BatchRequest::default());
        assert!(msg.downcast::<Envelope>().is_none());
    }
}
