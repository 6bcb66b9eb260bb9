//! Data-ingestion batch request

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use bytes::Bytes;
use uuid::Uuid;

use crate::protocol::{
    Error, ExternalUuid, FieldDescriptor, FieldRef, FieldType, FieldValue, Message, Result,
    WireEnum,
};

/// Class deployment mode requested by the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DeploymentMode {
    /// Classes are not shared between tasks
    Private = 0,
    /// Classes are shared within one master node
    Isolated = 1,
    /// Classes are shared across master nodes
    Shared = 2,
    /// Like shared, but classes outlive their master node
    Continuous = 3,
}

impl WireEnum for DeploymentMode {
    fn ordinal(self) -> u8 {
        self as u8
    }

    fn from_ordinal(ordinal: u8) -> Option<Self> {
        match ordinal {
            0 => Some(Self::Private),
            1 => Some(Self::Isolated),
            2 => Some(Self::Shared),
            3 => Some(Self::Continuous),
            _ => None,
        }
    }
}

/// Batch of serialized entries to load into a cache
///
/// The updater and the entry collection are opaque blobs; interpreting them
/// is up to the receiving loader.
#[derive(Debug, Default)]
pub struct BatchRequest {
    cache_name: Option<String>,
    class_loader_id: Option<ExternalUuid>,
    collection_bytes: Option<Bytes>,
    deployment_mode: Option<DeploymentMode>,
    force_local_deployment: bool,
    ignore_deployment_ownership: bool,
    participants: HashMap<Uuid, ExternalUuid>,
    request_id: i64,
    response_topic_bytes: Option<Bytes>,
    sample_class_name: Option<String>,
    skip_store: bool,
    updater_bytes: Option<Bytes>,
    user_version: Option<String>,
}

static SCHEMA: [FieldDescriptor; 13] = [
    FieldDescriptor::new("cache_name", FieldType::String),
    FieldDescriptor::new("class_loader_id", FieldType::ExternalUuid),
    FieldDescriptor::new("collection_bytes", FieldType::ByteArray),
    FieldDescriptor::new("deployment_mode", FieldType::EnumOrdinal),
    FieldDescriptor::new("force_local_deployment", FieldType::Bool),
    FieldDescriptor::new("ignore_deployment_ownership", FieldType::Bool),
    FieldDescriptor::map("loader_participants", FieldType::Uuid, FieldType::ExternalUuid),
    FieldDescriptor::new("request_id", FieldType::Long),
    FieldDescriptor::new("response_topic_bytes", FieldType::ByteArray),
    FieldDescriptor::new("sample_class_name", FieldType::String),
    FieldDescriptor::new("skip_store", FieldType::Bool),
    FieldDescriptor::new("updater_bytes", FieldType::ByteArray),
    FieldDescriptor::new("user_version", FieldType::String),
];

impl BatchRequest {
    /// Type tag
    pub const TYPE: u8 = 62;

    /// Start building a request
    #[must_use]
    pub fn builder(request_id: i64) -> BatchRequestBuilder {
        BatchRequestBuilder {
            inner: Self {
                request_id,
                ..Self::default()
            },
        }
    }

    /// Get the request ID
    #[must_use]
    pub const fn request_id(&self) -> i64 {
        self.request_id
    }

    /// Get the serialized response topic
    #[must_use]
    pub fn response_topic_bytes(&self) -> Option<&Bytes> {
        self.response_topic_bytes.as_ref()
    }

    /// Get the cache name, `None` for the default cache
    #[must_use]
    pub fn cache_name(&self) -> Option<&str> {
        self.cache_name.as_deref()
    }

    /// Get the serialized cache updater
    #[must_use]
    pub fn updater_bytes(&self) -> Option<&Bytes> {
        self.updater_bytes.as_ref()
    }

    /// Get the serialized entry collection
    #[must_use]
    pub fn collection_bytes(&self) -> Option<&Bytes> {
        self.collection_bytes.as_ref()
    }

    /// Check if deployment ownership is ignored
    #[must_use]
    pub const fn ignore_deployment_ownership(&self) -> bool {
        self.ignore_deployment_ownership
    }

    /// Check if the cache store is bypassed
    #[must_use]
    pub const fn skip_store(&self) -> bool {
        self.skip_store
    }

    /// Get the deployment mode
    #[must_use]
    pub const fn deployment_mode(&self) -> Option<DeploymentMode> {
        self.deployment_mode
    }

    /// Get the name of a class used to locate the class loader
    #[must_use]
    pub fn sample_class_name(&self) -> Option<&str> {
        self.sample_class_name.as_deref()
    }

    /// Get the user version
    #[must_use]
    pub fn user_version(&self) -> Option<&str> {
        self.user_version.as_deref()
    }

    /// Get the class loader participants by node
    #[must_use]
    pub const fn participants(&self) -> &HashMap<Uuid, ExternalUuid> {
        &self.participants
    }

    /// Get the class loader ID
    #[must_use]
    pub const fn class_loader_id(&self) -> Option<ExternalUuid> {
        self.class_loader_id
    }

    /// Check if local deployment is forced
    #[must_use]
    pub const fn force_local_deployment(&self) -> bool {
        self.force_local_deployment
    }

    fn participants_field(&self) -> FieldRef<'_> {
        FieldRef::Map(Some(
            self.participants
                .iter()
                .map(|(node, loader)| {
                    (
                        FieldRef::Uuid(Some(*node)),
                        FieldRef::ExternalUuid(Some(*loader)),
                    )
                })
                .collect(),
        ))
    }

    fn set_participants(&mut self, value: FieldValue) -> Result<()> {
        const FIELD: &str = "loader_participants";

        let entries = value.into_map(FIELD)?.unwrap_or_default();
        let mut participants = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            let (Some(node), Some(loader)) = (key.into_uuid(FIELD)?, value.into_external_uuid(FIELD)?)
            else {
                return Err(Error::InvalidValue {
                    field: FIELD,
                    reason: "absent participant key or value",
                });
            };
            match participants.entry(node) {
                Entry::Vacant(slot) => {
                    slot.insert(loader);
                }
                Entry::Occupied(_) => {
                    return Err(Error::InvalidValue {
                        field: FIELD,
                        reason: "duplicate participant node",
                    });
                }
            }
        }

        self.participants = participants;
        Ok(())
    }
}

impl Message for BatchRequest {
    fn message_type(&self) -> u8 {
        Self::TYPE
    }

    fn schema(&self) -> &'static [FieldDescriptor] {
        &SCHEMA
    }

    fn field(&self, index: usize) -> Option<FieldRef<'_>> {
        let value = match index {
            0 => FieldRef::String(self.cache_name.as_deref()),
            1 => FieldRef::ExternalUuid(self.class_loader_id),
            2 => FieldRef::ByteArray(self.collection_bytes.as_deref()),
            3 => FieldRef::ordinal(self.deployment_mode),
            4 => FieldRef::Bool(self.force_local_deployment),
            5 => FieldRef::Bool(self.ignore_deployment_ownership),
            6 => self.participants_field(),
            7 => FieldRef::Long(self.request_id),
            8 => FieldRef::ByteArray(self.response_topic_bytes.as_deref()),
            9 => FieldRef::String(self.sample_class_name.as_deref()),
            10 => FieldRef::Bool(self.skip_store),
            11 => FieldRef::ByteArray(self.updater_bytes.as_deref()),
            12 => FieldRef::String(self.user_version.as_deref()),
            _ => return None,
        };
        Some(value)
    }

    fn set_field(&mut self, index: usize, value: FieldValue) -> Result<()> {
        match index {
            0 => self.cache_name = value.into_string("cache_name")?,
            1 => self.class_loader_id = value.into_external_uuid("class_loader_id")?,
            2 => self.collection_bytes = value.into_bytes("collection_bytes")?,
            3 => self.deployment_mode = value.into_enum("deployment_mode")?,
            4 => self.force_local_deployment = value.into_bool("force_local_deployment")?,
            5 => {
                self.ignore_deployment_ownership = value.into_bool("ignore_deployment_ownership")?;
            }
            6 => self.set_participants(value)?,
            7 => self.request_id = value.into_long("request_id")?,
            8 => self.response_topic_bytes = value.into_bytes("response_topic_bytes")?,
            9 => self.sample_class_name = value.into_string("sample_class_name")?,
            10 => self.skip_store = value.into_bool("skip_store")?,
            11 => self.updater_bytes = value.into_bytes("updater_bytes")?,
            12 => self.user_version = value.into_string("user_version")?,
            _ => {
                return Err(Error::UnknownField {
                    message_type: Self::TYPE,
                    index,
                });
            }
        }
        Ok(())
    }
}

/// Builder for [`BatchRequest`]
#[derive(Debug)]
#[must_use]
pub struct BatchRequestBuilder {
    inner: BatchRequest,
}

impl BatchRequestBuilder {
    /// Set the serialized response topic
    pub fn response_topic_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.inner.response_topic_bytes = Some(bytes.into());
        self
    }

    /// Set the target cache name
    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.inner.cache_name = Some(name.into());
        self
    }

    /// Set the serialized cache updater
    pub fn updater_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.inner.updater_bytes = Some(bytes.into());
        self
    }

    /// Set the serialized entry collection
    pub fn collection_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.inner.collection_bytes = Some(bytes.into());
        self
    }

    /// Ignore deployment ownership
    pub fn ignore_deployment_ownership(mut self, ignore: bool) -> Self {
        self.inner.ignore_deployment_ownership = ignore;
        self
    }

    /// Bypass the cache store
    pub fn skip_store(mut self, skip: bool) -> Self {
        self.inner.skip_store = skip;
        self
    }

    /// Set the deployment mode
    pub fn deployment_mode(mut self, mode: DeploymentMode) -> Self {
        self.inner.deployment_mode = Some(mode);
        self
    }

    /// Set the sample class name
    pub fn sample_class_name(mut self, name: impl Into<String>) -> Self {
        self.inner.sample_class_name = Some(name.into());
        self
    }

    /// Set the user version
    pub fn user_version(mut self, version: impl Into<String>) -> Self {
        self.inner.user_version = Some(version.into());
        self
    }

    /// Add one class loader participant; a repeated node replaces the earlier entry
    pub fn participant(mut self, node: Uuid, loader: ExternalUuid) -> Self {
        self.inner.participants.insert(node, loader);
        self
    }

    /// Replace all class loader participants
    pub fn participants(mut self, participants: HashMap<Uuid, ExternalUuid>) -> Self {
        self.inner.participants = participants;
        self
    }

    /// Set the class loader ID
    pub fn class_loader_id(mut self, id: ExternalUuid) -> Self {
        self.inner.class_loader_id = Some(id);
        self
    }

    /// Force local deployment
    pub fn force_local_deployment(mut self, force: bool) -> Self {
        self.inner.force_local_deployment = force;
        self
    }

    /// Finish building
    pub fn build(self) -> BatchRequest {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MessageFactory, decode, encode};

    fn roundtrip(original: &BatchRequest) -> BatchRequest {
        let bytes = encode(original).unwrap();
        let factory = MessageFactory::standard();
        *decode(&mut bytes.as_slice(), &factory)
            .unwrap()
            .unwrap()
            .downcast::<BatchRequest>()
            .unwrap()
    }

    #[test]
    fn test_all_fields_roundtrip() {
        let node = Uuid::new_v4();
        let loader = ExternalUuid::random(17);
        let class_loader = ExternalUuid::random(3);
        let original = BatchRequest::builder(4_000_000_000)
            .response_topic_bytes(vec![1, 2])
            .cache_name("partitioned")
            .updater_bytes(vec![3; 20])
            .collection_bytes(vec![4; 30])
            .ignore_deployment_ownership(true)
            .skip_store(true)
            .deployment_mode(DeploymentMode::Shared)
            .sample_class_name("org.example.Loader")
            .user_version("2.1")
            .participant(node, loader)
            .class_loader_id(class_loader)
            .force_local_deployment(true)
            .build();

        let decoded = roundtrip(&original);
        assert_eq!(decoded.request_id(), 4_000_000_000);
        assert_eq!(decoded.response_topic_bytes().unwrap().as_ref(), &[1, 2]);
        assert_eq!(decoded.cache_name(), Some("partitioned"));
        assert_eq!(decoded.updater_bytes(), original.updater_bytes());
        assert_eq!(decoded.collection_bytes(), original.collection_bytes());
        assert!(decoded.ignore_deployment_ownership());
        assert!(decoded.skip_store());
        assert_eq!(decoded.deployment_mode(), Some(DeploymentMode::Shared));
        assert_eq!(decoded.sample_class_name(), Some("org.example.Loader"));
        assert_eq!(decoded.user_version(), Some("2.1"));
        assert_eq!(decoded.participants().get(&node), Some(&loader));
        assert_eq!(decoded.class_loader_id(), Some(class_loader));
        assert!(decoded.force_local_deployment());
    }

    #[test]
    fn test_absent_fields_roundtrip() {
        let decoded = roundtrip(&BatchRequest::default());
        assert_eq!(decoded.request_id(), 0);
        assert!(decoded.cache_name().is_none());
        assert!(decoded.collection_bytes().is_none());
        assert!(decoded.deployment_mode().is_none());
        assert!(decoded.class_loader_id().is_none());
        assert!(decoded.participants().is_empty());
    }

    #[test]
    fn test_empty_blob_is_not_absent() {
        let decoded = roundtrip(&BatchRequest::builder(1).collection_bytes(Vec::new()).build());
        assert_eq!(decoded.collection_bytes().map(Bytes::len), Some(0));
    }

    #[test]
    fn test_duplicate_participant_rejected() {
        let node = Uuid::new_v4();
        let entry = || {
            (
                FieldValue::Uuid(Some(node)),
                FieldValue::ExternalUuid(Some(ExternalUuid::random(1))),
            )
        };
        let mut request = BatchRequest::default();
        let err = request
            .set_field(6, FieldValue::Map(Some(vec![entry(), entry()])))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidValue {
                field: "loader_participants",
                ..
            }
        ));
    }

    #[test]
    fn test_absent_participant_value_rejected() {
        let mut request = BatchRequest::default();
        let entries = vec![(FieldValue::Uuid(Some(Uuid::new_v4())), FieldValue::ExternalUuid(None))];
        assert!(request.set_field(6, FieldValue::Map(Some(entries))).is_err());
    }

    #[test]
    fn test_unknown_deployment_mode() {
        let mut request = BatchRequest::default();
        assert!(matches!(
            request.set_field(3, FieldValue::Ordinal(Some(4))),
            Err(Error::InvalidOrdinal { ordinal: 4, .. })
        ));
    }

    #[test]
    fn test_field_index_out_of_range() {
        let request = BatchRequest::default();
        assert!(request.field(SCHEMA.len()).is_none());
        assert_eq!(request.schema().len(), 13);
    }
}
