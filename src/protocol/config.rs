//! Codec limits

/// Default maximum length of a single string or blob (16 MB)
pub const DEFAULT_MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

/// Default maximum number of entries in a single map or array
pub const DEFAULT_MAX_COLLECTION_LEN: usize = 1 << 20;

/// Default maximum nested message depth
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Limits applied by the encoder and decoder.
///
/// The encoder rejects an oversized field before writing any of its bytes;
/// the decoder rejects it as soon as the length prefix is read, before
/// allocating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CodecConfig {
    /// Maximum bytes in one string or blob field.
    pub max_field_len: usize,
    /// Maximum entries in one map or array field.
    pub max_collection_len: usize,
    /// Maximum nesting of message-typed fields below the top-level message.
    pub max_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_field_len: DEFAULT_MAX_FIELD_LEN,
            max_collection_len: DEFAULT_MAX_COLLECTION_LEN,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl CodecConfig {
    /// Set the field length limit (capped at `i32::MAX`, the largest encodable length)
    #[must_use]
    pub fn with_max_field_len(mut self, max: usize) -> Self {
        self.max_field_len = max.min(i32::MAX as usize);
        self
    }

    /// Set the collection length limit (capped at `i32::MAX`)
    #[must_use]
    pub fn with_max_collection_len(mut self, max: usize) -> Self {
        self.max_collection_len = max.min(i32::MAX as usize);
        self
    }

    /// Set the nesting limit
    #[must_use]
    pub const fn with_max_depth(mut self, max: usize) -> Self {
        self.max_depth = max;
        self
    }
}
