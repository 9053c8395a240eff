//! Typed per-user attributes.
//!
//! The attributes module provides:
//! - `AttributeKey` and the tagged `AttributeValue`
//! - Canonical text form used for signing (`AttributeValue::canonical_text`)
//! - The `AttributeRepository` persistence contract
//! - `AttributeStore`, the service used by the gateway and the protocol

pub mod store;
pub mod value;

pub use store::{AttributeEvent, AttributeStore};
pub use value::{
    canonical_json, validate_segment, AttributeKey, AttributeValue, DataType, StoredAttribute,
};

use crate::error::Result;

/// Persistence contract for attributes.
///
/// Values are handed over already canonicalized. Missing users and missing
/// types yield empty results.
pub trait AttributeRepository: Send + Sync {
    /// Insert or overwrite. Returns `true` if a previous value was replaced.
    fn put_attribute(&self, key: &AttributeKey, attribute: StoredAttribute) -> Result<bool>;

    fn get_attribute(&self, key: &AttributeKey) -> Result<Option<StoredAttribute>>;

    /// Returns `false` if nothing was stored under `key`.
    fn remove_attribute(&self, key: &AttributeKey) -> Result<bool>;

    /// Distinct attribute types of a user, sorted.
    fn attribute_types(&self, user_id: &str) -> Result<Vec<String>>;

    /// Attribute IDs of one type, sorted.
    fn attribute_ids(&self, user_id: &str, attr_type: &str) -> Result<Vec<String>>;
}
