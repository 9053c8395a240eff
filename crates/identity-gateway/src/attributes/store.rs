//! Attribute store service.
//!
//! No authorization happens here; callers check access first.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

use super::value::{AttributeKey, AttributeValue};
use super::AttributeRepository;

/// What a store operation did. Feed these to the attribute notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AttributeEvent {
    Created { key: AttributeKey },
    Updated { key: AttributeKey },
    Deleted { key: AttributeKey },
}

impl AttributeEvent {
    pub fn key(&self) -> &AttributeKey {
        match self {
            Self::Created { key } | Self::Updated { key } | Self::Deleted { key } => key,
        }
    }
}

pub struct AttributeStore {
    repo: Arc<dyn AttributeRepository>,
}

impl AttributeStore {
    pub fn new(repo: Arc<dyn AttributeRepository>) -> Self {
        Self { repo }
    }

    pub fn store_string_attribute(
        &self,
        key: &AttributeKey,
        value: impl Into<String>,
    ) -> Result<AttributeEvent> {
        self.store_attribute(key, &AttributeValue::String(value.into()))
    }

    pub fn store_json_attribute(&self, key: &AttributeKey, value: Value) -> Result<AttributeEvent> {
        self.store_attribute(key, &AttributeValue::Json(value))
    }

    /// Store a value of either type, overwriting any previous one.
    pub fn store_attribute(&self, key: &AttributeKey, value: &AttributeValue) -> Result<AttributeEvent> {
        key.validate()?;
        let replaced = self.repo.put_attribute(key, value.to_stored())?;
        log::info!(
            "stored {} attribute {key} ({})",
            value.data_type().as_str(),
            if replaced { "updated" } else { "created" }
        );
        let key = key.clone();
        Ok(if replaced {
            AttributeEvent::Updated { key }
        } else {
            AttributeEvent::Created { key }
        })
    }

    /// `None` when nothing is stored. An empty string is a value.
    pub fn retrieve_attribute(&self, key: &AttributeKey) -> Result<Option<AttributeValue>> {
        self.repo
            .get_attribute(key)?
            .map(|stored| AttributeValue::from_stored(&stored))
            .transpose()
    }

    /// Canonical text as persisted, used for signature checks.
    pub fn retrieve_canonical_text(&self, key: &AttributeKey) -> Result<Option<String>> {
        Ok(self.repo.get_attribute(key)?.map(|stored| stored.value))
    }

    /// Returns the deletion event, or `None` if there was nothing to delete.
    pub fn delete_attribute(&self, key: &AttributeKey) -> Result<Option<AttributeEvent>> {
        if self.repo.remove_attribute(key)? {
            log::info!("deleted attribute {key}");
            Ok(Some(AttributeEvent::Deleted { key: key.clone() }))
        } else {
            Ok(None)
        }
    }

    pub fn list_attribute_types(&self, user_id: &str) -> Result<Vec<String>> {
        self.repo.attribute_types(user_id)
    }

    pub fn list_attributes(&self, user_id: &str, attr_type: &str) -> Result<Vec<String>> {
        self.repo.attribute_ids(user_id, attr_type)
    }
}
