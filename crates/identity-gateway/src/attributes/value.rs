//! Attribute keys and values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GatewayError, Result};

/// Composite attribute address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttributeKey {
    pub user_id: String,
    pub attr_type: String,
    pub id: String,
}

impl AttributeKey {
    pub fn new(
        user_id: impl Into<String>,
        attr_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            attr_type: attr_type.into(),
            id: id.into(),
        }
    }

    /// Like [`AttributeKey::new`], but rejects segments that would not map
    /// to a path of their own.
    pub fn checked(
        user_id: impl Into<String>,
        attr_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Result<Self> {
        let key = Self::new(user_id, attr_type, id);
        key.validate()?;
        Ok(key)
    }

    /// Type and ID are path segments, so they must be non-empty and free of
    /// `/` and `*`. Otherwise `(email, "primary/verifications")` would share
    /// an access path with the verifications of `(email, primary)`.
    pub fn validate(&self) -> Result<()> {
        validate_segment("attribute type", &self.attr_type)?;
        validate_segment("attribute id", &self.id)
    }

    /// Access path of the attribute, e.g. `/identity/email/primary`.
    pub fn path(&self) -> String {
        format!("/identity/{}/{}", self.attr_type, self.id)
    }

    /// Access path guarding the attribute's verifications.
    pub fn verifications_path(&self) -> String {
        format!("{}/verifications", self.path())
    }
}

/// Reject an attribute type or ID that is empty or holds `/` or `*`.
pub fn validate_segment(what: &str, segment: &str) -> Result<()> {
    if segment.is_empty() {
        return Err(GatewayError::InvalidInput(format!("{what} is empty")));
    }
    if segment.contains(|c| c == '/' || c == '*') {
        return Err(GatewayError::InvalidInput(format!(
            "{what} {segment:?} contains '/' or '*'"
        )));
    }
    Ok(())
}

impl std::fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.user_id, self.attr_type, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Json,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Json => "json",
        }
    }
}

/// An attribute value, tagged with its data type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dataType", content = "value", rename_all = "lowercase")]
pub enum AttributeValue {
    String(String),
    Json(Value),
}

impl AttributeValue {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::String(_) => DataType::String,
            Self::Json(_) => DataType::Json,
        }
    }

    /// The exact text that gets persisted and signed.
    ///
    /// Strings are used verbatim. JSON is serialized compactly with object
    /// keys sorted at every depth.
    pub fn canonical_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Json(v) => canonical_json(v),
        }
    }

    /// Equality as used when comparing a claimed value with a fetched one.
    pub fn canonical_eq(&self, other: &Self) -> bool {
        self.data_type() == other.data_type() && self.canonical_text() == other.canonical_text()
    }

    pub fn to_stored(&self) -> StoredAttribute {
        StoredAttribute {
            value: self.canonical_text(),
            data_type: self.data_type(),
        }
    }

    pub fn from_stored(stored: &StoredAttribute) -> Result<Self> {
        match stored.data_type {
            DataType::String => Ok(Self::String(stored.value.clone())),
            DataType::Json => serde_json::from_str(&stored.value)
                .map(Self::Json)
                .map_err(|e| GatewayError::InvalidFileFormat(format!("stored JSON attribute: {e}"))),
        }
    }
}

/// Persisted form of an attribute: canonical text plus its data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAttribute {
    pub value: String,
    pub data_type: DataType,
}

/// Serialize `value` compactly with recursively sorted object keys.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Serializing a plain string cannot fail.
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
