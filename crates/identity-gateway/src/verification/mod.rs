//! Third-party attestations of attribute values.
//!
//! A verification is a detached signature by some verifier over the
//! canonical text an attribute held when it was signed. Records are
//! immutable; their validity is recomputed on every check, so editing the
//! attribute silently invalidates earlier verifications.

pub mod resolver;
pub mod store;

pub use resolver::{KeyResolvers, LinkedKeyResolver, PublicKeyResolver, StaticKeyResolver};
pub use store::{VerificationStore, VerificationStored};

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeKey;
use crate::error::Result;
use crate::identity::LinkedIdentities;

/// Per-attribute sequence number, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VerificationId(pub u64);

impl std::fmt::Display for VerificationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub id: VerificationId,
    pub verifier_identity: String,
    /// Base64 Ed25519 signature over the attribute's canonical text.
    pub signature: String,
    #[serde(default)]
    pub linked_identities: LinkedIdentities,
    pub created_at: u64,
}

/// A verification before the repository has numbered it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVerification {
    pub verifier_identity: String,
    pub signature: String,
    pub linked_identities: LinkedIdentities,
    pub created_at: u64,
}

impl NewVerification {
    pub fn with_id(self, id: VerificationId) -> Verification {
        Verification {
            id,
            verifier_identity: self.verifier_identity,
            signature: self.signature,
            linked_identities: self.linked_identities,
            created_at: self.created_at,
        }
    }
}

/// Persistence contract for verifications.
pub trait VerificationRepository: Send + Sync {
    /// Number the record with the attribute's next ID and persist it.
    /// Numbering and insertion are atomic.
    fn append_verification(
        &self,
        key: &AttributeKey,
        verification: NewVerification,
    ) -> Result<VerificationId>;

    /// All records of an attribute, ordered by ID. Empty when there are none.
    fn verifications(&self, key: &AttributeKey) -> Result<Vec<Verification>>;

    fn verification(&self, key: &AttributeKey, id: VerificationId) -> Result<Option<Verification>> {
        Ok(self.verifications(key)?.into_iter().find(|v| v.id == id))
    }
}
