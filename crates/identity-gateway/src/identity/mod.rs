//! Local identities: who owns attributes, and with which key pair.
//!
//! An identity is addressed internally by an opaque `user_id` and from the
//! outside by its identity URL, `{public_base_url}/{user_name}`. Its key pair
//! is derived from, and sealed under, the owner's seed phrase.

pub mod creator;
pub mod memory;
pub mod resolver;

pub use creator::IdentityCreator;
pub use memory::MemoryIdentityStore;
pub use resolver::IdentityStoreKeyResolver;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::crypto::StoredKeyPair;
use crate::error::Result;

/// Alternate key systems an identity is linked to, e.g. `ethereum -> 0xabc…`.
pub type LinkedIdentities = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub user_id: String,
    pub user_name: String,
    pub key_pair: StoredKeyPair,
    #[serde(default)]
    pub linked_identities: LinkedIdentities,
    /// Microseconds since epoch.
    pub created_at: u64,
}

/// Persistence contract for identities.
///
/// Key pairs are looked up by seed phrase. Stores never keep the phrase
/// itself, only its [`seed_fingerprint`].
pub trait IdentityStore: Send + Sync {
    /// Persist a new identity. Fails with `AlreadyExists` if the user name or
    /// the seed phrase is already taken.
    fn store_identity(&self, record: IdentityRecord, seed_phrase: &str) -> Result<()>;

    fn identity_by_user_name(&self, user_name: &str) -> Result<Option<IdentityRecord>>;

    fn identity_by_user_id(&self, user_id: &str) -> Result<Option<IdentityRecord>>;

    fn key_pair_by_seed_phrase(&self, seed_phrase: &str) -> Result<Option<StoredKeyPair>>;

    /// Add or replace one linked identity. Fails with `NotFound` for unknown users.
    fn link_identity(&self, user_id: &str, kind: &str, identifier: &str) -> Result<()>;

    fn user_id_by_user_name(&self, user_name: &str) -> Result<Option<String>> {
        Ok(self.identity_by_user_name(user_name)?.map(|r| r.user_id))
    }

    fn public_key_by_user_name(&self, user_name: &str) -> Result<Option<String>> {
        Ok(self
            .identity_by_user_name(user_name)?
            .map(|r| r.key_pair.public_key))
    }

    /// Empty for unknown users.
    fn linked_identities(&self, user_id: &str) -> Result<LinkedIdentities> {
        Ok(self
            .identity_by_user_id(user_id)?
            .map(|r| r.linked_identities)
            .unwrap_or_default())
    }
}

/// Domain-separated SHA-256 of a seed phrase, hex encoded.
pub fn seed_fingerprint(seed_phrase: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"identity-gateway/seed-fingerprint/v1");
    hasher.update(seed_phrase.as_bytes());
    hex::encode(hasher.finalize())
}
