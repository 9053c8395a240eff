//! Registration of new identities.

use std::sync::Arc;

use crate::crypto::random::random_id;
use crate::crypto::{KdfParams, StoredKeyPair};
use crate::error::{GatewayError, Result};

use super::{IdentityRecord, IdentityStore, LinkedIdentities};

/// Derives a key pair for a new user and stores the identity.
pub struct IdentityCreator {
    store: Arc<dyn IdentityStore>,
    kdf: KdfParams,
}

impl IdentityCreator {
    pub fn new(store: Arc<dyn IdentityStore>, kdf: KdfParams) -> Self {
        Self { store, kdf }
    }

    /// Create the identity `user_name`, keyed by `seed_phrase`.
    ///
    /// The user name becomes the last segment of the identity URL, so it may
    /// not be empty or contain `/`, `*` or whitespace.
    pub fn create_identity(&self, user_name: &str, seed_phrase: &str) -> Result<IdentityRecord> {
        validate_user_name(user_name)?;
        if seed_phrase.trim().is_empty() {
            return Err(GatewayError::InvalidInput("seed phrase is empty".into()));
        }
        if self.store.identity_by_user_name(user_name)?.is_some() {
            return Err(GatewayError::AlreadyExists(format!(
                "user name taken: {user_name}"
            )));
        }

        let record = IdentityRecord {
            user_id: random_id("usr_"),
            user_name: user_name.to_string(),
            key_pair: StoredKeyPair::derive(seed_phrase, &self.kdf)?,
            linked_identities: LinkedIdentities::new(),
            created_at: crate::time::now_micros(),
        };
        self.store.store_identity(record.clone(), seed_phrase)?;

        log::info!("created identity {} ({})", record.user_name, record.user_id);
        Ok(record)
    }
}

fn validate_user_name(user_name: &str) -> Result<()> {
    if user_name.is_empty()
        || user_name
            .chars()
            .any(|c| c == '/' || c == '*' || c.is_whitespace())
    {
        return Err(GatewayError::InvalidInput(format!(
            "invalid user name: {user_name:?}"
        )));
    }
    Ok(())
}
