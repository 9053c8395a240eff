//! In-memory identity store.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::crypto::StoredKeyPair;
use crate::error::{GatewayError, Result};

use super::{seed_fingerprint, IdentityRecord, IdentityStore};

#[derive(Default)]
struct Inner {
    by_user_id: HashMap<String, IdentityRecord>,
    user_ids_by_name: HashMap<String, String>,
    user_ids_by_seed: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    inner: RwLock<Inner>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn store_identity(&self, record: IdentityRecord, seed_phrase: &str) -> Result<()> {
        let fingerprint = seed_fingerprint(seed_phrase);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if inner.user_ids_by_name.contains_key(&record.user_name) {
            return Err(GatewayError::AlreadyExists(format!(
                "user name taken: {}",
                record.user_name
            )));
        }
        if inner.user_ids_by_seed.contains_key(&fingerprint) {
            return Err(GatewayError::AlreadyExists(
                "seed phrase already in use".into(),
            ));
        }

        inner
            .user_ids_by_name
            .insert(record.user_name.clone(), record.user_id.clone());
        inner
            .user_ids_by_seed
            .insert(fingerprint, record.user_id.clone());
        inner.by_user_id.insert(record.user_id.clone(), record);
        Ok(())
    }

    fn identity_by_user_name(&self, user_name: &str) -> Result<Option<IdentityRecord>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .user_ids_by_name
            .get(user_name)
            .and_then(|id| inner.by_user_id.get(id))
            .cloned())
    }

    fn identity_by_user_id(&self, user_id: &str) -> Result<Option<IdentityRecord>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.by_user_id.get(user_id).cloned())
    }

    fn key_pair_by_seed_phrase(&self, seed_phrase: &str) -> Result<Option<StoredKeyPair>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(inner
            .user_ids_by_seed
            .get(&seed_fingerprint(seed_phrase))
            .and_then(|id| inner.by_user_id.get(id))
            .map(|r| r.key_pair.clone()))
    }

    fn link_identity(&self, user_id: &str, kind: &str, identifier: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let record = inner
            .by_user_id
            .get_mut(user_id)
            .ok_or_else(|| GatewayError::NotFound(format!("identity not found: {user_id}")))?;
        record
            .linked_identities
            .insert(kind.to_string(), identifier.to_string());
        Ok(())
    }
}
