use std::sync::Arc;

use async_trait::async_trait;

use crate::config::user_name_from_identity_url;
use crate::error::{GatewayError, Result};
use crate::verification::PublicKeyResolver;

use super::IdentityStore;

/// Resolves identity URLs of this gateway's own users from the identity store.
pub struct IdentityStoreKeyResolver {
    store: Arc<dyn IdentityStore>,
    public_base_url: String,
}

impl IdentityStoreKeyResolver {
    pub fn new(store: Arc<dyn IdentityStore>, public_base_url: &str) -> Self {
        Self {
            store,
            public_base_url: public_base_url.to_string(),
        }
    }
}

#[async_trait]
impl PublicKeyResolver for IdentityStoreKeyResolver {
    async fn resolve(&self, identity_url: &str) -> Result<String> {
        let unresolvable = || GatewayError::PublicKeyUnresolvable(identity_url.to_string());
        let user_name =
            user_name_from_identity_url(&self.public_base_url, identity_url).ok_or_else(unresolvable)?;
        self.store
            .public_key_by_user_name(user_name)?
            .ok_or_else(unresolvable)
    }
}
