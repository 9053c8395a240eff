//! Public-key resolution for verifiers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{GatewayError, Result};
use crate::identity::LinkedIdentities;

/// Resolves an identity URL to its base64 public key.
#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    /// Fails with `PublicKeyUnresolvable` when no key can be found.
    async fn resolve(&self, identity_url: &str) -> Result<String>;
}

/// Resolves a key through an alternate key system, e.g. a wallet address
/// linked to the verifier.
#[async_trait]
pub trait LinkedKeyResolver: Send + Sync {
    async fn resolve(&self, verifier_identity: &str, identifier: &str) -> Result<String>;
}

/// The URL resolver plus any linked-identity resolvers, keyed by kind.
#[derive(Clone)]
pub struct KeyResolvers {
    url: Arc<dyn PublicKeyResolver>,
    linked: BTreeMap<String, Arc<dyn LinkedKeyResolver>>,
}

impl KeyResolvers {
    pub fn new(url: Arc<dyn PublicKeyResolver>) -> Self {
        Self {
            url,
            linked: BTreeMap::new(),
        }
    }

    pub fn with_linked(mut self, kind: impl Into<String>, resolver: Arc<dyn LinkedKeyResolver>) -> Self {
        self.linked.insert(kind.into(), resolver);
        self
    }

    pub fn url_resolver(&self) -> &Arc<dyn PublicKeyResolver> {
        &self.url
    }

    /// Resolve a verifier's key, preferring the first linked identity whose
    /// kind has a registered resolver over the identity URL.
    pub async fn resolve(&self, verifier_identity: &str, linked: &LinkedIdentities) -> Result<String> {
        for (kind, identifier) in linked {
            if let Some(resolver) = self.linked.get(kind) {
                log::debug!("resolving {verifier_identity} through linked {kind} identity");
                return resolver.resolve(verifier_identity, identifier).await;
            }
        }
        self.url.resolve(verifier_identity).await
    }
}

/// Fixed map from identity URL to public key. Useful for peers known in advance.
#[derive(Debug, Clone, Default)]
pub struct StaticKeyResolver {
    keys: BTreeMap<String, String>,
}

impl StaticKeyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, identity_url: impl Into<String>, public_key: impl Into<String>) -> Self {
        let url = identity_url.into();
        self.keys
            .insert(crate::pattern::normalize_identity(&url).to_string(), public_key.into());
        self
    }
}

#[async_trait]
impl PublicKeyResolver for StaticKeyResolver {
    async fn resolve(&self, identity_url: &str) -> Result<String> {
        self.keys
            .get(crate::pattern::normalize_identity(identity_url))
            .cloned()
            .ok_or_else(|| GatewayError::PublicKeyUnresolvable(identity_url.to_string()))
    }
}
