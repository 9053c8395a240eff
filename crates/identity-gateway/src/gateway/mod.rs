//! One gateway deployment: the stores and engines wired together, with
//! authorization applied to every request made by someone other than the
//! attribute's owner.
//!
//! | Operation             | Path checked                             | Needs |
//! |-----------------------|------------------------------------------|-------|
//! | `read_attribute`      | `/identity/{type}/{id}`                  | read  |
//! | `write_attribute`     | `/identity/{type}/{id}`                  | write |
//! | `delete_attribute`    | `/identity/{type}/{id}`                  | write |
//! | `read_verifications`  | `/identity/{type}/{id}/verifications`    | read  |
//! | `submit_verification` | `/identity/{type}/{id}/verifications`    | write |

pub mod local;

pub use local::LocalTransport;

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::access::{AccessRightsEngine, AccessRuleStore, Permissions};
use crate::attributes::{AttributeEvent, AttributeKey, AttributeRepository, AttributeStore, AttributeValue};
use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result};
use crate::identity::{
    IdentityCreator, IdentityRecord, IdentityStore, IdentityStoreKeyResolver, LinkedIdentities,
    MemoryIdentityStore,
};
use crate::notifier::{AttributeNotification, AttributeNotifier};
use crate::pattern::normalize_identity;
use crate::protocol::{AttributeChecker, AttributeVerifier, GatewayTransport, SourceAuthentication};
use crate::signer::DataSigner;
use crate::storage::{FileBackend, MemoryBackend};
use crate::time::{Clock, SystemClock};
use crate::verification::{
    KeyResolvers, LinkedKeyResolver, PublicKeyResolver, Verification, VerificationId,
    VerificationRepository, VerificationStore, VerificationStored,
};

// ── Builder ───────────────────────────────────────────────────────────────────

pub struct GatewayBuilder {
    config: GatewayConfig,
    identities: Arc<dyn IdentityStore>,
    rules: Arc<dyn AccessRuleStore>,
    attributes: Arc<dyn AttributeRepository>,
    verifications: Arc<dyn VerificationRepository>,
    clock: Arc<dyn Clock>,
    url_resolver: Option<Arc<dyn PublicKeyResolver>>,
    linked_resolvers: Vec<(String, Arc<dyn LinkedKeyResolver>)>,
    verification_events: Option<UnboundedSender<VerificationStored>>,
    notifications: Option<UnboundedSender<AttributeNotification>>,
}

impl GatewayBuilder {
    /// Everything in memory, regardless of `config.data_dir`.
    pub fn in_memory(config: GatewayConfig) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        Self::with_parts(
            config,
            Arc::new(MemoryIdentityStore::new()),
            backend.clone(),
            backend.clone(),
            backend,
        )
    }

    /// File backend under `config.data_dir`, or memory when it is unset.
    pub fn from_config(config: GatewayConfig) -> Result<Self> {
        let Some(dir) = config.data_dir.clone() else {
            return Ok(Self::in_memory(config));
        };
        let backend = Arc::new(FileBackend::open(dir)?);
        Ok(Self::with_parts(
            config,
            backend.clone(),
            backend.clone(),
            backend.clone(),
            backend,
        ))
    }

    pub fn with_parts(
        config: GatewayConfig,
        identities: Arc<dyn IdentityStore>,
        rules: Arc<dyn AccessRuleStore>,
        attributes: Arc<dyn AttributeRepository>,
        verifications: Arc<dyn VerificationRepository>,
    ) -> Self {
        Self {
            config,
            identities,
            rules,
            attributes,
            verifications,
            clock: Arc::new(SystemClock),
            url_resolver: None,
            linked_resolvers: Vec::new(),
            verification_events: None,
            notifications: None,
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the default resolver, which only knows this gateway's users.
    pub fn url_resolver(mut self, resolver: Arc<dyn PublicKeyResolver>) -> Self {
        self.url_resolver = Some(resolver);
        self
    }

    pub fn linked_resolver(mut self, kind: impl Into<String>, resolver: Arc<dyn LinkedKeyResolver>) -> Self {
        self.linked_resolvers.push((kind.into(), resolver));
        self
    }

    pub fn verification_events(mut self, sender: UnboundedSender<VerificationStored>) -> Self {
        self.verification_events = Some(sender);
        self
    }

    pub fn notifications(mut self, sender: UnboundedSender<AttributeNotification>) -> Self {
        self.notifications = Some(sender);
        self
    }

    pub fn build(self) -> Gateway {
        let url_resolver = self.url_resolver.unwrap_or_else(|| {
            Arc::new(IdentityStoreKeyResolver::new(
                self.identities.clone(),
                &self.config.public_base_url,
            ))
        });
        let resolvers = self
            .linked_resolvers
            .into_iter()
            .fold(KeyResolvers::new(url_resolver), |r, (kind, resolver)| {
                r.with_linked(kind, resolver)
            });

        let access = Arc::new(AccessRightsEngine::with_clock(self.rules, self.clock.clone()));
        let mut verifications =
            VerificationStore::new(self.attributes.clone(), self.verifications, resolvers.clone())
                .with_clock(self.clock);
        if let Some(sender) = self.verification_events {
            verifications = verifications.with_events(sender);
        }
        let notifier = self
            .notifications
            .map(|sender| AttributeNotifier::new(access.clone(), sender));

        Gateway {
            signer: Arc::new(DataSigner::new(self.identities.clone())),
            config: self.config,
            identities: self.identities,
            access,
            attributes: AttributeStore::new(self.attributes),
            verifications,
            resolvers,
            notifier,
        }
    }
}

// ── Gateway ───────────────────────────────────────────────────────────────────

pub struct Gateway {
    config: GatewayConfig,
    identities: Arc<dyn IdentityStore>,
    access: Arc<AccessRightsEngine>,
    attributes: AttributeStore,
    verifications: VerificationStore,
    resolvers: KeyResolvers,
    signer: Arc<DataSigner>,
    notifier: Option<AttributeNotifier>,
}

impl Gateway {
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn identities(&self) -> &Arc<dyn IdentityStore> {
        &self.identities
    }

    pub fn access(&self) -> &AccessRightsEngine {
        &self.access
    }

    pub fn attributes(&self) -> &AttributeStore {
        &self.attributes
    }

    pub fn verifications(&self) -> &VerificationStore {
        &self.verifications
    }

    pub fn signer(&self) -> &Arc<DataSigner> {
        &self.signer
    }

    pub fn identity_creator(&self) -> IdentityCreator {
        IdentityCreator::new(self.identities.clone(), self.config.kdf)
    }

    pub fn identity_url(&self, user_name: &str) -> String {
        self.config.identity_url(user_name)
    }

    /// A verifier signing with this gateway's users and talking through `transport`.
    pub fn verifier(&self, transport: Arc<dyn GatewayTransport>) -> AttributeVerifier {
        AttributeVerifier::new(self.signer.clone(), self.identities.clone(), transport)
    }

    pub fn checker(&self, transport: Arc<dyn GatewayTransport>) -> AttributeChecker {
        AttributeChecker::new(self.signer.clone(), transport, self.resolvers.clone())
    }

    /// Check that `auth` is signed by the key of the identity it names.
    /// Returns the normalized identity.
    pub async fn authenticate(&self, auth: &SourceAuthentication) -> Result<String> {
        let public_key = self.resolvers.url_resolver().resolve(&auth.identity).await?;
        if DataSigner::verify(&auth.identity, &auth.signature, &public_key)? {
            Ok(normalize_identity(&auth.identity).to_string())
        } else {
            log::warn!("authentication failed for {}", auth.identity);
            Err(GatewayError::AccessDenied(format!(
                "authentication failed for {}",
                auth.identity
            )))
        }
    }

    /// The local identity behind an identity URL.
    ///
    /// URLs outside `public_base_url` fail with `RemoteTransport`; unknown
    /// users with `NotFound`.
    pub fn owner_by_identity(&self, identity_url: &str) -> Result<IdentityRecord> {
        let user_name = self.config.user_name_from_identity_url(identity_url).ok_or_else(|| {
            GatewayError::RemoteTransport(format!("{identity_url} is not served by this gateway"))
        })?;
        self.identities
            .identity_by_user_name(user_name)?
            .ok_or_else(|| GatewayError::NotFound(format!("identity not found: {identity_url}")))
    }

    pub fn read_attribute(
        &self,
        requester: &str,
        owner: &IdentityRecord,
        attr_type: &str,
        attr_id: &str,
        token: Option<&str>,
    ) -> Result<Option<AttributeValue>> {
        let key = AttributeKey::checked(&owner.user_id, attr_type, attr_id)?;
        self.authorize(requester, owner, &key.path(), token, Permissions::READ)?;
        self.attributes.retrieve_attribute(&key)
    }

    pub fn write_attribute(
        &self,
        requester: &str,
        owner: &IdentityRecord,
        attr_type: &str,
        attr_id: &str,
        value: &AttributeValue,
        token: Option<&str>,
    ) -> Result<AttributeEvent> {
        let key = AttributeKey::checked(&owner.user_id, attr_type, attr_id)?;
        self.authorize(requester, owner, &key.path(), token, Permissions::WRITE)?;
        let event = self.attributes.store_attribute(&key, value)?;
        // The write has committed; a failing observer must not undo that.
        if let Err(e) = self.notify(&event) {
            log::warn!("notifier failed after writing {key}: {e}");
        }
        Ok(event)
    }

    pub fn delete_attribute(
        &self,
        requester: &str,
        owner: &IdentityRecord,
        attr_type: &str,
        attr_id: &str,
        token: Option<&str>,
    ) -> Result<Option<AttributeEvent>> {
        let key = AttributeKey::checked(&owner.user_id, attr_type, attr_id)?;
        self.authorize(requester, owner, &key.path(), token, Permissions::WRITE)?;
        self.attributes.delete_attribute(&key)
    }

    pub fn read_verifications(
        &self,
        requester: &str,
        owner: &IdentityRecord,
        attr_type: &str,
        attr_id: &str,
        token: Option<&str>,
    ) -> Result<Vec<Verification>> {
        let key = AttributeKey::checked(&owner.user_id, attr_type, attr_id)?;
        self.authorize(requester, owner, &key.verifications_path(), token, Permissions::READ)?;
        self.verifications.get_verifications(&key)
    }

    /// Store a verification by `requester`, who must already be authenticated.
    pub async fn submit_verification(
        &self,
        requester: &str,
        owner: &IdentityRecord,
        attr_type: &str,
        attr_id: &str,
        linked_identities: LinkedIdentities,
        signature: &str,
    ) -> Result<VerificationId> {
        let key = AttributeKey::checked(&owner.user_id, attr_type, attr_id)?;
        self.authorize(requester, owner, &key.verifications_path(), None, Permissions::WRITE)?;
        self.verifications
            .store_verification(&key, requester, linked_identities, signature)
            .await
    }

    /// Pass a store event to the notifier, if one is configured.
    pub fn notify(&self, event: &AttributeEvent) -> Result<usize> {
        match &self.notifier {
            Some(notifier) => notifier.notify(event),
            None => Ok(0),
        }
    }

    fn is_owner(&self, requester: &str, owner: &IdentityRecord) -> bool {
        normalize_identity(requester) == self.identity_url(&owner.user_name)
    }

    fn authorize(
        &self,
        requester: &str,
        owner: &IdentityRecord,
        path: &str,
        token: Option<&str>,
        needed: Permissions,
    ) -> Result<()> {
        if self.is_owner(requester, owner) {
            return Ok(());
        }
        let granted = self.access.check(&owner.user_id, requester, path, token)?;
        if (needed.read && !granted.read) || (needed.write && !granted.write) {
            log::info!("denied {requester} on {path} of {}", owner.user_name);
            return Err(GatewayError::AccessDenied(format!("{requester} on {path}")));
        }
        Ok(())
    }
}
