//! Verification store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::attributes::{AttributeKey, AttributeRepository};
use crate::error::{GatewayError, Result};
use crate::identity::LinkedIdentities;
use crate::signer::DataSigner;
use crate::time::{Clock, SystemClock};

use super::{KeyResolvers, NewVerification, Verification, VerificationId, VerificationRepository};

/// Sent after a verification has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStored {
    pub key: AttributeKey,
    pub verification_id: VerificationId,
    pub verifier_identity: String,
}

/// Persists verifications after checking them against the attribute's
/// current value and the verifier's key.
pub struct VerificationStore {
    attributes: Arc<dyn AttributeRepository>,
    repo: Arc<dyn VerificationRepository>,
    resolvers: KeyResolvers,
    clock: Arc<dyn Clock>,
    events: Option<UnboundedSender<VerificationStored>>,
}

impl VerificationStore {
    pub fn new(
        attributes: Arc<dyn AttributeRepository>,
        repo: Arc<dyn VerificationRepository>,
        resolvers: KeyResolvers,
    ) -> Self {
        Self {
            attributes,
            repo,
            resolvers,
            clock: Arc::new(SystemClock),
            events: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send a [`VerificationStored`] event for every stored record.
    pub fn with_events(mut self, sender: UnboundedSender<VerificationStored>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Validate and persist a verification.
    ///
    /// # Errors
    ///
    /// `NotFound` if the attribute does not exist, `PublicKeyUnresolvable`
    /// if the verifier's key cannot be found, `SignatureInvalid` if the
    /// signature does not cover the attribute's current value.
    pub async fn store_verification(
        &self,
        key: &AttributeKey,
        verifier_identity: &str,
        linked_identities: LinkedIdentities,
        signature: &str,
    ) -> Result<VerificationId> {
        let current = self
            .attributes
            .get_attribute(key)?
            .ok_or_else(|| GatewayError::NotFound(format!("attribute not found: {key}")))?;

        let public_key = self
            .resolvers
            .resolve(verifier_identity, &linked_identities)
            .await?;
        if !DataSigner::verify(&current.value, signature, &public_key)? {
            log::warn!("rejected verification of {key} by {verifier_identity}: bad signature");
            return Err(GatewayError::SignatureInvalid);
        }

        let id = self.repo.append_verification(
            key,
            NewVerification {
                verifier_identity: verifier_identity.to_string(),
                signature: signature.trim().to_string(),
                linked_identities,
                created_at: self.clock.now(),
            },
        )?;
        log::info!("stored verification {id} of {key} by {verifier_identity}");

        if let Some(events) = &self.events {
            let event = VerificationStored {
                key: key.clone(),
                verification_id: id,
                verifier_identity: verifier_identity.to_string(),
            };
            if events.send(event).is_err() {
                log::debug!("verification event receiver dropped");
            }
        }
        Ok(id)
    }

    pub fn get_verifications(&self, key: &AttributeKey) -> Result<Vec<Verification>> {
        self.repo.verifications(key)
    }

    pub fn get_verification(
        &self,
        key: &AttributeKey,
        id: VerificationId,
    ) -> Result<Option<Verification>> {
        self.repo.verification(key, id)
    }
}
