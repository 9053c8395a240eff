//! The Verify flow.

use std::sync::Arc;

use crate::attributes::AttributeValue;
use crate::error::{GatewayError, Result};
use crate::identity::IdentityStore;
use crate::signer::{DataSigner, SignatureMode};
use crate::verification::VerificationId;

use super::{GatewayTransport, RemoteAttribute, SourceAuthentication};

#[derive(Debug, Clone)]
pub struct VerifyRequest {
    /// Identity URL of the verifier.
    pub source_identity: String,
    /// Local user ID of the verifier, used to look up linked identities.
    pub source_user_id: String,
    pub passphrase: String,
    pub target: RemoteAttribute,
    /// The value the verifier vouches for.
    pub claimed_value: AttributeValue,
}

pub struct AttributeVerifier {
    signer: Arc<DataSigner>,
    identities: Arc<dyn IdentityStore>,
    transport: Arc<dyn GatewayTransport>,
}

impl AttributeVerifier {
    pub fn new(
        signer: Arc<DataSigner>,
        identities: Arc<dyn IdentityStore>,
        transport: Arc<dyn GatewayTransport>,
    ) -> Self {
        Self {
            signer,
            identities,
            transport,
        }
    }

    /// Attest that the target attribute holds `claimed_value`.
    ///
    /// Nothing is submitted unless the fetched value equals the claim; a
    /// difference fails with `AttributeValueMismatch`.
    pub async fn verify_attribute(&self, request: &VerifyRequest) -> Result<VerificationId> {
        let target = &request.target;
        let auth = SourceAuthentication::sign(
            &self.signer,
            &request.source_identity,
            &request.passphrase,
        )?;

        let current = self
            .transport
            .retrieve_attribute(&auth, target)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("attribute not found: {target}")))?;
        if !current.canonical_eq(&request.claimed_value) {
            log::info!("verification of {target} aborted: value mismatch");
            return Err(GatewayError::AttributeValueMismatch {
                attr_type: target.attr_type.clone(),
                attr_id: target.id.clone(),
            });
        }

        let signed = self.signer.sign(
            &current.canonical_text(),
            &request.passphrase,
            SignatureMode::Detached,
        )?;
        let linked = self.identities.linked_identities(&request.source_user_id)?;

        let id = self
            .transport
            .submit_verification(&auth, target, linked, signed.signature)
            .await?;
        log::info!("{} verified {target} as #{id}", request.source_identity);
        Ok(id)
    }
}
