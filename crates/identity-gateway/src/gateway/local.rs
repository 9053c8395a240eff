//! In-process transport to a [`Gateway`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::attributes::AttributeValue;
use crate::error::Result;
use crate::identity::LinkedIdentities;
use crate::protocol::{GatewayTransport, RemoteAttribute, SourceAuthentication};
use crate::verification::{Verification, VerificationId};

use super::Gateway;

/// Serves protocol calls from a gateway in the same process. Every call
/// authenticates the caller first; the caller's identity is what gets
/// recorded as verifier.
#[derive(Clone)]
pub struct LocalTransport {
    gateway: Arc<Gateway>,
}

impl LocalTransport {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl GatewayTransport for LocalTransport {
    async fn retrieve_attribute(
        &self,
        auth: &SourceAuthentication,
        target: &RemoteAttribute,
    ) -> Result<Option<AttributeValue>> {
        let requester = self.gateway.authenticate(auth).await?;
        let owner = self.gateway.owner_by_identity(&target.identity)?;
        self.gateway
            .read_attribute(&requester, &owner, &target.attr_type, &target.id, None)
    }

    async fn retrieve_verifications(
        &self,
        auth: &SourceAuthentication,
        target: &RemoteAttribute,
    ) -> Result<Vec<Verification>> {
        let requester = self.gateway.authenticate(auth).await?;
        let owner = self.gateway.owner_by_identity(&target.identity)?;
        self.gateway
            .read_verifications(&requester, &owner, &target.attr_type, &target.id, None)
    }

    async fn submit_verification(
        &self,
        auth: &SourceAuthentication,
        target: &RemoteAttribute,
        linked_identities: LinkedIdentities,
        signature: String,
    ) -> Result<VerificationId> {
        let requester = self.gateway.authenticate(auth).await?;
        let owner = self.gateway.owner_by_identity(&target.identity)?;
        self.gateway
            .submit_verification(
                &requester,
                &owner,
                &target.attr_type,
                &target.id,
                linked_identities,
                &signature,
            )
            .await
    }
}
