//! The attribute verification protocol.
//!
//! - [`AttributeVerifier`]: attest that a remote attribute holds a value.
//! - [`AttributeChecker`]: re-validate the attestations stored on a remote
//!   attribute against an expected value.
//!
//! Both talk to the target gateway through a [`GatewayTransport`], each call
//! authenticated by a signature over the caller's own identity URL.

pub mod checker;
pub mod verifier;

pub use checker::{AttributeChecker, CheckResult};
pub use verifier::{AttributeVerifier, VerifyRequest};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;
use crate::error::Result;
use crate::identity::LinkedIdentities;
use crate::signer::{DataSigner, SignatureMode};
use crate::verification::{Verification, VerificationId};

/// Proof that the caller controls `identity`: a detached signature over the
/// identity URL itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAuthentication {
    pub identity: String,
    pub signature: String,
}

impl SourceAuthentication {
    pub fn sign(signer: &DataSigner, identity: &str, passphrase: &str) -> Result<Self> {
        let signed = signer.sign(identity, passphrase, SignatureMode::Detached)?;
        Ok(Self {
            identity: signed.data,
            signature: signed.signature,
        })
    }
}

/// An attribute on some gateway, addressed by its owner's identity URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttribute {
    pub identity: String,
    pub attr_type: String,
    pub id: String,
}

impl RemoteAttribute {
    pub fn new(identity: impl Into<String>, attr_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            attr_type: attr_type.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for RemoteAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/identity/{}/{}", self.identity, self.attr_type, self.id)
    }
}

/// Calls to a peer gateway. Implementations surface connectivity failures
/// as `RemoteTransport` and never retry.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn retrieve_attribute(
        &self,
        auth: &SourceAuthentication,
        target: &RemoteAttribute,
    ) -> Result<Option<AttributeValue>>;

    async fn retrieve_verifications(
        &self,
        auth: &SourceAuthentication,
        target: &RemoteAttribute,
    ) -> Result<Vec<Verification>>;

    /// The verifier recorded by the peer is `auth.identity`.
    async fn submit_verification(
        &self,
        auth: &SourceAuthentication,
        target: &RemoteAttribute,
        linked_identities: LinkedIdentities,
        signature: String,
    ) -> Result<VerificationId>;
}
