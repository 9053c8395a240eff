//! The Check flow. Reads only; nothing is cached or written.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::attributes::AttributeValue;
use crate::error::{GatewayError, Result};
use crate::signer::DataSigner;
use crate::verification::{KeyResolvers, VerificationId};

use super::{GatewayTransport, RemoteAttribute, SourceAuthentication};

/// Outcome for one stored verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub verification_id: VerificationId,
    pub verifier: String,
    pub valid: bool,
    /// `false` when the verifier's key could not be found. `valid` is then `false` too.
    pub key_resolved: bool,
}

pub struct AttributeChecker {
    signer: Arc<DataSigner>,
    transport: Arc<dyn GatewayTransport>,
    resolvers: KeyResolvers,
}

impl AttributeChecker {
    pub fn new(
        signer: Arc<DataSigner>,
        transport: Arc<dyn GatewayTransport>,
        resolvers: KeyResolvers,
    ) -> Self {
        Self {
            signer,
            transport,
            resolvers,
        }
    }

    /// Check every verification on `target` against `expected_value`.
    ///
    /// An unresolvable verifier key is reported as invalid, not as an error.
    /// A malformed stored signature or key is an error.
    pub async fn check_attribute(
        &self,
        checker_identity: &str,
        passphrase: &str,
        target: &RemoteAttribute,
        expected_value: &AttributeValue,
    ) -> Result<Vec<CheckResult>> {
        let auth = SourceAuthentication::sign(&self.signer, checker_identity, passphrase)?;
        let verifications = self.transport.retrieve_verifications(&auth, target).await?;
        let expected = expected_value.canonical_text();

        let mut results = Vec::with_capacity(verifications.len());
        for verification in verifications {
            let resolved = self
                .resolvers
                .resolve(&verification.verifier_identity, &verification.linked_identities)
                .await;
            let (valid, key_resolved) = match resolved {
                Ok(public_key) => (
                    DataSigner::verify(&expected, &verification.signature, &public_key)?,
                    true,
                ),
                Err(GatewayError::PublicKeyUnresolvable(who)) => {
                    log::warn!(
                        "verification #{} of {target}: cannot resolve key of {who}",
                        verification.id
                    );
                    (false, false)
                }
                Err(e) => return Err(e),
            };
            results.push(CheckResult {
                verification_id: verification.id,
                verifier: verification.verifier_identity,
                valid,
                key_resolved,
            });
        }
        Ok(results)
    }
}
