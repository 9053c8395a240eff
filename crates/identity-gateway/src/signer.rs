//! Passphrase-keyed signing of text.
//!
//! Producing a valid signature is how a caller proves it knows its
//! passphrase: the key pair is looked up by that passphrase and its private
//! half only decrypts under it.
//!
//! Combined messages use a cleartext layout:
//!
//! ```text
//! -----BEGIN SIGNED MESSAGE-----
//! <data>
//! -----BEGIN SIGNATURE-----
//! <base64 signature>
//! -----END SIGNATURE-----
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::crypto::keys::decode_public_key;
use crate::crypto::signing::{sign_to_base64, verify_from_base64};
use crate::error::{GatewayError, Result};
use crate::identity::IdentityStore;

const BEGIN_MESSAGE: &str = "-----BEGIN SIGNED MESSAGE-----\n";
const BEGIN_SIGNATURE: &str = "\n-----BEGIN SIGNATURE-----\n";
const END_SIGNATURE: &str = "\n-----END SIGNATURE-----";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMode {
    /// `signature` is the bare base64 signature.
    Detached,
    /// `signature` is the full cleartext-signed message.
    Combined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedData {
    pub data: String,
    pub signature: String,
}

pub struct DataSigner {
    identities: Arc<dyn IdentityStore>,
}

impl DataSigner {
    pub fn new(identities: Arc<dyn IdentityStore>) -> Self {
        Self { identities }
    }

    /// Sign `data` with the key pair belonging to `passphrase`.
    ///
    /// Fails with `Decryption` when no key pair belongs to the passphrase or
    /// its private key does not open.
    pub fn sign(&self, data: &str, passphrase: &str, mode: SignatureMode) -> Result<SignedData> {
        let key_pair = self
            .identities
            .key_pair_by_seed_phrase(passphrase)?
            .ok_or_else(|| GatewayError::Decryption("no key pair for passphrase".into()))?;
        let signing_key = key_pair.unlock(passphrase)?;
        let detached = sign_to_base64(&signing_key, data.as_bytes());

        let signature = match mode {
            SignatureMode::Detached => detached,
            SignatureMode::Combined => {
                format!("{BEGIN_MESSAGE}{data}{BEGIN_SIGNATURE}{detached}{END_SIGNATURE}")
            }
        };
        Ok(SignedData {
            data: data.to_string(),
            signature,
        })
    }

    /// Check a detached base64 signature.
    ///
    /// `Ok(false)` means well-formed but not matching. Unparsable keys or
    /// signatures are errors.
    pub fn verify(data: &str, signature: &str, public_key: &str) -> Result<bool> {
        let key = decode_public_key(public_key)?;
        match verify_from_base64(&key, data.as_bytes(), signature) {
            Ok(()) => Ok(true),
            Err(GatewayError::SignatureInvalid) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Split a combined message into its data and detached signature.
    pub fn open_combined(message: &str) -> Result<SignedData> {
        let malformed = || GatewayError::InvalidSignature("malformed signed message".into());
        let body = message
            .trim_end()
            .strip_prefix(BEGIN_MESSAGE)
            .and_then(|rest| rest.strip_suffix(END_SIGNATURE))
            .ok_or_else(malformed)?;
        let (data, signature) = body.rsplit_once(BEGIN_SIGNATURE).ok_or_else(malformed)?;
        Ok(SignedData {
            data: data.to_string(),
            signature: signature.trim().to_string(),
        })
    }
}
