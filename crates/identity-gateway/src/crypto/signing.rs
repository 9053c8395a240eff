//! Ed25519 signing and verification.
//!
//! Signatures travel as base64 strings. Parsing failures are reported as
//! `InvalidSignature`, a failed check as `SignatureInvalid`, so callers can
//! tell malformed input apart from a signature that simply does not match.

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::error::{GatewayError, Result};

/// Sign a message and return the signature as a base64-encoded string.
pub fn sign_to_base64(signing_key: &SigningKey, message: &[u8]) -> String {
    let sig: Signature = signing_key.sign(message);
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, sig.to_bytes())
}

/// Parse a base64-encoded Ed25519 signature.
pub fn signature_from_base64(signature_b64: &str) -> Result<Signature> {
    let sig_bytes =
        base64::Engine::decode(&base64::engine::general_purpose::STANDARD, signature_b64.trim())
            .map_err(|e| GatewayError::InvalidSignature(format!("invalid base64: {e}")))?;

    let sig_array: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| GatewayError::InvalidSignature("signature must be 64 bytes".into()))?;

    Ok(Signature::from_bytes(&sig_array))
}

/// Verify an Ed25519 signature against a public key and message.
///
/// Uses strict verification: small-order keys and non-canonical
/// signatures are rejected.
pub fn verify(verifying_key: &VerifyingKey, message: &[u8], signature: &Signature) -> Result<()> {
    verifying_key
        .verify_strict(message, signature)
        .map_err(|_| GatewayError::SignatureInvalid)
}

/// Verify a base64-encoded signature.
pub fn verify_from_base64(
    verifying_key: &VerifyingKey,
    message: &[u8],
    signature_b64: &str,
) -> Result<()> {
    let signature = signature_from_base64(signature_b64)?;
    verify(verifying_key, message, &signature)
}
