//! Key derivation using HKDF-SHA256.
//!
//! A user's signing key is derived from their seed phrase in two steps:
//! Argon2id stretches the phrase into a master key, then HKDF expands the
//! master key under a fixed context string.

use ed25519_dalek::SigningKey;
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::crypto::encryption::{derive_passphrase_key, KdfParams};
use crate::error::{GatewayError, Result};

/// HKDF context for the identity signing key. Must remain stable across versions.
const SIGNING_CONTEXT: &str = "identity-gateway/signing";

/// Domain string hashed into the fixed Argon2id salt for seed derivation.
const SEED_SALT_DOMAIN: &str = "identity-gateway/seed-salt/v1";

/// Derive a 32-byte child key from a root key and context string.
pub fn derive_key(root_key_bytes: &[u8; 32], context: &str) -> Result<[u8; 32]> {
    let hk = Hkdf::<Sha256>::new(None, root_key_bytes);
    let mut output = [0u8; 32];
    hk.expand(context.as_bytes(), &mut output)
        .map_err(|e| GatewayError::DerivationFailed(format!("HKDF expand failed: {e}")))?;
    Ok(output)
}

/// Deterministically derive the Ed25519 signing key for a seed phrase.
pub fn signing_key_from_seed_phrase(seed_phrase: &str, kdf: &KdfParams) -> Result<SigningKey> {
    let mut master = derive_passphrase_key(seed_phrase.as_bytes(), &seed_salt(), kdf)?;
    let derived = derive_key(&master, SIGNING_CONTEXT);
    master.zeroize();
    let mut derived = derived?;
    let key = SigningKey::from_bytes(&derived);
    derived.zeroize();
    Ok(key)
}

fn seed_salt() -> [u8; 16] {
    let digest = Sha256::digest(SEED_SALT_DOMAIN.as_bytes());
    let mut salt = [0u8; 16];
    salt.copy_from_slice(&digest[..16]);
    salt
}
