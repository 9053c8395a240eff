//! Symmetric encryption using ChaCha20-Poly1305 and passphrase-based
//! key derivation using Argon2id.
//!
//! Used for keeping each identity's private signing key encrypted under
//! the identity's own passphrase.

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::random::{random_nonce_12, random_salt_16};
use crate::error::{GatewayError, Result};

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Iterations.
    pub t_cost: u32,
    /// Parallel lanes.
    pub p_cost: u32,
}

impl KdfParams {
    /// Minimal parameters. Only for tests and throwaway identities.
    pub fn insecure_fast() -> Self {
        Self {
            m_cost: 8,
            t_cost: 1,
            p_cost: 1,
        }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536, // 64 MiB
            t_cost: 3,
            p_cost: 4,
        }
    }
}

/// Derive a 32-byte key from a passphrase and salt using Argon2id.
pub fn derive_passphrase_key(
    passphrase: &[u8],
    salt: &[u8; 16],
    kdf: &KdfParams,
) -> Result<[u8; 32]> {
    let params = Params::new(kdf.m_cost, kdf.t_cost, kdf.p_cost, Some(32))
        .map_err(|e| GatewayError::DerivationFailed(format!("Argon2 params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; 32];
    argon2
        .hash_password_into(passphrase, salt, &mut output)
        .map_err(|e| GatewayError::DerivationFailed(format!("Argon2 hash: {e}")))?;

    Ok(output)
}

/// Encrypt plaintext with ChaCha20-Poly1305.
///
/// Returns `(nonce, ciphertext)`.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let nonce_bytes = random_nonce_12();
    let nonce = Nonce::from_slice(&nonce_bytes);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| GatewayError::EncryptionFailed(format!("cipher init: {e}")))?;
    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| GatewayError::EncryptionFailed(format!("encrypt: {e}")))?;
    Ok((nonce_bytes.to_vec(), ciphertext))
}

/// Decrypt ciphertext with ChaCha20-Poly1305.
pub fn decrypt(key: &[u8; 32], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != 12 {
        return Err(GatewayError::Decryption("nonce must be 12 bytes".into()));
    }
    let nonce = Nonce::from_slice(nonce);
    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| GatewayError::Decryption(format!("cipher init: {e}")))?;
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| GatewayError::Decryption("wrong passphrase or corrupted key".into()))
}

/// A secret sealed under a passphrase, in a storable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedSecret {
    /// Base64 Argon2id salt (16 bytes).
    pub salt: String,
    /// Base64 ChaCha20-Poly1305 nonce (12 bytes).
    pub nonce: String,
    /// Base64 ciphertext.
    pub ciphertext: String,
    /// KDF parameters used at sealing time.
    pub kdf: KdfParams,
}

impl EncryptedSecret {
    /// Encrypt `plaintext` under `passphrase`.
    pub fn seal(passphrase: &[u8], plaintext: &[u8], kdf: &KdfParams) -> Result<Self> {
        let salt = random_salt_16();
        let mut key = derive_passphrase_key(passphrase, &salt, kdf)?;
        let sealed = encrypt(&key, plaintext);
        key.zeroize();
        let (nonce, ciphertext) = sealed?;
        Ok(Self {
            salt: b64_encode(salt),
            nonce: b64_encode(&nonce),
            ciphertext: b64_encode(&ciphertext),
            kdf: *kdf,
        })
    }

    /// Decrypt with `passphrase`. Fails with `Decryption` on a wrong passphrase.
    pub fn open(&self, passphrase: &[u8]) -> Result<Vec<u8>> {
        let salt: [u8; 16] = b64_decode(&self.salt)?
            .try_into()
            .map_err(|_| GatewayError::Decryption("salt must be 16 bytes".into()))?;
        let nonce = b64_decode(&self.nonce)?;
        let ciphertext = b64_decode(&self.ciphertext)?;

        let mut key = derive_passphrase_key(passphrase, &salt, &self.kdf)?;
        let result = decrypt(&key, &nonce, &ciphertext);
        key.zeroize();
        result
    }
}

fn b64_encode(bytes: impl AsRef<[u8]>) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, bytes)
}

fn b64_decode(s: &str) -> Result<Vec<u8>> {
    base64::Engine::decode(&base64::engine::general_purpose::STANDARD, s)
        .map_err(|e| GatewayError::Decryption(format!("invalid base64: {e}")))
}
