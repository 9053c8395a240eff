//! Ed25519 key pairs protected by the owner's seed phrase.
//!
//! The public half is stored in the clear as base64. The private half is
//! only ever persisted inside an [`EncryptedSecret`] sealed under the same
//! seed phrase it was derived from.

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::crypto::derivation::signing_key_from_seed_phrase;
use crate::crypto::encryption::{EncryptedSecret, KdfParams};
use crate::error::{GatewayError, Result};

/// A key pair as persisted by an identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredKeyPair {
    /// Base64 Ed25519 verifying key (32 bytes).
    pub public_key: String,
    /// Signing key bytes sealed under the seed phrase.
    pub private_key: EncryptedSecret,
}

impl StoredKeyPair {
    /// Derive the key pair for `seed_phrase` and seal its private half.
    pub fn derive(seed_phrase: &str, kdf: &KdfParams) -> Result<Self> {
        let signing_key = signing_key_from_seed_phrase(seed_phrase, kdf)?;
        let mut secret = signing_key.to_bytes();
        let sealed = EncryptedSecret::seal(seed_phrase.as_bytes(), &secret, kdf);
        secret.zeroize();
        Ok(Self {
            public_key: encode_public_key(&signing_key.verifying_key()),
            private_key: sealed?,
        })
    }

    /// Decrypt the signing key. A wrong passphrase yields `Decryption`.
    pub fn unlock(&self, passphrase: &str) -> Result<SigningKey> {
        let mut bytes = self.private_key.open(passphrase.as_bytes())?;
        let key_bytes: Result<[u8; 32]> = bytes
            .as_slice()
            .try_into()
            .map_err(|_| GatewayError::Decryption("private key must be 32 bytes".into()));
        bytes.zeroize();
        let mut key_bytes = key_bytes?;
        let signing_key = SigningKey::from_bytes(&key_bytes);
        key_bytes.zeroize();
        Ok(signing_key)
    }

    /// Parse the stored public key.
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        decode_public_key(&self.public_key)
    }
}

/// Encode a verifying key as base64.
pub fn encode_public_key(key: &VerifyingKey) -> String {
    base64::Engine::encode(&base64::engine::general_purpose::STANDARD, key.to_bytes())
}

/// Decode a base64 verifying key.
pub fn decode_public_key(public_key: &str) -> Result<VerifyingKey> {
    let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, public_key)
        .map_err(|e| GatewayError::InvalidKey(format!("invalid base64 public key: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| GatewayError::InvalidKey("public key must be 32 bytes".into()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| GatewayError::InvalidKey(format!("invalid verifying key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_and_unlock() {
        let kdf = KdfParams::insecure_fast();
        let pair = StoredKeyPair::derive("seed one", &kdf).unwrap();
        let signing_key = pair.unlock("seed one").unwrap();
        assert_eq!(signing_key.verifying_key(), pair.verifying_key().unwrap());
    }

    #[test]
    fn test_unlock_wrong_passphrase() {
        let kdf = KdfParams::insecure_fast();
        let pair = StoredKeyPair::derive("seed one", &kdf).unwrap();
        assert!(matches!(
            pair.unlock("seed two"),
            Err(GatewayError::Decryption(_))
        ));
    }

    #[test]
    fn test_same_seed_same_public_key() {
        let kdf = KdfParams::insecure_fast();
        let a = StoredKeyPair::derive("stable seed", &kdf).unwrap();
        let b = StoredKeyPair::derive("stable seed", &kdf).unwrap();
        assert_eq!(a.public_key, b.public_key);
        // Sealing uses a fresh salt and nonce each time.
        assert_ne!(a.private_key, b.private_key);
    }

    #[test]
    fn test_decode_public_key_rejects_garbage() {
        assert!(matches!(
            decode_public_key("not base64!"),
            Err(GatewayError::InvalidKey(_))
        ));
        assert!(matches!(
            decode_public_key("AAAA"),
            Err(GatewayError::InvalidKey(_))
        ));
    }
}
