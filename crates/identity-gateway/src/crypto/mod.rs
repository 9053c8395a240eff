//! Cryptographic primitives for the gateway.
//!
//! This module provides:
//! - Ed25519 signing and verification
//! - Seed-phrase key derivation (Argon2id + HKDF-SHA256)
//! - ChaCha20-Poly1305 sealing of private keys under a passphrase
//! - Cryptographically secure random identifiers

pub mod derivation;
pub mod encryption;
pub mod keys;
pub mod random;
pub mod signing;

pub use encryption::{EncryptedSecret, KdfParams};
pub use keys::{decode_public_key, encode_public_key, StoredKeyPair};
