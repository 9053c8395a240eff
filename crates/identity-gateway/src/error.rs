//! Error types for the identity gateway.
//!
//! All errors are strongly typed and propagated without panicking.
//! Passphrases and private key material are never included in error messages.

/// Gateway error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Decryption failed: {0}")]
    Decryption(String),

    #[error("Key derivation failed: {0}")]
    DerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Attribute value mismatch for {attr_type}/{attr_id}")]
    AttributeValueMismatch { attr_type: String, attr_id: String },

    #[error("Remote gateway unreachable: {0}")]
    RemoteTransport(String),

    #[error("Public key unresolvable for {0}")]
    PublicKeyUnresolvable(String),

    #[error("One-time token already consumed")]
    TokenAlreadyConsumed,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for GatewayError {
    fn from(e: serde_json::Error) -> Self {
        GatewayError::SerializationError(e.to_string())
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, GatewayError>;
