//! Identity Gateway: personal identity attributes with pattern-based access
//! rights and cross-identity attribute verification.
//!
//! Each user owns typed attributes (email, phone, wallet address, ...).
//! Other identities read or write them under time-bounded, optionally
//! single-use access rules, and attest to their values with Ed25519
//! signatures that are re-validated on every check.

pub mod access;
pub mod attributes;
pub mod config;
pub mod crypto;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod notifier;
pub mod pattern;
pub mod protocol;
pub mod signer;
pub mod storage;
pub mod time;
pub mod verification;

// Re-export primary types
pub use error::{GatewayError, Result};

pub use access::{AccessRightsEngine, AccessRule, AccessRuleStore, Permissions, RuleId, RuleSummary};
pub use attributes::{AttributeEvent, AttributeKey, AttributeStore, AttributeValue, DataType};
pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayBuilder, LocalTransport};
pub use identity::{
    IdentityCreator, IdentityRecord, IdentityStore, IdentityStoreKeyResolver, LinkedIdentities,
    MemoryIdentityStore,
};
pub use notifier::{AttributeNotification, AttributeNotifier};
pub use protocol::{
    AttributeChecker, AttributeVerifier, CheckResult, GatewayTransport, RemoteAttribute,
    SourceAuthentication, VerifyRequest,
};
pub use signer::{DataSigner, SignatureMode, SignedData};
pub use storage::{FileBackend, MemoryBackend};
pub use time::{Clock, ManualClock, SystemClock};
pub use verification::{
    KeyResolvers, LinkedKeyResolver, PublicKeyResolver, StaticKeyResolver, Verification,
    VerificationId, VerificationStore, VerificationStored,
};
