//! Persistence backends.
//!
//! Both backends implement the same repository contracts:
//! [`AccessRuleStore`](crate::access::AccessRuleStore),
//! [`AttributeRepository`](crate::attributes::AttributeRepository) and
//! [`VerificationRepository`](crate::verification::VerificationRepository).
//! The file backend additionally implements
//! [`IdentityStore`](crate::identity::IdentityStore).
//!
//! # Modules
//!
//! - [`memory`]: maps behind a lock, lost on drop.
//! - [`file`]: one versioned JSON document per user and concern.

pub mod file;
pub mod memory;

pub use file::FileBackend;
pub use memory::MemoryBackend;
