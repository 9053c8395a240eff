//! Access rules: who may read or write which attribute paths, and until when.

use serde::{Deserialize, Serialize};

use crate::pattern::{identity_matches, matches, normalize_identity};

/// Unique identifier for a stored access rule.
///
/// Format: `rule_` + base58 of 16 random bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

impl RuleId {
    /// Generate a fresh random rule ID.
    pub fn generate() -> Self {
        Self(crate::crypto::random::random_id("rule_"))
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read/write flags, either granted by a rule or resulting from a check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
}

impl Permissions {
    pub const NONE: Self = Self {
        read: false,
        write: false,
    };
    pub const READ: Self = Self {
        read: true,
        write: false,
    };
    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };

    pub fn new(read: bool, write: bool) -> Self {
        Self { read, write }
    }

    /// Flag-wise OR.
    pub fn union(self, other: Self) -> Self {
        Self {
            read: self.read || other.read,
            write: self.write || other.write,
        }
    }

    pub fn is_none(&self) -> bool {
        !self.read && !self.write
    }
}

/// A grant of permissions from an owner to a set of identities over a set of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    pub id: RuleId,
    /// Glob over requester identity URLs.
    pub identity_pattern: String,
    /// Glob over attribute paths, e.g. `/identity/email/*`.
    pub path_pattern: String,
    pub read: bool,
    pub write: bool,
    /// Rule is ignored from this time on (microseconds since epoch).
    pub expires_at: Option<u64>,
    /// Rule only applies to a check presenting this token, and is consumed by it.
    pub one_time_token: Option<String>,
}

impl AccessRule {
    /// Create a permanent rule.
    pub fn new(
        identity_pattern: impl Into<String>,
        path_pattern: impl Into<String>,
        permissions: Permissions,
    ) -> Self {
        Self {
            id: RuleId::generate(),
            identity_pattern: identity_pattern.into(),
            path_pattern: path_pattern.into(),
            read: permissions.read,
            write: permissions.write,
            expires_at: None,
            one_time_token: None,
        }
    }

    /// Limit the rule to checks made before `micros`.
    pub fn expires_at(mut self, micros: u64) -> Self {
        self.expires_at = Some(micros);
        self
    }

    /// Make the rule single-use, redeemable with `token`.
    pub fn one_time(mut self, token: impl Into<String>) -> Self {
        self.one_time_token = Some(token.into());
        self
    }

    pub fn permissions(&self) -> Permissions {
        Permissions::new(self.read, self.write)
    }

    /// No expiry and no token: lives until revoked.
    pub fn is_permanent(&self) -> bool {
        self.expires_at.is_none() && self.one_time_token.is_none()
    }

    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }

    /// Whether this rule takes part in a check with the given inputs.
    pub fn applies_to(&self, requester: &str, path: &str, token: Option<&str>, now: u64) -> bool {
        identity_matches(requester, &self.identity_pattern)
            && match &self.one_time_token {
                None => true,
                Some(expected) => token == Some(expected.as_str()),
            }
            && !self.is_expired(now)
            && matches(path, &self.path_pattern)
    }

    /// Exact (non-glob) comparison used by revoke.
    pub fn has_patterns(&self, identity_pattern: &str, path_pattern: &str) -> bool {
        normalize_identity(&self.identity_pattern) == normalize_identity(identity_pattern)
            && self.path_pattern == path_pattern
    }

    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            identity: self.identity_pattern.clone(),
            pattern: self.path_pattern.clone(),
            read: self.read,
            write: self.write,
            expires_at: self.expires_at,
            one_time: self.one_time_token.is_some(),
        }
    }
}

/// Listing view of a rule. Never exposes the one-time token itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub identity: String,
    pub pattern: String,
    pub read: bool,
    pub write: bool,
    pub expires_at: Option<u64>,
    pub one_time: bool,
}

/// Tombstone of a consumed one-time rule.
///
/// Only the token digest is kept. A later check presenting the same token
/// for the same requester and path is reported as a replay, while a fresh
/// rule carrying that token stays redeemable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRedemption {
    pub rule_id: RuleId,
    /// Hex SHA-256 of the token.
    pub token_digest: String,
    pub identity_pattern: String,
    pub path_pattern: String,
    pub expires_at: Option<u64>,
}

impl TokenRedemption {
    pub fn of(rule: &AccessRule, token_digest: &str) -> Self {
        Self {
            rule_id: rule.id.clone(),
            token_digest: token_digest.to_string(),
            identity_pattern: rule.identity_pattern.clone(),
            path_pattern: rule.path_pattern.clone(),
            expires_at: rule.expires_at,
        }
    }

    /// Past the consumed rule's own expiry the tombstone is meaningless.
    pub fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry <= now)
    }

    /// Whether a check with these inputs would have selected the consumed rule.
    pub fn covers(&self, requester: &str, path: &str, token_digest: &str, now: u64) -> bool {
        self.token_digest == token_digest
            && !self.is_expired(now)
            && identity_matches(requester, &self.identity_pattern)
            && matches(path, &self.path_pattern)
    }
}
