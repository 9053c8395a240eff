//! Access rights: per-owner, pattern-based, optionally time-bounded or
//! single-use authorization rules.
//!
//! The access module provides:
//! - `AccessRule` and the `Permissions` it grants
//! - The `AccessRuleStore` persistence contract
//! - `AccessRightsEngine` implementing grant / revoke / check / list

pub mod engine;
pub mod rule;

pub use engine::AccessRightsEngine;
pub use rule::{AccessRule, Permissions, RuleId, RuleSummary, TokenRedemption};

use crate::error::Result;

/// Persistence contract for access rules, scoped by owner `user_id`.
///
/// Unknown owners have no rules; implementations must not error for them.
pub trait AccessRuleStore: Send + Sync {
    /// Append a rule to the owner's set.
    fn insert_rule(&self, user_id: &str, rule: AccessRule) -> Result<()>;

    /// All rules of an owner, in insertion order.
    fn rules(&self, user_id: &str) -> Result<Vec<AccessRule>>;

    /// Replace the rule with the same ID. Returns `false` if it no longer exists.
    fn update_rule(&self, user_id: &str, rule: &AccessRule) -> Result<bool>;

    /// Delete a rule. Returns `false` if it was already gone.
    fn remove_rule(&self, user_id: &str, id: &RuleId) -> Result<bool>;

    /// Record that a one-time rule was consumed. Returns `false` if a
    /// redemption of the same rule is already recorded.
    fn record_redemption(&self, user_id: &str, redemption: TokenRedemption) -> Result<bool>;

    /// Tombstones of the owner's consumed one-time rules.
    fn redemptions(&self, user_id: &str) -> Result<Vec<TokenRedemption>>;

    /// Returns `false` if no redemption of `rule_id` was recorded.
    fn remove_redemption(&self, user_id: &str, rule_id: &RuleId) -> Result<bool>;
}
