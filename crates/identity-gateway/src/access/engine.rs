//! The access rights engine.
//!
//! Decisions are the OR of every applicable rule: if any rule selected for
//! a request grants read, the request may read, regardless of other rules.
//!
//! A one-time token is redeemed only by the check that actually selects the
//! rule carrying it, and only that rule is consumed. The consumed rule
//! leaves a tombstone keyed by its ID. Presenting the token again for the
//! same requester and path fails with `TokenAlreadyConsumed` unless some
//! other rule still grants access. A new rule granted with the same token
//! is redeemable once more.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};

use crate::error::{GatewayError, Result};
use crate::pattern::normalize_identity;
use crate::time::{Clock, SystemClock};

use super::rule::{AccessRule, Permissions, RuleId, RuleSummary, TokenRedemption};
use super::AccessRuleStore;

/// Owner-scoped authorization engine over an [`AccessRuleStore`].
///
/// Every operation for a given owner runs under that owner's lock, so a
/// check and a concurrent grant or revoke for the same owner never
/// interleave, and a token cannot be redeemed twice. Locks exist only while
/// some operation on the owner is in flight.
pub struct AccessRightsEngine {
    store: Arc<dyn AccessRuleStore>,
    clock: Arc<dyn Clock>,
    owner_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccessRightsEngine {
    /// Create an engine reading wall-clock time.
    pub fn new(store: Arc<dyn AccessRuleStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Create an engine with an injected clock.
    pub fn with_clock(store: Arc<dyn AccessRuleStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current engine time in microseconds.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Append a rule to `user_id`'s set. Overlapping rules are kept side by side.
    pub fn grant(&self, user_id: &str, rule: AccessRule) -> Result<RuleId> {
        self.with_owner_lock(user_id, || {
            let id = rule.id.clone();
            log::info!(
                "grant owner={user_id} identity={} path={} read={} write={} one_time={}",
                rule.identity_pattern,
                rule.path_pattern,
                rule.read,
                rule.write,
                rule.one_time_token.is_some()
            );
            self.store.insert_rule(user_id, rule)?;
            Ok(id)
        })
    }

    /// Revoke rules whose patterns exactly equal the given pair.
    ///
    /// With both flags false the rules are deleted; otherwise their flags are
    /// overwritten in place. Returns the number of rules affected.
    pub fn revoke(
        &self,
        user_id: &str,
        identity_pattern: &str,
        path_pattern: &str,
        read: bool,
        write: bool,
    ) -> Result<usize> {
        self.with_owner_lock(user_id, || {
            let mut affected = 0;
            for mut rule in self.store.rules(user_id)? {
                if !rule.has_patterns(identity_pattern, path_pattern) {
                    continue;
                }
                let changed = if !read && !write {
                    self.store.remove_rule(user_id, &rule.id)?
                } else {
                    rule.read = read;
                    rule.write = write;
                    self.store.update_rule(user_id, &rule)?
                };
                if changed {
                    affected += 1;
                }
            }
            if !read && !write {
                self.forget_redemptions(user_id, identity_pattern, path_pattern)?;
            }

            log::info!(
                "revoke owner={user_id} identity={identity_pattern} path={path_pattern} \
                 read={read} write={write} affected={affected}"
            );
            Ok(affected)
        })
    }

    /// Decide what `requester` may do on `path` of `user_id`'s attributes.
    pub fn check(
        &self,
        user_id: &str,
        requester: &str,
        path: &str,
        one_time_token: Option<&str>,
    ) -> Result<Permissions> {
        self.with_owner_lock(user_id, || {
            let now = self.clock.now();
            let rules = self.store.rules(user_id)?;
            let selected: Vec<&AccessRule> = rules
                .iter()
                .filter(|rule| rule.applies_to(requester, path, one_time_token, now))
                .collect();

            let permissions = selected
                .iter()
                .fold(Permissions::NONE, |acc, rule| acc.union(rule.permissions()));

            if let Some(token) = one_time_token {
                let digest = token_digest(token);
                let consumed: Vec<&AccessRule> = selected
                    .iter()
                    .copied()
                    .filter(|rule| rule.one_time_token.is_some())
                    .collect();
                if consumed.is_empty() {
                    if permissions.is_none()
                        && self.is_replay(user_id, requester, path, &digest, now)?
                    {
                        log::warn!("check owner={user_id} requester={requester}: token replayed");
                        return Err(GatewayError::TokenAlreadyConsumed);
                    }
                } else {
                    self.consume(user_id, requester, &consumed, &digest)?;
                }
            }

            log::debug!(
                "check owner={user_id} requester={requester} path={path} -> read={} write={}",
                permissions.read,
                permissions.write
            );
            Ok(permissions)
        })
    }

    /// Non-expired rules, optionally only those whose path pattern matches `path_filter`.
    pub fn list(&self, user_id: &str, path_filter: Option<&str>) -> Result<Vec<RuleSummary>> {
        let now = self.clock.now();
        Ok(self
            .store
            .rules(user_id)?
            .iter()
            .filter(|rule| !rule.is_expired(now))
            .filter(|rule| {
                path_filter.map_or(true, |filter| {
                    crate::pattern::matches(&rule.path_pattern, filter)
                })
            })
            .map(AccessRule::summary)
            .collect())
    }

    /// Delete rules whose expiry has passed, along with tombstones of
    /// consumed rules that would have expired by now. Returns how many rules
    /// were removed.
    pub fn purge_expired(&self, user_id: &str) -> Result<usize> {
        self.with_owner_lock(user_id, || {
            let now = self.clock.now();
            let mut removed = 0;
            for rule in self.store.rules(user_id)? {
                if rule.is_expired(now) && self.store.remove_rule(user_id, &rule.id)? {
                    removed += 1;
                }
            }
            for redemption in self.store.redemptions(user_id)? {
                if redemption.is_expired(now) {
                    self.store.remove_redemption(user_id, &redemption.rule_id)?;
                }
            }
            if removed > 0 {
                log::info!("purged {removed} expired rule(s) for owner={user_id}");
            }
            Ok(removed)
        })
    }

    fn is_replay(
        &self,
        user_id: &str,
        requester: &str,
        path: &str,
        digest: &str,
        now: u64,
    ) -> Result<bool> {
        Ok(self
            .store
            .redemptions(user_id)?
            .iter()
            .any(|r| r.covers(requester, path, digest, now)))
    }

    /// A full revoke of a pattern pair also clears tombstones left by
    /// consumed rules with that pair.
    fn forget_redemptions(
        &self,
        user_id: &str,
        identity_pattern: &str,
        path_pattern: &str,
    ) -> Result<()> {
        for redemption in self.store.redemptions(user_id)? {
            if normalize_identity(&redemption.identity_pattern) == normalize_identity(identity_pattern)
                && redemption.path_pattern == path_pattern
            {
                self.store.remove_redemption(user_id, &redemption.rule_id)?;
            }
        }
        Ok(())
    }

    /// Tombstone then delete each consumed rule. The tombstone write is the
    /// point of no return: whoever records it first owns the redemption.
    fn consume(
        &self,
        user_id: &str,
        requester: &str,
        consumed: &[&AccessRule],
        digest: &str,
    ) -> Result<()> {
        for rule in consumed {
            let won = self
                .store
                .record_redemption(user_id, TokenRedemption::of(rule, digest))?;
            if !won || !self.store.remove_rule(user_id, &rule.id)? {
                log::warn!("check owner={user_id} requester={requester}: token raced");
                return Err(GatewayError::TokenAlreadyConsumed);
            }
            log::info!("one-time rule {} of owner={user_id} consumed", rule.id);
        }
        Ok(())
    }

    fn with_owner_lock<R>(&self, user_id: &str, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let lock = self.owner_lock(user_id);
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release_owner_lock(user_id, &lock);
        result
    }

    fn owner_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(user_id.to_string()).or_default())
    }

    /// Drop the owner's entry once nobody else holds or waits on it.
    fn release_owner_lock(&self, user_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self
            .owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller.
        if Arc::strong_count(lock) == 2 {
            locks.remove(user_id);
        }
    }

    #[cfg(test)]
    fn tracked_owners(&self) -> usize {
        self.owner_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Tokens are only persisted as digests.
fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
