//! In-memory backend.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::access::{AccessRule, AccessRuleStore, RuleId, TokenRedemption};
use crate::attributes::{AttributeKey, AttributeRepository, StoredAttribute};
use crate::error::Result;
use crate::verification::{NewVerification, Verification, VerificationId, VerificationRepository};

#[derive(Default)]
struct State {
    rules: HashMap<String, Vec<AccessRule>>,
    redemptions: HashMap<String, Vec<TokenRedemption>>,
    attributes: BTreeMap<AttributeKey, StoredAttribute>,
    verifications: HashMap<AttributeKey, Vec<Verification>>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AccessRuleStore for MemoryBackend {
    fn insert_rule(&self, user_id: &str, rule: AccessRule) -> Result<()> {
        self.write()
            .rules
            .entry(user_id.to_string())
            .or_default()
            .push(rule);
        Ok(())
    }

    fn rules(&self, user_id: &str) -> Result<Vec<AccessRule>> {
        Ok(self.read().rules.get(user_id).cloned().unwrap_or_default())
    }

    fn update_rule(&self, user_id: &str, rule: &AccessRule) -> Result<bool> {
        let mut state = self.write();
        let existing = state
            .rules
            .get_mut(user_id)
            .and_then(|rules| rules.iter_mut().find(|r| r.id == rule.id));
        Ok(match existing {
            Some(existing) => {
                *existing = rule.clone();
                true
            }
            None => false,
        })
    }

    fn remove_rule(&self, user_id: &str, id: &RuleId) -> Result<bool> {
        let mut state = self.write();
        let Some(rules) = state.rules.get_mut(user_id) else {
            return Ok(false);
        };
        let before = rules.len();
        rules.retain(|r| &r.id != id);
        Ok(rules.len() != before)
    }

    fn record_redemption(&self, user_id: &str, redemption: TokenRedemption) -> Result<bool> {
        let mut state = self.write();
        let recorded = state.redemptions.entry(user_id.to_string()).or_default();
        if recorded.iter().any(|r| r.rule_id == redemption.rule_id) {
            return Ok(false);
        }
        recorded.push(redemption);
        Ok(true)
    }

    fn redemptions(&self, user_id: &str) -> Result<Vec<TokenRedemption>> {
        Ok(self.read().redemptions.get(user_id).cloned().unwrap_or_default())
    }

    fn remove_redemption(&self, user_id: &str, rule_id: &RuleId) -> Result<bool> {
        let mut state = self.write();
        let Some(recorded) = state.redemptions.get_mut(user_id) else {
            return Ok(false);
        };
        let before = recorded.len();
        recorded.retain(|r| &r.rule_id != rule_id);
        Ok(recorded.len() != before)
    }
}

impl AttributeRepository for MemoryBackend {
    fn put_attribute(&self, key: &AttributeKey, attribute: StoredAttribute) -> Result<bool> {
        Ok(self
            .write()
            .attributes
            .insert(key.clone(), attribute)
            .is_some())
    }

    fn get_attribute(&self, key: &AttributeKey) -> Result<Option<StoredAttribute>> {
        Ok(self.read().attributes.get(key).cloned())
    }

    fn remove_attribute(&self, key: &AttributeKey) -> Result<bool> {
        Ok(self.write().attributes.remove(key).is_some())
    }

    fn attribute_types(&self, user_id: &str) -> Result<Vec<String>> {
        let types: BTreeSet<String> = self
            .read()
            .attributes
            .keys()
            .filter(|k| k.user_id == user_id)
            .map(|k| k.attr_type.clone())
            .collect();
        Ok(types.into_iter().collect())
    }

    fn attribute_ids(&self, user_id: &str, attr_type: &str) -> Result<Vec<String>> {
        // Keys are ordered by (user, type, id), so IDs come out sorted.
        Ok(self
            .read()
            .attributes
            .keys()
            .filter(|k| k.user_id == user_id && k.attr_type == attr_type)
            .map(|k| k.id.clone())
            .collect())
    }
}

impl VerificationRepository for MemoryBackend {
    fn append_verification(
        &self,
        key: &AttributeKey,
        verification: NewVerification,
    ) -> Result<VerificationId> {
        let mut state = self.write();
        let records = state.verifications.entry(key.clone()).or_default();
        let id = VerificationId(records.last().map_or(1, |v| v.id.0 + 1));
        records.push(verification.with_id(id));
        Ok(id)
    }

    fn verifications(&self, key: &AttributeKey) -> Result<Vec<Verification>> {
        Ok(self
            .read()
            .verifications
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}
