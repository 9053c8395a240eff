//! Directory-of-JSON-files backend.
//!
//! ```text
//! {root}/
//! ├── rules/{user}.json          : access rules and consumed-token tombstones
//! ├── attributes/{user}.json     : type → id → canonical value
//! ├── verifications/{user}.json  : type → id → records
//! └── identities/{user}.json     : identity record and seed fingerprint
//! ```
//!
//! `{user}` is the hex-encoded user ID, so no user ID can escape its
//! directory. Every document is wrapped as `{ "version": 1, ... }`.
//!
//! Each document is rewritten whole through a temporary file and a rename.
//! A backend-wide mutex serializes read-modify-write cycles within the
//! process; sharing one data directory between processes is not supported.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::access::{AccessRule, AccessRuleStore, RuleId, TokenRedemption};
use crate::attributes::{AttributeKey, AttributeRepository, StoredAttribute};
use crate::crypto::StoredKeyPair;
use crate::error::{GatewayError, Result};
use crate::identity::{seed_fingerprint, IdentityRecord, IdentityStore};
use crate::verification::{NewVerification, Verification, VerificationId, VerificationRepository};

const FILE_VERSION: u32 = 1;

const RULES_DIR: &str = "rules";
const ATTRIBUTES_DIR: &str = "attributes";
const VERIFICATIONS_DIR: &str = "verifications";
const IDENTITIES_DIR: &str = "identities";

// ── On-disk structures ────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct Versioned<T> {
    version: u32,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RulesDoc {
    rules: Vec<AccessRule>,
    #[serde(default)]
    redemptions: Vec<TokenRedemption>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AttributesDoc {
    attributes: BTreeMap<String, BTreeMap<String, StoredAttribute>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct VerificationsDoc {
    verifications: BTreeMap<String, BTreeMap<String, Vec<Verification>>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityDoc {
    identity: IdentityRecord,
    seed_fingerprint: String,
}

// ── FileBackend ───────────────────────────────────────────────────────────────

pub struct FileBackend {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileBackend {
    /// Open (creating if needed) a backend rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Io` if a directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [RULES_DIR, ATTRIBUTES_DIR, VERIFICATIONS_DIR, IDENTITIES_DIR] {
            std::fs::create_dir_all(root.join(dir))?;
        }
        log::debug!("file backend at {}", root.display());
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn user_path(&self, dir: &str, user_id: &str) -> PathBuf {
        self.root
            .join(dir)
            .join(format!("{}.json", hex::encode(user_id.as_bytes())))
    }

    /// Apply `f` to one document and write it back if it reports a change.
    fn modify<T, R>(&self, path: &Path, f: impl FnOnce(&mut T) -> (R, bool)) -> Result<R>
    where
        T: Serialize + DeserializeOwned + Default,
    {
        let _guard = self.lock();
        let mut doc: T = read_doc(path)?.unwrap_or_default();
        let (result, changed) = f(&mut doc);
        if changed {
            write_doc(path, &doc)?;
        }
        Ok(result)
    }

    fn identity_docs(&self) -> Result<Vec<IdentityDoc>> {
        let mut docs = Vec::new();
        for entry in std::fs::read_dir(self.root.join(IDENTITIES_DIR))? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(doc) = read_doc::<IdentityDoc>(&path)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }
}

fn read_doc<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let file: Versioned<T> = serde_json::from_str(&text)
        .map_err(|e| GatewayError::InvalidFileFormat(format!("{}: {e}", path.display())))?;
    if file.version != FILE_VERSION {
        return Err(GatewayError::InvalidFileFormat(format!(
            "{}: unsupported version {}",
            path.display(),
            file.version
        )));
    }
    Ok(Some(file.body))
}

fn write_doc<T: Serialize>(path: &Path, body: &T) -> Result<()> {
    let file = Versioned {
        version: FILE_VERSION,
        body,
    };
    let json = serde_json::to_string_pretty(&file)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ── Access rules ──────────────────────────────────────────────────────────────

impl AccessRuleStore for FileBackend {
    fn insert_rule(&self, user_id: &str, rule: AccessRule) -> Result<()> {
        self.modify(&self.user_path(RULES_DIR, user_id), |doc: &mut RulesDoc| {
            doc.rules.push(rule);
            ((), true)
        })
    }

    fn rules(&self, user_id: &str) -> Result<Vec<AccessRule>> {
        let doc: Option<RulesDoc> = read_doc(&self.user_path(RULES_DIR, user_id))?;
        Ok(doc.map(|d| d.rules).unwrap_or_default())
    }

    fn update_rule(&self, user_id: &str, rule: &AccessRule) -> Result<bool> {
        self.modify(&self.user_path(RULES_DIR, user_id), |doc: &mut RulesDoc| {
            match doc.rules.iter_mut().find(|r| r.id == rule.id) {
                Some(existing) => {
                    *existing = rule.clone();
                    (true, true)
                }
                None => (false, false),
            }
        })
    }

    fn remove_rule(&self, user_id: &str, id: &RuleId) -> Result<bool> {
        self.modify(&self.user_path(RULES_DIR, user_id), |doc: &mut RulesDoc| {
            let before = doc.rules.len();
            doc.rules.retain(|r| &r.id != id);
            let removed = doc.rules.len() != before;
            (removed, removed)
        })
    }

    fn record_redemption(&self, user_id: &str, redemption: TokenRedemption) -> Result<bool> {
        self.modify(&self.user_path(RULES_DIR, user_id), |doc: &mut RulesDoc| {
            if doc.redemptions.iter().any(|r| r.rule_id == redemption.rule_id) {
                return (false, false);
            }
            doc.redemptions.push(redemption);
            (true, true)
        })
    }

    fn redemptions(&self, user_id: &str) -> Result<Vec<TokenRedemption>> {
        let doc: Option<RulesDoc> = read_doc(&self.user_path(RULES_DIR, user_id))?;
        Ok(doc.map(|d| d.redemptions).unwrap_or_default())
    }

    fn remove_redemption(&self, user_id: &str, rule_id: &RuleId) -> Result<bool> {
        self.modify(&self.user_path(RULES_DIR, user_id), |doc: &mut RulesDoc| {
            let before = doc.redemptions.len();
            doc.redemptions.retain(|r| &r.rule_id != rule_id);
            let removed = doc.redemptions.len() != before;
            (removed, removed)
        })
    }
}

// ── Attributes ────────────────────────────────────────────────────────────────

impl AttributeRepository for FileBackend {
    fn put_attribute(&self, key: &AttributeKey, attribute: StoredAttribute) -> Result<bool> {
        self.modify(
            &self.user_path(ATTRIBUTES_DIR, &key.user_id),
            |doc: &mut AttributesDoc| {
                let replaced = doc
                    .attributes
                    .entry(key.attr_type.clone())
                    .or_default()
                    .insert(key.id.clone(), attribute)
                    .is_some();
                (replaced, true)
            },
        )
    }

    fn get_attribute(&self, key: &AttributeKey) -> Result<Option<StoredAttribute>> {
        let doc: Option<AttributesDoc> = read_doc(&self.user_path(ATTRIBUTES_DIR, &key.user_id))?;
        Ok(doc.and_then(|mut d| {
            d.attributes
                .get_mut(&key.attr_type)
                .and_then(|ids| ids.remove(&key.id))
        }))
    }

    fn remove_attribute(&self, key: &AttributeKey) -> Result<bool> {
        self.modify(
            &self.user_path(ATTRIBUTES_DIR, &key.user_id),
            |doc: &mut AttributesDoc| {
                let Some(ids) = doc.attributes.get_mut(&key.attr_type) else {
                    return (false, false);
                };
                let removed = ids.remove(&key.id).is_some();
                if ids.is_empty() {
                    doc.attributes.remove(&key.attr_type);
                }
                (removed, removed)
            },
        )
    }

    fn attribute_types(&self, user_id: &str) -> Result<Vec<String>> {
        let doc: Option<AttributesDoc> = read_doc(&self.user_path(ATTRIBUTES_DIR, user_id))?;
        Ok(doc
            .map(|d| d.attributes.into_keys().collect())
            .unwrap_or_default())
    }

    fn attribute_ids(&self, user_id: &str, attr_type: &str) -> Result<Vec<String>> {
        let doc: Option<AttributesDoc> = read_doc(&self.user_path(ATTRIBUTES_DIR, user_id))?;
        Ok(doc
            .and_then(|mut d| d.attributes.remove(attr_type))
            .map(|ids| ids.into_keys().collect())
            .unwrap_or_default())
    }
}

// ── Verifications ─────────────────────────────────────────────────────────────

impl VerificationRepository for FileBackend {
    fn append_verification(
        &self,
        key: &AttributeKey,
        verification: NewVerification,
    ) -> Result<VerificationId> {
        self.modify(
            &self.user_path(VERIFICATIONS_DIR, &key.user_id),
            |doc: &mut VerificationsDoc| {
                let records = doc
                    .verifications
                    .entry(key.attr_type.clone())
                    .or_default()
                    .entry(key.id.clone())
                    .or_default();
                let id = VerificationId(records.last().map_or(1, |v| v.id.0 + 1));
                records.push(verification.with_id(id));
                (id, true)
            },
        )
    }

    fn verifications(&self, key: &AttributeKey) -> Result<Vec<Verification>> {
        let doc: Option<VerificationsDoc> =
            read_doc(&self.user_path(VERIFICATIONS_DIR, &key.user_id))?;
        Ok(doc
            .and_then(|mut d| {
                d.verifications
                    .get_mut(&key.attr_type)
                    .and_then(|ids| ids.remove(&key.id))
            })
            .unwrap_or_default())
    }
}

// ── Identities ────────────────────────────────────────────────────────────────

impl IdentityStore for FileBackend {
    fn store_identity(&self, record: IdentityRecord, seed_phrase: &str) -> Result<()> {
        let fingerprint = seed_fingerprint(seed_phrase);
        let _guard = self.lock();

        for doc in self.identity_docs()? {
            if doc.identity.user_name == record.user_name {
                return Err(GatewayError::AlreadyExists(format!(
                    "user name taken: {}",
                    record.user_name
                )));
            }
            if doc.seed_fingerprint == fingerprint {
                return Err(GatewayError::AlreadyExists(
                    "seed phrase already in use".into(),
                ));
            }
        }

        let path = self.user_path(IDENTITIES_DIR, &record.user_id);
        write_doc(
            &path,
            &IdentityDoc {
                identity: record,
                seed_fingerprint: fingerprint,
            },
        )
    }

    fn identity_by_user_name(&self, user_name: &str) -> Result<Option<IdentityRecord>> {
        Ok(self
            .identity_docs()?
            .into_iter()
            .find(|d| d.identity.user_name == user_name)
            .map(|d| d.identity))
    }

    fn identity_by_user_id(&self, user_id: &str) -> Result<Option<IdentityRecord>> {
        let doc: Option<IdentityDoc> = read_doc(&self.user_path(IDENTITIES_DIR, user_id))?;
        Ok(doc.map(|d| d.identity))
    }

    fn key_pair_by_seed_phrase(&self, seed_phrase: &str) -> Result<Option<StoredKeyPair>> {
        let fingerprint = seed_fingerprint(seed_phrase);
        Ok(self
            .identity_docs()?
            .into_iter()
            .find(|d| d.seed_fingerprint == fingerprint)
            .map(|d| d.identity.key_pair))
    }

    fn link_identity(&self, user_id: &str, kind: &str, identifier: &str) -> Result<()> {
        let path = self.user_path(IDENTITIES_DIR, user_id);
        let _guard = self.lock();
        let mut doc: IdentityDoc = read_doc(&path)?
            .ok_or_else(|| GatewayError::NotFound(format!("identity not found: {user_id}")))?;
        doc.identity
            .linked_identities
            .insert(kind.to_string(), identifier.to_string());
        write_doc(&path, &doc)
    }
}
