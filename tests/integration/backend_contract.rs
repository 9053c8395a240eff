//! Integration test: both storage backends honour the same contracts.
//!
//! Every check runs once against `MemoryBackend` and once against a
//! `FileBackend` in a temporary directory.

use std::sync::Arc;

use identity_gateway::access::{AccessRule, AccessRuleStore, Permissions, RuleId, TokenRedemption};
use identity_gateway::attributes::{AttributeKey, AttributeRepository, AttributeValue, DataType};
use identity_gateway::verification::{NewVerification, VerificationId, VerificationRepository};
use identity_gateway::{AccessRightsEngine, FileBackend, MemoryBackend};
use serde_json::json;

trait Backend: AccessRuleStore + AttributeRepository + VerificationRepository {}
impl<T: AccessRuleStore + AttributeRepository + VerificationRepository> Backend for T {}

/// Run `check` against each backend, labelled for assertion messages.
fn each_backend(check: impl Fn(&str, Arc<dyn Backend>)) {
    check("memory", Arc::new(MemoryBackend::new()));

    let dir = tempfile::tempdir().expect("tempdir");
    let file = FileBackend::open(dir.path()).expect("open file backend");
    check("file", Arc::new(file));
}

fn new_verification(verifier: &str) -> NewVerification {
    NewVerification {
        verifier_identity: verifier.to_string(),
        signature: "c2lnbmF0dXJl".to_string(),
        linked_identities: Default::default(),
        created_at: 1_700_000_000_000_000,
    }
}

#[test]
fn rules_are_scoped_by_owner() {
    each_backend(|name, backend| {
        let rule = AccessRule::new("https://x.com/bob", "/identity/*", Permissions::READ);
        backend.insert_rule("alice", rule.clone()).unwrap();

        assert_eq!(backend.rules("alice").unwrap(), vec![rule.clone()], "{name}");
        assert!(backend.rules("carol").unwrap().is_empty(), "{name}");

        assert!(backend.remove_rule("alice", &rule.id).unwrap(), "{name}");
        assert!(!backend.remove_rule("alice", &rule.id).unwrap(), "{name}");
        assert!(!backend
            .remove_rule("alice", &RuleId("rule_missing".into()))
            .unwrap());
    });
}

#[test]
fn update_rule_replaces_in_place() {
    each_backend(|name, backend| {
        let first = AccessRule::new("https://x.com/bob", "/identity/a", Permissions::READ);
        let second = AccessRule::new("https://x.com/bob", "/identity/b", Permissions::READ);
        backend.insert_rule("alice", first.clone()).unwrap();
        backend.insert_rule("alice", second.clone()).unwrap();

        let mut widened = first.clone();
        widened.write = true;
        assert!(backend.update_rule("alice", &widened).unwrap(), "{name}");

        let rules = backend.rules("alice").unwrap();
        assert_eq!(rules, vec![widened.clone(), second], "{name}: order kept");

        backend.remove_rule("alice", &first.id).unwrap();
        assert!(!backend.update_rule("alice", &widened).unwrap(), "{name}");
    });
}

#[test]
fn redemptions_are_recorded_once_per_rule() {
    each_backend(|name, backend| {
        let first = AccessRule::new("https://x.com/bob", "/identity/*", Permissions::READ).one_time("t");
        let second = AccessRule::new("https://x.com/bob", "/identity/*", Permissions::READ).one_time("t");

        assert!(backend.record_redemption("alice", TokenRedemption::of(&first, "abc")).unwrap(), "{name}");
        assert!(!backend.record_redemption("alice", TokenRedemption::of(&first, "abc")).unwrap(), "{name}");
        // Same token, different rule.
        assert!(backend.record_redemption("alice", TokenRedemption::of(&second, "abc")).unwrap(), "{name}");
        assert_eq!(backend.redemptions("alice").unwrap().len(), 2, "{name}");
        assert!(backend.redemptions("bob").unwrap().is_empty(), "{name}");

        assert!(backend.remove_redemption("alice", &first.id).unwrap(), "{name}");
        assert!(!backend.remove_redemption("alice", &first.id).unwrap(), "{name}");
        assert_eq!(backend.redemptions("alice").unwrap()[0].rule_id, second.id, "{name}");
    });
}

#[test]
fn attributes_round_trip_and_list_sorted() {
    each_backend(|name, backend| {
        let phone = AttributeKey::new("alice", "phone", "work");
        let email_b = AttributeKey::new("alice", "email", "b");
        let email_a = AttributeKey::new("alice", "email", "a");
        let value = AttributeValue::Json(json!({"b": 1, "a": [true, null]}));

        assert!(!backend.put_attribute(&phone, value.to_stored()).unwrap(), "{name}");
        backend
            .put_attribute(&email_b, AttributeValue::String("b@y.com".into()).to_stored())
            .unwrap();
        backend
            .put_attribute(&email_a, AttributeValue::String("a@y.com".into()).to_stored())
            .unwrap();

        let stored = backend.get_attribute(&phone).unwrap().unwrap();
        assert_eq!(stored.data_type, DataType::Json, "{name}");
        assert_eq!(stored.value, r#"{"a":[true,null],"b":1}"#, "{name}");

        assert_eq!(backend.attribute_types("alice").unwrap(), vec!["email", "phone"]);
        assert_eq!(backend.attribute_ids("alice", "email").unwrap(), vec!["a", "b"]);
        assert!(backend.attribute_types("bob").unwrap().is_empty(), "{name}");
        assert!(backend.attribute_ids("alice", "passport").unwrap().is_empty());

        // Overwrite reports replacement
        assert!(backend
            .put_attribute(&email_a, AttributeValue::String("new@y.com".into()).to_stored())
            .unwrap());

        assert!(backend.remove_attribute(&phone).unwrap(), "{name}");
        assert!(!backend.remove_attribute(&phone).unwrap(), "{name}");
        assert_eq!(backend.attribute_types("alice").unwrap(), vec!["email"], "{name}");
    });
}

#[test]
fn verification_ids_are_per_attribute() {
    each_backend(|name, backend| {
        let email = AttributeKey::new("alice", "email", "primary");
        let phone = AttributeKey::new("alice", "phone", "work");

        let first = backend.append_verification(&email, new_verification("v1")).unwrap();
        let second = backend.append_verification(&email, new_verification("v2")).unwrap();
        let other = backend.append_verification(&phone, new_verification("v3")).unwrap();
        assert_eq!((first, second, other), (VerificationId(1), VerificationId(2), VerificationId(1)));

        let all = backend.verifications(&email).unwrap();
        let verifiers: Vec<_> = all.iter().map(|v| v.verifier_identity.as_str()).collect();
        assert_eq!(verifiers, vec!["v1", "v2"], "{name}");

        let found = backend.verification(&email, VerificationId(2)).unwrap().unwrap();
        assert_eq!(found.verifier_identity, "v2", "{name}");
        assert!(backend.verification(&email, VerificationId(9)).unwrap().is_none());
        assert!(backend
            .verifications(&AttributeKey::new("bob", "email", "primary"))
            .unwrap()
            .is_empty());
    });
}

#[test]
fn engine_behaves_the_same_on_both_backends() {
    let dir = tempfile::tempdir().unwrap();
    let stores: Vec<(&str, Arc<dyn AccessRuleStore>)> = vec![
        ("memory", Arc::new(MemoryBackend::new())),
        ("file", Arc::new(FileBackend::open(dir.path()).unwrap())),
    ];
    for (name, store) in stores {
        let engine = AccessRightsEngine::new(store);
        let bob = "https://x.com/bob";
        engine
            .grant("alice", AccessRule::new(bob, "/identity/email/*", Permissions::READ))
            .unwrap();
        engine
            .grant("alice", AccessRule::new("https://x.com/*", "/identity/email/*", Permissions::WRITE))
            .unwrap();

        assert_eq!(
            engine.check("alice", bob, "/identity/email/primary", None).unwrap(),
            Permissions::READ_WRITE,
            "{name}"
        );
        assert_eq!(engine.list("alice", None).unwrap().len(), 2, "{name}");
        assert_eq!(engine.revoke("alice", bob, "/identity/email/*", false, false).unwrap(), 1);
        assert_eq!(
            engine.check("alice", bob, "/identity/email/primary", None).unwrap(),
            Permissions::WRITE,
            "{name}"
        );
    }
}

#[test]
fn file_backend_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let key = AttributeKey::new("alice", "email", "primary");
    let rule = AccessRule::new("https://x.com/bob", "/identity/*", Permissions::READ_WRITE);
    let spent = AccessRule::new("https://x.com/bob", "/identity/passport/*", Permissions::READ).one_time("t");

    {
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.insert_rule("alice", rule.clone()).unwrap();
        backend
            .record_redemption("alice", TokenRedemption::of(&spent, "digest"))
            .unwrap();
        backend
            .put_attribute(&key, AttributeValue::String("x@y.com".into()).to_stored())
            .unwrap();
        backend.append_verification(&key, new_verification("v1")).unwrap();
    }

    let backend = FileBackend::open(dir.path()).unwrap();
    assert_eq!(backend.rules("alice").unwrap(), vec![rule]);
    assert_eq!(
        backend.redemptions("alice").unwrap(),
        vec![TokenRedemption::of(&spent, "digest")]
    );
    assert_eq!(backend.get_attribute(&key).unwrap().unwrap().value, "x@y.com");
    assert_eq!(
        backend.append_verification(&key, new_verification("v2")).unwrap(),
        VerificationId(2)
    );
}
