//! Integration test: full end-to-end workflow.
//!
//! Tests the complete lifecycle on one gateway:
//! 1. Create identities
//! 2. Store attributes
//! 3. Grant, check and revoke access
//! 4. Verify an attribute and check the verification
//! 5. Edit the attribute and watch the verification lapse

use std::sync::Arc;

use identity_gateway::access::{AccessRule, Permissions};
use identity_gateway::crypto::KdfParams;
use identity_gateway::time::{Clock, ManualClock};
use identity_gateway::{
    AttributeKey, AttributeValue, GatewayBuilder, GatewayConfig, GatewayError, LocalTransport,
    RemoteAttribute, VerificationId, VerifyRequest,
};
use serde_json::json;
use tokio::sync::mpsc;

const BASE: &str = "https://identity.test.com";
const HOUR: u64 = 3_600_000_000;

fn config() -> GatewayConfig {
    GatewayConfig::new(BASE).with_kdf(KdfParams::insecure_fast())
}

#[test]
fn owner_grants_and_revokes_read() {
    let gateway = GatewayBuilder::in_memory(config()).build();
    let alice = gateway
        .identity_creator()
        .create_identity("alice", "alice seed")
        .expect("create alice");
    let a = alice.user_id.as_str();
    let b = gateway.identity_url("bob");

    // ── Step 1: Owner stores an attribute ──────────────────────────────
    gateway
        .attributes()
        .store_string_attribute(&AttributeKey::new(a, "email", "primary"), "x@y.com")
        .expect("store attribute");

    // ── Step 2: Grant read-only ───────────────────────────────────────
    gateway
        .access()
        .grant(a, AccessRule::new(&b, "/identity/email/primary", Permissions::READ))
        .expect("grant");
    let granted = gateway
        .access()
        .check(a, &b, "/identity/email/primary", None)
        .expect("check");
    assert_eq!(granted, Permissions::READ);

    // ── Step 3: Revoke entirely ───────────────────────────────────────
    let removed = gateway
        .access()
        .revoke(a, &b, "/identity/email/primary", false, false)
        .expect("revoke");
    assert_eq!(removed, 1);
    let after = gateway
        .access()
        .check(a, &b, "/identity/email/primary", None)
        .expect("check");
    assert_eq!(after, Permissions::NONE);
}

#[test]
fn expiry_and_one_time_tokens_follow_clock() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000_000));
    let gateway = GatewayBuilder::in_memory(config()).clock(clock.clone()).build();
    let b = "https://identity.test.com/bob";

    gateway
        .access()
        .grant(
            "alice",
            AccessRule::new(b, "/identity/passport/*", Permissions::READ)
                .expires_at(clock.now() + HOUR)
                .one_time("token-1"),
        )
        .expect("grant");

    // Too late: the rule has expired and is not redeemed.
    clock.advance(2 * HOUR);
    assert!(gateway
        .access()
        .check("alice", b, "/identity/passport/holland", Some("token-1"))
        .unwrap()
        .is_none());

    // Back in time it still works, exactly once.
    clock.set(clock.now() - 2 * HOUR);
    assert!(gateway
        .access()
        .check("alice", b, "/identity/passport/holland", Some("token-1"))
        .unwrap()
        .read);
    assert!(matches!(
        gateway
            .access()
            .check("alice", b, "/identity/passport/holland", Some("token-1")),
        Err(GatewayError::TokenAlreadyConsumed)
    ));
}

#[tokio::test]
async fn verify_and_check_round_trip() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let gateway = Arc::new(
        GatewayBuilder::in_memory(config())
            .verification_events(events_tx)
            .build(),
    );
    let creator = gateway.identity_creator();
    let alice = creator.create_identity("alice", "alice seed").unwrap();
    let bob = creator.create_identity("bob", "bob seed").unwrap();
    let carol = creator.create_identity("carol", "carol seed").unwrap();
    gateway
        .identities()
        .link_identity(&bob.user_id, "ethereum", "0xb0b")
        .unwrap();

    let address = json!({"street": "Main St", "city": "Paris", "zip": "75001"});
    let key = AttributeKey::new(&alice.user_id, "address", "home");
    gateway
        .attributes()
        .store_json_attribute(&key, address.clone())
        .unwrap();

    // Bob and Carol may read the address and add verifications.
    gateway
        .access()
        .grant(
            &alice.user_id,
            AccessRule::new(format!("{BASE}/*"), "/identity/address/home*", Permissions::READ_WRITE),
        )
        .unwrap();

    let transport = Arc::new(LocalTransport::new(gateway.clone()));
    let target = RemoteAttribute::new(gateway.identity_url("alice"), "address", "home");
    let verifier = gateway.verifier(transport.clone());

    // ── Bob verifies with keys in a different order ─────────────────────
    let request = VerifyRequest {
        source_identity: gateway.identity_url("bob"),
        source_user_id: bob.user_id.clone(),
        passphrase: "bob seed".into(),
        target: target.clone(),
        claimed_value: AttributeValue::Json(json!({"zip": "75001", "city": "Paris", "street": "Main St"})),
    };
    assert_eq!(verifier.verify_attribute(&request).await.unwrap(), VerificationId(1));

    // ── Carol claims a wrong value: nothing is written ─────────────────
    let wrong = VerifyRequest {
        source_identity: gateway.identity_url("carol"),
        source_user_id: carol.user_id.clone(),
        passphrase: "carol seed".into(),
        target: target.clone(),
        claimed_value: AttributeValue::Json(json!({"street": "Elm St", "city": "Paris", "zip": "75001"})),
    };
    assert!(matches!(
        verifier.verify_attribute(&wrong).await,
        Err(GatewayError::AttributeValueMismatch { .. })
    ));
    assert_eq!(gateway.verifications().get_verifications(&key).unwrap().len(), 1);

    let stored = events_rx.recv().await.unwrap();
    assert_eq!(stored.verification_id, VerificationId(1));
    assert_eq!(stored.verifier_identity, gateway.identity_url("bob"));
    assert!(events_rx.try_recv().is_err());

    let record = gateway
        .verifications()
        .get_verification(&key, VerificationId(1))
        .unwrap()
        .unwrap();
    assert_eq!(
        record.linked_identities.get("ethereum").map(String::as_str),
        Some("0xb0b")
    );

    // ── Alice checks against the stored value ─────────────────────────
    let checker = gateway.checker(transport.clone());
    let results = checker
        .check_attribute(
            &gateway.identity_url("alice"),
            "alice seed",
            &target,
            &AttributeValue::Json(address.clone()),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].valid);

    // ── Editing the attribute invalidates the verification ────────────
    let moved = json!({"street": "Elm St", "city": "Paris", "zip": "75001"});
    gateway.attributes().store_json_attribute(&key, moved.clone()).unwrap();
    let current = gateway
        .attributes()
        .retrieve_attribute(&key)
        .unwrap()
        .unwrap();
    let results = checker
        .check_attribute(&gateway.identity_url("alice"), "alice seed", &target, &current)
        .await
        .unwrap();
    assert!(!results[0].valid);
    assert!(results[0].key_resolved);
}

#[tokio::test]
async fn file_backend_workflow_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config().with_data_dir(dir.path());

    let alice_id = {
        let gateway = Arc::new(GatewayBuilder::from_config(config.clone()).unwrap().build());
        let creator = gateway.identity_creator();
        let alice = creator.create_identity("alice", "alice seed").unwrap();
        let bob = creator.create_identity("bob", "bob seed").unwrap();
        gateway
            .attributes()
            .store_string_attribute(&AttributeKey::new(&alice.user_id, "email", "primary"), "x@y.com")
            .unwrap();
        gateway
            .access()
            .grant(
                &alice.user_id,
                AccessRule::new(gateway.identity_url("bob"), "/identity/email/*", Permissions::READ_WRITE),
            )
            .unwrap();

        let transport = Arc::new(LocalTransport::new(gateway.clone()));
        gateway
            .verifier(transport)
            .verify_attribute(&VerifyRequest {
                source_identity: gateway.identity_url("bob"),
                source_user_id: bob.user_id,
                passphrase: "bob seed".into(),
                target: RemoteAttribute::new(gateway.identity_url("alice"), "email", "primary"),
                claimed_value: AttributeValue::String("x@y.com".into()),
            })
            .await
            .unwrap();
        alice.user_id
    };

    let gateway = Arc::new(GatewayBuilder::from_config(config).unwrap().build());
    let key = AttributeKey::new(&alice_id, "email", "primary");
    assert_eq!(gateway.verifications().get_verifications(&key).unwrap().len(), 1);
    assert_eq!(gateway.access().list(&alice_id, None).unwrap().len(), 1);

    let transport = Arc::new(LocalTransport::new(gateway.clone()));
    let results = gateway
        .checker(transport)
        .check_attribute(
            &gateway.identity_url("alice"),
            "alice seed",
            &RemoteAttribute::new(gateway.identity_url("alice"), "email", "primary"),
            &AttributeValue::String("x@y.com".into()),
        )
        .await
        .unwrap();
    assert!(results[0].valid);
}
