//! Scale test: many identities verify one attribute concurrently.
//!
//! Verification IDs must come out unique and gap-free, and every record
//! must still check out as valid afterwards.

use std::sync::Arc;

use identity_gateway::access::{AccessRule, Permissions};
use identity_gateway::crypto::KdfParams;
use identity_gateway::{
    AttributeKey, AttributeValue, Gateway, GatewayBuilder, GatewayConfig, LocalTransport,
    RemoteAttribute, VerificationId, VerifyRequest,
};

const BASE: &str = "https://identity.test.com";

fn config() -> GatewayConfig {
    GatewayConfig::new(BASE).with_kdf(KdfParams::insecure_fast())
}

/// Create `alice` with an email attribute open to everyone on this gateway,
/// plus `count` verifier identities.
fn populate(gateway: &Gateway, count: usize) -> (AttributeKey, Vec<(String, String)>) {
    let creator = gateway.identity_creator();
    let alice = creator.create_identity("alice", "alice seed").unwrap();
    let key = AttributeKey::new(&alice.user_id, "email", "primary");
    gateway.attributes().store_string_attribute(&key, "x@y.com").unwrap();
    gateway
        .access()
        .grant(
            &alice.user_id,
            AccessRule::new(format!("{BASE}/*"), "/identity/email/primary*", Permissions::READ_WRITE),
        )
        .unwrap();

    let verifiers = (0..count)
        .map(|i| {
            let name = format!("verifier{i}");
            let record = creator
                .create_identity(&name, &format!("seed {i}"))
                .expect("create verifier");
            (name, record.user_id)
        })
        .collect();
    (key, verifiers)
}

async fn verify_concurrently(gateway: Arc<Gateway>, verifiers: Vec<(String, String)>) -> Vec<u64> {
    let transport = Arc::new(LocalTransport::new(gateway.clone()));
    let mut handles = Vec::new();
    for (i, (name, user_id)) in verifiers.into_iter().enumerate() {
        let gateway = Arc::clone(&gateway);
        let transport = Arc::clone(&transport);
        handles.push(tokio::spawn(async move {
            let request = VerifyRequest {
                source_identity: gateway.identity_url(&name),
                source_user_id: user_id,
                passphrase: format!("seed {i}"),
                target: RemoteAttribute::new(gateway.identity_url("alice"), "email", "primary"),
                claimed_value: AttributeValue::String("x@y.com".into()),
            };
            gateway
                .verifier(transport)
                .verify_attribute(&request)
                .await
                .expect("verification should succeed")
        }));
    }

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap().0);
    }
    ids.sort_unstable();
    ids
}

async fn assert_all_valid(gateway: Arc<Gateway>, count: usize) {
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
    assert_eq!(results.len(), count);
    assert!(results.iter().all(|r| r.valid && r.key_resolved));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_32_verifiers_memory() {
    let gateway = Arc::new(GatewayBuilder::in_memory(config()).build());
    let (key, verifiers) = populate(&gateway, 32);

    let ids = verify_concurrently(gateway.clone(), verifiers).await;
    assert_eq!(ids, (1..=32).collect::<Vec<u64>>());

    let stored = gateway.verifications().get_verifications(&key).unwrap();
    let stored_ids: Vec<VerificationId> = stored.iter().map(|v| v.id).collect();
    assert!(stored_ids.windows(2).all(|w| w[0] < w[1]), "ordered by id");

    assert_all_valid(gateway, 32).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stress_16_verifiers_file() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(
        GatewayBuilder::from_config(config().with_data_dir(dir.path()))
            .unwrap()
            .build(),
    );
    let (key, verifiers) = populate(&gateway, 16);

    let ids = verify_concurrently(gateway.clone(), verifiers).await;
    assert_eq!(ids, (1..=16).collect::<Vec<u64>>());
    assert_eq!(gateway.verifications().get_verifications(&key).unwrap().len(), 16);

    assert_all_valid(gateway, 16).await;
}

#[tokio::test]
async fn stress_editing_invalidates_every_verification() {
    let gateway = Arc::new(GatewayBuilder::in_memory(config()).build());
    let (key, verifiers) = populate(&gateway, 10);
    verify_concurrently(gateway.clone(), verifiers).await;

    gateway.attributes().store_string_attribute(&key, "new@y.com").unwrap();

    let transport = Arc::new(LocalTransport::new(gateway.clone()));
    let results = gateway
        .checker(transport)
        .check_attribute(
            &gateway.identity_url("alice"),
            "alice seed",
            &RemoteAttribute::new(gateway.identity_url("alice"), "email", "primary"),
            &AttributeValue::String("new@y.com".into()),
        )
        .await
        .unwrap();
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|r| !r.valid && r.key_resolved));
}
