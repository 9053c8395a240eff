//! Attribute Verification: vouch for another identity's attribute, then
//! check who vouched and whether it still holds.
//!
//! Run with:
//!   cargo run --example attribute_verification -p identity-gateway

use std::sync::Arc;

use identity_gateway::access::{AccessRule, Permissions};
use identity_gateway::crypto::KdfParams;
use identity_gateway::{
    AttributeKey, AttributeValue, GatewayBuilder, GatewayConfig, LocalTransport, RemoteAttribute,
    VerifyRequest,
};

#[tokio::main]
async fn main() {
    let config = GatewayConfig::new("https://id.example.com").with_kdf(KdfParams::insecure_fast());
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let gateway = Arc::new(
        GatewayBuilder::in_memory(config)
            .verification_events(events_tx)
            .build(),
    );
    let transport = Arc::new(LocalTransport::new(gateway.clone()));

    // ── Setup: an owner and a notary ────────────────────────────────────────
    let creator = gateway.identity_creator();
    let alice = creator.create_identity("alice", "alice seed").expect("create alice");
    let notary = creator.create_identity("notary", "notary seed").expect("create notary");
    gateway
        .identities()
        .link_identity(&notary.user_id, "ethereum", "0x5eal")
        .expect("link");

    let key = AttributeKey::new(&alice.user_id, "phone", "mobile");
    gateway
        .attributes()
        .store_string_attribute(&key, "+33 6 12 34 56 78")
        .expect("store phone");

    // The notary needs to read the phone and write its verifications.
    gateway
        .access()
        .grant(
            &alice.user_id,
            AccessRule::new(gateway.identity_url("notary"), "/identity/phone/mobile*", Permissions::READ_WRITE),
        )
        .expect("grant");

    // ── 1. The notary verifies ──────────────────────────────────────────────
    //
    // The claimed value is compared with the fetched one before anything
    // is signed. Only a match produces a stored verification.
    let target = RemoteAttribute::new(gateway.identity_url("alice"), "phone", "mobile");
    let id = gateway
        .verifier(transport.clone())
        .verify_attribute(&VerifyRequest {
            source_identity: gateway.identity_url("notary"),
            source_user_id: notary.user_id.clone(),
            passphrase: "notary seed".into(),
            target: target.clone(),
            claimed_value: AttributeValue::String("+33 6 12 34 56 78".into()),
        })
        .await
        .expect("verification should succeed");
    println!("Stored verification #{id} on {target}");
    if let Some(event) = events_rx.recv().await {
        println!("  event: {} by {}", event.key, event.verifier_identity);
    }
    println!();

    // ── 2. Alice checks ─────────────────────────────────────────────────────
    let checker = gateway.checker(transport.clone());
    let current = AttributeValue::String("+33 6 12 34 56 78".into());
    for result in checker
        .check_attribute(&gateway.identity_url("alice"), "alice seed", &target, &current)
        .await
        .expect("check")
    {
        println!("  #{} {} valid={}", result.verification_id, result.verifier, result.valid);
    }

    // ── 3. Editing the attribute invalidates the verification ──────────────
    gateway
        .attributes()
        .store_string_attribute(&key, "+33 7 00 00 00 00")
        .expect("update phone");
    let edited = AttributeValue::String("+33 7 00 00 00 00".into());
    for result in checker
        .check_attribute(&gateway.identity_url("alice"), "alice seed", &target, &edited)
        .await
        .expect("check")
    {
        println!("  after edit: #{} valid={}", result.verification_id, result.valid);
    }
}
