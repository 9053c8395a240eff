//! Basic Gateway: create identities, store attributes, share them.
//!
//! Run with:
//!   cargo run --example basic_gateway -p identity-gateway

use identity_gateway::access::{AccessRule, Permissions};
use identity_gateway::crypto::KdfParams;
use identity_gateway::{AttributeKey, GatewayBuilder, GatewayConfig, SignatureMode};
use serde_json::json;

fn main() {
    let config = GatewayConfig::new("https://id.example.com").with_kdf(KdfParams::insecure_fast());
    let gateway = GatewayBuilder::in_memory(config).build();

    // ── 1. Create an identity ───────────────────────────────────────────────
    //
    // The seed phrase derives the Ed25519 key pair and also seals its
    // private half. Nothing else needs to be remembered.
    let alice = gateway
        .identity_creator()
        .create_identity("alice", "correct horse battery staple")
        .expect("identity creation should succeed");
    println!("Identity created");
    println!("  URL:        {}", gateway.identity_url("alice"));
    println!("  User ID:    {}", alice.user_id);
    println!("  Public key: {}", alice.key_pair.public_key);
    println!();

    // ── 2. Store attributes ─────────────────────────────────────────────────
    let email = AttributeKey::new(&alice.user_id, "email", "primary");
    let address = AttributeKey::new(&alice.user_id, "address", "home");
    gateway
        .attributes()
        .store_string_attribute(&email, "alice@example.com")
        .expect("store email");
    gateway
        .attributes()
        .store_json_attribute(&address, json!({"street": "Main St", "city": "Paris"}))
        .expect("store address");
    for attr_type in gateway.attributes().list_attribute_types(&alice.user_id).unwrap() {
        let ids = gateway
            .attributes()
            .list_attributes(&alice.user_id, &attr_type)
            .unwrap();
        println!("  {attr_type}: {}", ids.join(", "));
    }
    println!(
        "  canonical address: {}",
        gateway.attributes().retrieve_canonical_text(&address).unwrap().unwrap()
    );
    println!();

    // ── 3. Grant, check, revoke ─────────────────────────────────────────────
    let bob = gateway.identity_url("bob");
    gateway
        .access()
        .grant(&alice.user_id, AccessRule::new(&bob, "/identity/email/*", Permissions::READ))
        .expect("grant");
    let p = gateway
        .access()
        .check(&alice.user_id, &bob, &email.path(), None)
        .expect("check");
    println!("bob on {}: read={} write={}", email.path(), p.read, p.write);

    gateway
        .access()
        .revoke(&alice.user_id, &bob, "/identity/email/*", false, false)
        .expect("revoke");
    let p = gateway
        .access()
        .check(&alice.user_id, &bob, &email.path(), None)
        .expect("check");
    println!("after revoke: read={} write={}", p.read, p.write);
    println!();

    // ── 4. Sign and verify data ─────────────────────────────────────────────
    let signed = gateway
        .signer()
        .sign("hello", "correct horse battery staple", SignatureMode::Detached)
        .expect("sign");
    let ok = identity_gateway::DataSigner::verify("hello", &signed.signature, &alice.key_pair.public_key)
        .expect("verify");
    println!("Detached signature valid: {ok}");
}
