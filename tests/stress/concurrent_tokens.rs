//! Concurrency test: racing one-time tokens.
//!
//! Many threads present the same token at once; exactly one check may win.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use identity_gateway::access::{AccessRule, AccessRuleStore, Permissions};
use identity_gateway::{AccessRightsEngine, FileBackend, GatewayError, MemoryBackend};

const BOB: &str = "https://identity.test.com/bob";

/// Race `threads` checks of one token and return (winners, replays).
fn race_token(engine: Arc<AccessRightsEngine>, threads: usize) -> (usize, usize) {
    engine
        .grant(
            "alice",
            AccessRule::new(BOB, "/identity/passport/*", Permissions::READ).one_time("t-1"),
        )
        .expect("grant should succeed");

    let winners = Arc::new(AtomicUsize::new(0));
    let replays = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for _ in 0..threads {
        let engine = Arc::clone(&engine);
        let winners = Arc::clone(&winners);
        let replays = Arc::clone(&replays);
        handles.push(thread::spawn(move || {
            match engine.check("alice", BOB, "/identity/passport/holland", Some("t-1")) {
                Ok(p) if p.read => {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
                Ok(_) => {}
                Err(GatewayError::TokenAlreadyConsumed) => {
                    replays.fetch_add(1, Ordering::SeqCst);
                }
                Err(e) => panic!("unexpected error: {e}"),
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    (winners.load(Ordering::SeqCst), replays.load(Ordering::SeqCst))
}

#[test]
fn stress_50_threads_one_token_memory() {
    let store: Arc<dyn AccessRuleStore> = Arc::new(MemoryBackend::new());
    let engine = Arc::new(AccessRightsEngine::new(store.clone()));

    let (winners, replays) = race_token(engine, 50);
    assert_eq!(winners, 1);
    assert_eq!(replays, 49);
    assert!(store.rules("alice").unwrap().is_empty());
}

#[test]
fn stress_20_threads_one_token_file() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn AccessRuleStore> = Arc::new(FileBackend::open(dir.path()).unwrap());
    let engine = Arc::new(AccessRightsEngine::new(store.clone()));

    let (winners, replays) = race_token(engine, 20);
    assert_eq!(winners, 1);
    assert_eq!(replays, 19);
    assert!(store.rules("alice").unwrap().is_empty());
}

#[test]
fn stress_two_engines_share_one_file_store() {
    // Engines over one backend do not share owner locks. The backend's
    // tombstone write alone decides the winner.
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn AccessRuleStore> = Arc::new(FileBackend::open(dir.path()).unwrap());
    let first = Arc::new(AccessRightsEngine::new(store.clone()));
    let second = Arc::new(AccessRightsEngine::new(store));
    first
        .grant(
            "alice",
            AccessRule::new(BOB, "/identity/passport/*", Permissions::READ).one_time("t-2"),
        )
        .unwrap();

    let winners = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for i in 0..20 {
        let engine = if i % 2 == 0 { Arc::clone(&first) } else { Arc::clone(&second) };
        let winners = Arc::clone(&winners);
        handles.push(thread::spawn(move || {
            if let Ok(p) = engine.check("alice", BOB, "/identity/passport/holland", Some("t-2")) {
                if p.read {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

#[test]
fn stress_concurrent_grants_and_checks() {
    let engine = Arc::new(AccessRightsEngine::new(Arc::new(MemoryBackend::new())));

    let mut handles = Vec::new();
    for thread_id in 0..20 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let requester = format!("https://identity.test.com/user{thread_id}");
            let path = format!("/identity/email/{thread_id}");
            for _ in 0..25 {
                engine
                    .grant("alice", AccessRule::new(&requester, &path, Permissions::READ))
                    .expect("grant should succeed");
                let p = engine.check("alice", &requester, &path, None).unwrap();
                assert!(p.read);
                assert!(!p.write);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(engine.list("alice", None).unwrap().len(), 500);
    let removed = engine
        .revoke("alice", "https://identity.test.com/user7", "/identity/email/7", false, false)
        .unwrap();
    assert_eq!(removed, 25);
}
