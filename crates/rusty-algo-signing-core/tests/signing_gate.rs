use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rusty_algo_signing_core::SigningRequestGate;

#[test]
fn one_request_per_topic() {
    let gate = SigningRequestGate::new();
    assert!(gate.try_acquire("topic-a"));
    assert!(!gate.try_acquire("topic-a"));
    assert!(gate.is_held("topic-a"));

    gate.release("topic-a");
    assert!(!gate.is_held("topic-a"));
    assert!(gate.try_acquire("topic-a"));
}

#[test]
fn topics_are_independent() {
    let gate = SigningRequestGate::new();
    assert!(gate.try_acquire("topic-a"));
    assert!(gate.try_acquire("topic-b"));
    gate.release("topic-a");
    assert!(gate.is_held("topic-b"));
}

#[test]
fn concurrent_acquire_has_single_winner() {
    let gate = Arc::new(SigningRequestGate::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || gate.try_acquire("shared"))
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().expect("join"))
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn guard_releases_on_drop() {
    let gate = Arc::new(SigningRequestGate::new());
    {
        let guard = gate.acquire_guard("topic-a").expect("acquire");
        assert_eq!(guard.topic(), "topic-a");
        assert!(gate.acquire_guard("topic-a").is_none());
    }
    assert!(!gate.is_held("topic-a"));
}

#[tokio::test(start_paused = true)]
async fn stale_entries_expire_after_ttl() {
    let gate = SigningRequestGate::with_ttl(Duration::from_secs(300));
    assert!(gate.try_acquire("topic-a"));
    assert!(gate.try_acquire("topic-b"));

    tokio::time::advance(Duration::from_secs(299)).await;
    assert!(!gate.try_acquire("topic-a"));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(!gate.is_held("topic-b"));
    assert!(gate.try_acquire("topic-a"));
    assert_eq!(gate.purge_expired(), 1);
    assert!(gate.is_held("topic-a"));
}

#[tokio::test(start_paused = true)]
async fn expired_holder_cannot_release_reclaimed_topic() {
    let gate = Arc::new(SigningRequestGate::with_ttl(Duration::from_secs(300)));
    let first = gate.acquire_guard("topic-a").expect("first");

    tokio::time::advance(Duration::from_secs(301)).await;
    let second = gate.acquire("topic-a").expect("reclaim");

    // The first sheet closes after its entry was taken over.
    drop(first);
    assert!(gate.is_held("topic-a"));
    assert!(!gate.try_acquire("topic-a"));

    assert!(gate.release_ticket(&second));
    assert!(!gate.is_held("topic-a"));
    assert!(!gate.release_ticket(&second));
}

#[test]
fn tickets_are_distinct_per_acquisition() {
    let gate = SigningRequestGate::new();
    let first = gate.acquire("topic-a").expect("first");
    assert!(gate.release_ticket(&first));

    let second = gate.acquire("topic-a").expect("second");
    assert_ne!(first, second);
    assert!(!gate.release_ticket(&first));
    assert!(gate.is_held("topic-a"));
    assert_eq!(second.topic(), "topic-a");
}
