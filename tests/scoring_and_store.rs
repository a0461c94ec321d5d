//! Integration tests for fraud scoring through the admission path.

use chrono::{Duration, TimeZone, Utc};

use securechain::clock::FixedClock;
use securechain::config::Config;
use securechain::persistence::InMemoryPersistence;
use securechain::store::{ListQuery, TransactionStore};
use securechain::transaction::TxStatus;

fn store_at_noon() -> (TransactionStore, std::sync::Arc<FixedClock>) {
    let clock = std::sync::Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 5, 6, 12, 0, 0).unwrap(),
    ));
    let store = TransactionStore::open(
        Box::new(InMemoryPersistence::new()),
        Box::new(SharedClock(clock.clone())),
        Config::default(),
    )
    .expect("Failed to open store");
    (store, clock)
}

/// Clock handle the test keeps after handing ownership to the store.
struct SharedClock(std::sync::Arc<FixedClock>);

impl securechain::clock::Clock for SharedClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.0.now()
    }
}

#[test]
fn daytime_small_transfer_is_clear_and_night_whale_is_suspicious() {
    let (store, clock) = store_at_noon();

    let tx1 = store.submit("alice", "bob", 100.0).unwrap();
    assert!(tx1.transaction.fraud_score < 0.4);
    assert_eq!(tx1.transaction.status(&store.config().scoring), TxStatus::Clear);

    clock.set(Utc.with_ymd_and_hms(2024, 5, 7, 3, 0, 0).unwrap());
    let tx2 = store.submit("carol", "dave", 60_000.0).unwrap();
    assert!(
        tx2.transaction.fraud_score >= 0.7,
        "expected Suspicious, got {}",
        tx2.transaction.fraud_score
    );
    assert_eq!(tx2.transaction.status(&store.config().scoring), TxStatus::Suspicious);
}

#[test]
fn amount_tier_boundary_is_strict() {
    let (store, _) = store_at_noon();
    let at_boundary = store.submit("alice", "bob", 5_000.00).unwrap();
    let above_boundary = store.submit("carol", "dave", 5_000.01).unwrap();

    // 5000.00 picks up only the round-amount weight; 5000.01 crosses the tier.
    assert!(at_boundary.transaction.fraud_score < above_boundary.transaction.fraud_score);
    assert!((at_boundary.transaction.fraud_score - 0.05).abs() < 1e-9);
    assert!((above_boundary.transaction.fraud_score - 0.12).abs() < 1e-9);
}

#[test]
fn high_velocity_sender_scores_higher() {
    let (store, clock) = store_at_noon();

    for _ in 0..10 {
        clock.advance(Duration::seconds(30));
        store.submit("alice", "shop", 50.0).unwrap();
    }
    clock.advance(Duration::seconds(30));
    let last_alice = store.submit("alice", "shop", 50.0).unwrap().transaction.fraud_score;

    for _ in 0..2 {
        clock.advance(Duration::seconds(30));
        store.submit("bob", "shop", 50.0).unwrap();
    }
    clock.advance(Duration::seconds(30));
    let last_bob = store.submit("bob", "shop", 50.0).unwrap().transaction.fraud_score;

    assert!(
        last_alice > last_bob,
        "11 in-window submissions ({}) must outscore 3 ({})",
        last_alice,
        last_bob
    );
    assert_eq!(last_bob, 0.0);
}

#[test]
fn velocity_resets_outside_the_window() {
    let (store, clock) = store_at_noon();

    for _ in 0..11 {
        store.submit("alice", "shop", 50.0).unwrap();
    }

    // Slide past the one-hour window (still daytime) and submit again.
    clock.advance(Duration::seconds(3_700));
    let calm_again = store.submit("alice", "shop", 50.0).unwrap();
    assert_eq!(calm_again.transaction.fraud_score, 0.0);
}

#[test]
fn identical_submissions_score_identically() {
    let (store_a, _) = store_at_noon();
    let (store_b, _) = store_at_noon();

    let sequence = [("alice", "bob", 120.5), ("alice", "bob", 9_000.0), ("carol", "bob", 60_000.0)];
    for (sender, receiver, amount) in sequence {
        let a = store_a.submit(sender, receiver, amount).unwrap();
        let b = store_b.submit(sender, receiver, amount).unwrap();
        assert_eq!(a.transaction.fraud_score, b.transaction.fraud_score);
    }
}

#[test]
fn trained_model_keeps_scores_in_bands() {
    let (store, _) = store_at_noon();
    for i in 0..30 {
        store
            .submit(&format!("user-{}", i % 5), "shop", 40.0 + (i % 9) as f64 * 5.0)
            .unwrap();
    }

    assert!(store.retrain());
    assert!(store.model_status().trained);

    // Blended scoring still lands in [0, 1] and keeps ordering sensible.
    let ordinary = store.submit("user-1", "shop", 45.0).unwrap();
    let hostile = store.submit("ghost", "offshore", 250_000.0).unwrap();
    assert!((0.0..=1.0).contains(&ordinary.transaction.fraud_score));
    assert!((0.0..=1.0).contains(&hostile.transaction.fraud_score));
    assert!(hostile.transaction.fraud_score > ordinary.transaction.fraud_score);
}

#[test]
fn fresh_accounts_carry_no_frequency_penalty() {
    let (store, _) = store_at_noon();
    let first_ever = store.submit("newcomer", "stranger", 200.0).unwrap();
    assert_eq!(first_ever.transaction.fraud_score, 0.0);
}

#[test]
fn rejection_is_all_or_nothing() {
    let (store, _) = store_at_noon();
    store.submit("alice", "bob", 10.0).unwrap();

    assert!(store.submit("alice", "", 10.0).is_err());
    assert!(store.submit("alice", "bob", 0.0).is_err());

    assert_eq!(store.transaction_count(), 1);
    let report = store.validate_chain();
    assert!(report.valid);
    assert_eq!(report.total_blocks, 1);
}

#[test]
fn list_searches_and_filters_by_band() {
    let (store, clock) = store_at_noon();
    store.submit("alice", "bob", 10.0).unwrap();
    store.submit("carol", "dave", 7_000.0).unwrap(); // 0.12 -> Clear
    clock.set(Utc.with_ymd_and_hms(2024, 5, 7, 2, 0, 0).unwrap());
    store.submit("mallory", "offshore", 60_000.0).unwrap(); // 0.75 -> Suspicious

    let suspicious = store.list(&ListQuery {
        page: 1,
        per_page: 10,
        search: None,
        status: Some(TxStatus::Suspicious),
    });
    assert_eq!(suspicious.total, 1);
    assert_eq!(suspicious.items[0].sender, "mallory");

    let alerts = store.fraud_alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].sender, "mallory");

    let by_amount = store.list(&ListQuery {
        page: 1,
        per_page: 10,
        search: Some("7000".to_string()),
        status: None,
    });
    assert_eq!(by_amount.total, 1);
    assert_eq!(by_amount.items[0].sender, "carol");
}
