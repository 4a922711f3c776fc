//! Retention engine tests against the in-memory store.

use chrono::Duration;
use ingest_core::{
    ExpiryRule, LedgerRule, ObservationType, RecordTable, RetentionPolicy, MAX_RETAIN_HOURS,
};
use integration_tests::{fixtures, mocks::MemoryStore};
use std::sync::Arc;
use worker::RetentionEngine;

fn engine(store: &MemoryStore, policy: RetentionPolicy) -> RetentionEngine {
    RetentionEngine::new(Arc::new(store.clone()), policy).unwrap()
}

fn overlaps_only() -> RetentionPolicy {
    RetentionPolicy {
        prune_overlaps: true,
        expiry: vec![],
        ledger: vec![],
    }
}

/// Recent rows older than the historical source's last record are removed;
/// a row at exactly that instant survives.
#[tokio::test]
async fn test_overlap_pruning_scenario() {
    let store = MemoryStore::new();
    let recent = store.add_source(ObservationType::Recent, Some("10001"), Some("01234"));
    let historical = store.add_source(ObservationType::Historical, Some("10001"), Some("01234"));

    store.add_records(
        RecordTable::Weather,
        historical,
        &[fixtures::day(2023, 12, 1), fixtures::day(2024, 1, 10)],
    );
    store.add_records(
        RecordTable::Weather,
        recent,
        &[
            fixtures::day(2024, 1, 2),
            fixtures::day(2024, 1, 10),
            fixtures::day(2024, 1, 15),
        ],
    );
    store.set_bounds(
        recent,
        Some(fixtures::day(2024, 1, 1)),
        Some(fixtures::day(2024, 1, 15)),
    );

    let report = engine(&store, overlaps_only())
        .run_at(fixtures::day(2024, 1, 20))
        .await
        .unwrap();

    assert_eq!(report.overlaps, 1);
    assert_eq!(report.pruned.purge.qualified, 1);
    assert_eq!(report.pruned.purge.deleted, 1);
    assert_eq!(
        store.timestamps(RecordTable::Weather, recent),
        vec![fixtures::day(2024, 1, 10), fixtures::day(2024, 1, 15)]
    );

    // Historical rows are never touched
    assert_eq!(store.timestamps(RecordTable::Weather, historical).len(), 2);

    let source = store.source(recent).unwrap();
    assert_eq!(source.first_record, Some(fixtures::day(2024, 1, 10)));
    assert_eq!(source.last_record, Some(fixtures::day(2024, 1, 15)));
    assert!(source.bounds_consistent());
}

#[tokio::test]
async fn test_overlap_requires_same_station() {
    let store = MemoryStore::new();
    let recent = store.add_source(ObservationType::Recent, Some("10001"), Some("01234"));
    let other = store.add_source(ObservationType::Historical, Some("10002"), Some("05678"));
    let unnamed_recent = store.add_source(ObservationType::Recent, None, None);
    let unnamed_historical = store.add_source(ObservationType::Historical, None, None);

    for id in [recent, unnamed_recent] {
        store.add_records(RecordTable::Weather, id, &[fixtures::day(2024, 1, 2)]);
    }
    for id in [other, unnamed_historical] {
        store.add_records(RecordTable::Weather, id, &[fixtures::day(2024, 1, 10)]);
    }

    let report = engine(&store, overlaps_only())
        .run_at(fixtures::day(2024, 1, 20))
        .await
        .unwrap();

    assert_eq!(report.overlaps, 0);
    assert_eq!(store.record_count(RecordTable::Weather), 4);
}

#[tokio::test]
async fn test_overlap_pruning_can_be_disabled() {
    let store = MemoryStore::new();
    let recent = store.add_source(ObservationType::Recent, Some("10001"), Some("01234"));
    let historical = store.add_source(ObservationType::Historical, Some("10001"), Some("01234"));
    store.add_records(RecordTable::Weather, recent, &[fixtures::day(2024, 1, 2)]);
    store.add_records(RecordTable::Weather, historical, &[fixtures::day(2024, 1, 10)]);

    let policy = RetentionPolicy {
        prune_overlaps: false,
        ..overlaps_only()
    };
    let report = engine(&store, policy)
        .run_at(fixtures::day(2024, 1, 20))
        .await
        .unwrap();

    assert_eq!(report.overlaps, 0);
    assert_eq!(store.record_count(RecordTable::Weather), 2);
}

/// Expired rows are removed and bounds recomputed from surviving rows.
#[tokio::test]
async fn test_expiry_recomputes_bounds() {
    let now = fixtures::at(2024, 3, 1, 12);
    let store = MemoryStore::new();
    let forecast = store.add_source(ObservationType::Forecast, Some("10382"), None);
    let timestamps: Vec<_> = (1..=5).map(|h| now - Duration::hours(h)).collect();
    store.add_records(RecordTable::Weather, forecast, &timestamps);

    let policy = RetentionPolicy {
        prune_overlaps: false,
        expiry: vec![ExpiryRule::new(
            RecordTable::Weather,
            ObservationType::Forecast,
            3,
        )],
        ledger: vec![],
    };
    let report = engine(&store, policy).run_at(now).await.unwrap();

    // Rows at -4h and -5h are strictly older than the cutoff; -3h survives
    assert_eq!(report.records_deleted(), 2);
    assert_eq!(report.expired.len(), 1);
    assert_eq!(report.expired[0].bounds_updated, 1);

    let source = store.source(forecast).unwrap();
    assert_eq!(source.first_record, Some(now - Duration::hours(3)));
    assert_eq!(source.last_record, Some(now - Duration::hours(1)));
}

/// A source that loses every row keeps its catalogue entry with NULL bounds.
#[tokio::test]
async fn test_emptied_source_gets_null_bounds() {
    let now = fixtures::at(2024, 3, 1, 12);
    let store = MemoryStore::new();
    let current = store.add_source(ObservationType::Current, Some("10382"), None);
    store.add_records(
        RecordTable::Weather,
        current,
        &[now - Duration::hours(72), now - Duration::hours(60)],
    );

    let report = engine(&store, RetentionPolicy::default())
        .run_at(now)
        .await
        .unwrap();

    let weather = report
        .expired
        .iter()
        .find(|e| e.table == RecordTable::Weather)
        .unwrap();
    assert_eq!(weather.bounds_cleared, 1);

    let source = store.source(current).unwrap();
    assert_eq!(source.first_record, None);
    assert_eq!(source.last_record, None);
    assert!(source.bounds_consistent());
}

/// Expiry only applies to rows of the listed observation types.
#[tokio::test]
async fn test_expiry_respects_observation_type() {
    let now = fixtures::at(2024, 3, 1, 12);
    let store = MemoryStore::new();
    let forecast = store.add_source(ObservationType::Forecast, Some("10382"), None);
    let recent = store.add_source(ObservationType::Recent, Some("10382"), Some("00433"));
    let old = now - Duration::days(10);
    store.add_records(RecordTable::Weather, forecast, &[old]);
    store.add_records(RecordTable::Weather, recent, &[old]);

    engine(&store, RetentionPolicy::default())
        .run_at(now)
        .await
        .unwrap();

    assert!(store.timestamps(RecordTable::Weather, forecast).is_empty());
    assert_eq!(store.timestamps(RecordTable::Weather, recent), vec![old]);
    assert_eq!(store.source(recent).unwrap().first_record, Some(old));
}

#[tokio::test]
async fn test_synop_table_expiry() {
    let now = fixtures::at(2024, 3, 1, 12);
    let store = MemoryStore::new();
    let synop = store.add_source(ObservationType::Synop, Some("10382"), None);
    store.add_records(
        RecordTable::Synop,
        synop,
        &[now - Duration::hours(31), now - Duration::hours(29)],
    );

    let report = engine(&store, RetentionPolicy::default())
        .run_at(now)
        .await
        .unwrap();

    let expiry = report
        .expired
        .iter()
        .find(|e| e.table == RecordTable::Synop)
        .unwrap();
    assert_eq!(expiry.deleted(), 1);
    assert_eq!(
        store.timestamps(RecordTable::Synop, synop),
        vec![now - Duration::hours(29)]
    );
}

/// A second run with no new writes changes nothing.
#[tokio::test]
async fn test_rerun_is_idempotent() {
    let now = fixtures::at(2024, 1, 20, 0);
    let store = MemoryStore::new();
    let recent = store.add_source(ObservationType::Recent, Some("10001"), Some("01234"));
    let historical = store.add_source(ObservationType::Historical, Some("10001"), Some("01234"));
    let forecast = store.add_source(ObservationType::Forecast, Some("10001"), None);
    store.add_records(
        RecordTable::Weather,
        recent,
        &[fixtures::day(2024, 1, 2), fixtures::day(2024, 1, 15)],
    );
    store.add_records(RecordTable::Weather, historical, &[fixtures::day(2024, 1, 10)]);
    store.add_records(
        RecordTable::Weather,
        forecast,
        &[now - Duration::hours(6), now - Duration::hours(1)],
    );
    store.add_parsed_file(&fixtures::synop_url(1), now - Duration::days(8));

    let engine = engine(&store, RetentionPolicy::default());
    let first = engine.run_at(now).await.unwrap();
    assert!(!first.is_noop());
    assert_eq!(first.records_deleted(), 2);
    assert_eq!(first.parsed_files_deleted(), 1);

    let second = engine.run_at(now).await.unwrap();
    assert!(second.is_noop(), "second run changed data: {:?}", second);
    assert_eq!(second.overlaps, 0);
}

/// Ledger patterns use LIKE wildcards, not regular expressions.
#[tokio::test]
async fn test_ledger_expiry_uses_like_semantics() {
    let now = fixtures::at(2024, 3, 1, 12);
    let store = MemoryStore::new();
    let old = now - Duration::days(8);
    let synop = fixtures::synop_url(1);
    let fresh_synop = fixtures::synop_url(2);
    store.add_parsed_file(&synop, old);
    store.add_parsed_file(&fresh_synop, now - Duration::days(1));
    store.add_parsed_file(&fixtures::mosmix_url(), old);

    let report = engine(&store, RetentionPolicy::default())
        .run_at(now)
        .await
        .unwrap();

    assert_eq!(report.ledger.len(), 1);
    assert_eq!(report.ledger[0].pattern, "%/Z__C_EDZW_%");
    assert_eq!(report.ledger[0].purge.deleted, 1);

    let mut expected = vec![fresh_synop, fixtures::mosmix_url()];
    expected.sort();
    assert_eq!(store.parsed_urls(), expected);
}

#[tokio::test]
async fn test_ledger_pattern_wildcards() {
    let now = fixtures::at(2024, 3, 1, 12);
    let old = now - Duration::days(30);
    let store = MemoryStore::new();
    store.add_parsed_file("https://example.com/data/a1c.zip", old);
    store.add_parsed_file("https://example.com/data/a12c.zip", old);
    store.add_parsed_file("https://example.com/data/abczip", old);

    let policy = RetentionPolicy {
        prune_overlaps: false,
        expiry: vec![],
        ledger: vec![LedgerRule::new("%/a_c.zip", 24)],
    };
    let report = engine(&store, policy).run_at(now).await.unwrap();

    assert_eq!(report.parsed_files_deleted(), 1);
    assert_eq!(
        store.parsed_urls(),
        vec![
            "https://example.com/data/a12c.zip".to_string(),
            "https://example.com/data/abczip".to_string(),
        ]
    );
}

#[test]
fn test_invalid_policy_is_rejected() {
    let store = MemoryStore::new();
    let policy = RetentionPolicy {
        prune_overlaps: true,
        expiry: vec![ExpiryRule::new(
            RecordTable::Weather,
            ObservationType::Forecast,
            0,
        )],
        ledger: vec![],
    };

    let err = RetentionEngine::new(Arc::new(store), policy).err().unwrap();
    assert_eq!(err.error_code(), "CFG_001");
}

/// A "keep forever" window is refused instead of wrapping into a cutoff
/// in the future, and the longest accepted window deletes nothing recent.
#[tokio::test]
async fn test_oversized_retention_never_deletes_fresh_rows() {
    let now = fixtures::at(2024, 3, 1, 12);
    let store = MemoryStore::new();
    let forecast = store.add_source(ObservationType::Forecast, Some("10382"), None);
    let rows = vec![now - Duration::minutes(10), now];
    store.add_records(RecordTable::Weather, forecast, &rows);

    for hours in [u64::MAX, 1 << 60] {
        let policy = RetentionPolicy {
            prune_overlaps: false,
            expiry: vec![ExpiryRule::new(
                RecordTable::Weather,
                ObservationType::Forecast,
                hours,
            )],
            ledger: vec![],
        };
        let err = RetentionEngine::new(Arc::new(store.clone()), policy)
            .err()
            .unwrap();
        assert_eq!(err.error_code(), "CFG_001");
    }

    let policy = RetentionPolicy {
        prune_overlaps: false,
        expiry: vec![ExpiryRule::new(
            RecordTable::Weather,
            ObservationType::Forecast,
            MAX_RETAIN_HOURS,
        )],
        ledger: vec![],
    };
    let report = engine(&store, policy).run_at(now).await.unwrap();

    assert_eq!(report.records_deleted(), 0);
    assert_eq!(store.timestamps(RecordTable::Weather, forecast), rows);
}

#[tokio::test]
async fn test_storage_failure_fails_run() {
    let store = MemoryStore::new();
    store.set_should_fail(true);

    let err = engine(&store, RetentionPolicy::default())
        .run_at(fixtures::day(2024, 1, 1))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "DB_001");
}
