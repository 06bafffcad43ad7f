// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync reconciliation against the in-memory remote store.
//!
//! Covers first upload, merging with another device's copy, write
//! conflicts, transient outages and corrupt remote data.

mod common;

use chrono::{DateTime, Duration, Utc};
use common::{base_time, fix_at, history_of, test_tracker};
use state_passport::config::SyncConfig;
use state_passport::db::{codec, keys, LocalStore, MemoryRemoteStore};
use state_passport::models::{
    merge_histories, merge_ledgers, AchievementLedger, AchievementRecord, RegionVisit,
    VisitHistory,
};
use state_passport::services::{synchronize, StaticFactProvider, SyncError, SyncService};
use std::sync::Arc;

fn service(remote: &Arc<MemoryRemoteStore>) -> SyncService<MemoryRemoteStore> {
    SyncService::new(Arc::clone(remote), SyncConfig::default())
}

fn remote_visits(remote: &MemoryRemoteStore) -> VisitHistory {
    let record = remote.record(keys::VISIT_HISTORY).expect("visits uploaded");
    codec::decode_visits(&record.payload).expect("valid blob")
}

#[tokio::test]
async fn test_first_sync_uploads() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let local = history_of(&[("Ohio", base_time())]);

    let merged = service(&remote).sync_visits(&local).await.unwrap();

    assert_eq!(merged, local);
    assert_eq!(remote_visits(&remote), local);
    assert_eq!(remote.record(keys::VISIT_HISTORY).map(|r| r.version), Some(1));
}

#[tokio::test]
async fn test_merges_with_other_device() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let t = base_time();

    let theirs = history_of(&[("Ohio", t - Duration::days(3)), ("Utah", t)]);
    remote.put_direct(keys::VISIT_HISTORY, &codec::encode_visits(&theirs).unwrap());

    let ours = history_of(&[("Ohio", t), ("Indiana", t)]);
    let merged = service(&remote).sync_visits(&ours).await.unwrap();

    assert_eq!(
        merged.keys().collect::<Vec<_>>(),
        vec!["Indiana", "Ohio", "Utah"]
    );
    assert_eq!(merged["Ohio"].first_confirmed_at, Some(t - Duration::days(3)));
    assert_eq!(merged["Ohio"].last_confirmed_at, Some(t));
    assert_eq!(remote_visits(&remote), merged);
    assert_eq!(remote.record(keys::VISIT_HISTORY).map(|r| r.version), Some(2));
}

#[tokio::test]
async fn test_conflicting_write_is_merged_and_retried() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let t = base_time();

    // Another device writes between our read and our save
    let foreign = history_of(&[("Nevada", t)]);
    remote.interleave_write(keys::VISIT_HISTORY, &codec::encode_visits(&foreign).unwrap());

    let ours = history_of(&[("California", t)]);
    let merged = service(&remote).sync_visits(&ours).await.unwrap();

    assert!(merged.contains_key("Nevada"));
    assert!(merged.contains_key("California"));
    assert_eq!(remote_visits(&remote), merged);
    assert_eq!(remote.save_attempts(), 2);
}

#[tokio::test]
async fn test_conflict_retries_are_bounded() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let foreign = codec::encode_visits(&history_of(&[("Nevada", base_time())])).unwrap();
    for _ in 0..3 {
        remote.interleave_write(keys::VISIT_HISTORY, &foreign);
    }

    let err = service(&remote)
        .sync_visits(&history_of(&[("California", base_time())]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::ConflictRetriesExhausted { attempts: 3, .. }
    ));
    assert!(err.is_transient());
    assert_eq!(remote.save_attempts(), 3);
    // Nothing of ours reached the server
    assert!(!remote_visits(&remote).contains_key("California"));
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_failure_retried() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.fail_next_fetches(2);

    let local = history_of(&[("Ohio", base_time())]);
    let merged = service(&remote).sync_visits(&local).await.unwrap();

    assert_eq!(merged, local);
    assert_eq!(remote_visits(&remote), local);
}

#[tokio::test(start_paused = true)]
async fn test_outage_outlasting_retries_fails() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.fail_next_fetches(3);

    let err = service(&remote)
        .sync_visits(&history_of(&[("Ohio", base_time())]))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Remote(_)));
    assert!(err.is_transient());
    assert_eq!(remote.save_attempts(), 0);
}

#[tokio::test]
async fn test_corrupt_remote_blob_treated_as_empty() {
    let remote = Arc::new(MemoryRemoteStore::new());
    remote.put_direct(keys::VISIT_HISTORY, "{ definitely not a visit history");

    let local = history_of(&[("Ohio", base_time())]);
    let merged = service(&remote).sync_visits(&local).await.unwrap();

    assert_eq!(merged, local);
    assert_eq!(remote_visits(&remote), local);
}

#[tokio::test]
async fn test_newer_schema_on_server_left_untouched() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let newer = r#"{"schema_version": 2, "records": {"Ohio": {"future_field": true}}}"#;
    remote.put_direct(keys::VISIT_HISTORY, newer);

    let err = service(&remote)
        .sync_visits(&history_of(&[("Utah", base_time())]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SyncError::UnsupportedRemoteSchema { version: 2, .. }
    ));
    assert!(!err.is_transient());
    assert_eq!(remote.save_attempts(), 0);
    let record = remote.record(keys::VISIT_HISTORY).expect("still present");
    assert_eq!(record.payload, newer);
}

#[tokio::test]
async fn test_sync_all_covers_both_blobs() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let t = base_time();

    let mut theirs = AchievementLedger::new();
    let mut record = AchievementRecord::unearned("first_state");
    record.earn(t, vec!["Utah".to_string()]);
    theirs.insert("first_state".to_string(), record);
    remote.put_direct(keys::ACHIEVEMENTS, &codec::encode_ledger(&theirs).unwrap());

    let (visits, ledger) = service(&remote)
        .sync_all(&history_of(&[("Ohio", t)]), &AchievementLedger::new())
        .await
        .unwrap();

    assert!(visits.contains_key("Ohio"));
    assert!(ledger["first_state"].is_earned);
    assert!(remote.record(keys::ACHIEVEMENTS).is_some());
}

#[tokio::test]
async fn test_synchronize_applies_remote_state() {
    let remote = Arc::new(MemoryRemoteStore::new());
    let sync = service(&remote);

    // Another device saw Indiana and Pennsylvania an hour ago
    let now = Utc::now();
    let theirs = history_of(&[
        ("Indiana", now - Duration::hours(2)),
        ("Pennsylvania", now - Duration::hours(1)),
    ]);
    remote.put_direct(keys::VISIT_HISTORY, &codec::encode_visits(&theirs).unwrap());

    let (mut tracker, sink) = test_tracker(LocalStore::in_memory(), StaticFactProvider::new());
    tracker.handle_fix(&fix_at("Columbus", 0)).await;
    let (handle, task) = tracker.spawn();

    synchronize(&handle, &sync).await.unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(
        snapshot.visits.keys().collect::<Vec<_>>(),
        vec!["Indiana", "Ohio", "Pennsylvania"]
    );
    assert!(snapshot.achievements["first_state"].is_earned);
    // Remote regions never notify on their own
    assert_eq!(sink.delivered().len(), 1);

    // The server holds the union too
    assert!(remote_visits(&remote).contains_key("Ohio"));

    handle.shutdown();
    task.await.unwrap();
}

fn timestamps() -> [Option<DateTime<Utc>>; 3] {
    let t = base_time();
    [None, Some(t), Some(t + Duration::hours(5))]
}

/// Every combination of flags and timestamps for one region.
fn visit_variants() -> Vec<RegionVisit> {
    let mut variants = Vec::new();
    for flags in 0u8..16 {
        for first in timestamps() {
            for last in timestamps() {
                variants.push(RegionVisit {
                    region_name: "Ohio".to_string(),
                    confirmed_by_detection: flags & 1 != 0,
                    manually_added: flags & 2 != 0,
                    is_active: flags & 4 != 0,
                    ever_confirmed: flags & 8 != 0,
                    first_confirmed_at: first,
                    last_confirmed_at: last,
                });
            }
        }
    }
    variants
}

fn record_variants() -> Vec<AchievementRecord> {
    let mut variants = vec![AchievementRecord::unearned("road_trip")];
    for at in timestamps() {
        for regions in [vec![], vec!["Ohio"], vec!["Indiana", "Ohio"]] {
            variants.push(AchievementRecord {
                id: "road_trip".to_string(),
                is_earned: true,
                earned_at: at,
                contributing_regions: regions.into_iter().map(String::from).collect(),
            });
        }
    }
    variants
}

#[test]
fn test_visit_merge_is_order_independent() {
    let variants = visit_variants();
    for a in &variants {
        assert_eq!(&a.merge(a), a, "merge must be idempotent");
        for b in &variants {
            assert_eq!(a.merge(b), b.merge(a));
        }
    }

    // Associativity on a slice of the space
    for a in variants.iter().step_by(7) {
        for b in variants.iter().step_by(5) {
            for c in variants.iter().step_by(11) {
                assert_eq!(a.merge(b).merge(c), a.merge(&b.merge(c)));
            }
        }
    }
}

#[test]
fn test_record_merge_is_order_independent() {
    let variants = record_variants();
    for a in &variants {
        assert_eq!(&a.merge(a), a);
        for b in &variants {
            assert_eq!(a.merge(b), b.merge(a));
            if a.is_earned || b.is_earned {
                assert!(a.merge(b).is_earned, "earned never reverts");
            }
            for c in &variants {
                assert_eq!(a.merge(b).merge(c), a.merge(&b.merge(c)));
            }
        }
    }
}

#[test]
fn test_history_merge_commutes() {
    let t = base_time();
    let mut ours = history_of(&[("Ohio", t), ("Indiana", t)]);
    if let Some(ohio) = ours.get_mut("Ohio") {
        ohio.deactivate();
    }
    let mut theirs = history_of(&[("Ohio", t - Duration::days(1))]);
    theirs.insert("Utah".to_string(), RegionVisit::manual("Utah"));

    let mut ledger_a = AchievementLedger::new();
    ledger_a.insert("first_state".into(), AchievementRecord::unearned("first_state"));
    let mut ledger_b = AchievementLedger::new();
    let mut earned = AchievementRecord::unearned("first_state");
    earned.earn(t, vec!["Ohio".to_string()]);
    ledger_b.insert("first_state".into(), earned);

    assert_eq!(merge_histories(&ours, &theirs), merge_histories(&theirs, &ours));
    assert_eq!(merge_ledgers(&ledger_a, &ledger_b), merge_ledgers(&ledger_b, &ledger_a));

    let merged = merge_histories(&ours, &theirs);
    assert!(merged["Ohio"].is_active, "active on either side wins");
    assert!(merged["Utah"].manually_added);
    assert!(merge_ledgers(&ledger_a, &ledger_b)["first_state"].is_earned);
}
