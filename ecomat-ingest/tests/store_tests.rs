//! Integration tests for the versioned material store
//!
//! Promotion atomicity, history immutability and the pending slot, all
//! against an in-memory SQLite database with the real schema.

mod helpers;

use chrono::NaiveDate;

use ecomat_common::models::PendingVersion;
use ecomat_ingest::store::{PromoteOutcome, VersionStore, CURRENT_VERSION_KEY};
use helpers::{candidate, create_test_db, material, pending};

#[tokio::test]
async fn current_is_empty_before_first_promotion() {
    let store = VersionStore::new(create_test_db().await);

    assert_eq!(store.current_label().await.unwrap(), None);
    assert!(store.current().await.unwrap().is_none());
    assert!(store.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn promote_sets_current_and_appends_history() {
    let store = VersionStore::new(create_test_db().await);

    let outcome = store
        .promote(&pending("2024/1:2024, Version 5", 3), false)
        .await
        .unwrap();

    let PromoteOutcome::Promoted(version) = outcome else {
        panic!("expected promotion");
    };
    assert_eq!(version.label, "2024/1:2024, Version 5");
    assert_eq!(version.materials_count, 3);
    assert!(version.is_current);

    let (current, materials) = store.current().await.unwrap().expect("current version");
    assert_eq!(current.label, "2024/1:2024, Version 5");
    assert!(current.is_current);
    assert_eq!(materials.len(), 3);

    let history = store.history().await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn promote_clears_pending_in_the_same_transaction() {
    let store = VersionStore::new(create_test_db().await);
    let staged = pending("2024/1:2024, Version 5", 2);

    store.put_pending(&staged).await.unwrap();
    assert!(store.pending().await.unwrap().is_some());

    store.promote(&staged, false).await.unwrap();
    assert!(store.pending().await.unwrap().is_none());
}

#[tokio::test]
async fn promoted_versions_stay_readable_after_pointer_moves() {
    let store = VersionStore::new(create_test_db().await);

    store.promote(&pending("Version 4", 2), false).await.unwrap();
    store.promote(&pending("Version 5", 3), false).await.unwrap();

    let (current, _) = store.current().await.unwrap().expect("current version");
    assert_eq!(current.label, "Version 5");

    // The older release is history now, but its record set is intact
    let old = store.get_by_label("Version 4").await.unwrap();
    assert_eq!(old.len(), 2);

    let old_meta = store.version_meta("Version 4").await.unwrap().unwrap();
    assert!(!old_meta.is_current);
    assert_eq!(store.history().await.unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_label_without_force_is_a_noop() {
    let store = VersionStore::new(create_test_db().await);

    store.promote(&pending("Version 5", 2), false).await.unwrap();

    let retry = pending("Version 5", 4);
    let outcome = store.promote(&retry, false).await.unwrap();
    assert!(matches!(outcome, PromoteOutcome::AlreadyInHistory));

    // Stored data unchanged, single history row
    assert_eq!(store.get_by_label("Version 5").await.unwrap().len(), 2);
    assert_eq!(store.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn force_rewrites_a_release_in_place() {
    let store = VersionStore::new(create_test_db().await);

    store.promote(&pending("Version 5", 2), false).await.unwrap();

    let outcome = store.promote(&pending("Version 5", 4), true).await.unwrap();
    assert!(matches!(outcome, PromoteOutcome::Promoted(_)));

    assert_eq!(store.get_by_label("Version 5").await.unwrap().len(), 4);
    assert_eq!(store.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn get_by_label_rejects_unknown_versions() {
    let store = VersionStore::new(create_test_db().await);
    store.promote(&pending("Version 5", 1), false).await.unwrap();

    let err = store.get_by_label("Version 99").await.unwrap_err();
    assert!(matches!(err, ecomat_common::Error::NotFound(_)));
}

#[tokio::test]
async fn materials_come_back_in_sheet_order() {
    let store = VersionStore::new(create_test_db().await);

    let mut staged = pending("Version 5", 0);
    staged.materials = vec![
        material(30, "Zement"),
        material(10, "Beton"),
        material(20, "Kalk"),
    ];
    store.promote(&staged, false).await.unwrap();

    let names: Vec<_> = store
        .get_by_label("Version 5")
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.name_de.unwrap())
        .collect();
    assert_eq!(names, vec!["Zement", "Beton", "Kalk"]);
}

#[tokio::test]
async fn history_orders_by_publish_date_then_label() {
    let store = VersionStore::new(create_test_db().await);

    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
    let releases = [
        ("Version 3", date(2022, 3, 1)),
        ("Version 5", date(2025, 2, 17)),
        ("Version 4", date(2025, 2, 17)),
        ("Undated", None),
    ];
    for (label, publish_date) in releases {
        let staged = PendingVersion {
            candidate: candidate(label, publish_date),
            materials: vec![material(1, "Beton")],
            staged_at: chrono::Utc::now(),
        };
        store.promote(&staged, false).await.unwrap();
    }

    let labels: Vec<_> = store
        .history()
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.label)
        .collect();
    assert_eq!(labels, vec!["Version 5", "Version 4", "Version 3", "Undated"]);
}

#[tokio::test]
async fn promote_updates_the_settings_pointer() {
    let pool = create_test_db().await;
    let store = VersionStore::new(pool.clone());

    store.promote(&pending("Version 5", 1), false).await.unwrap();

    let pointer: Option<String> = ecomat_common::db::get_setting(&pool, CURRENT_VERSION_KEY)
        .await
        .unwrap();
    assert_eq!(pointer.as_deref(), Some("Version 5"));
}

#[tokio::test]
async fn pending_slot_roundtrips_materials() {
    let store = VersionStore::new(create_test_db().await);
    let staged = pending("Version 5", 3);

    assert!(store.pending().await.unwrap().is_none());
    store.put_pending(&staged).await.unwrap();

    let loaded = store.pending().await.unwrap().expect("pending version");
    assert_eq!(loaded.label(), "Version 5");
    assert_eq!(loaded.candidate.url, staged.candidate.url);
    assert_eq!(loaded.candidate.publish_date, staged.candidate.publish_date);
    assert_eq!(loaded.materials, staged.materials);

    store.clear_pending().await.unwrap();
    assert!(store.pending().await.unwrap().is_none());
}

#[tokio::test]
async fn put_pending_reports_superseded_label_only_on_change() {
    let store = VersionStore::new(create_test_db().await);

    assert_eq!(store.put_pending(&pending("Version 4", 1)).await.unwrap(), None);

    // Restaging the same label is a refresh, not a supersession
    assert_eq!(store.put_pending(&pending("Version 4", 2)).await.unwrap(), None);

    let superseded = store.put_pending(&pending("Version 5", 1)).await.unwrap();
    assert_eq!(superseded.as_deref(), Some("Version 4"));

    // Single slot: only the newest release remains
    let loaded = store.pending().await.unwrap().unwrap();
    assert_eq!(loaded.label(), "Version 5");
}
