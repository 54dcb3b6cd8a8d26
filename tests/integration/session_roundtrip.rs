//! Integration tests for the capture to restore round trip
//!
//! Drive full sessions through capture, snapshot serialization, and
//! restore, and verify the destination ends up with the source's
//! contents.

use super::common::fixtures::{fast_options, seeded_bridge, session_cookie};
use carryon::browser::mock::{MockPage, MockPageConfig};
use carryon::session::{capture_session, restore_session};
use carryon::snapshot::{load_snapshot, save_snapshot};
use carryon::storage::{capture_databases, MemoryStorageBridge, RestoreEngine, StoredValue};
use serde_json::json;
use tempfile::TempDir;

/// Test that databases captured from one bridge replay into another with
/// identical contents.
#[tokio::test]
async fn test_database_round_trip_preserves_contents() {
    let source = seeded_bridge();
    source.seed_store(
        "auth-db",
        "tokens",
        None,
        &[("access", StoredValue::Text("opaque token".to_string()))],
    );

    let dumps = capture_databases(&source).await.unwrap();
    assert_eq!(dumps.len(), 2, "every database should produce a dump");

    let destination = MemoryStorageBridge::new();
    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &dumps)
        .await
        .unwrap();

    assert_eq!(report.databases, 2);
    assert_eq!(report.entries_applied, 3);
    assert!(report.store_failures.is_empty());

    assert_eq!(
        destination.store_entries("app-db", "items"),
        source.store_entries("app-db", "items")
    );
    assert_eq!(
        destination.store_entries("auth-db", "tokens"),
        source.store_entries("auth-db", "tokens")
    );

    // Both sides released their connections.
    assert_eq!(source.open_connection_count(), 0);
    assert_eq!(destination.open_connection_count(), 0);
}

/// Test that values which are not valid JSON survive the round trip as
/// plain text, byte for byte.
#[tokio::test]
async fn test_non_json_text_survives_unchanged() {
    let source = MemoryStorageBridge::new();
    source.seed_store(
        "app-db",
        "blobs",
        None,
        &[("k", StoredValue::Text("not{json".to_string()))],
    );

    let dumps = capture_databases(&source).await.unwrap();

    let destination = MemoryStorageBridge::new();
    let page = MockPage::new();
    RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &dumps)
        .await
        .unwrap();

    let entries = destination.store_entries("app-db", "blobs").unwrap();
    assert_eq!(entries["k"], StoredValue::Text("not{json".to_string()));
}

/// Test a full session round trip: capture from a scripted page, persist
/// the snapshot to disk, load it back, and replay it into a second page.
#[tokio::test]
async fn test_session_round_trip_through_snapshot_file() {
    let capture_page = MockPage::new().with_config(
        MockPageConfig::default()
            .with_url("https://app.example.com/")
            .with_cookies(vec![session_cookie("sid", "abc123")])
            .with_evaluations(vec![
                // localStorage read
                json!({"ok": true, "value": {
                    "origin": "https://app.example.com",
                    "localStorage": [{"name": "theme", "value": "dark"}],
                }}),
                // database listing
                json!({"ok": true, "value": [{"name": "app-db", "version": 1}]}),
                // open at the reported version
                json!({"ok": true, "value": {
                    "version": 1,
                    "stores": [{"name": "items", "keyPath": null}],
                }}),
                // store read
                json!({"ok": true, "value": {
                    "1": {"kind": "json", "data": "a"},
                    "2": {"kind": "json", "data": {"x": 1}},
                }}),
                // close
                json!({"ok": true, "value": true}),
            ]),
    );

    let snapshot = capture_session(&capture_page).await.unwrap();
    assert_eq!(snapshot.idbs_url, "https://app.example.com/");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    save_snapshot(&path, &snapshot).unwrap();
    let loaded = load_snapshot(&path).unwrap();
    assert_eq!(loaded, snapshot, "snapshot should survive disk unchanged");

    let restore_page = MockPage::new().with_config(MockPageConfig::default().with_evaluations(vec![
        // localStorage write
        json!({"ok": true, "value": 1}),
        // probe open of app-db
        json!({"ok": true, "value": {
            "version": 1,
            "stores": [{"name": "items", "keyPath": null}],
        }}),
        // store write
        json!({"ok": true, "value": {"applied": 2, "errors": []}}),
        // drain close of the probe connection
        json!({"ok": true, "value": true}),
    ]));

    let outcome = restore_session(&restore_page, &loaded, fast_options())
        .await
        .unwrap();

    assert_eq!(outcome.cookies_applied, 1);
    assert_eq!(outcome.origins_applied, 1);
    assert_eq!(outcome.storage_items_applied, 1);

    let report = outcome.report.unwrap();
    assert_eq!(report.attempts, 1);
    assert_eq!(report.entries_applied, 2);
    assert!(report.store_failures.is_empty());

    assert_eq!(restore_page.cookie_writes(), vec![snapshot.cookies.clone()]);
    assert_eq!(
        restore_page.navigations(),
        vec![
            "https://app.example.com".to_string(),
            "https://app.example.com/".to_string(),
        ]
    );
    assert_eq!(restore_page.reload_count(), 1);
}

/// Test that a page with no stored state captures to an empty snapshot
/// and that restoring it touches nothing.
#[tokio::test]
async fn test_empty_session_round_trips_to_a_no_op() {
    let capture_page = MockPage::new().with_config(MockPageConfig::default().with_evaluations(vec![
        json!({"ok": true, "value": {"origin": "https://app.example.com", "localStorage": []}}),
        json!({"ok": true, "value": []}),
    ]));

    let snapshot = capture_session(&capture_page).await.unwrap();
    assert!(snapshot.cookies.is_empty());
    assert!(snapshot.origins.is_empty());
    assert!(snapshot.idbs.is_empty());

    let restore_page = MockPage::new();
    let outcome = restore_session(&restore_page, &snapshot, fast_options())
        .await
        .unwrap();

    assert_eq!(outcome.cookies_applied, 0);
    assert!(outcome.report.is_none());
    assert!(restore_page.navigations().is_empty());
    assert!(restore_page.cookie_writes().is_empty());
    assert_eq!(restore_page.reload_count(), 0);
}
