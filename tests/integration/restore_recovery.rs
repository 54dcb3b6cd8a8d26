//! Integration tests for restore retry and blocked-upgrade recovery
//!
//! Exercise the failure paths of the structured-storage engine: schema
//! drift resolved through version upgrades, bounded retries, connections
//! that refuse to cede, and stores that fail mid-write.

use std::time::Duration;

use super::common::fixtures::{fast_options, worked_dumps};
use carryon::browser::mock::{MockPage, MockPageConfig};
use carryon::storage::{
    DatabaseDump, MemoryConfig, MemoryStorageBridge, RestoreEngine, RestoreError, RestoreOptions,
    StoreDump, StoredValue,
};
use serde_json::json;

/// Test that a dump restored into a database missing its store triggers a
/// version upgrade that creates the store.
#[tokio::test]
async fn test_missing_store_is_created_through_an_upgrade() {
    let destination = MemoryStorageBridge::new();
    destination.seed_database("app-db", 1);

    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(report.stores_applied, 1);
    assert_eq!(destination.database_version("app-db"), Some(2));
    assert_eq!(destination.store_names("app-db"), vec!["items".to_string()]);

    // Created stores take the out-of-line key policy.
    assert_eq!(destination.store_key_path("app-db", "items"), Some(None));
    assert_eq!(destination.store_auto_increment("app-db", "items"), Some(true));
    assert_eq!(destination.store_entries("app-db", "items").unwrap().len(), 2);
}

/// Test that restoring into a database whose schema already matches
/// writes in place: no upgrade, and keys the dump does not mention stay.
#[tokio::test]
async fn test_matching_schema_keeps_version_and_foreign_keys() {
    let destination = MemoryStorageBridge::new();
    destination.seed_store(
        "app-db",
        "items",
        None,
        &[("9", StoredValue::Json(json!("keep")))],
    );

    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(destination.database_version("app-db"), Some(1));

    let entries = destination.store_entries("app-db", "items").unwrap();
    assert_eq!(
        entries.keys().cloned().collect::<Vec<_>>(),
        vec!["1".to_string(), "2".to_string(), "9".to_string()]
    );
    assert_eq!(entries["2"], StoredValue::Json(json!({"x": 1})));
}

/// Test that restoring the same dumps twice converges: the second pass
/// finds the schema in place and leaves the contents identical.
#[tokio::test]
async fn test_restore_twice_converges_to_the_same_contents() {
    let destination = MemoryStorageBridge::new();
    let page = MockPage::new();
    let dumps = worked_dumps();

    RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &dumps)
        .await
        .unwrap();
    let first_entries = destination.store_entries("app-db", "items").unwrap();
    let first_version = destination.database_version("app-db");

    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &dumps)
        .await
        .unwrap();

    assert!(report.store_failures.is_empty());
    assert_eq!(destination.store_entries("app-db", "items").unwrap(), first_entries);
    assert_eq!(destination.database_version("app-db"), first_version);
}

/// Test that a dump with no stores still materializes the database.
#[tokio::test]
async fn test_empty_database_dump_creates_the_database() {
    let source = MemoryStorageBridge::new();
    source.seed_database("empty-db", 3);
    let dumps = carryon::storage::capture_databases(&source).await.unwrap();

    let destination = MemoryStorageBridge::new();
    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &dumps)
        .await
        .unwrap();

    assert_eq!(report.databases, 1);
    assert_eq!(report.stores_applied, 0);
    assert!(destination.database_version("empty-db").is_some());
}

/// Test that attempts stop at the configured bound and the terminal error
/// wraps the last failure.
#[tokio::test]
async fn test_retries_stop_at_the_attempt_bound() {
    let page = MockPage::new().with_config(MockPageConfig::default().with_fail_all_navigations());
    let destination = MemoryStorageBridge::new();

    let err = RestoreEngine::new(&page, &destination)
        .with_options(RestoreOptions::default().with_retry_delay(Duration::from_millis(1)))
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap_err();

    match err {
        RestoreError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3, "default policy allows three attempts");
            assert!(matches!(*last, RestoreError::Navigate { .. }));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }

    assert_eq!(page.navigations().len(), 3);
    assert_eq!(page.reload_count(), 0, "failed attempts must not reload");
}

/// Test that a navigation failure on the first attempt is absorbed by the
/// retry policy.
#[tokio::test]
async fn test_transient_navigation_failure_recovers() {
    let page = MockPage::new().with_config(MockPageConfig::default().with_fail_navigations(1));
    let destination = MemoryStorageBridge::new();

    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap();

    assert_eq!(report.attempts, 2);
    assert_eq!(destination.store_entries("app-db", "items").unwrap().len(), 2);
}

/// Test that an upgrade blocked by this engine's own lingering probe
/// connection recovers within the attempt by closing it.
#[tokio::test]
async fn test_blocked_upgrade_recovers_by_closing_own_connections() {
    let destination =
        MemoryStorageBridge::new().with_config(MemoryConfig::default().with_stubborn_own_conns());
    destination.seed_database("app-db", 1);

    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap();

    assert_eq!(report.attempts, 1, "recovery happens inside the attempt");
    assert_eq!(destination.database_version("app-db"), Some(2));
    assert_eq!(destination.open_connection_count(), 0);
}

/// Test that a foreign holder which cedes after seeing one blocked open
/// lets the restore finish on the retried open.
#[tokio::test]
async fn test_foreign_holder_that_cedes_unblocks_the_upgrade() {
    let destination = MemoryStorageBridge::new()
        .with_config(MemoryConfig::default().with_holders_ceding_after_blocked());
    destination.seed_database("app-db", 1);
    destination.add_holder("app-db");

    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap();

    assert_eq!(report.attempts, 1);
    assert_eq!(destination.holder_count("app-db"), 0);
    assert_eq!(destination.database_version("app-db"), Some(2));
}

/// Test that a holder which never cedes exhausts the attempts with a
/// still-blocked error and leaves no engine connections behind.
#[tokio::test]
async fn test_unyielding_holder_exhausts_the_attempts() {
    let destination = MemoryStorageBridge::new();
    destination.seed_database("app-db", 1);
    destination.add_holder("app-db");

    let page = MockPage::new();
    let err = RestoreEngine::new(&page, &destination)
        .with_options(
            RestoreOptions::default()
                .with_max_attempts(2)
                .with_retry_delay(Duration::from_millis(1)),
        )
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap_err();

    match err {
        RestoreError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(matches!(*last, RestoreError::StillBlocked(_)));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert_eq!(destination.open_connection_count(), 0);
}

/// Test that one store failing to write does not stop the other stores
/// or databases, and the failure is reported.
#[tokio::test]
async fn test_store_failure_does_not_abort_the_rest() {
    let destination =
        MemoryStorageBridge::new().with_config(MemoryConfig::default().with_failing_write("thumbs"));
    destination.seed_store("app-db", "items", None, &[]);
    destination.seed_store("media-db", "thumbs", None, &[]);
    destination.seed_store("media-db", "meta", None, &[]);

    let mut dumps = worked_dumps();
    let mut media = DatabaseDump::new("media-db", 1);
    let mut thumbs = StoreDump::new();
    thumbs.insert("t1".to_string(), StoredValue::Json(json!("jpeg")));
    media.stores.insert("thumbs".to_string(), thumbs);
    let mut meta = StoreDump::new();
    meta.insert("m1".to_string(), StoredValue::Json(json!({"w": 64})));
    media.stores.insert("meta".to_string(), meta);
    dumps.insert("media-db".to_string(), media.encode().unwrap());

    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &dumps)
        .await
        .unwrap();

    assert_eq!(report.attempts, 1, "store failures are not retried");
    assert_eq!(report.databases, 2);
    assert_eq!(report.stores_applied, 2);
    assert_eq!(report.store_failures.len(), 1);
    assert_eq!(report.store_failures[0].database, "media-db");
    assert_eq!(report.store_failures[0].store, "thumbs");

    // Every other store still landed.
    assert_eq!(destination.store_entries("app-db", "items").unwrap().len(), 2);
    assert_eq!(destination.store_entries("media-db", "meta").unwrap().len(), 1);
    assert!(destination.store_entries("media-db", "thumbs").unwrap().is_empty());
}

/// Test that single items rejected inside an otherwise healthy write are
/// reported per key.
#[tokio::test]
async fn test_rejected_items_are_reported_per_key() {
    let destination = MemoryStorageBridge::new()
        .with_config(MemoryConfig::default().with_failing_item("items", "2"));
    destination.seed_store("app-db", "items", None, &[]);

    let page = MockPage::new();
    let report = RestoreEngine::new(&page, &destination)
        .with_options(fast_options())
        .restore("https://app.example.com/", &worked_dumps())
        .await
        .unwrap();

    assert_eq!(report.entries_applied, 1);
    assert_eq!(report.store_failures.len(), 1);
    assert!(report.store_failures[0].message.contains("key \"2\""));

    let entries = destination.store_entries("app-db", "items").unwrap();
    assert!(entries.contains_key("1"));
    assert!(!entries.contains_key("2"));
}
