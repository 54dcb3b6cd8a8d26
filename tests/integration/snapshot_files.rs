//! Integration tests for snapshot persistence
//!
//! Round trip snapshots through disk and pin the JSON field names other
//! tooling reads.

use super::common::fixtures::SAMPLE_SNAPSHOT;
use carryon::snapshot::{load_snapshot, save_snapshot, SnapshotError};
use tempfile::TempDir;

/// Test that a snapshot written to disk loads back identical.
#[test]
fn test_snapshot_survives_disk_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");

    save_snapshot(&path, &SAMPLE_SNAPSHOT).unwrap();
    let loaded = load_snapshot(&path).unwrap();

    assert_eq!(loaded, *SAMPLE_SNAPSHOT);
}

/// Test that saving creates missing parent directories.
#[test]
fn test_save_creates_parent_directories() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("deep").join("session.json");

    save_snapshot(&path, &SAMPLE_SNAPSHOT).unwrap();
    assert!(path.exists());
}

/// Test that the on-disk format keeps its camelCase field names.
#[test]
fn test_wire_format_field_names_are_stable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    save_snapshot(&path, &SAMPLE_SNAPSHOT).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

    assert!(value.get("idbsUrl").is_some());
    assert!(value["cookies"][0].get("httpOnly").is_some());
    assert!(value["cookies"][0].get("sameSite").is_some());
    assert!(value["origins"][0].get("localStorage").is_some());
    // Database dumps stay strings, one per database.
    assert!(value["idbs"]["app-db"].is_string());
}

/// Test that a minimal hand-written snapshot loads with field defaults
/// filled in.
#[test]
fn test_handwritten_snapshot_loads_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(
        &path,
        r#"{"cookies": [{"name": "sid", "value": "abc", "domain": ".example.com"}]}"#,
    )
    .unwrap();

    let snapshot = load_snapshot(&path).unwrap();
    assert_eq!(snapshot.cookies.len(), 1);
    assert_eq!(snapshot.cookies[0].path, "/");
    assert!(snapshot.cookies[0].is_session());
    assert!(snapshot.origins.is_empty());
    assert!(snapshot.idbs.is_empty());
}

/// Test that a missing file is a read error, not an empty snapshot.
#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_snapshot(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, SnapshotError::Read { .. }));
}

/// Test that corrupt JSON is reported as malformed with the path.
#[test]
fn test_corrupt_file_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    std::fs::write(&path, "not a snapshot").unwrap();

    let err = load_snapshot(&path).unwrap_err();
    assert!(matches!(err, SnapshotError::Parse { .. }));
    assert!(err.to_string().contains("session.json"));
}
