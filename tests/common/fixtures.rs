//! Fixtures shared across the integration tests
//!
//! The canonical dump is one database (`app-db`) with one keyless store
//! (`items`) holding a JSON string under key "1" and an object under
//! key "2". Most restore tests replay it against differently prepared
//! destinations.

use std::collections::BTreeMap;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde_json::json;

use carryon::snapshot::{CookieRecord, OriginState, Snapshot, StorageItem};
use carryon::storage::{DatabaseDump, MemoryStorageBridge, RestoreOptions, StoreDump, StoredValue};

/// The canonical database dump.
pub static WORKED_DUMP: Lazy<DatabaseDump> = Lazy::new(|| {
    let mut dump = DatabaseDump::new("app-db", 1);
    let mut items = StoreDump::new();
    items.insert("1".to_string(), StoredValue::Json(json!("a")));
    items.insert("2".to_string(), StoredValue::Json(json!({"x": 1})));
    dump.stores.insert("items".to_string(), items);
    dump
});

/// Snapshot carrying one session cookie, one origin with one localStorage
/// item, and the canonical dump.
pub static SAMPLE_SNAPSHOT: Lazy<Snapshot> = Lazy::new(|| {
    let mut snapshot = Snapshot {
        cookies: vec![session_cookie("sid", "abc123")],
        origins: vec![OriginState {
            origin: "https://app.example.com".to_string(),
            local_storage: vec![StorageItem {
                name: "theme".to_string(),
                value: "dark".to_string(),
            }],
        }],
        ..Snapshot::default()
    };
    snapshot.idbs.insert(
        "app-db".to_string(),
        WORKED_DUMP.encode().expect("fixture dump encodes"),
    );
    snapshot.idbs_url = "https://app.example.com/".to_string();
    snapshot
});

/// Session cookie scoped to `.example.com`.
pub fn session_cookie(name: &str, value: &str) -> CookieRecord {
    CookieRecord {
        name: name.to_string(),
        value: value.to_string(),
        domain: ".example.com".to_string(),
        path: "/".to_string(),
        expires: -1.0,
        http_only: true,
        secure: true,
        same_site: Some("Lax".to_string()),
    }
}

/// In-memory bridge already holding the canonical dump's contents.
pub fn seeded_bridge() -> MemoryStorageBridge {
    let bridge = MemoryStorageBridge::new();
    bridge.seed_store(
        "app-db",
        "items",
        None,
        &[
            ("1", StoredValue::Json(json!("a"))),
            ("2", StoredValue::Json(json!({"x": 1}))),
        ],
    );
    bridge
}

/// The canonical dump keyed the way a snapshot carries it.
pub fn worked_dumps() -> BTreeMap<String, String> {
    let mut dumps = BTreeMap::new();
    dumps.insert(
        "app-db".to_string(),
        WORKED_DUMP.encode().expect("fixture dump encodes"),
    );
    dumps
}

/// Retry options with a delay short enough for tests.
pub fn fast_options() -> RestoreOptions {
    RestoreOptions::default().with_retry_delay(Duration::from_millis(1))
}
