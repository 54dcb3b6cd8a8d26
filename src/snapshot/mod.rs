//! Session snapshot: data model and file persistence

pub mod file;
pub mod model;

pub use file::{load_snapshot, save_snapshot, SnapshotError};
pub use model::{CookieRecord, OriginState, Snapshot, StorageItem};
