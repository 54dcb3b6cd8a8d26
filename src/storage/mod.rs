//! Structured storage engine: capture and restore of versioned,
//! multi-store databases.

pub mod arena;
pub mod bridge;
pub mod capture;
pub mod dump;
pub mod memory;
pub mod restore;
pub(crate) mod scripts;
pub mod value;
pub mod web;

pub use arena::ConnectionArena;
pub use bridge::{
    ConnId, DatabaseInfo, ItemFailure, OpenOutcome, StorageBridge, StorageError, StoreInfo,
    WriteOutcome,
};
pub use capture::{capture_databases, CaptureError};
pub use dump::{DatabaseDump, StoreDump};
pub use memory::{MemoryConfig, MemoryStorageBridge};
pub use restore::{RestoreEngine, RestoreError, RestoreOptions, RestoreReport, StoreFailure};
pub use value::StoredValue;
pub use web::WebStorageBridge;
