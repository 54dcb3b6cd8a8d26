pub mod browser;
pub mod cli;
pub mod config;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod util;

pub use browser::{ChromeSession, LaunchOptions, PageDriver};
pub use config::Config;
pub use session::{capture_session, restore_session, RestoreOutcome, SessionError};
pub use snapshot::{load_snapshot, save_snapshot, Snapshot};
pub use storage::{
    DatabaseDump, MemoryStorageBridge, RestoreEngine, RestoreOptions, RestoreReport, StorageBridge,
    StoredValue, WebStorageBridge,
};
