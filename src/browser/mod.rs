//! Browser boundary: page driver trait, Chrome implementation, mock

pub mod chrome;
pub mod mock;
pub mod page;

pub use chrome::{default_executable, ChromeSession, LaunchOptions};
pub use page::{BrowserError, PageDriver};
