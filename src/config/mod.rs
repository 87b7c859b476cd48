// Re-exports so callers can "use crate::config::*".
pub mod api;
pub mod config;
pub mod logging;
pub mod storage;

pub use api::*;
pub use config::*;
pub use logging::*;
pub use storage::*;
