//! Shared plumbing for the Gala crates: `GalaError`, `config.toml`
//! handling, tracing setup and per-user directories.

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod platform;

pub use config::AppConfig;
pub use error::{GalaError, GalaResult};
pub use logging::init_logging;
pub use platform::Platform;
