//! Per-user directories.
//!
//! `GALA_HOME`, when set and non-empty, replaces both the data and the
//! config root. Useful for running several identities side by side.

use std::path::PathBuf;

use crate::constants::APP_NAME;
use crate::error::{GalaError, GalaResult};

/// Environment variable overriding every Gala directory root.
pub const HOME_ENV: &str = "GALA_HOME";

/// Directory resolution for the current user.
pub struct Platform;

impl Platform {
    fn resolve(base: Option<PathBuf>, kind: &str) -> GalaResult<PathBuf> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(home));
        }
        base.map(|b| b.join(APP_NAME))
            .ok_or_else(|| GalaError::Config(format!("could not determine {kind} directory")))
    }

    /// Application data directory.
    ///
    /// - Windows: `%APPDATA%/Gala`
    /// - macOS: `~/Library/Application Support/Gala`
    /// - Linux: `~/.local/share/Gala`
    pub fn data_dir() -> GalaResult<PathBuf> {
        Self::resolve(dirs::data_dir(), "data")
    }

    /// Directory holding `config.toml`.
    pub fn config_dir() -> GalaResult<PathBuf> {
        Self::resolve(dirs::config_dir(), "config")
    }

    /// Default directory for rolling log files.
    pub fn log_dir() -> GalaResult<PathBuf> {
        Ok(Self::data_dir()?.join("logs"))
    }
}
