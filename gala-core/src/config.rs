//! `config.toml`: socket endpoint, token source, bound identity and
//! reconnect policy. Missing keys fall back to serde defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{GalaError, GalaResult};
use crate::platform::Platform;

/// Everything read from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Messaging server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity bound to the socket after every open.
    #[serde(default)]
    pub identity: Option<IdentityConfig>,

    /// Automatic reconnect behaviour.
    #[serde(default)]
    pub reconnect: ReconnectSettings,

    /// Page sizes for paginated streams.
    #[serde(default)]
    pub pagination: PaginationConfig,

    /// Log level, directory and format.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Messaging server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// WebSocket endpoint (e.g., "wss://chat.example.com/ws").
    #[serde(default)]
    pub endpoint: String,

    /// URL the HTTP token provider fetches short-lived bearer tokens from.
    #[serde(default)]
    pub token_url: String,

    /// Credential presented to the token URL, if it requires one.
    #[serde(default)]
    pub token_credential: Option<String>,

    /// Socket connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Identity the socket registers as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Sender id known to the server.
    pub sender_id: String,

    /// "CLIENT" or "VENDOR".
    #[serde(default = "default_sender_type")]
    pub sender_type: String,
}

/// Reconnect configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Automatic attempts before the connection is declared timed out.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts, in seconds.
    #[serde(default = "default_reconnect_delay")]
    pub delay_secs: u64,
}

/// Pagination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Chats per chat-list page.
    #[serde(default = "default_chat_page_size")]
    pub chat_page_size: u32,

    /// Messages per history page.
    #[serde(default = "default_message_page_size")]
    pub message_page_size: u32,
}

/// Where and how log records are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file directory. Empty means `Platform::log_dir()`.
    #[serde(default)]
    pub directory: String,

    /// Write the log file as JSON lines.
    #[serde(default)]
    pub json_output: bool,
}

// serde defaults

fn default_connect_timeout() -> u64 {
    constants::DEFAULT_CONNECT_TIMEOUT_MS
}

fn default_sender_type() -> String {
    "CLIENT".to_string()
}

fn default_max_retries() -> u32 {
    constants::MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_delay() -> u64 {
    constants::RECONNECT_DELAY_SECS
}

fn default_chat_page_size() -> u32 {
    constants::DEFAULT_CHAT_PAGE_SIZE
}

fn default_message_page_size() -> u32 {
    constants::DEFAULT_MESSAGE_PAGE_SIZE
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token_url: String::new(),
            token_credential: None,
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_secs: default_reconnect_delay(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            chat_page_size: default_chat_page_size(),
            message_page_size: default_message_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Reads `config.toml` from the config dir, or returns defaults when absent.
    pub fn load_default() -> GalaResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parses, sanitizes and validates the file at `path`.
    pub fn load_from_file(path: &Path) -> GalaResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: AppConfig = toml::from_str(&contents)?;
        config.server.endpoint = Self::sanitize_endpoint(&config.server.endpoint);
        config.validate()?;
        Ok(config)
    }

    /// Writes TOML to `path`, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> GalaResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| GalaError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// `<config dir>/config.toml`.
    pub fn default_config_path() -> GalaResult<PathBuf> {
        let config_dir = Platform::config_dir()?;
        Ok(config_dir.join("config.toml"))
    }

    /// The configured log directory, or the platform default when unset.
    pub fn effective_log_dir(&self) -> GalaResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Platform::log_dir()
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Check whether a socket endpoint is configured.
    pub fn is_server_configured(&self) -> bool {
        !self.server.endpoint.is_empty()
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> GalaResult<()> {
        let timeout = self.server.connect_timeout_ms;
        if timeout == 0 || timeout > constants::MAX_CONNECT_TIMEOUT_MS {
            return Err(GalaError::Config(format!(
                "server.connect_timeout_ms must be between 1 and {}, got {timeout}",
                constants::MAX_CONNECT_TIMEOUT_MS
            )));
        }
        let retries = self.reconnect.max_retries;
        if retries == 0 || retries > constants::MAX_RECONNECT_ATTEMPTS_LIMIT {
            return Err(GalaError::Config(format!(
                "reconnect.max_retries must be between 1 and {}, got {retries}",
                constants::MAX_RECONNECT_ATTEMPTS_LIMIT
            )));
        }
        if self.reconnect.delay_secs > constants::MAX_RECONNECT_DELAY_SECS {
            return Err(GalaError::Config(format!(
                "reconnect.delay_secs must be at most {}",
                constants::MAX_RECONNECT_DELAY_SECS
            )));
        }
        if self.pagination.chat_page_size == 0 || self.pagination.message_page_size == 0 {
            return Err(GalaError::Config("page sizes must be greater than zero".into()));
        }
        if let Some(identity) = &self.identity {
            if identity.sender_id.trim().is_empty() {
                return Err(GalaError::Config("identity.sender_id is empty".into()));
            }
            if !matches!(identity.sender_type.as_str(), "CLIENT" | "VENDOR") {
                return Err(GalaError::Config(format!(
                    "identity.sender_type must be CLIENT or VENDOR, got {}",
                    identity.sender_type
                )));
            }
        }
        Ok(())
    }

    /// Sanitize and normalize a socket endpoint.
    ///
    /// Maps http(s) schemes to ws(s), defaults to `wss://` when no scheme
    /// is given, and strips trailing slashes.
    pub fn sanitize_endpoint(endpoint: &str) -> String {
        let trimmed = endpoint.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
            trimmed.to_string()
        } else {
            format!("wss://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Config shared between the CLI commands and the client.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
}

impl ConfigHandle {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }
}
