//! Config commands.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;
use dialoguer::{Input, Select};

use gala_core::config::{AppConfig, ConfigHandle, IdentityConfig};
use gala_core::error::{GalaError, GalaResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration.
    Show,
    /// Get a setting value by key path.
    Get {
        /// Setting key path (e.g., "server.endpoint", "reconnect.max_retries").
        key: String,
    },
    /// Set a setting value by key path and save.
    Set {
        /// Setting key path (e.g., "server.endpoint", "reconnect.max_retries").
        key: String,
        /// New value.
        value: String,
    },
    /// Create a configuration file interactively.
    Init,
}

fn get_setting_value(cfg: &AppConfig, key: &str) -> Option<String> {
    match key {
        "server.endpoint" => Some(cfg.server.endpoint.clone()),
        "server.token_url" => Some(cfg.server.token_url.clone()),
        "server.token_credential" => Some(
            cfg.server
                .token_credential
                .as_ref()
                .map(|_| "********".to_string())
                .unwrap_or_default(),
        ),
        "server.connect_timeout_ms" => Some(cfg.server.connect_timeout_ms.to_string()),
        "identity.sender_id" => cfg.identity.as_ref().map(|i| i.sender_id.clone()),
        "identity.sender_type" => cfg.identity.as_ref().map(|i| i.sender_type.clone()),
        "reconnect.max_retries" => Some(cfg.reconnect.max_retries.to_string()),
        "reconnect.delay_secs" => Some(cfg.reconnect.delay_secs.to_string()),
        "pagination.chat_page_size" => Some(cfg.pagination.chat_page_size.to_string()),
        "pagination.message_page_size" => Some(cfg.pagination.message_page_size.to_string()),
        "logging.level" => Some(cfg.logging.level.clone()),
        "logging.directory" => Some(cfg.logging.directory.clone()),
        "logging.json_output" => Some(cfg.logging.json_output.to_string()),
        _ => None,
    }
}

fn identity_mut(cfg: &mut AppConfig) -> &mut IdentityConfig {
    cfg.identity.get_or_insert_with(|| IdentityConfig {
        sender_id: String::new(),
        sender_type: "CLIENT".to_string(),
    })
}

fn set_setting_value(cfg: &mut AppConfig, key: &str, value: &str) -> Result<(), String> {
    match key {
        "server.endpoint" => cfg.server.endpoint = AppConfig::sanitize_endpoint(value),
        "server.token_url" => cfg.server.token_url = value.trim().to_string(),
        "server.token_credential" => {
            cfg.server.token_credential = Some(value.to_string()).filter(|v| !v.is_empty());
        }
        "server.connect_timeout_ms" => {
            cfg.server.connect_timeout_ms = value.parse().map_err(|_| "invalid integer".to_string())?;
        }
        "identity.sender_id" => identity_mut(cfg).sender_id = value.trim().to_string(),
        "identity.sender_type" => {
            let v = value.trim().to_uppercase();
            if !matches!(v.as_str(), "CLIENT" | "VENDOR") {
                return Err("expected CLIENT or VENDOR".to_string());
            }
            identity_mut(cfg).sender_type = v;
        }
        "reconnect.max_retries" => {
            cfg.reconnect.max_retries = value.parse().map_err(|_| "invalid integer".to_string())?;
        }
        "reconnect.delay_secs" => {
            cfg.reconnect.delay_secs = value.parse().map_err(|_| "invalid integer".to_string())?;
        }
        "pagination.chat_page_size" => {
            cfg.pagination.chat_page_size = value.parse().map_err(|_| "invalid integer".to_string())?;
        }
        "pagination.message_page_size" => {
            cfg.pagination.message_page_size = value.parse().map_err(|_| "invalid integer".to_string())?;
        }
        "logging.level" => {
            let v = value.to_lowercase();
            if !["trace", "debug", "info", "warn", "error"].contains(&v.as_str()) {
                return Err("expected one of: trace, debug, info, warn, error".to_string());
            }
            cfg.logging.level = v;
        }
        "logging.directory" => cfg.logging.directory = value.to_string(),
        "logging.json_output" => {
            cfg.logging.json_output = value.parse().map_err(|_| "expected true/false".to_string())?;
        }
        _ => return Err(format!("unknown setting: {key}")),
    }
    Ok(())
}

fn prompt_error(e: dialoguer::Error) -> GalaError {
    GalaError::Internal(e.to_string())
}

fn prompt_config(mut cfg: AppConfig) -> GalaResult<AppConfig> {
    let endpoint: String = Input::new()
        .with_prompt("Socket endpoint")
        .with_initial_text(cfg.server.endpoint.clone())
        .interact_text()
        .map_err(prompt_error)?;
    cfg.server.endpoint = AppConfig::sanitize_endpoint(&endpoint);

    let token_url: String = Input::new()
        .with_prompt("Token URL (empty to pass --token)")
        .with_initial_text(cfg.server.token_url.clone())
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_error)?;
    cfg.server.token_url = token_url.trim().to_string();

    let current = cfg.identity.clone();
    let sender_id: String = Input::new()
        .with_prompt("Sender id")
        .with_initial_text(current.as_ref().map(|i| i.sender_id.clone()).unwrap_or_default())
        .interact_text()
        .map_err(prompt_error)?;
    let roles = ["CLIENT", "VENDOR"];
    let default_role = current
        .as_ref()
        .and_then(|i| roles.iter().position(|r| *r == i.sender_type))
        .unwrap_or(0);
    let role = Select::new()
        .with_prompt("Sender type")
        .items(&roles)
        .default(default_role)
        .interact()
        .map_err(prompt_error)?;
    cfg.identity = Some(IdentityConfig {
        sender_id: sender_id.trim().to_string(),
        sender_type: roles[role].to_string(),
    });

    cfg.validate()?;
    Ok(cfg)
}

pub async fn run(
    config: ConfigHandle,
    path: PathBuf,
    action: ConfigAction,
    format: OutputFormat,
) -> GalaResult<()> {
    match action {
        ConfigAction::Show => {
            let mut cfg = config.read().await.clone();
            if cfg.server.token_credential.is_some() {
                cfg.server.token_credential = Some("********".to_string());
            }
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&cfg)?);
                }
                OutputFormat::Text => {
                    println!("{} {}", style("Config file:").bold(), path.display());
                    println!();
                    let text = toml::to_string_pretty(&cfg)
                        .map_err(|e| GalaError::Config(format!("failed to render config: {e}")))?;
                    println!("{text}");
                }
            }
        }
        ConfigAction::Get { key } => {
            let cfg = config.read().await;
            match get_setting_value(&cfg, &key) {
                Some(value) => match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::json!({ "key": key, "value": value }));
                    }
                    OutputFormat::Text => println!("{value}"),
                },
                None => {
                    return Err(GalaError::InvalidRequest(format!("unknown or unset setting: {key}")));
                }
            }
        }
        ConfigAction::Set { key, value } => {
            let mut cfg = config.write().await;
            set_setting_value(&mut cfg, &key, &value).map_err(GalaError::Config)?;
            cfg.validate()?;
            cfg.save_to_file(&path)?;
            println!("  {} {key} updated in {}", style("OK").green(), path.display());
        }
        ConfigAction::Init => {
            let current = config.read().await.clone();
            let cfg = prompt_config(current)?;
            cfg.save_to_file(&path)?;
            *config.write().await = cfg;
            println!("  {} Config saved to {}", style("OK").green().bold(), path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get_round_trip() {
        let mut cfg = AppConfig::default();
        set_setting_value(&mut cfg, "server.endpoint", "https://chat.example.com/").unwrap();
        set_setting_value(&mut cfg, "identity.sender_id", "v-1").unwrap();
        set_setting_value(&mut cfg, "identity.sender_type", "vendor").unwrap();
        set_setting_value(&mut cfg, "reconnect.max_retries", "5").unwrap();

        assert_eq!(get_setting_value(&cfg, "server.endpoint").unwrap(), "wss://chat.example.com");
        assert_eq!(get_setting_value(&cfg, "identity.sender_type").unwrap(), "VENDOR");
        assert_eq!(get_setting_value(&cfg, "reconnect.max_retries").unwrap(), "5");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        assert!(set_setting_value(&mut cfg, "identity.sender_type", "ADMIN").is_err());
        assert!(set_setting_value(&mut cfg, "reconnect.delay_secs", "soon").is_err());
        assert!(set_setting_value(&mut cfg, "no.such.key", "1").is_err());
    }

    #[test]
    fn test_credential_is_masked() {
        let mut cfg = AppConfig::default();
        set_setting_value(&mut cfg, "server.token_credential", "secret").unwrap();
        assert_eq!(get_setting_value(&cfg, "server.token_credential").unwrap(), "********");
        assert!(get_setting_value(&cfg, "identity.sender_id").is_none());
    }
}
