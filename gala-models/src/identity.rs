//! Sender identity bound to a socket session.

use serde::{Deserialize, Serialize};

use gala_core::config::IdentityConfig;
use gala_core::error::{GalaError, GalaResult};

/// Role a sender acts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderType {
    Client,
    Vendor,
}

impl SenderType {
    /// Wire string for this role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Vendor => "VENDOR",
        }
    }

    /// Parse a wire string, case-insensitively.
    pub fn parse(s: &str) -> GalaResult<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Self::Client),
            "VENDOR" => Ok(Self::Vendor),
            other => Err(GalaError::InvalidRequest(format!("unknown sender type: {other}"))),
        }
    }
}

impl std::fmt::Display for SenderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A (senderId, senderType) pair. Every request envelope carries one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub sender_id: String,
    pub sender_type: SenderType,
}

impl Identity {
    pub fn new(sender_id: impl Into<String>, sender_type: SenderType) -> Self {
        Self {
            sender_id: sender_id.into(),
            sender_type,
        }
    }

    pub fn client(sender_id: impl Into<String>) -> Self {
        Self::new(sender_id, SenderType::Client)
    }

    pub fn vendor(sender_id: impl Into<String>) -> Self {
        Self::new(sender_id, SenderType::Vendor)
    }

    /// Build an identity from the `[identity]` config section.
    pub fn from_config(config: &IdentityConfig) -> GalaResult<Self> {
        if config.sender_id.trim().is_empty() {
            return Err(GalaError::MissingConfig("identity.sender_id".into()));
        }
        Ok(Self::new(
            config.sender_id.trim(),
            SenderType::parse(&config.sender_type)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_type_wire_format() {
        assert_eq!(serde_json::to_string(&SenderType::Vendor).unwrap(), "\"VENDOR\"");
        let parsed: SenderType = serde_json::from_str("\"CLIENT\"").unwrap();
        assert_eq!(parsed, SenderType::Client);
    }

    #[test]
    fn test_sender_type_parse() {
        assert_eq!(SenderType::parse("vendor").unwrap(), SenderType::Vendor);
        assert!(SenderType::parse("admin").is_err());
    }

    #[test]
    fn test_identity_from_config() {
        let config = IdentityConfig {
            sender_id: " client-7 ".into(),
            sender_type: "CLIENT".into(),
        };
        let identity = Identity::from_config(&config).unwrap();
        assert_eq!(identity, Identity::client("client-7"));

        let empty = IdentityConfig {
            sender_id: "".into(),
            sender_type: "CLIENT".into(),
        };
        assert!(Identity::from_config(&empty).is_err());
    }
}
