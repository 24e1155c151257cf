//! Configuration for peer sessions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A relay/reflexive (TURN/STUN) server descriptor.
///
/// Produced either from configuration or from a well-formed `TurnInfo`
/// signaling message. The list held by a session is always replaced as a
/// whole, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayServerConfig {
    /// Relay endpoint URIs (e.g. "stun:stun.l.google.com:19302")
    pub urls: Vec<String>,

    /// Long-term credential username, if the server requires one
    #[serde(default)]
    pub username: Option<String>,

    /// Long-term credential secret
    #[serde(default)]
    pub credential: Option<String>,
}

/// Static configuration for one peer session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Path of the signaling socket
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Named logical channels the session exposes, in binding-priority order
    #[serde(default)]
    pub channels: Vec<String>,

    /// Initial relay-server list; replaced in full by `TurnInfo` messages
    #[serde(default = "default_relay_servers")]
    pub relay_servers: Vec<RelayServerConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            channels: Vec::new(),
            relay_servers: default_relay_servers(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file; a missing file yields defaults.
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(SessionConfig::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        for (i, name) in self.channels.iter().enumerate() {
            if name.is_empty() {
                return Err("Channel names must be non-empty".into());
            }
            if self.channels[..i].contains(name) {
                return Err(format!("Duplicate channel name: {}", name).into());
            }
        }

        for server in &self.relay_servers {
            if server.urls.is_empty() {
                return Err("Relay server entries must carry at least one URL".into());
            }
        }

        Ok(())
    }
}

/// Default relay-server list: a single public STUN entry.
pub fn default_relay_servers() -> Vec<RelayServerConfig> {
    vec![RelayServerConfig {
        urls: vec!["stun:stun.l.google.com:19302".to_string()],
        username: None,
        credential: None,
    }]
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/var/run/rtc/signaling.sock")
}

#[cfg(test)]
mod tests {
    use super::SessionConfig;

    #[test]
    fn default_relay_list_is_single_stun_entry() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.relay_servers.len(), 1);
        assert_eq!(cfg.relay_servers[0].urls, vec!["stun:stun.l.google.com:19302"]);
        assert!(cfg.relay_servers[0].username.is_none());
    }

    #[test]
    fn validate_rejects_duplicate_channels() {
        let mut cfg = SessionConfig::default();
        cfg.channels = vec!["audio".to_string(), "audio".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_relay_urls() {
        let mut cfg = SessionConfig::default();
        cfg.relay_servers[0].urls.clear();
        assert!(cfg.validate().is_err());
    }
}
