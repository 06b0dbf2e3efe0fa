//! Application configuration management.
//!
//! This module handles loading and saving the client configuration, which
//! includes the dashboard server URL, the last used username and the list of
//! cross-server targets (remote dashboards reached with an API key).
//!
//! Configuration is stored at `~/.config/wgdash/config.json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::RemoteTarget;

/// Application name used for the config directory path
const APP_NAME: &str = "wgdash";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Server URL used when none is configured. 10086 is the dashboard's default port.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:10086";

/// A remote dashboard reachable with an API key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossServer {
    #[serde(default)]
    pub host: String,
    #[serde(default, rename = "apiKey")]
    pub api_key: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CrossServerConfiguration {
    #[serde(default)]
    pub enable: bool,
    #[serde(default)]
    pub server_list: BTreeMap<String, CrossServer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server_url: Option<String>,
    pub last_username: Option<String>,
    #[serde(default, rename = "CrossServerConfiguration")]
    pub cross_server: CrossServerConfiguration,
    #[serde(default, rename = "ActiveCrossServerConfiguration")]
    pub active_server: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    // ===== Cross-server targets =====

    /// Add an empty cross-server entry and return its key.
    pub fn add_cross_server(&mut self) -> String {
        let key = Uuid::new_v4().to_string();
        self.cross_server
            .server_list
            .insert(key.clone(), CrossServer::default());
        key
    }

    pub fn delete_cross_server(&mut self, key: &str) -> Option<CrossServer> {
        if self.active_server.as_deref() == Some(key) {
            self.active_server = None;
        }
        self.cross_server.server_list.remove(key)
    }

    pub fn set_active_cross_server(&mut self, key: &str) -> Result<()> {
        if !self.cross_server.server_list.contains_key(key) {
            anyhow::bail!("Unknown cross-server: {}", key);
        }
        for (k, server) in self.cross_server.server_list.iter_mut() {
            server.active = k == key;
        }
        self.active_server = Some(key.to_string());
        Ok(())
    }

    pub fn remove_active_cross_server(&mut self) {
        for server in self.cross_server.server_list.values_mut() {
            server.active = false;
        }
        self.active_server = None;
    }

    pub fn active_cross_server(&self) -> Option<&CrossServer> {
        self.active_server
            .as_ref()
            .and_then(|key| self.cross_server.server_list.get(key))
    }

    /// The request target for the active cross-server, if any.
    pub fn remote_target(&self) -> Option<RemoteTarget> {
        self.active_cross_server()
            .filter(|server| !server.host.is_empty())
            .map(|server| RemoteTarget {
                host: server.host.clone(),
                api_key: server.api_key.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::load_from(&dir.path().join("missing.json")).expect("load config");
        assert_eq!(config.server_url(), DEFAULT_SERVER_URL);
        assert!(config.remote_target().is_none());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config {
            server_url: Some("https://vpn.example.org".to_string()),
            last_username: Some("admin".to_string()),
            ..Config::default()
        };
        let key = config.add_cross_server();
        if let Some(server) = config.cross_server.server_list.get_mut(&key) {
            server.host = "https://remote.example.org".to_string();
            server.api_key = "k-123".to_string();
        }
        config.set_active_cross_server(&key).expect("activate server");
        config.save_to(&path).expect("save config");

        let loaded = Config::load_from(&path).expect("reload config");
        assert_eq!(loaded.server_url(), "https://vpn.example.org");
        assert_eq!(
            loaded.remote_target(),
            Some(RemoteTarget {
                host: "https://remote.example.org".to_string(),
                api_key: "k-123".to_string(),
            })
        );

        let raw = std::fs::read_to_string(&path).expect("read config");
        assert!(raw.contains("\"ServerList\""));
        assert!(raw.contains("\"apiKey\""));
    }

    #[test]
    fn test_active_server_lifecycle() {
        let mut config = Config::default();
        assert!(config.set_active_cross_server("nope").is_err());

        let first = config.add_cross_server();
        let second = config.add_cross_server();
        config.set_active_cross_server(&first).expect("activate first");
        config.set_active_cross_server(&second).expect("activate second");
        assert!(!config.cross_server.server_list[&first].active);
        assert!(config.cross_server.server_list[&second].active);

        // Empty host is not a usable target yet
        assert!(config.remote_target().is_none());

        config.delete_cross_server(&second);
        assert_eq!(config.active_server, None);

        config.set_active_cross_server(&first).expect("activate first");
        config.remove_active_cross_server();
        assert!(config.active_cross_server().is_none());
    }
}
