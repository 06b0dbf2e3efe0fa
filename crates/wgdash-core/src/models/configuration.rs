//! WireGuard/AmneziaWG interface configurations as reported by the server.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Tunnel protocol of a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Wg,
    Awg,
}

impl Protocol {
    pub fn display_name(&self) -> &'static str {
        match self {
            Protocol::Wg => "WireGuard",
            Protocol::Awg => "AmneziaWG",
        }
    }
}

/// Cumulative traffic in GB across a configuration's peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DataUsage {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub sent: f64,
    #[serde(default)]
    pub receive: f64,
}

/// One entry of `/api/getConfigurations`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WireguardConfiguration {
    pub name: String,
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "port_from_string_or_number")]
    pub listen_port: Option<String>,
    #[serde(default)]
    pub data_usage: DataUsage,
    #[serde(default)]
    pub connected_peers: u32,
    #[serde(default)]
    pub total_peers: u32,
    #[serde(default)]
    pub protocol: Protocol,
}

impl WireguardConfiguration {
    pub fn status_display(&self) -> &'static str {
        if self.status {
            "running"
        } else {
            "stopped"
        }
    }

    pub fn peers_display(&self) -> String {
        format!("{}/{}", self.connected_peers, self.total_peers)
    }
}

/// Listen ports come back as strings from config files and as numbers elsewhere.
fn port_from_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// One message of `/api/config-status-stream`: running flag per configuration name.
pub type ConfigStatusSnapshot = BTreeMap<String, bool>;
