//! Per-peer traffic shaping types.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Queueing discipline used to shape an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerType {
    #[default]
    Htb,
    Hfsc,
    Cake,
}

impl SchedulerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulerType::Htb => "htb",
            SchedulerType::Hfsc => "hfsc",
            SchedulerType::Cake => "cake",
        }
    }
}

impl fmt::Display for SchedulerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SchedulerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "htb" => Ok(SchedulerType::Htb),
            "hfsc" => Ok(SchedulerType::Hfsc),
            "cake" => Ok(SchedulerType::Cake),
            other => Err(format!("Unknown scheduler type: {}", other)),
        }
    }
}

/// A missing, null or empty scheduler falls back to HTB.
fn scheduler_or_default<'de, D>(deserializer: D) -> Result<SchedulerType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(SchedulerType::default()),
        Some(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Upload/download limits of one peer, in Kb/s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerRateLimit {
    #[serde(default)]
    pub upload_rate: f64,
    #[serde(default)]
    pub download_rate: f64,
    #[serde(default, deserialize_with = "scheduler_or_default")]
    pub scheduler_type: SchedulerType,
}

impl PeerRateLimit {
    pub fn is_limited(&self) -> bool {
        self.upload_rate > 0.0 || self.download_rate > 0.0
    }
}

/// Scheduler currently applied to an interface. Locked once peers are shaped with it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceScheduler {
    #[serde(default, deserialize_with = "scheduler_or_default")]
    pub scheduler_type: SchedulerType,
    #[serde(default, deserialize_with = "bool_or_default")]
    pub locked: bool,
}

fn bool_or_default<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}
