//! Shiftdesk configuration system.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, ShiftdeskError};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftdeskConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub access: AccessConfig,
}

impl ShiftdeskConfig {
    /// Load config from the default path (~/.shiftdesk/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ShiftdeskError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ShiftdeskError::Config(format!("Failed to parse config: {e}")))
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ShiftdeskError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Shiftdesk home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shiftdesk")
    }
}

/// Expand `~` and environment variables in a configured path.
pub fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

/// SQLite store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> String { "~/.shiftdesk/shiftdesk.db".into() }
fn default_busy_timeout_ms() -> u64 { 5000 }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Advisory rule thresholds used by the conflict analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_overtime_threshold")]
    pub overtime_threshold_hours: f64,
    /// Look-back window for "recent load" annotations.
    #[serde(default = "default_recent_load_days")]
    pub recent_load_days: i64,
}

fn default_overtime_threshold() -> f64 { 40.0 }
fn default_recent_load_days() -> i64 { 28 }

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            overtime_threshold_hours: default_overtime_threshold(),
            recent_load_days: default_recent_load_days(),
        }
    }
}

/// Suggestion generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Base URL override, e.g. "http://localhost:11434/v1".
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_suggest_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_weekly_hours")]
    pub max_weekly_hours: f64,
    #[serde(default = "default_min_headcount")]
    pub min_headcount_per_shift: u32,
    /// Additional generators tried in order when the primary fails.
    #[serde(default)]
    pub fallbacks: Vec<GeneratorEndpoint>,
}

fn default_provider() -> String { "openai".into() }
fn default_model() -> String { "gpt-4o-mini".into() }
fn default_temperature() -> f32 { 0.2 }
fn default_max_tokens() -> u32 { 2048 }
fn default_suggest_timeout() -> u64 { 30 }
fn default_max_weekly_hours() -> f64 { 40.0 }
fn default_min_headcount() -> u32 { 1 }

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: String::new(),
            api_key: String::new(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_suggest_timeout(),
            max_weekly_hours: default_max_weekly_hours(),
            min_headcount_per_shift: default_min_headcount(),
            fallbacks: Vec::new(),
        }
    }
}

/// A secondary generator endpoint for failover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorEndpoint {
    pub provider: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Empty = log-only delivery.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default = "default_notify_timeout")]
    pub timeout_secs: u64,
}

fn default_notify_timeout() -> u64 { 10 }

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            headers: Vec::new(),
            timeout_secs: default_notify_timeout(),
        }
    }
}

/// Static capability grants used by the CLI caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "bool_true")]
    pub allow_all: bool,
    /// actor → capability names ("manage_schedule", "edit_slots", "publish", "suggest").
    #[serde(default)]
    pub grants: HashMap<String, Vec<String>>,
}

fn bool_true() -> bool { true }

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allow_all: true,
            grants: HashMap::new(),
        }
    }
}
