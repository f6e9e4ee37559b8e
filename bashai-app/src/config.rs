use anyhow::{bail, Context, Result};
use bashai_core::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = ".bashai_config.json";
pub const DEFAULT_SERVER_URL: &str = "http://84.247.164.54:8000/";

/// User settings persisted at `~/.bashai_config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub max_history: usize,
    pub safe_mode: bool,
    pub auto_execute: bool,
    pub max_retries: u32,
    pub execution_timeout_secs: u64,
    pub request_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// YAML danger-pattern policy merged with or replacing the defaults.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            max_history: 100,
            safe_mode: true,
            auto_execute: false,
            max_retries: 3,
            execution_timeout_secs: 60,
            request_timeout_secs: 60,
            api_key: None,
            model: None,
            policy_file: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(CONFIG_FILE_NAME))
    }

    pub fn history_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".bashai").join("history.json"))
    }

    /// Missing file gives defaults; an unreadable or corrupted one is
    /// reported and replaced by defaults for this run.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let parsed = std::fs::read_to_string(path)
            .context("Failed to read config file")
            .and_then(|content| serde_json::from_str::<Self>(&content).context("Failed to parse config file"));

        match parsed {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config at {:?}: {:#}", path, e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply `BASHAI_SERVER_URL`, `BASHAI_API_KEY` and `BASHAI_MODEL`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = lookup("BASHAI_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(key) = lookup("BASHAI_API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("BASHAI_MODEL") {
            self.model = Some(model);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.server_url.trim();
        if url.is_empty() {
            bail!("server_url must not be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            bail!("server_url must start with http:// or https://, got '{}'", url);
        }
        if self.execution_timeout_secs == 0 {
            bail!("execution_timeout_secs must be greater than zero");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be greater than zero");
        }
        Ok(())
    }

    /// Update one setting from its textual form, as used by `config set`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let optional = |v: &str| {
            let v = v.trim();
            (!v.is_empty() && v != "none").then(|| v.to_string())
        };

        match key {
            "server_url" => self.server_url = value.trim().to_string(),
            "max_history" => self.max_history = parse_number(key, value)?,
            "safe_mode" => self.safe_mode = parse_bool(key, value)?,
            "auto_execute" => self.auto_execute = parse_bool(key, value)?,
            "max_retries" => self.max_retries = parse_number(key, value)?,
            "execution_timeout_secs" => self.execution_timeout_secs = parse_number(key, value)?,
            "request_timeout_secs" => self.request_timeout_secs = parse_number(key, value)?,
            "api_key" => self.api_key = optional(value),
            "model" => self.model = optional(value),
            "policy_file" => self.policy_file = optional(value).map(PathBuf::from),
            other => bail!("Unknown config key '{}'", other),
        }
        self.validate()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            auto_execute: self.auto_execute,
            safe_mode: self.safe_mode,
            max_retries: self.max_retries,
            execution_timeout: Duration::from_secs(self.execution_timeout_secs),
            ..EngineConfig::default()
        }
    }

    /// JSON for `config show`, with the API key masked.
    pub fn display_json(&self) -> Result<String> {
        let mut shown = self.clone();
        if let Some(key) = &shown.api_key {
            let visible: String = key.chars().take(4).collect();
            shown.api_key = Some(format!("{}****", visible));
        }
        Ok(serde_json::to_string_pretty(&shown)?)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => bail!("{} expects true/false, got '{}'", key, other),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} expects a non-negative number, got '{}'", key, value.trim()))
}
