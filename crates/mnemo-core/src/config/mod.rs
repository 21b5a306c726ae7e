//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Mnemo configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub sync: SyncConfig,
    pub session: SessionConfig,
}

/// Remote graph store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub base_url: String,
    /// Developer identity the graph is partitioned by
    pub user_id: Option<String>,
    pub timeout_secs: u64,
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub confidence_threshold: f64,
    pub freshness_hours: i64,
}

/// Session file location, relative to the project directory
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub dir_name: String,
    pub file_name: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.getzep.com/api/v2".to_string(),
            user_id: None,
            timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
            freshness_hours: 24,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir_name: ".mnemo".to_string(),
            file_name: "session.json".to_string(),
        }
    }
}

impl GraphConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("MNEMO_API_KEY")
            .or_else(|_| env::var("ZEP_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Graph API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }

    /// User id from the environment, falling back to the configured value
    pub fn resolved_user_id(&self) -> Option<String> {
        env::var("MNEMO_USER_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.user_id.clone())
    }
}

/// Mask all but the last four characters of a key
fn redact(key: &str) -> String {
    if key.chars().count() <= 4 {
        return "***".to_string();
    }
    let mut tail: Vec<char> = key.chars().rev().take(4).collect();
    tail.reverse();
    format!("***{}", tail.into_iter().collect::<String>())
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("MNEMO_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("mnemo")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or fall back to defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.graph.enforce_env_only()?;
        if !(0.0..=1.0).contains(&self.sync.confidence_threshold) {
            return Err(anyhow!("Confidence threshold must be between 0.0 and 1.0"));
        }
        if self.sync.freshness_hours <= 0 {
            return Err(anyhow!("Freshness window must be at least one hour"));
        }
        if self.session.file_name.trim().is_empty() {
            return Err(anyhow!("Session file name cannot be empty"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "graph.base_url" => Ok(self.graph.base_url.clone()),
            "graph.user_id" => Ok(self
                .graph
                .resolved_user_id()
                .unwrap_or_else(|| "(not set - use MNEMO_USER_ID env var)".to_string())),
            "graph.timeout_secs" => Ok(self.graph.timeout_secs.to_string()),

            "sync.confidence_threshold" => Ok(self.sync.confidence_threshold.to_string()),
            "sync.freshness_hours" => Ok(self.sync.freshness_hours.to_string()),

            "session.dir_name" => Ok(self.session.dir_name.clone()),
            "session.file_name" => Ok(self.session.file_name.clone()),

            "graph.api_key" | "api_key" => match self.graph.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok("(not set - use MNEMO_API_KEY or ZEP_API_KEY env var)".to_string()),
            },

            _ => Err(anyhow!("Unknown configuration key: {}", key)),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "graph.base_url" => {
                let trimmed = value.trim().trim_end_matches('/');
                if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                    return Err(anyhow!("Base URL must start with http:// or https://"));
                }
                self.graph.base_url = trimmed.to_string();
            }
            "graph.user_id" => {
                let trimmed = value.trim();
                self.graph.user_id = if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                };
            }
            "graph.timeout_secs" => {
                self.graph.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            "sync.confidence_threshold" => {
                let threshold: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid confidence_threshold value: {}", value))?;
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(anyhow!("Confidence threshold must be between 0.0 and 1.0"));
                }
                self.sync.confidence_threshold = threshold;
            }
            "sync.freshness_hours" => {
                let hours: i64 = value
                    .parse()
                    .with_context(|| format!("Invalid freshness_hours value: {}", value))?;
                if hours <= 0 {
                    return Err(anyhow!("Freshness window must be at least one hour"));
                }
                self.sync.freshness_hours = hours;
            }

            "session.dir_name" => {
                self.session.dir_name = value.trim().to_string();
            }
            "session.file_name" => {
                if value.trim().is_empty() {
                    return Err(anyhow!("Session file name cannot be empty"));
                }
                self.session.file_name = value.trim().to_string();
            }

            "graph.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the MNEMO_API_KEY environment variable instead."
                ));
            }

            _ => return Err(anyhow!("Unknown configuration key: {}", key)),
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = [
            "graph.base_url",
            "graph.user_id",
            "graph.timeout_secs",
            "graph.api_key",
            "sync.confidence_threshold",
            "sync.freshness_hours",
            "session.dir_name",
            "session.file_name",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.confidence_threshold, 0.6);
        assert_eq!(config.sync.freshness_hours, 24);
        assert_eq!(config.session.dir_name, ".mnemo");
        assert_eq!(config.session.file_name, "session.json");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("sync.confidence_threshold", "0.75").unwrap();
        config.set("sync.freshness_hours", "12").unwrap();
        config.set("graph.base_url", "http://localhost:8000/api/").unwrap();

        assert_eq!(config.get("sync.confidence_threshold").unwrap(), "0.75");
        assert_eq!(config.get("sync.freshness_hours").unwrap(), "12");
        assert_eq!(
            config.get("graph.base_url").unwrap(),
            "http://localhost:8000/api"
        );
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("sync.confidence_threshold", "1.5").is_err());
        assert!(config.set("sync.freshness_hours", "0").is_err());
        assert!(config.set("graph.base_url", "ftp://example.com").is_err());
        assert!(config.set("graph.api_key", "secret").is_err());
        assert!(config.set("nope", "x").is_err());
    }

    #[test]
    fn test_toml_roundtrip_skips_api_key() {
        let mut config = Config::default();
        config.graph.user_id = Some("dev-1".to_string());
        let text = toml::to_string_pretty(&config).unwrap();
        assert!(!text.contains("api_key"));

        let parsed = Config::from_toml(&text).unwrap();
        assert_eq!(parsed.graph.user_id.as_deref(), Some("dev-1"));
        assert_eq!(parsed.session.file_name, "session.json");
    }

    #[test]
    fn test_from_toml_validates() {
        let text = r#"
[graph]
base_url = "http://localhost:8000"
timeout_secs = 5

[sync]
confidence_threshold = 2.0
freshness_hours = 24

[session]
dir_name = ".mnemo"
file_name = "session.json"
"#;
        assert!(Config::from_toml(text).is_err());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = Config::from_toml("[sync]\nfreshness_hours = 6\n").unwrap();
        assert_eq!(config.sync.freshness_hours, 6);
        assert_eq!(config.sync.confidence_threshold, 0.6);
        assert_eq!(config.session.dir_name, ".mnemo");
        assert_eq!(config.graph.timeout_secs, 30);
    }

    #[test]
    fn test_api_key_must_come_from_env() {
        let mut config = Config::default();
        config.graph.api_key = Some("stored".to_string());
        assert!(config.validate().is_err());
        assert!(config.graph.resolved_api_key().is_err());
    }

    #[test]
    fn test_redact_keeps_last_four_chars() {
        assert_eq!(redact("abc"), "***");
        assert_eq!(redact("sk-123456"), "***3456");
        assert_eq!(redact("clé-secrète-ünïcødé"), "***cødé");
        assert_eq!(redact("ключ"), "***");
    }

    #[test]
    fn test_list_contains_all_keys() {
        let config = Config::default();
        let listed = config.list().unwrap();
        assert_eq!(listed.len(), 8);
        assert!(listed.iter().any(|(k, _)| k == "sync.freshness_hours"));
    }
}
