use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const BASE_URL_ENV: &str = "INVCTL_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub notifications: NotificationSettings,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            polling: PollingSettings::default(),
            notifications: NotificationSettings::default(),
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub prefix: String,
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            prefix: "/api/v1".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Joins base URL, prefix and an endpoint path without doubling slashes.
    pub fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let prefix = self.prefix.trim_matches('/');
        let path = path.trim_start_matches('/');

        if prefix.is_empty() {
            format!("{base}/{path}")
        } else {
            format!("{base}/{prefix}/{path}")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    /// How many of the most recent runs the monitor keeps an eye on.
    pub run_window: u32,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 5,
            run_window: 25,
        }
    }
}

impl PollingSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub enabled: bool,
    pub on_failure: bool,
    pub on_completion: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            on_failure: true,
            on_completion: false,
        }
    }
}

impl Settings {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("invctl"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        let mut settings = Self::load_from(&path)?;

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            tracing::debug!(%base_url, "Overriding API base URL from environment");
            settings.api.base_url = base_url;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(?path, "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(?path, "Loaded config");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_secs == 0 {
            anyhow::bail!("polling.interval_secs must be greater than 0");
        }
        if self.polling.run_window == 0 {
            anyhow::bail!("polling.run_window must be greater than 0");
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be greater than 0");
        }
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://"))
        {
            anyhow::bail!(
                "api.base_url must start with http:// or https://, got {}",
                self.api.base_url
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "http://localhost:8000");
        assert_eq!(settings.api.prefix, "/api/v1");
        assert!(settings.polling.enabled);
        assert_eq!(settings.polling.interval(), Duration::from_secs(5));
        assert!(settings.notifications.on_failure);
        assert!(!settings.notifications.on_completion);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        settings.polling.interval_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.api.base_url = "localhost:8000".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.api.timeout_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_endpoint_joining() {
        let mut api = ApiSettings::default();
        assert_eq!(
            api.endpoint("/providers/"),
            "http://localhost:8000/api/v1/providers/"
        );

        api.base_url = "https://inventory.example.com/".to_string();
        api.prefix = "api/".to_string();
        assert_eq!(
            api.endpoint("resources/12/"),
            "https://inventory.example.com/api/resources/12/"
        );

        api.prefix = String::new();
        assert_eq!(
            api.endpoint("tags/"),
            "https://inventory.example.com/tags/"
        );
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            debug = true

            [api]
            base_url = "https://inventory.internal"
            timeout_secs = 10

            [polling]
            enabled = false
            interval_secs = 15

            [notifications]
            on_completion = true
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.api.base_url, "https://inventory.internal");
        assert_eq!(settings.api.prefix, "/api/v1");
        assert_eq!(settings.api.timeout(), Duration::from_secs(10));
        assert!(!settings.polling.enabled);
        assert_eq!(settings.polling.interval_secs, 15);
        assert_eq!(settings.polling.run_window, 25);
        assert!(settings.notifications.enabled);
        assert!(settings.notifications.on_completion);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings.polling.interval_secs, 5);
    }

    #[test]
    fn test_load_invalid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[polling\ninterval_secs = ").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
