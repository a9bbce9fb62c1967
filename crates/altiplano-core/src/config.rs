//! Application configuration management.
//!
//! Configuration is stored at `~/.config/altiplano-mcp/config.json` and
//! every field can be overridden through `ALTIPLANO_*` environment
//! variables (a `.env` file works too; the binary loads it via dotenvy).

use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "altiplano-mcp";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Token cache file name inside the cache directory
const TOKEN_CACHE_FILE: &str = "token_cache.json";

/// Default controller base URL (lab controller).
const DEFAULT_BASE_URL: &str = "https://192.168.9.65/nokia-altiplano-ac";

/// Default base URL for the legacy IP-prefix sidecar.
const DEFAULT_LEGACY_BASE_URL: &str = "http://localhost:8000";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub legacy_base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// The lab controller serves a self-signed certificate, so
    /// verification is off unless explicitly enabled.
    pub verify_tls: bool,
    /// Override for the token cache file location.
    pub token_cache_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            legacy_base_url: DEFAULT_LEGACY_BASE_URL.to_string(),
            username: None,
            password: None,
            verify_tls: false,
            token_cache_file: None,
        }
    }
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match Self::config_path() {
            Ok(path) if path.exists() => {
                let contents = std::fs::read_to_string(&path)?;
                serde_json::from_str(&contents)?
            }
            _ => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("ALTIPLANO_URL") {
            self.base_url = url;
        }
        if let Ok(url) = std::env::var("ALTIPLANO_LEGACY_URL") {
            self.legacy_base_url = url;
        }
        if let Ok(username) = std::env::var("ALTIPLANO_USERNAME") {
            self.username = Some(username);
        }
        if let Ok(password) = std::env::var("ALTIPLANO_PASSWORD") {
            self.password = Some(password);
        }
        if let Ok(verify) = std::env::var("ALTIPLANO_VERIFY_TLS") {
            self.verify_tls = matches!(verify.as_str(), "1" | "true" | "yes");
        }
        if let Ok(path) = std::env::var("ALTIPLANO_TOKEN_CACHE") {
            self.token_cache_file = Some(PathBuf::from(path));
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir =
            dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Resolve the token cache file: explicit override first, otherwise
    /// the per-user cache directory.
    pub fn token_cache_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.token_cache_file {
            return Ok(path.clone());
        }
        Ok(Self::cache_dir()?.join(TOKEN_CACHE_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_lab_controller() {
        let config = Config::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.legacy_base_url, DEFAULT_LEGACY_BASE_URL);
        assert!(!config.verify_tls);
        assert!(config.username.is_none());
    }

    #[test]
    fn partial_config_file_fills_in_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"username": "adminuser", "verify_tls": true}"#).unwrap();
        assert_eq!(config.username.as_deref(), Some("adminuser"));
        assert!(config.verify_tls);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn explicit_token_cache_path_wins() {
        let config = Config {
            token_cache_file: Some(PathBuf::from("/tmp/alt-test/cache.json")),
            ..Config::default()
        };
        assert_eq!(
            config.token_cache_path().unwrap(),
            PathBuf::from("/tmp/alt-test/cache.json")
        );
    }
}
