use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, ScraperError};

/// A login/password pair for an authenticated source.
///
/// Inventories live in `config.toml`, never in code. Equasis bans logins
/// quickly, so production runs need a large pool to rotate through.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialEntry {
    pub login: String,
    pub password: String,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory for JSON-lines item output.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Directory for per-spider persisted state files.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    pub equasis: EquasisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EquasisConfig {
    /// Searches done on one login before rotating to the next. Spreading
    /// usage across all logins minimises the chance of a ban.
    #[serde(default = "default_search_quota")]
    pub search_quota: u32,
    /// Average interval between authenticated requests, in seconds.
    #[serde(default = "default_avg_delay_secs")]
    pub avg_delay_secs: u64,
    /// Cooldown after a detected block. The ban appears to be linked to a
    /// download limit per day.
    #[serde(default = "default_banned_cooldown_secs")]
    pub banned_cooldown_secs: i64,
    /// Production login inventory.
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
    /// Dev logins, used with `--test` to preserve the prod users' quota.
    #[serde(default)]
    pub dev_credentials: Vec<CredentialEntry>,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_state_dir() -> String {
    "state".to_string()
}

fn default_search_quota() -> u32 {
    5
}

fn default_avg_delay_secs() -> u64 {
    40
}

fn default_banned_cooldown_secs() -> i64 {
    24 * 3600
}

impl Config {
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ScraperError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [equasis]
            credentials = [
                { login = "someone@example.com", password = "hunter2" },
            ]
            "#,
        )
        .unwrap();

        assert_eq!(config.output_dir, "output");
        assert_eq!(config.equasis.search_quota, 5);
        assert_eq!(config.equasis.banned_cooldown_secs, 86400);
        assert_eq!(config.equasis.credentials.len(), 1);
        assert!(config.equasis.dev_credentials.is_empty());
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = Config::load_from("definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ScraperError::Config(_)));
    }
}
