//! TOML configuration with serde defaults throughout.
//!
//! Every key is optional; a missing file yields a fully default config
//! listening on 127.0.0.1:5000 with the SQLite database under the
//! platform data dir.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::session::DEFAULT_SESSION_TTL_SECS;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    /// Directory for the account database. Defaults to the platform data
    /// dir (e.g. `~/.local/share/vestibule`).
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Sliding-window rate limit for login/register POSTs per client
    /// (0 = unlimited).
    pub credential_attempts_per_minute: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            credential_attempts_per_minute: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Whether new accounts may be created via /register.
    pub allow_registration: bool,
    /// Maximum registered accounts (0 = unlimited).
    pub max_users: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allow_registration: true,
            max_users: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Session lifetime in seconds.
    pub ttl_secs: u64,
    /// How often writes sweep expired sessions, in seconds.
    pub sweep_interval_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: None,
        }
    }
}

impl Config {
    /// Load from an explicit path (must exist and parse), or from the
    /// default location if present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config at {}", p.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config at {}", p.display()))
            }
            None => match default_config_path() {
                Some(path) if path.exists() => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read config at {}", path.display()))?;
                    toml::from_str(&raw)
                        .with_context(|| format!("Failed to parse config at {}", path.display()))
                }
                _ => Ok(Self::default()),
            },
        }
    }

    /// Resolve the directory holding the account database, creating it if
    /// needed.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        let dir = match &self.data_dir {
            Some(d) => d.clone(),
            None => directories::ProjectDirs::from("", "", "vestibule")
                .context("Could not determine a platform data directory")?
                .data_dir()
                .to_path_buf(),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data dir {}", dir.display()))?;
        Ok(dir)
    }
}

fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "vestibule")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bind_loopback() {
        let config = Config::default();
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 5000);
        assert!(config.auth.allow_registration);
        assert_eq!(config.auth.max_users, 0);
        assert_eq!(config.session.ttl_secs, DEFAULT_SESSION_TTL_SECS);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [gateway]
            port = 8080

            [session]
            ttl_secs = 3600
            "#,
        )
        .unwrap();

        assert_eq!(config.gateway.port, 8080);
        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.session.ttl_secs, 3600);
        assert!(config.auth.allow_registration);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result: Result<Config, _> = toml::from_str(
            r#"
            [gateway]
            prot = 8080
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/vestibule.toml")));
        assert!(result.is_err());
    }
}
