use crate::core::db::ConnectOptions;
use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File name looked up under the user's configuration directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
}

/// Connection coordinates for the database session.
#[derive(Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    pub busy_timeout_ms: Option<u64>,
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .finish()
    }
}

impl From<&DatabaseConfig> for ConnectOptions {
    fn from(cfg: &DatabaseConfig) -> Self {
        let options = ConnectOptions::new(
            cfg.host.as_str(),
            cfg.username.as_str(),
            cfg.password.as_str(),
            cfg.database.as_str(),
        );
        match cfg.busy_timeout_ms {
            Some(ms) => options.busy_timeout(Duration::from_millis(ms)),
            None => options,
        }
    }
}

/// Loads configuration from a TOML file at the given path.
///
/// # Example
///
/// ```no_run
/// let config = dbwrap::config::load_config("config.toml").expect("Failed to load config");
/// println!("{:?}", config);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
    parse_config(&content)
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| DbError::Config(e.to_string()))
}

/// Default configuration path, `<config dir>/dbwrap/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("dbwrap").join(CONFIG_FILE_NAME))
}
