//! # configs
//!
//! Layered settings for the roaming library:
//!
//! 1. built-in defaults (a working device at `192.168.4.1`),
//! 2. an optional TOML file (`config/default.toml`, or the path in
//!    `LIBRARY_CONFIG`),
//! 3. environment variables such as `LIBRARY__SERVER__DEVICE_IP`, with `.env`
//!    loaded first by dotenvy.

use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_PREFIX: &str = "LIBRARY";
pub const CONFIG_PATH_VAR: &str = "LIBRARY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/default";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub forum: ForumSettings,
    pub listing: ListingSettings,
    pub upload: UploadSettings,
    pub dns: DnsSettings,
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// Address clients are redirected to and DNS answers point at.
    pub device_ip: Ipv4Addr,
    /// Label shown on listing pages (the access point's SSID).
    pub node_name: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 80)),
            device_ip: Ipv4Addr::new(192, 168, 4, 1),
            node_name: "PR0J3K7_B00KM4RK_00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Mount point of the medium.
    pub root: PathBuf,
    /// Directory under the root holding the 28 document buckets.
    pub collection: String,
    /// Keep everything in memory instead of touching `root`.
    pub in_memory: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { root: PathBuf::from("./sd"), collection: "Alexandria".to_string(), in_memory: false }
    }
}

impl StorageSettings {
    /// Storage path of the collection root, e.g. `/Alexandria`.
    pub fn collection_root(&self) -> String {
        format!("/{}", self.collection.trim_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForumSettings {
    pub cleanup_interval_secs: u64,
}

impl Default for ForumSettings {
    fn default() -> Self {
        Self { cleanup_interval_secs: 3600 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    /// Items emitted between two voluntary yields to the scheduler.
    pub yield_batch: usize,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self { yield_batch: 10 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub max_bytes: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self { max_bytes: 64 * 1024 * 1024 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DnsSettings {
    pub enabled: bool,
    pub bind_addr: SocketAddr,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self { enabled: true, bind_addr: SocketAddr::from(([0, 0, 0, 0], 53)) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

impl Settings {
    /// Loads `.env`, the config file and the environment, then validates.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let raw = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Self::from_config(raw)
    }

    /// Parses settings from an in-memory TOML document.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Self::from_config(raw)
    }

    fn from_config(raw: config::Config) -> Result<Self, ConfigError> {
        let settings: Settings = raw.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.forum.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid("forum.cleanup_interval_secs must be > 0".into()));
        }
        if self.listing.yield_batch == 0 {
            return Err(ConfigError::Invalid("listing.yield_batch must be > 0".into()));
        }
        if self.upload.max_bytes == 0 {
            return Err(ConfigError::Invalid("upload.max_bytes must be > 0".into()));
        }
        let collection = self.storage.collection.trim_matches('/');
        if collection.is_empty() || collection.split('/').any(|p| p == ".." || p == "." || p.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "storage.collection is not a usable directory name: {:?}",
                self.storage.collection
            )));
        }
        if collection.eq_ignore_ascii_case("forum") {
            return Err(ConfigError::Invalid("storage.collection must not be the forum directory".into()));
        }
        tracing::debug!(?self, "configuration validated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_device() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.device_ip, Ipv4Addr::new(192, 168, 4, 1));
        assert_eq!(settings.forum.cleanup_interval_secs, 3600);
        assert_eq!(settings.listing.yield_batch, 10);
        assert_eq!(settings.storage.collection_root(), "/Alexandria");
    }

    #[test]
    fn toml_overrides_individual_keys() {
        let settings = Settings::from_toml(
            r#"
            [server]
            device_ip = "10.0.0.1"
            node_name = "NODE_7"

            [forum]
            cleanup_interval_secs = 60

            [log]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.device_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(settings.server.node_name, "NODE_7");
        assert_eq!(settings.forum.cleanup_interval_secs, 60);
        assert_eq!(settings.log.format, LogFormat::Json);
        assert_eq!(settings.listing.yield_batch, 10);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = Settings::from_toml("[forum]\ncleanup_interval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn collection_cannot_escape_root() {
        let err = Settings::from_toml("[storage]\ncollection = \"../etc\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = Settings::from_toml("[storage]\ncollection = \"Forum\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
