use crate::utils::errors::{KeyServerError, Result};
use serde::{Deserialize, Serialize};
use std::net::{Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_MAX_CACHE_SIZE: i64 = 4;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_PRUNE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_PORT: u16 = 8080;

/// Settings of a caching key client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the key server
    pub server: Url,

    /// Cache capacity enforced by the prune task; negative disables pruning
    pub max_cache_size: i64,

    /// Upper bound on each remote call, in milliseconds
    #[serde(with = "duration_ms")]
    pub timeout: Duration,

    /// Period of the prune task, in milliseconds
    #[serde(with = "duration_ms")]
    pub prune_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server_url(),
            max_cache_size: DEFAULT_MAX_CACHE_SIZE,
            timeout: DEFAULT_TIMEOUT,
            prune_interval: DEFAULT_PRUNE_INTERVAL,
        }
    }
}

impl ClientConfig {
    pub fn pruning_enabled(&self) -> bool {
        self.max_cache_size >= 0
    }

    pub fn validate(&self) -> Result<()> {
        if self.pruning_enabled() && self.prune_interval.is_zero() {
            return Err(KeyServerError::Config(
                "prune interval must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(KeyServerError::Config(
                "timeout must be greater than zero".to_string(),
            ));
        }
        match self.server.scheme() {
            "http" | "https" => Ok(()),
            other => Err(KeyServerError::Config(format!(
                "unsupported server URL scheme: {other}"
            ))),
        }
    }
}

fn default_server_url() -> Url {
    Url::parse(DEFAULT_SERVER_URL).expect("valid default URL")
}

/// Settings of a key server process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the RPC interface listens on
    pub bind: SocketAddr,

    /// PEM or DER files loaded into the store at startup
    pub certificates: Vec<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv6Addr::UNSPECIFIED, DEFAULT_PORT)),
            certificates: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load server settings from a YAML file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            KeyServerError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
