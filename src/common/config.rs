//! Configuration for flowcoord nodes
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `FLOWCOORD__*` environment variables (`__` separates nested keys, e.g.
//! `FLOWCOORD__CLUSTER__ROLE=follower`). CLI flags are applied last by the
//! binary.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::auth::RequestAction;
use crate::common::{Error, Result};
use crate::port::PortState;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "FLOWCOORD_CONFIG";

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node ID (unique identifier)
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Bind address for the HTTP API
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Public base URL used to build resource URIs
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on waiting for a per-resource write lock
    #[serde(default = "default_write_lock_timeout")]
    pub write_lock_timeout_ms: u64,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    /// Static authorization grants
    #[serde(default)]
    pub grants: Vec<Grant>,

    /// Ports present at startup
    #[serde(default)]
    pub ports: Vec<PortSeed>,
}

fn default_node_id() -> String {
    "node-1".to_string()
}
fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_write_lock_timeout() -> u64 {
    5_000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            bind_addr: default_bind_addr(),
            base_url: default_base_url(),
            log_level: default_log_level(),
            write_lock_timeout_ms: default_write_lock_timeout(),
            cluster: ClusterConfig::default(),
            auth: AuthConfig::default(),
            audit: AuditConfig::default(),
            grants: Vec::new(),
            ports: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from `$FLOWCOORD_CONFIG` when no
    /// path is given. A named file must exist; with no file at all only
    /// defaults and environment apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.is_file() {
                return Err(Error::InvalidConfig(format!(
                    "config file {} does not exist",
                    path.display()
                )));
            }
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix("FLOWCOORD")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_id.trim().is_empty() {
            return Err(Error::InvalidConfig("node_id must not be empty".into()));
        }
        if self.write_lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "write_lock_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.cluster.enabled
            && self.cluster.role == ClusterRole::Follower
            && self.cluster.coordinator_url.is_none()
        {
            tracing::warn!("follower started without coordinator_url; requests will fail with 503 until one is known");
        }
        if self.auth.enabled && self.auth.jwt_secret.is_none() {
            return Err(Error::InvalidConfig(
                "auth.enabled requires auth.jwt_secret".into(),
            ));
        }
        Ok(())
    }

    pub fn write_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.write_lock_timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClusterRole {
    #[default]
    Coordinator,
    Follower,
}

/// Cluster membership configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// When disabled every request is handled locally
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub role: ClusterRole,

    /// Base URL of the coordinator node (followers only)
    #[serde(default)]
    pub coordinator_url: Option<String>,

    /// Timeout for the forward hop
    #[serde(default = "default_forward_timeout")]
    pub forward_timeout_ms: u64,
}

fn default_forward_timeout() -> u64 {
    10_000
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            role: ClusterRole::Coordinator,
            coordinator_url: None,
            forward_timeout_ms: default_forward_timeout(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Whether bearer tokens are required
    #[serde(default)]
    pub enabled: bool,

    /// HMAC secret for HS256 tokens
    #[serde(default)]
    pub jwt_secret: Option<String>,

    /// Identity used for every request when auth is disabled
    #[serde(default = "default_anonymous")]
    pub anonymous_principal: String,

    /// Paths that never require a token
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
}

fn default_anonymous() -> String {
    "anonymous".to_string()
}
fn default_public_paths() -> Vec<String> {
    vec!["/health".to_string(), "/cluster/status".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            jwt_secret: None,
            anonymous_principal: default_anonymous(),
            public_paths: default_public_paths(),
        }
    }
}

/// Audit log configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuditConfig {
    /// Append-only JSON lines file; tracing only when absent
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Grants `actions` on `resource` to `principal`. `*` matches any principal
/// or any resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub principal: String,
    pub resource: String,
    pub actions: Vec<RequestAction>,
}

/// A port created at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortSeed {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub state: PortState,
    #[serde(default = "default_concurrent_tasks")]
    pub concurrent_tasks: u32,
}

fn default_concurrent_tasks() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.node_id, "node-1");
        assert!(!config.cluster.enabled);
        assert!(!config.auth.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
node_id = "coord-a"
base_url = "https://flow.example.com"
write_lock_timeout_ms = 250

[cluster]
enabled = true
role = "follower"
coordinator_url = "http://10.0.0.1:8080"

[[grants]]
principal = "alice"
resource = "/input-ports/*"
actions = ["read", "write"]

[[ports]]
id = "p1"
name = "ingest"
state = "stopped"
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.node_id, "coord-a");
        assert_eq!(config.write_lock_timeout(), Duration::from_millis(250));
        assert_eq!(config.cluster.role, ClusterRole::Follower);
        assert_eq!(
            config.cluster.coordinator_url.as_deref(),
            Some("http://10.0.0.1:8080")
        );
        assert_eq!(config.grants.len(), 1);
        assert_eq!(
            config.grants[0].actions,
            vec![RequestAction::Read, RequestAction::Write]
        );
        assert_eq!(config.ports[0].concurrent_tasks, 1);
    }

    #[test]
    fn test_named_file_must_exist() {
        let dir = tempfile::TempDir::new().unwrap();
        let missing = dir.path().join("node-2.toml");

        let result = Config::load(Some(&missing));
        match result {
            Err(Error::InvalidConfig(msg)) => assert!(msg.contains("node-2.toml")),
            other => panic!("expected InvalidConfig, got {:?}", other.map(|c| c.node_id)),
        }
    }

    #[test]
    fn test_auth_requires_secret() {
        let mut config = Config::default();
        config.auth.enabled = true;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
