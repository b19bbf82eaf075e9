use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::global::error::ConfigError;

/// Environment variable holding the configuration file path
pub const CONFIG_PATH_ENV: &str = "CONFIG_DIR";
const DEFAULT_CONFIG_PATH: &str = "config.json";
/// Upper bound for `retention_days`, about a century
pub const MAX_RETENTION_DAYS: u64 = 36_500;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_type: LogType,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,
}

/// Where log output goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    /// Console only
    #[default]
    #[serde(alias = "DEFAULT")]
    Default,
    /// Console and `log_file`
    #[serde(alias = "FILE")]
    File,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_mongo_port")]
    pub port: u16,
    #[serde(default)]
    pub name: String,
    /// Defaults to the database name
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub direct_connection: bool,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub server_selection_timeout_ms: Option<u64>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Deadline for every CRUD call, 0 disables it
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "tmp/app.log".to_string()
}

fn default_retention_days() -> u64 {
    1
}

fn default_mongo_port() -> u16 {
    27017
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_operation_timeout_secs() -> u64 {
    30
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_type: LogType::default(),
            log_level: default_log_level(),
            log_file: default_log_file(),
            retention_days: default_retention_days(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: String::new(),
            port: default_mongo_port(),
            name: String::new(),
            collection: None,
            direct_connection: false,
            app_name: None,
            server_selection_timeout_ms: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            operation_timeout_secs: default_operation_timeout_secs(),
        }
    }
}

impl DatabaseConfig {
    /// Collection every operation acts on
    pub fn collection_name(&self) -> &str {
        self.collection.as_deref().unwrap_or(&self.name)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        match self.operation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Build the driver connection string.
    ///
    /// A host that already carries a scheme is kept as-is. The port is only
    /// added to a single `mongodb://` host that has none, `mongodb+srv` hosts
    /// never get one. Options join an existing query string.
    pub fn connection_uri(&self) -> String {
        let mut uri = match split_scheme(&self.host) {
            Some((scheme, rest)) => {
                let (authority, tail) = split_authority(rest);
                let hosts = authority.rsplit_once('@').map_or(authority, |(_, hosts)| hosts);
                if scheme == "mongodb://" && !hosts.contains(',') && !has_port(hosts) {
                    format!("{}{}:{}{}", scheme, authority, self.port, tail)
                } else {
                    self.host.clone()
                }
            }
            None => format!("mongodb://{}:{}", self.host, self.port),
        };

        let mut params = Vec::new();
        if self.direct_connection {
            params.push("directConnection=true".to_string());
        }
        if let Some(ms) = self.server_selection_timeout_ms {
            params.push(format!("serverSelectionTimeoutMS={}", ms));
        }
        if let Some(app_name) = self.app_name.as_deref().filter(|n| !n.is_empty()) {
            params.push(format!("appName={}", app_name));
        }

        if !params.is_empty() {
            let (_, tail) = split_authority(split_scheme(&uri).map_or("", |(_, rest)| rest));
            if tail.contains('?') {
                if !uri.ends_with('?') && !uri.ends_with('&') {
                    uri.push('&');
                }
            } else if tail.is_empty() {
                uri.push_str("/?");
            } else {
                uri.push('?');
            }
            uri.push_str(&params.join("&"));
        }
        uri
    }

    /// Connection string with any `user:password@` replaced, safe to log
    pub fn redacted_uri(&self) -> String {
        let uri = self.connection_uri();
        match split_scheme(&uri) {
            Some((scheme, rest)) => {
                let (authority, tail) = split_authority(rest);
                match authority.rsplit_once('@') {
                    Some((_, hosts)) => format!("{}***@{}{}", scheme, hosts, tail),
                    None => uri.clone(),
                }
            }
            None => uri.clone(),
        }
    }
}

fn split_scheme(uri: &str) -> Option<(&'static str, &str)> {
    ["mongodb+srv://", "mongodb://"]
        .into_iter()
        .find_map(|scheme| uri.strip_prefix(scheme).map(|rest| (scheme, rest)))
}

/// Split `user@host:port/db?opts` into the authority and everything after it
fn split_authority(rest: &str) -> (&str, &str) {
    let end = rest.find(['/', '?']).unwrap_or(rest.len());
    rest.split_at(end)
}

/// Whether a single host, possibly a bracketed IPv6 literal, names a port
fn has_port(host: &str) -> bool {
    let after_literal = host.rsplit_once(']').map_or(host, |(_, after)| after);
    after_literal.contains(':')
}

impl AppConfig {
    /// Load configuration from the file named by `CONFIG_DIR` (default `config.json`)
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path, format picked from the extension
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path, e)))?;

        let app_config: AppConfig = config.try_deserialize()
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path, e)))?;

        app_config.validate()?;
        Ok(app_config)
    }

    /// Reject settings the server or the database connection cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app.port == 0 {
            return Err(ConfigError::Invalid("app.port must be non-zero".to_string()));
        }

        if self.database.enabled {
            if self.database.host.trim().is_empty() {
                return Err(ConfigError::Invalid("database.host is empty".to_string()));
            }
            if self.database.name.trim().is_empty() {
                return Err(ConfigError::Invalid("database.name is empty".to_string()));
            }
            if self.database.collection_name().trim().is_empty() {
                return Err(ConfigError::Invalid("database.collection is empty".to_string()));
            }
            if self.database.connect_timeout_secs == 0 {
                return Err(ConfigError::Invalid("database.connect_timeout_secs must be non-zero".to_string()));
            }
        }

        let retention = self.app.logging.retention_days;
        if !(1..=MAX_RETENTION_DAYS).contains(&retention) {
            return Err(ConfigError::Invalid(format!(
                "app.logging.retention_days must be between 1 and {}, got {}",
                MAX_RETENTION_DAYS, retention
            )));
        }

        Ok(())
    }
}
