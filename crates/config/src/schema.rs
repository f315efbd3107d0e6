use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, path::Path};
use tenantgate_types::{GateError, Grant, TenantCredentials, is_defined};

/// Prefix for environment overrides, e.g. `TENANTGATE_TENANT__CLIENT_ID`.
pub const ENV_PREFIX: &str = "TENANTGATE_";

/// Accept plain strings as well as bare numbers and booleans.
///
/// Environment values such as a numeric client ID arrive as integers.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Uint(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::Uint(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Bool(b) => b.to_string(),
    })
}

/// Tenant connection and OAuth client settings.
///
/// All fields default to empty; blank values are reported when a grant is
/// attempted rather than at load time.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Tenant base URL, e.g. `https://acme.api.example.com`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub host: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub api_key: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_secret: String,
    /// Only needed for the password grant.
    #[serde(default, deserialize_with = "lenient_string")]
    pub username: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub password: String,
}

impl fmt::Debug for TenantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantConfig")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl TenantConfig {
    /// The tenant-level OAuth client settings shared by every grant.
    #[must_use]
    pub fn credentials(&self) -> TenantCredentials {
        TenantCredentials {
            host: self.host.clone(),
            api_key: self.api_key.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
        }
    }

    /// Build a password grant from the configured username and password.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Configuration`] if either value is blank.
    pub fn password_grant(&self) -> Result<Grant, GateError> {
        if !is_defined(&self.username) || !is_defined(&self.password) {
            return Err(GateError::Configuration(
                "password grant requires tenant.username and tenant.password".into(),
            ));
        }
        Ok(Grant::Password {
            username: self.username.clone(),
            password: self.password.clone(),
        })
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Authenticated proxy hardening.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Path prefixes the proxy may forward to. Empty means unrestricted.
    #[serde(default)]
    pub allowed_paths: Vec<String>,
}

impl ProxyConfig {
    /// Whether `path` (relative to the tenant base URL) may be forwarded.
    ///
    /// Prefixes match whole segments: `/v1/data` admits `/v1/data` and
    /// `/v1/data/x` but not `/v1/database`. Paths with dot segments, plain or
    /// percent-encoded, are never admitted under a non-empty list.
    #[must_use]
    pub fn allows(&self, path: &str) -> bool {
        if self.allowed_paths.is_empty() {
            return true;
        }
        let path = path.split(['?', '#']).next().unwrap_or_default();
        if path.split('/').any(is_dot_segment) {
            return false;
        }
        let path = format!("/{}", path.trim_matches('/'));
        self.allowed_paths.iter().any(|prefix| {
            let prefix = prefix.trim_matches('/');
            prefix.is_empty()
                || path == format!("/{prefix}")
                || path.starts_with(&format!("/{prefix}/"))
        })
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_callback_port() -> u16 {
    8721
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listen port (defaults to 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Listen address (defaults to `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Loopback port for the CLI authorization-code login (defaults to 8721).
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,
    /// Optional outbound HTTP proxy for vendor calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub tenant: TenantConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            callback_port: default_callback_port(),
            proxy_url: None,
            tenant: TenantConfig::default(),
            log: LogConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl Config {
    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from a file path, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: &Path) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Format as _, Serialized, Yaml},
        };
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
    }

    /// Loads defaults, then the optional YAML file, then `TENANTGATE_*`
    /// environment variables (nested keys separated by `__`).
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if any layer cannot be parsed.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        use figment::{
            Figment,
            providers::{Env, Format as _, Serialized, Yaml},
        };
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }
}
