use crate::env::{
    env_or, ELASTIC_LOG_INDEX_ENV, ELASTIC_LOG_ORIGIN_ENV, ELASTIC_LOG_PASSWORD_ENV,
    ELASTIC_LOG_REFRESH_SECS_ENV, ELASTIC_LOG_URL_ENV, ELASTIC_LOG_USERNAME_ENV,
};
use crate::record::LogRecord;
use crate::template::DEFAULT_ORIGIN;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Default interval between configuration refresh ticks.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// A configuration value expression, evaluated on every refresh.
///
/// Serialized as `{"type": "env", "value": "ES_URL"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ConfigExpr {
    /// The value itself.
    Literal(String),
    /// Name of a process environment variable.
    Env(String),
    /// Key in the host's global scope.
    Global(String),
    /// Field path into the record being delivered.
    Message(String),
}

impl ConfigExpr {
    pub fn is_message_ref(&self) -> bool {
        matches!(self, ConfigExpr::Message(_))
    }
}

/// Resolves [`ConfigExpr`]s to strings. Resolution failure is `None`.
pub trait ConfigSource: Send + Sync {
    fn resolve(&self, expr: &ConfigExpr, record: Option<&LogRecord>) -> Option<String>;
}

/// Default [`ConfigSource`]: literals, environment variables, a global
/// key/value scope maintained by the host, and per-message field paths.
pub struct HostConfigSource {
    globals: ArcSwap<HashMap<String, String>>,
}

impl HostConfigSource {
    pub fn new() -> Self {
        HostConfigSource {
            globals: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    pub fn set_global(&self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        self.globals.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(key.clone(), value.clone());
            next
        });
    }

    pub fn remove_global(&self, key: &str) {
        self.globals.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(key);
            next
        });
    }
}

impl Default for HostConfigSource {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigSource for HostConfigSource {
    fn resolve(&self, expr: &ConfigExpr, record: Option<&LogRecord>) -> Option<String> {
        match expr {
            ConfigExpr::Literal(value) => Some(value.clone()),
            ConfigExpr::Env(key) => std::env::var(key).ok(),
            ConfigExpr::Global(key) => self.globals.load().get(key).cloned(),
            ConfigExpr::Message(path) => record
                .and_then(|r| r.field(path))
                .map(|value| match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Url,
    Username,
    Password,
    Index,
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigField::Url => "url",
            ConfigField::Username => "username",
            ConfigField::Password => "password",
            ConfigField::Index => "index",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("elasticsearch {0} is not set")]
    Missing(ConfigField),
}

/// Fully resolved connection values for one transport.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TransportConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    /// Always lowercase and non-empty.
    pub index: String,
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("index", &self.index)
            .finish()
    }
}

fn default_refresh_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_origin() -> String {
    DEFAULT_ORIGIN.to_string()
}

/// Unresolved transport configuration as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    pub url: ConfigExpr,
    pub username: ConfigExpr,
    pub password: ConfigExpr,
    pub index: ConfigExpr,
    #[serde(default = "default_refresh_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_origin")]
    pub origin: String,
}

impl TransportSettings {
    pub fn new(url: ConfigExpr, username: ConfigExpr, password: ConfigExpr, index: ConfigExpr) -> Self {
        TransportSettings {
            url,
            username,
            password,
            index,
            refresh_interval_secs: default_refresh_secs(),
            request_timeout_secs: None,
            origin: default_origin(),
        }
    }

    /// Bind every connection value to the environment variables in
    /// [`crate::env`]. Values are re-read on each refresh.
    pub fn from_env() -> Self {
        let refresh_interval_secs = env_or(ELASTIC_LOG_REFRESH_SECS_ENV, "")
            .parse()
            .unwrap_or_else(|_| default_refresh_secs());

        TransportSettings {
            refresh_interval_secs,
            origin: env_or(ELASTIC_LOG_ORIGIN_ENV, DEFAULT_ORIGIN),
            ..TransportSettings::new(
                ConfigExpr::Env(ELASTIC_LOG_URL_ENV.to_string()),
                ConfigExpr::Env(ELASTIC_LOG_USERNAME_ENV.to_string()),
                ConfigExpr::Env(ELASTIC_LOG_PASSWORD_ENV.to_string()),
                ConfigExpr::Env(ELASTIC_LOG_INDEX_ENV.to_string()),
            )
        }
    }

    /// Refresh interval, never below one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Whether any value depends on the record being delivered.
    pub fn has_message_refs(&self) -> bool {
        [&self.url, &self.username, &self.password, &self.index]
            .into_iter()
            .any(ConfigExpr::is_message_ref)
    }

    /// Resolve all four values. Empty and `"undefined"` results count as
    /// missing; every missing value is reported, the first is returned.
    pub fn resolve(
        &self,
        source: &dyn ConfigSource,
        record: Option<&LogRecord>,
    ) -> Result<TransportConfig, ConfigError> {
        let lookup = |field: ConfigField, expr: &ConfigExpr| {
            let value = source
                .resolve(expr, record)
                .filter(|v| !v.is_empty() && v != "undefined");
            if value.is_none() {
                tracing::error!(field = %field, "elasticsearch {} is not set", field);
            }
            value.ok_or(ConfigError::Missing(field))
        };

        let url = lookup(ConfigField::Url, &self.url);
        let username = lookup(ConfigField::Username, &self.username);
        let password = lookup(ConfigField::Password, &self.password);
        let index = lookup(ConfigField::Index, &self.index);

        Ok(TransportConfig {
            url: url?,
            username: username?,
            password: password?,
            index: index?.to_lowercase(),
        })
    }
}
