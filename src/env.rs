/// Environment variable names used by [`TransportSettings::from_env`]
/// to bind the transport configuration to the process environment.
///
/// The bound values are re-read on every refresh tick, so changing them
/// at runtime swaps the transport.
///
/// [`TransportSettings::from_env`]: crate::config::TransportSettings::from_env

/// Elasticsearch base URL, e.g. `https://127.0.0.1:9200`.
pub const ELASTIC_LOG_URL_ENV: &str = "ELASTIC_LOG_URL";

/// Elasticsearch user name.
pub const ELASTIC_LOG_USERNAME_ENV: &str = "ELASTIC_LOG_USERNAME";

/// Elasticsearch password.
pub const ELASTIC_LOG_PASSWORD_ENV: &str = "ELASTIC_LOG_PASSWORD";

/// Target index name. Lowercased before use.
pub const ELASTIC_LOG_INDEX_ENV: &str = "ELASTIC_LOG_INDEX";

/// Optional origin tag stamped into `Origin_String`.
pub const ELASTIC_LOG_ORIGIN_ENV: &str = "ELASTIC_LOG_ORIGIN";

/// Optional refresh interval in seconds.
pub const ELASTIC_LOG_REFRESH_SECS_ENV: &str = "ELASTIC_LOG_REFRESH_SECS";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
