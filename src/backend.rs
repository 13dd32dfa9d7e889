use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::sink::DocumentSink;

/// Error type returned when building a sink from resolved configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("elasticsearch feature is not enabled")]
    ElasticsearchFeatureDisabled,

    #[cfg(feature = "elasticsearch")]
    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("backend build failed: {0}")]
    Other(Box<dyn Error + Send + Sync>),
}

/// Builds a fresh [`DocumentSink`] for a resolved [`TransportConfig`].
///
/// The refresh manager calls this every time the url, credentials or
/// index change; the returned sink must be fully usable on return.
pub trait TransportFactory: Send + Sync {
    fn build(&self, config: &TransportConfig) -> Result<Arc<dyn DocumentSink>, BackendBuildError>;
}

/// Create the Elasticsearch `DocumentSink` for `config`.
///
/// This is the main entry point for applications that want a sink
/// without going through a [`TransportFactory`].
pub fn make_sink_from_config(
    config: &TransportConfig,
    timeout: Option<Duration>,
) -> Result<Arc<dyn DocumentSink>, BackendBuildError> {
    #[cfg(feature = "elasticsearch")]
    {
        use crate::elasticsearch::ElasticsearchSink;

        let sink = ElasticsearchSink::new(config, timeout)?;
        Ok(Arc::new(sink) as Arc<dyn DocumentSink>)
    }

    #[cfg(not(feature = "elasticsearch"))]
    {
        let _ = (config, timeout); // silence unused warning when feature is disabled
        Err(BackendBuildError::ElasticsearchFeatureDisabled)
    }
}

/// [`TransportFactory`] producing Elasticsearch HTTP sinks.
#[derive(Debug, Clone, Default)]
pub struct ElasticTransportFactory {
    /// Per-request timeout handed to the HTTP client.
    pub timeout: Option<Duration>,
}

impl ElasticTransportFactory {
    pub fn new(timeout: Option<Duration>) -> Self {
        ElasticTransportFactory { timeout }
    }
}

impl TransportFactory for ElasticTransportFactory {
    fn build(&self, config: &TransportConfig) -> Result<Arc<dyn DocumentSink>, BackendBuildError> {
        make_sink_from_config(config, self.timeout)
    }
}
