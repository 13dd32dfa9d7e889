use crate::backend::{BackendBuildError, TransportFactory};
use crate::config::TransportConfig;
use crate::document::ElasticDocument;
use crate::record::Severity;
use crate::sink::{DeliveryResult, DocumentSink};
use async_trait::async_trait;
use std::error::Error;
use std::sync::Arc;

/// A sink that simply drops all documents.
///
/// Useful for measuring the overhead of the pipeline itself without any
/// external I/O, and for unit tests that don't care about persistence.
#[derive(Clone, Default)]
pub struct NoopSink;

#[async_trait]
impl DocumentSink for NoopSink {
    async fn send(
        &self,
        _document: &ElasticDocument,
        index: &str,
        _severity: Severity,
    ) -> Result<DeliveryResult, Box<dyn Error + Send + Sync>> {
        Ok(DeliveryResult {
            index: Some(index.to_string()),
            ..DeliveryResult::default()
        })
    }
}

/// [`TransportFactory`] that always hands out a [`NoopSink`].
#[derive(Clone, Default)]
pub struct NoopTransportFactory;

impl TransportFactory for NoopTransportFactory {
    fn build(&self, _config: &TransportConfig) -> Result<Arc<dyn DocumentSink>, BackendBuildError> {
        Ok(Arc::new(NoopSink) as Arc<dyn DocumentSink>)
    }
}
