use crate::document::ElasticDocument;
use crate::record::Severity;
use async_trait::async_trait;
use serde::Serialize;
use std::error::Error;

/// Outcome reported by the indexing service for one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryResult {
    /// Index the document landed in (`_index`).
    pub index: Option<String>,
    /// Document id assigned by the service (`_id`).
    pub id: Option<String>,
    /// Service-side result, e.g. `"created"`.
    pub result: Option<String>,
    /// Raw response body.
    pub response: serde_json::Value,
}

impl DeliveryResult {
    pub fn from_response(response: serde_json::Value) -> Self {
        let text = |key: &str| response.get(key).and_then(|v| v.as_str()).map(str::to_string);
        DeliveryResult {
            index: text("_index"),
            id: text("_id"),
            result: text("result"),
            response,
        }
    }
}

/// Asynchronous destination for [`ElasticDocument`]s.
///
/// Implementations own the wire protocol, connection handling and any
/// retry policy. The crate itself never retries a failed send.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Deliver a single document to `index`.
    ///
    /// **Parameters**
    /// - `document`: shaped document produced by [`crate::document::transform`].
    /// - `index`: lowercase target index.
    /// - `severity`: effective severity of the record.
    ///
    /// **Returns**
    /// - `Ok(DeliveryResult)` if the backend accepted the document.
    /// - `Err(..)` on network, authentication, serialization or HTTP
    ///   status failures. Callers report the error and move on.
    async fn send(
        &self,
        document: &ElasticDocument,
        index: &str,
        severity: Severity,
    ) -> Result<DeliveryResult, Box<dyn Error + Send + Sync>>;

    /// Stop accepting new documents. Sends already in flight may finish.
    ///
    /// Default implementation is a no-op.
    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
