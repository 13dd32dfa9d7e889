use crate::config::TransportConfig;
use crate::document::ElasticDocument;
use crate::record::Severity;
use crate::sink::{DeliveryResult, DocumentSink};
use async_trait::async_trait;
use reqwest::Client;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Elasticsearch sink that indexes one document per request via
/// `POST {url}/{index}/_doc` with HTTP basic authentication.
pub struct ElasticsearchSink {
    client: Client,
    /// Base URL of the cluster, e.g. "https://localhost:9200".
    base_url: String,
    username: String,
    password: String,
    closed: AtomicBool,
}

impl ElasticsearchSink {
    /// Build a sink bound to the url and credentials of `config`.
    ///
    /// `timeout` bounds each request; `None` leaves the client default.
    pub fn new(config: &TransportConfig, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(ElasticsearchSink {
            client: builder.build()?,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            closed: AtomicBool::new(false),
        })
    }

    fn endpoint(&self, index: &str) -> String {
        format!("{}/{}/_doc", self.base_url, urlencoding::encode(index))
    }
}

#[async_trait]
impl DocumentSink for ElasticsearchSink {
    async fn send(
        &self,
        document: &ElasticDocument,
        index: &str,
        severity: Severity,
    ) -> Result<DeliveryResult, Box<dyn Error + Send + Sync>> {
        if self.closed.load(Ordering::Acquire) {
            return Err("elasticsearch transport is closed".into());
        }

        let resp = self
            .client
            .post(self.endpoint(index))
            .basic_auth(&self.username, Some(&self.password))
            .json(document)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_else(|_| "<no body>".to_string());
        if status.is_success() {
            tracing::debug!(index, severity = %severity, "document indexed");
            let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
            Ok(DeliveryResult::from_response(body))
        } else {
            Err(format!("Elasticsearch index request failed with status {}: {}", status, text).into())
        }
    }

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.closed.store(true, Ordering::Release);
        tracing::debug!(url = %self.base_url, "elasticsearch transport closed");
        Ok(())
    }
}
