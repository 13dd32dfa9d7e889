use crate::backend::TransportFactory;
use crate::config::{ConfigSource, TransportSettings};
use crate::document::{transform, ElasticDocument};
use crate::level::LevelSelector;
use crate::record::{LogRecord, Severity};
use crate::refresh::{RefreshError, TransportManager, TransportStatus};
use crate::sink::DeliveryResult;
use crate::template::{merge_record, TemplateContext};
use std::error::Error;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(thiserror::Error, Debug)]
pub enum LogError {
    #[error("no elasticsearch transport is configured, record dropped")]
    NoTransport,

    #[error("no elasticsearch transport for this record: {0}")]
    Route(#[from] RefreshError),

    #[error("elasticsearch delivery failed: {0}")]
    Transport(Box<dyn Error + Send + Sync>),
}

/// Entry point used by the host's routing layer.
///
/// Every delivery resolves the level, merges the template, shapes the
/// document and hands it to whichever transport is active at that moment,
/// or to the transport resolved from the record itself when a setting reads
/// from the message.
pub struct ElasticLogger {
    manager: Arc<TransportManager>,
    context: TemplateContext,
    default_selector: Option<LevelSelector>,
}

impl ElasticLogger {
    pub fn new(manager: Arc<TransportManager>, context: TemplateContext) -> Self {
        ElasticLogger {
            manager,
            context,
            default_selector: None,
        }
    }

    /// Build the manager, run its startup refresh and spawn its timer.
    ///
    /// A failed startup refresh is reported and the logger is still
    /// returned; records are dropped until a later tick succeeds.
    pub async fn start(
        settings: TransportSettings,
        source: Arc<dyn ConfigSource>,
        factory: Arc<dyn TransportFactory>,
    ) -> Arc<Self> {
        let context = TemplateContext::detect(settings.origin.clone());
        let manager = Arc::new(TransportManager::new(settings, source, factory));
        if let Err(e) = manager.start().await {
            warn!(error = %e, "elasticsearch logger started without a transport");
        }
        Arc::new(ElasticLogger::new(manager, context))
    }

    /// Selector applied when a call does not pass its own.
    pub fn with_level_selector(mut self, selector: &str) -> Self {
        self.default_selector = Some(LevelSelector::parse(selector));
        self
    }

    pub fn manager(&self) -> &Arc<TransportManager> {
        &self.manager
    }

    pub fn status(&self) -> TransportStatus {
        self.manager.status()
    }

    /// Resolve level and template and shape the document. No I/O.
    ///
    /// Without any selector the record keeps its own level.
    pub fn prepare(&self, mut record: LogRecord, selector: Option<&str>) -> (ElasticDocument, Severity) {
        let selector = selector
            .map(LevelSelector::parse)
            .or_else(|| self.default_selector.clone());
        if let Some(selector) = selector {
            record.level = selector.resolve(&record);
        }
        let level = record.level;

        let merged = merge_record(record, &self.context);
        if let Some(e) = &merged.error {
            warn!(error = %e, template = %merged.record.message_template, "log message template only partially resolved");
        }
        (transform(&merged.record), level)
    }

    /// Deliver one record and wait for the service's answer.
    pub async fn deliver(&self, record: LogRecord, selector: Option<&str>) -> Result<DeliveryResult, LogError> {
        let transport = if self.manager.settings().has_message_refs() {
            // resolution failures are reported by the manager
            Some(self.manager.route(&record)?)
        } else {
            self.manager.active()
        };

        let (document, severity) = self.prepare(record, selector);
        let Some(transport) = transport else {
            error!(severity = %severity, "no elasticsearch transport is configured, dropping record");
            return Err(LogError::NoTransport);
        };

        transport.send(&document, severity).await.map_err(|e| {
            error!(index = %transport.index(), error = %e, "failed to deliver log record");
            LogError::Transport(e)
        })
    }

    /// Fire-and-forget delivery on a spawned task. Failures are reported
    /// through `tracing` only. Must be called from within a Tokio runtime.
    pub fn log(self: &Arc<Self>, record: LogRecord, selector: Option<&str>) {
        let logger = Arc::clone(self);
        let selector = selector.map(str::to_string);
        tokio::spawn(async move {
            let _ = logger.deliver(record, selector.as_deref()).await;
        });
    }

    /// Stop refreshing and close the active transport.
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}
