#![allow(dead_code)]

use async_trait::async_trait;
use elastic_log_sink::backend::{BackendBuildError, TransportFactory};
use elastic_log_sink::config::{ConfigExpr, HostConfigSource, TransportConfig, TransportSettings};
use elastic_log_sink::document::ElasticDocument;
use elastic_log_sink::record::Severity;
use elastic_log_sink::refresh::TransportManager;
use elastic_log_sink::sink::{DeliveryResult, DocumentSink};
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

/// Sink that records every document and notes which index was active
/// when it got closed.
pub struct RecordingSink {
    pub config: TransportConfig,
    pub sent: Mutex<Vec<(String, ElasticDocument, Severity)>>,
    pub closed: AtomicBool,
    pub active_index_at_close: Mutex<Option<String>>,
    manager: Arc<OnceLock<Weak<TransportManager>>>,
}

#[async_trait]
impl DocumentSink for RecordingSink {
    async fn send(
        &self,
        document: &ElasticDocument,
        index: &str,
        severity: Severity,
    ) -> Result<DeliveryResult, Box<dyn Error + Send + Sync>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err("closed".into());
        }
        self.sent
            .lock()
            .unwrap()
            .push((index.to_string(), document.clone(), severity));
        Ok(DeliveryResult {
            index: Some(index.to_string()),
            result: Some("created".to_string()),
            ..DeliveryResult::default()
        })
    }

    async fn close(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let active = self
            .manager
            .get()
            .and_then(Weak::upgrade)
            .and_then(|m| m.active())
            .map(|t| t.index().to_string());
        *self.active_index_at_close.lock().unwrap() = active;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFactory {
    pub builds: AtomicUsize,
    pub fail: AtomicBool,
    pub sinks: Mutex<Vec<Arc<RecordingSink>>>,
    manager: Arc<OnceLock<Weak<TransportManager>>>,
}

impl RecordingFactory {
    pub fn attach(&self, manager: &Arc<TransportManager>) {
        let _ = self.manager.set(Arc::downgrade(manager));
    }

    pub fn sink(&self, n: usize) -> Arc<RecordingSink> {
        Arc::clone(&self.sinks.lock().unwrap()[n])
    }
}

impl TransportFactory for RecordingFactory {
    fn build(&self, config: &TransportConfig) -> Result<Arc<dyn DocumentSink>, BackendBuildError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BackendBuildError::Other("factory failure".into()));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        let sink = Arc::new(RecordingSink {
            config: config.clone(),
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            active_index_at_close: Mutex::new(None),
            manager: Arc::clone(&self.manager),
        });
        self.sinks.lock().unwrap().push(Arc::clone(&sink));
        Ok(sink as Arc<dyn DocumentSink>)
    }
}

/// Settings reading every value from the global scope of `source`.
pub fn global_settings() -> TransportSettings {
    TransportSettings::new(
        ConfigExpr::Global("es_url".to_string()),
        ConfigExpr::Global("es_user".to_string()),
        ConfigExpr::Global("es_password".to_string()),
        ConfigExpr::Global("es_index".to_string()),
    )
}

pub fn source_with_index(index: &str) -> Arc<HostConfigSource> {
    let source = Arc::new(HostConfigSource::new());
    source.set_global("es_url", "http://127.0.0.1:9200");
    source.set_global("es_user", "elastic");
    source.set_global("es_password", "changeme");
    source.set_global("es_index", index);
    source
}

pub fn manager_for(
    settings: TransportSettings,
    source: Arc<HostConfigSource>,
) -> (Arc<TransportManager>, Arc<RecordingFactory>) {
    let factory = Arc::new(RecordingFactory::default());
    let manager = Arc::new(TransportManager::new(settings, source, factory.clone()));
    factory.attach(&manager);
    (manager, factory)
}
