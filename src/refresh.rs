//! Configuration refresh and transport swapping.
//!
//! [`TransportManager`] owns the single active [`Transport`]. On startup and
//! on every refresh tick it re-resolves url, credentials and index; when any
//! of them changed it builds a new transport, swaps it in, and only then
//! closes the old one. Readers take a lock-free snapshot of the active
//! transport and keep it for the duration of one send.
//!
//! Settings that read from the message cannot be resolved by a timer. For
//! those, [`TransportManager::route`] resolves each record on its own and
//! hands out a transport bound to exactly that configuration.

use crate::backend::{BackendBuildError, TransportFactory};
use crate::config::{ConfigError, ConfigSource, TransportConfig, TransportSettings};
use crate::document::ElasticDocument;
use crate::record::{LogRecord, Severity};
use crate::sink::{DeliveryResult, DocumentSink};
use arc_swap::ArcSwapOption;
use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::sync::{Arc, PoisonError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Per-message transports kept alive at once.
pub const MAX_ROUTES: usize = 16;

/// A sink bound to one resolved [`TransportConfig`].
pub struct Transport {
    config: TransportConfig,
    sink: Arc<dyn DocumentSink>,
}

impl Transport {
    pub fn new(config: TransportConfig, sink: Arc<dyn DocumentSink>) -> Self {
        Transport { config, sink }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn index(&self) -> &str {
        &self.config.index
    }

    /// Send `document` to this transport's index.
    pub async fn send(
        &self,
        document: &ElasticDocument,
        severity: Severity,
    ) -> Result<DeliveryResult, Box<dyn Error + Send + Sync>> {
        self.sink.send(document, &self.config.index, severity).await
    }

    /// Close the underlying sink. Failures are reported, not returned.
    pub async fn close(&self) {
        if let Err(e) = self.sink.close().await {
            warn!(index = %self.config.index, error = %e, "failed to close elasticsearch transport");
        }
    }
}

/// Health indicator surfaced to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportStatus {
    Uninitialized,
    Connected { index: String },
    /// Configuration could not be resolved or the transport could not be
    /// built. A previously installed transport stays in service.
    Degraded { reason: String },
    Closed,
}

/// What a call to [`TransportManager::refresh`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// First transport installed.
    Installed,
    /// A new transport replaced the previous one.
    Replaced,
    /// Configuration matches the active transport.
    Unchanged,
    /// Another refresh held the guard, or the manager is shutting down.
    Skipped,
}

#[derive(thiserror::Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Build(#[from] BackendBuildError),

    #[error("transport manager is shut down")]
    Closed,
}

/// Transports built for per-message configurations, oldest first.
#[derive(Default)]
struct Routes {
    by_config: HashMap<TransportConfig, Arc<Transport>>,
    order: VecDeque<TransportConfig>,
}

pub struct TransportManager {
    settings: TransportSettings,
    source: Arc<dyn ConfigSource>,
    factory: Arc<dyn TransportFactory>,
    active: ArcSwapOption<Transport>,
    routes: std::sync::Mutex<Routes>,
    refreshing: Mutex<()>,
    status: watch::Sender<TransportStatus>,
    cancel: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl TransportManager {
    pub fn new(
        settings: TransportSettings,
        source: Arc<dyn ConfigSource>,
        factory: Arc<dyn TransportFactory>,
    ) -> Self {
        let (status, _) = watch::channel(TransportStatus::Uninitialized);
        TransportManager {
            settings,
            source,
            factory,
            active: ArcSwapOption::empty(),
            routes: std::sync::Mutex::new(Routes::default()),
            refreshing: Mutex::new(()),
            status,
            cancel: CancellationToken::new(),
            timer: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Snapshot of the currently installed transport.
    pub fn active(&self) -> Option<Arc<Transport>> {
        self.active.load_full()
    }

    pub fn status(&self) -> TransportStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<TransportStatus> {
        self.status.subscribe()
    }

    /// Run the startup refresh and spawn the periodic refresh timer.
    ///
    /// The timer keeps running even when the startup refresh fails, so a
    /// configuration that becomes valid later is picked up on a later tick.
    /// When a setting reads from the message there is nothing to resolve up
    /// front: no timer is spawned and `Skipped` is returned.
    /// Must be called from within a Tokio runtime.
    pub async fn start(self: &Arc<Self>) -> Result<RefreshOutcome, RefreshError> {
        if self.settings.has_message_refs() {
            debug!("transport is resolved per message, no refresh timer");
            return Ok(RefreshOutcome::Skipped);
        }

        let outcome = self.refresh(None).await;

        let mut timer = self.timer.lock().await;
        if timer.is_none() && !self.cancel.is_cancelled() {
            let period = self.settings.refresh_interval();
            let manager = Arc::downgrade(self);
            let cancel = self.cancel.clone();

            *timer = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            let Some(strong) = manager.upgrade() else { break };
                            // failures are reported inside refresh
                            let _ = strong.refresh(None).await;
                        }
                    }
                }
                debug!("transport refresh timer stopped");
            }));
        }

        outcome
    }

    /// Re-resolve configuration and swap the transport if anything changed.
    ///
    /// `record` is used to evaluate per-message expressions; pass `None`
    /// for timer-driven refreshes. A failed resolution or build leaves the
    /// active transport untouched.
    pub async fn refresh(&self, record: Option<&LogRecord>) -> Result<RefreshOutcome, RefreshError> {
        let config = match self.settings.resolve(self.source.as_ref(), record) {
            Ok(config) => config,
            Err(e) => {
                self.degrade(&e);
                return Err(e.into());
            }
        };

        if self.is_current(&config) {
            return Ok(RefreshOutcome::Unchanged);
        }

        let Ok(_guard) = self.refreshing.try_lock() else {
            debug!("transport refresh already in progress, skipping");
            return Ok(RefreshOutcome::Skipped);
        };
        if self.cancel.is_cancelled() {
            return Ok(RefreshOutcome::Skipped);
        }
        // a concurrent refresh may have installed the same values meanwhile
        if self.is_current(&config) {
            return Ok(RefreshOutcome::Unchanged);
        }

        let sink = match self.factory.build(&config) {
            Ok(sink) => sink,
            Err(e) => {
                self.degrade(&e);
                return Err(e.into());
            }
        };

        let index = config.index.clone();
        let previous = self.active.swap(Some(Arc::new(Transport::new(config, sink))));
        self.status.send_replace(TransportStatus::Connected { index: index.clone() });
        info!(index = %index, replaced = previous.is_some(), "elasticsearch transport installed");

        match previous {
            Some(old) => {
                old.close().await;
                Ok(RefreshOutcome::Replaced)
            }
            None => Ok(RefreshOutcome::Installed),
        }
    }

    /// Stop the refresh timer, then close the active transport and every
    /// cached route.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.timer.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "transport refresh timer ended abnormally");
            }
        }

        // wait out an explicit refresh that is mid-swap
        let _guard = self.refreshing.lock().await;

        if let Some(transport) = self.active.swap(None) {
            transport.close().await;
        }
        let routes = std::mem::take(&mut *self.routes.lock().unwrap_or_else(PoisonError::into_inner));
        for (_, transport) in routes.by_config {
            transport.close().await;
        }
        self.status.send_replace(TransportStatus::Closed);
        debug!("transport manager shut down");
    }

    /// Transport for a record whose settings read from the message.
    ///
    /// The record's own values pick the transport, so concurrent records
    /// with different values never share one. Transports are cached per
    /// configuration; once [`MAX_ROUTES`] are cached the oldest is dropped
    /// without closing, so a send already holding it completes.
    pub fn route(&self, record: &LogRecord) -> Result<Arc<Transport>, RefreshError> {
        let config = match self.settings.resolve(self.source.as_ref(), Some(record)) {
            Ok(config) => config,
            Err(e) => {
                self.degrade(&e);
                return Err(e.into());
            }
        };

        let mut routes = self.routes.lock().unwrap_or_else(PoisonError::into_inner);
        if self.cancel.is_cancelled() {
            return Err(RefreshError::Closed);
        }
        let transport = match routes.by_config.get(&config) {
            Some(transport) => Arc::clone(transport),
            None => {
                let sink = match self.factory.build(&config) {
                    Ok(sink) => sink,
                    Err(e) => {
                        self.degrade(&e);
                        return Err(e.into());
                    }
                };
                let transport = Arc::new(Transport::new(config.clone(), sink));
                if routes.order.len() >= MAX_ROUTES {
                    if let Some(oldest) = routes.order.pop_front() {
                        routes.by_config.remove(&oldest);
                    }
                }
                routes.order.push_back(config.clone());
                routes.by_config.insert(config, Arc::clone(&transport));
                info!(index = %transport.index(), "elasticsearch transport built for message route");
                transport
            }
        };
        // status is written under the lock so shutdown's `Closed` lands last
        self.status.send_if_modified(|status| match status {
            TransportStatus::Connected { index } if index == transport.index() => false,
            _ => {
                *status = TransportStatus::Connected {
                    index: transport.index().to_string(),
                };
                true
            }
        });
        drop(routes);
        Ok(transport)
    }

    fn is_current(&self, config: &TransportConfig) -> bool {
        let active = self.active.load();
        matches!(&*active, Some(active) if active.config() == config)
    }

    fn degrade(&self, reason: &dyn std::fmt::Display) {
        if self.cancel.is_cancelled() {
            debug!(reason = %reason, "transport refresh failed after shutdown");
            return;
        }
        let reason = reason.to_string();
        error!(reason = %reason, has_transport = self.active.load().is_some(), "transport refresh failed");
        self.status.send_replace(TransportStatus::Degraded { reason });
    }
}

impl Drop for TransportManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
