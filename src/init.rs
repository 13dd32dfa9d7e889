use crate::layer::ElasticLogLayer;
use crate::logger::ElasticLogger;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Конфигурация слоя логирования.
///
/// Controls the size of the internal buffer, the minimum level forwarded
/// to Elasticsearch, and whether events are also printed to the console
/// through a `fmt` layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of pending [`LogRecord`]s before new
///   records are dropped.
/// - `min_level`: most verbose level forwarded to the logger.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   added on top of [`ElasticLogLayer`].
///
/// [`LogRecord`]: crate::record::LogRecord
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub min_level: Level,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            min_level: Level::INFO,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that forwards events to `logger`.
///
/// **Parameters**
/// - `logger`: started [`ElasticLogger`] that delivers the records.
/// - `config`: [`LayerConfig`] controlling buffering and filtering.
///
/// **Returns**
/// - the handle of the background delivery task, or the error raised when
///   a global subscriber is already installed.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    logger: Arc<ElasticLogger>,
    config: LayerConfig,
) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    let (layer, handle) = ElasticLogLayer::new(logger, config.channel_buffer, config.min_level);

    // Два варианта subscriber'а: с `fmt`‑слоем и без, типы у них разные.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(handle)
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with
/// [`LayerConfig::default`].
pub fn init_tracing(logger: Arc<ElasticLogger>) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    init_tracing_with_config(logger, LayerConfig::default())
}
