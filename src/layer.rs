use crate::logger::ElasticLogger;
use crate::record::{LogRecord, Severity, Value};
use crate::template::placeholder_names;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Arc, atomic::{AtomicU64, Ordering}};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Targets whose events are never forwarded: this crate's own diagnostics
/// and the HTTP stack used for delivery would otherwise feed back into the
/// pipeline.
const IGNORED_TARGETS: &[&str] = &[env!("CARGO_CRATE_NAME"), "reqwest", "hyper", "h2", "rustls"];

/// `tracing_subscriber` layer that turns events into [`LogRecord`]s and
/// forwards them to an [`ElasticLogger`] via a bounded channel and a
/// background task.
///
/// Placeholders in the event message are filled from fields of the same
/// name, in placeholder order; remaining fields go to metadata. Inside the
/// `tracing` macros braces must be escaped: `info!(id = 7, "job {{id}}")`.
pub struct ElasticLogLayer {
    sender: mpsc::Sender<LogRecord>,
    min_level: Level,
    /// Total events seen by the layer (before filtering by level).
    pub total_events: Arc<AtomicU64>,
    /// Successfully enqueued into channel.
    pub enqueued_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
    /// Records the logger failed to deliver.
    pub failed_deliveries: Arc<AtomicU64>,
}

impl ElasticLogLayer {
    /// Create a new layer and spawn a background task that pulls
    /// [`LogRecord`]s from a bounded channel and delivers them through
    /// `logger`.
    ///
    /// `buffer` is raised to at least 16. Events more verbose than
    /// `min_level` are ignored.
    pub fn new(logger: Arc<ElasticLogger>, buffer: usize, min_level: Level) -> (Self, JoinHandle<()>) {
        let buffer = buffer.max(16);
        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer);

        let total_events = Arc::new(AtomicU64::new(0));
        let enqueued_events = Arc::new(AtomicU64::new(0));
        let dropped_events = Arc::new(AtomicU64::new(0));
        let failed_deliveries = Arc::new(AtomicU64::new(0));

        let failed_bg = Arc::clone(&failed_deliveries);

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = logger.deliver(record, None).await {
                    failed_bg.fetch_add(1, Ordering::Relaxed);
                    eprintln!("error delivering log record: {}", e);
                }
            }
        });

        (Self {
            sender: tx,
            min_level,
            total_events,
            enqueued_events,
            dropped_events,
            failed_deliveries,
        }, handle)
    }
}

pub fn severity_for(level: &Level) -> Severity {
    match *level {
        Level::ERROR => Severity::Error,
        Level::WARN => Severity::Warning,
        Level::INFO => Severity::Information,
        _ => Severity::Debug,
    }
}

fn is_ignored(target: &str) -> bool {
    IGNORED_TARGETS.iter().any(|ignored| target.starts_with(ignored))
}

/// Move fields named by message placeholders into the positional list.
/// Stops at the first placeholder without a matching field.
fn lift_placeholders(record: &mut LogRecord) {
    let names = match record.message.as_deref() {
        Some(message) => placeholder_names(message),
        None => return,
    };
    for name in names {
        match record.meta.remove(&name) {
            Some(value) => record.push_value(Value::classify(&value)),
            None => break,
        }
    }
}

fn event_record(event: &Event<'_>) -> LogRecord {
    let mut fields = BTreeMap::new();
    let mut message: Option<String> = None;

    let mut visitor = FieldVisitor { fields: &mut fields, message: &mut message };
    event.record(&mut visitor);

    let meta = event.metadata();
    fields.insert("target".to_string(), serde_json::Value::from(meta.target()));

    let mut record = LogRecord {
        timestamp: Some(Utc::now()),
        level: severity_for(meta.level()),
        message,
        meta: fields,
        values: Vec::new(),
    };
    lift_placeholders(&mut record);
    record
}

impl<S> Layer<S> for ElasticLogLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        let meta = event.metadata();
        if *meta.level() > self.min_level || is_ignored(meta.target()) {
            return;
        }

        match self.sender.try_send(event_record(event)) {
            Ok(()) => {
                self.enqueued_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_e) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping log record");
            }
        }
    }
}

use tracing::field::{Field, Visit};

pub struct FieldVisitor<'a> {
    pub fields: &'a mut BTreeMap<String, serde_json::Value>,
    pub message: &'a mut Option<String>,
}

impl<'a> Visit for FieldVisitor<'a> {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            *self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(value.to_string()));
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields.insert(field.name().to_string(), serde_json::Value::from(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        // the formatted message arrives here as `fmt::Arguments`
        if field.name() == "message" {
            *self.message = Some(format!("{:?}", value));
        } else {
            self.fields.insert(field.name().to_string(), serde_json::Value::String(format!("{:?}", value)));
        }
    }
}
