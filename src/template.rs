//! Field templating: merges positional values into `{name}` placeholders and
//! writes type-suffixed fields into the record metadata.

use crate::record::{LogRecord, ResolvedLogRecord, Severity, Value, POSITIONAL_VALUES_KEY};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::ops::Range;

/// Metadata field identifying the producing system.
pub const ORIGIN_FIELD: &str = "Origin_String";

/// Metadata field carrying the local host name.
pub const MACHINE_NAME_FIELD: &str = "MachineName_String";

/// Origin tag used when none is configured.
pub const DEFAULT_ORIGIN: &str = "node-red";

/// Fixed contextual fields stamped onto every resolved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateContext {
    pub origin: String,
    pub host: String,
}

impl TemplateContext {
    pub fn new(origin: impl Into<String>, host: impl Into<String>) -> Self {
        TemplateContext {
            origin: origin.into(),
            host: host.into(),
        }
    }

    /// Build a context for `origin` using the host name of this machine.
    pub fn detect(origin: impl Into<String>) -> Self {
        TemplateContext::new(origin, host_name())
    }
}

/// Best-effort host name lookup: environment first, then the system call.
pub fn host_name() -> String {
    for key in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(name) = std::env::var(key) {
            if !name.is_empty() {
                return name;
            }
        }
    }

    #[cfg(unix)]
    {
        match nix::unistd::gethostname() {
            Ok(name) => {
                if let Some(name) = name.to_str().filter(|n| !n.is_empty()) {
                    return name.to_string();
                }
            }
            Err(e) => tracing::warn!(error = %e, "failed to read system hostname"),
        }
    }

    "unknown".to_string()
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("log message is missing")]
    MissingMessage,

    #[error("unclosed placeholder starting at byte {offset}")]
    UnclosedPlaceholder { offset: usize },
}

/// A `{name}` span found in a template. `span` covers the braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    pub span: Range<usize>,
}

/// Result of a merge. The record is always usable; `error` reports what
/// went wrong while building it.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub record: ResolvedLogRecord,
    pub error: Option<TemplateError>,
}

/// Scan `template` left to right, stopping after `limit` placeholders.
///
/// An inner `{` restarts the span, so `{a{b}` yields `b`. Empty `{}` pairs
/// are not placeholders.
fn scan(template: &str, limit: usize) -> (Vec<Placeholder>, Option<TemplateError>) {
    let mut found = Vec::new();
    let mut cursor = 0;

    while found.len() < limit {
        let Some(rel) = template[cursor..].find('{') else {
            break;
        };
        let open = cursor + rel;
        let body_start = open + 1;
        let Some(rel) = template[body_start..].find(|c: char| c == '{' || c == '}') else {
            return (found, Some(TemplateError::UnclosedPlaceholder { offset: open }));
        };
        let stop = body_start + rel;
        if template.as_bytes()[stop] == b'{' {
            cursor = stop;
            continue;
        }

        if stop > body_start {
            found.push(Placeholder {
                name: template[body_start..stop].to_string(),
                span: open..stop + 1,
            });
        }
        cursor = stop + 1;
    }

    (found, None)
}

/// Names of every placeholder in `template`, in order of appearance.
pub fn placeholder_names(template: &str) -> Vec<String> {
    scan(template, usize::MAX)
        .0
        .into_iter()
        .map(|p| p.name)
        .collect()
}

/// Merge positional `values` into `template` and `meta`.
///
/// At most `values.len()` placeholders are resolved; extra values are
/// ignored and extra placeholders stay verbatim in the message. The
/// positional list is removed from `meta` and the context fields are
/// stamped regardless of errors.
pub fn merge(
    template: Option<&str>,
    values: &[Value],
    mut meta: BTreeMap<String, serde_json::Value>,
    ctx: &TemplateContext,
    timestamp: Option<DateTime<Utc>>,
    level: Severity,
) -> Merge {
    meta.remove(POSITIONAL_VALUES_KEY);
    let timestamp = timestamp.unwrap_or_else(Utc::now);

    let (message, message_template, error) = match template {
        None => (String::new(), String::new(), Some(TemplateError::MissingMessage)),
        Some(template) => {
            let (placeholders, error) = scan(template, values.len());
            let mut message = String::with_capacity(template.len());
            let mut cursor = 0;
            for (placeholder, value) in placeholders.iter().zip(values) {
                meta.insert(value.field_name(&placeholder.name), value.to_json());
                message.push_str(&template[cursor..placeholder.span.start]);
                message.push_str(&value.render());
                cursor = placeholder.span.end;
            }
            message.push_str(&template[cursor..]);
            (message, template.to_string(), error)
        }
    };

    meta.insert(ORIGIN_FIELD.to_string(), serde_json::Value::String(ctx.origin.clone()));
    meta.insert(MACHINE_NAME_FIELD.to_string(), serde_json::Value::String(ctx.host.clone()));

    Merge {
        record: ResolvedLogRecord {
            timestamp,
            message,
            message_template,
            level,
            meta,
        },
        error,
    }
}

/// Merge a [`LogRecord`], taking positional values from its reserved
/// `values` metadata entry.
pub fn merge_record(record: LogRecord, ctx: &TemplateContext) -> Merge {
    let values = record.positional_values();
    let LogRecord {
        timestamp,
        level,
        message,
        meta,
        ..
    } = record;
    merge(message.as_deref(), &values, meta, ctx, timestamp, level)
}
