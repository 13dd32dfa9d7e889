use crate::record::{ResolvedLogRecord, Severity};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

pub const TRANSACTION_ID_KEY: &str = "transaction.id";
pub const TRACE_ID_KEY: &str = "trace.id";
pub const SPAN_ID_KEY: &str = "span.id";

/// Nested `{ "id": ... }` object for a lifted correlation identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationId {
    pub id: serde_json::Value,
}

/// Document shape indexed by Elasticsearch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElasticDocument {
    #[serde(rename = "@timestamp")]
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(rename = "messageTemplate")]
    pub message_template: String,
    pub severity: Severity,
    pub level: Severity,
    pub fields: BTreeMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<CorrelationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<CorrelationId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<CorrelationId>,
}

/// Shape a resolved record into an [`ElasticDocument`].
///
/// `severity` and `level` carry the same value; consumers query on either.
/// Correlation identifiers are moved out of `fields` into nested objects.
pub fn transform(record: &ResolvedLogRecord) -> ElasticDocument {
    let mut fields = record.meta.clone();
    let mut lift = |key: &str| fields.remove(key).map(|id| CorrelationId { id });

    let transaction = lift(TRANSACTION_ID_KEY);
    let trace = lift(TRACE_ID_KEY);
    let span = lift(SPAN_ID_KEY);

    ElasticDocument {
        timestamp: record.timestamp,
        message: record.message.clone(),
        message_template: record.message_template.clone(),
        severity: record.level,
        level: record.level,
        fields,
        transaction,
        trace,
        span,
    }
}
