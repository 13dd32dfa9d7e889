use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Reserved `meta` key holding the ordered list of positional template values.
pub const POSITIONAL_VALUES_KEY: &str = "values";

static GUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("static guid pattern")
});

/// Severity of a log record, ordered by increasing verbosity.
///
/// `Error` is the most severe. Anything that cannot be resolved to one of
/// the four names collapses to `Debug`, never upwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Severity {
    Error = 0,
    Warning = 1,
    Information = 2,
    #[default]
    Debug = 3,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Error,
        Severity::Warning,
        Severity::Information,
        Severity::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Information => "Information",
            Severity::Debug => "Debug",
        }
    }

    /// Exact, case-sensitive lookup by name.
    pub fn from_name(name: &str) -> Option<Severity> {
        Severity::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("unknown severity: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::from_name(s).ok_or_else(|| UnknownSeverity(s.to_string()))
    }
}

/// A positional metadata value, classified by its runtime shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    /// Canonical `8-4-4-4-12` hex identifier, kept in its original casing.
    Guid(String),
    Number(serde_json::Number),
    Boolean(bool),
    DateTime(DateTime<Utc>),
    /// Anything else; stored verbatim under the bare field name.
    Other(serde_json::Value),
}

impl Value {
    /// Classify a JSON value.
    ///
    /// GUID detection takes precedence over plain strings. Date-like text
    /// stays a `String`; only values built from a `DateTime<Utc>` are tagged
    /// `DateTime`.
    pub fn classify(value: &serde_json::Value) -> Value {
        match value {
            serde_json::Value::String(s) if GUID_PATTERN.is_match(s) => Value::Guid(s.clone()),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Number(n) => Value::Number(n.clone()),
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            other => Value::Other(other.clone()),
        }
    }

    /// Suffix appended to the field name, `None` for [`Value::Other`].
    pub fn type_tag(&self) -> Option<&'static str> {
        match self {
            Value::String(_) => Some("String"),
            Value::Guid(_) => Some("Guid"),
            Value::Number(_) => Some("Number"),
            Value::Boolean(_) => Some("Boolean"),
            Value::DateTime(_) => Some("DateTime"),
            Value::Other(_) => None,
        }
    }

    /// Name of the metadata field this value is stored under.
    pub fn field_name(&self, name: &str) -> String {
        match self.type_tag() {
            Some(tag) => format!("{}_{}", name, tag),
            None => name.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) | Value::Guid(s) => serde_json::Value::String(s.clone()),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::DateTime(dt) => serde_json::Value::String(dt.to_rfc3339()),
            Value::Other(v) => v.clone(),
        }
    }

    /// Text substituted into a message placeholder.
    pub fn render(&self) -> String {
        match self {
            Value::String(s) | Value::Guid(s) => format!("'{}'", s),
            Value::Number(n) => n.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::DateTime(dt) => dt.to_rfc3339(),
            Value::Other(v) => v.to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::classify(&serde_json::Value::String(s.to_string()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::classify(&serde_json::Value::String(s))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        match serde_json::Number::from_f64(n) {
            Some(n) => Value::Number(n),
            None => Value::Other(serde_json::Value::Null),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Value::DateTime(dt)
    }
}

/// A log record as handed over by the host's routing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub level: Severity,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, serde_json::Value>,
    /// Typed copy of the positional list, filled by [`LogRecord::push_value`].
    #[serde(skip)]
    pub(crate) values: Vec<Value>,
}

impl LogRecord {
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: None,
            level,
            message: Some(message.into()),
            meta: BTreeMap::new(),
            values: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Append a positional value to the reserved `values` list.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.push_value(value.into());
        self
    }

    ///
    /// The value keeps its tag through to the merge; the `values` metadata
    /// entry only mirrors it for field lookups.
    pub fn push_value(&mut self, value: Value) {
        if self.values.is_empty() {
            self.values = self.meta_values();
        }
        let json = value.to_json();
        self.values.push(value);
        let slot = self
            .meta
            .entry(POSITIONAL_VALUES_KEY.to_string())
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        match slot {
            serde_json::Value::Array(items) => items.push(json),
            other => *other = serde_json::Value::Array(vec![json]),
        }
    }

    /// Positional values in order. Values pushed through
    /// [`LogRecord::push_value`] keep their tag; a list that only arrived in
    /// `meta` is classified.
    pub fn positional_values(&self) -> Vec<Value> {
        if self.values.is_empty() {
            self.meta_values()
        } else {
            self.values.clone()
        }
    }

    fn meta_values(&self) -> Vec<Value> {
        match self.meta.get(POSITIONAL_VALUES_KEY) {
            Some(serde_json::Value::Array(items)) => items.iter().map(Value::classify).collect(),
            _ => Vec::new(),
        }
    }

    /// Read a dotted field path from the record.
    ///
    /// `level`, `message` and `timestamp` address the record itself, `meta`
    /// addresses the whole metadata map, any other first segment is looked up
    /// in `meta`. Numeric segments index arrays.
    pub fn field(&self, path: &str) -> Option<serde_json::Value> {
        let mut segments = path.split('.');
        let first = segments.next().filter(|s| !s.is_empty())?;
        let root = match first {
            "level" => serde_json::Value::String(self.level.to_string()),
            "message" => serde_json::Value::String(self.message.clone()?),
            "timestamp" => serde_json::Value::String(self.timestamp?.to_rfc3339()),
            "meta" => serde_json::Value::Object(
                self.meta.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            ),
            other => self.meta.get(other)?.clone(),
        };
        segments.try_fold(root, descend)
    }
}

fn descend(current: serde_json::Value, segment: &str) -> Option<serde_json::Value> {
    if segment.is_empty() {
        return None;
    }
    match current {
        serde_json::Value::Object(mut map) => map.remove(segment),
        serde_json::Value::Array(mut items) => {
            let idx = segment.parse::<usize>().ok()?;
            if idx < items.len() {
                Some(items.swap_remove(idx))
            } else {
                None
            }
        }
        _ => None,
    }
}

/// A record after template resolution, ready to be shaped into a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLogRecord {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub message_template: String,
    pub level: Severity,
    pub meta: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_is_ordered_by_verbosity() {
        assert!(Severity::Error < Severity::Warning);
        assert!(Severity::Warning < Severity::Information);
        assert!(Severity::Information < Severity::Debug);
        assert_eq!(Severity::Error as u8, 0);
        assert_eq!(Severity::default(), Severity::Debug);
    }

    #[test]
    fn severity_names_are_case_sensitive() {
        assert_eq!("Warning".parse::<Severity>(), Ok(Severity::Warning));
        assert!("warning".parse::<Severity>().is_err());
        assert_eq!(Severity::from_name("ERROR"), None);
    }

    #[test]
    fn classify_guid_before_string() {
        let v = Value::classify(&json!("7C9E6679-7425-40de-944b-e07fc1f90ae7"));
        assert_eq!(v.type_tag(), Some("Guid"));
        let v = Value::classify(&json!("7c9e6679-7425-40de-944b-e07fc1f90ae"));
        assert_eq!(v.type_tag(), Some("String"));
        let v = Value::classify(&json!("{7c9e6679-7425-40de-944b-e07fc1f90ae7}"));
        assert_eq!(v.type_tag(), Some("String"));
    }

    #[test]
    fn classify_scalar_kinds() {
        assert_eq!(Value::classify(&json!(42)).type_tag(), Some("Number"));
        assert_eq!(Value::classify(&json!(false)).type_tag(), Some("Boolean"));
        assert_eq!(
            Value::classify(&json!("2024-03-01T10:00:00Z")).type_tag(),
            Some("String")
        );
        assert_eq!(Value::classify(&json!(null)).type_tag(), None);
        assert_eq!(Value::classify(&json!({"a": 1})).field_name("obj"), "obj");
    }

    #[test]
    fn render_quotes_only_strings() {
        assert_eq!(Value::from("abc").render(), "'abc'");
        assert_eq!(Value::from(5i64).render(), "5");
        assert_eq!(Value::from(true).render(), "true");
        assert_eq!(Value::Other(json!([1, 2])).render(), "[1,2]");
    }

    #[test]
    fn field_reads_meta_and_record_properties() {
        let record = LogRecord::new(Severity::Warning, "hi")
            .with_meta("payload", json!({"sev": "Error", "list": ["a", "b"]}));

        assert_eq!(record.field("payload.sev"), Some(json!("Error")));
        assert_eq!(record.field("payload.list.1"), Some(json!("b")));
        assert_eq!(record.field("meta.payload.sev"), Some(json!("Error")));
        assert_eq!(record.field("level"), Some(json!("Warning")));
        assert_eq!(record.field("message"), Some(json!("hi")));
        assert_eq!(record.field("payload.missing"), None);
        assert_eq!(record.field("payload..sev"), None);
        assert_eq!(record.field(""), None);
        assert_eq!(record.field("timestamp"), None);
    }

    #[test]
    fn push_value_appends_in_order() {
        let record = LogRecord::new(Severity::Debug, "{a} {b}")
            .with_value("x")
            .with_value(3i64);
        assert_eq!(record.meta[POSITIONAL_VALUES_KEY], json!(["x", 3]));
        assert_eq!(record.positional_values().len(), 2);
    }

    #[test]
    fn pushed_values_keep_their_tag() {
        let at = Utc::now();
        let record = LogRecord::new(Severity::Debug, "{when} {tag}")
            .with_value(at)
            .with_value("2024-03-01T10:00:00+02:00");

        let values = record.positional_values();
        assert_eq!(values[0], Value::DateTime(at));
        assert_eq!(values[1], Value::String("2024-03-01T10:00:00+02:00".to_string()));
    }

    #[test]
    fn push_extends_a_list_supplied_in_meta() {
        let mut record = LogRecord::new(Severity::Debug, "{a} {b}").with_meta(POSITIONAL_VALUES_KEY, json!([1]));
        record.push_value(Value::from(true));
        assert_eq!(record.positional_values(), vec![Value::from(1i64), Value::from(true)]);
        assert_eq!(record.meta[POSITIONAL_VALUES_KEY], json!([1, true]));
    }
}
