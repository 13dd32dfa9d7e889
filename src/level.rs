use crate::record::{LogRecord, Severity};

/// How the effective severity of a record is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LevelSelector {
    /// Always use this severity.
    Fixed(Severity),
    /// Read the severity name from a field path of the record.
    Field(String),
}

impl LevelSelector {
    /// A selector that names one of the four severities is fixed; anything
    /// else is a field path.
    pub fn parse(selector: &str) -> Self {
        match Severity::from_name(selector) {
            Some(level) => LevelSelector::Fixed(level),
            None => LevelSelector::Field(selector.to_string()),
        }
    }

    /// Resolve the severity for `record`. Never fails: unreadable paths and
    /// unknown names fall back to [`Severity::Debug`].
    pub fn resolve(&self, record: &LogRecord) -> Severity {
        match self {
            LevelSelector::Fixed(level) => *level,
            LevelSelector::Field(path) => record
                .field(path)
                .as_ref()
                .and_then(serde_json::Value::as_str)
                .and_then(Severity::from_name)
                .unwrap_or_else(|| {
                    tracing::debug!(path = %path, "level selector did not resolve, using Debug");
                    Severity::Debug
                }),
        }
    }
}

/// Resolve `selector` against `record`. See [`LevelSelector::resolve`].
pub fn resolve(selector: &str, record: &LogRecord) -> Severity {
    LevelSelector::parse(selector).resolve(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> LogRecord {
        LogRecord::new(Severity::Information, "msg")
            .with_meta("payload", json!({"sev": "Warning", "bad": "warning", "num": 1}))
    }

    #[test]
    fn fixed_selector_wins_unconditionally() {
        for level in Severity::ALL {
            assert_eq!(resolve(level.as_str(), &record()), level);
        }
    }

    #[test]
    fn field_selector_reads_record() {
        assert_eq!(resolve("payload.sev", &record()), Severity::Warning);
        assert_eq!(resolve("level", &record()), Severity::Information);
    }

    #[test]
    fn missing_path_defaults_to_debug() {
        let record = LogRecord::new(Severity::Error, "msg");
        assert_eq!(resolve("payload.sev", &record), Severity::Debug);
        assert_eq!(resolve("", &record), Severity::Debug);
    }

    #[test]
    fn unrecognized_values_default_to_debug() {
        assert_eq!(resolve("payload.bad", &record()), Severity::Debug);
        assert_eq!(resolve("payload.num", &record()), Severity::Debug);
        assert_eq!(resolve("payload", &record()), Severity::Debug);
    }

    #[test]
    fn parse_distinguishes_fixed_and_field() {
        assert_eq!(LevelSelector::parse("Error"), LevelSelector::Fixed(Severity::Error));
        assert_eq!(
            LevelSelector::parse("error"),
            LevelSelector::Field("error".to_string())
        );
    }
}
