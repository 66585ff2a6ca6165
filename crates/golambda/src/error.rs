use std::backtrace::Backtrace;
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Handler error carrying key/value context for the error log.
///
/// ```
/// use golambda::Error;
///
/// let error = Error::new("queue message rejected").with("queue", "orders");
/// assert_eq!(error.values()["queue"], "orders");
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct Error {
    message: String,
    values: BTreeMap<String, Value>,
    stacktrace: String,
    #[source]
    source: Option<BoxedSource>,
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            values: BTreeMap::new(),
            stacktrace: Backtrace::capture().to_string(),
            source: None,
        }
    }

    /// Wraps `source`; the message becomes `"{message}: {source}"`.
    pub fn wrap(
        source: impl std::error::Error + Send + Sync + 'static,
        message: impl AsRef<str>,
    ) -> Self {
        Self {
            message: format!("{}: {source}", message.as_ref()),
            values: BTreeMap::new(),
            stacktrace: Backtrace::capture().to_string(),
            source: Some(Box::new(source)),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|error| Value::String(format!("<unserializable: {error}>")));
        self.values.insert(key.into(), value);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn stacktrace(&self) -> &str {
        &self.stacktrace
    }
}
