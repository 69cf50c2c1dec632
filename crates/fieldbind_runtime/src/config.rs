//! Executor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Maximum field nesting depth of an operation.
    pub max_depth: usize,
    /// Maximum number of keys handed to one batch function call.
    /// `None` dispatches every queued key in one call.
    pub max_batch_size: Option<usize>,
    /// Number of subscription payloads prepared ahead of delivery.
    pub subscription_buffer: usize,
    /// Timeout for a deferred field result in milliseconds. `0` disables it.
    pub field_timeout_ms: u64,
    /// Enable per-field tracing.
    pub tracing: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            max_batch_size: None,
            subscription_buffer: 1,
            field_timeout_ms: 30000,
            tracing: false,
        }
    }
}

impl ExecutorConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Sets the maximum batch size for every loader.
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = Some(size.max(1));
        self
    }

    /// Sets how many subscription payloads may be prepared concurrently.
    pub fn with_subscription_buffer(mut self, buffer: usize) -> Self {
        self.subscription_buffer = buffer.max(1);
        self
    }

    /// Sets the deferred field timeout.
    pub fn with_field_timeout(mut self, timeout: Duration) -> Self {
        self.field_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Disables the deferred field timeout.
    pub fn without_field_timeout(mut self) -> Self {
        self.field_timeout_ms = 0;
        self
    }

    /// Enables per-field tracing.
    pub fn with_tracing(mut self) -> Self {
        self.tracing = true;
        self
    }

    pub(crate) fn field_timeout(&self) -> Option<Duration> {
        (self.field_timeout_ms > 0).then(|| Duration::from_millis(self.field_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: ExecutorConfig = serde_json::from_str(r#"{"max_depth": 4}"#).unwrap();
        assert_eq!(config.max_depth, 4);
        assert_eq!(config.max_batch_size, None);
        assert_eq!(config.field_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_builder() {
        let config = ExecutorConfig::new()
            .with_max_batch_size(0)
            .with_subscription_buffer(4)
            .without_field_timeout()
            .with_tracing();
        assert_eq!(config.max_batch_size, Some(1));
        assert_eq!(config.subscription_buffer, 4);
        assert_eq!(config.field_timeout(), None);
        assert!(config.tracing);
    }
}
