//! Bridge configuration.

/// Default name given to session worker threads.
pub const DEFAULT_THREAD_NAME: &str = "webhdfs-bridge";

/// Configuration for a [`Bridge`](crate::Bridge).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Maximum number of items waiting in the hand-off buffer.
    ///
    /// `None` buffers without bound. With `Some(n)`, `write` blocks once
    /// `n` items are pending until the consumer catches up.
    pub capacity: Option<usize>,

    /// Name of the worker thread spawned for each session.
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            capacity: None,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Bound the hand-off buffer to `capacity` pending items.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Let the hand-off buffer grow without bound.
    pub fn unbounded(mut self) -> Self {
        self.capacity = None;
        self
    }

    /// Name the worker thread.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded() {
        let config = BridgeConfig::default();
        assert_eq!(config.capacity, None);
        assert_eq!(config.thread_name, DEFAULT_THREAD_NAME);
    }

    #[test]
    fn builders_override_fields() {
        let config = BridgeConfig::default()
            .with_capacity(4)
            .with_thread_name("upload");
        assert_eq!(config.capacity, Some(4));
        assert_eq!(config.thread_name, "upload");
        assert_eq!(config.unbounded().capacity, None);
    }
}
