//! Error types for the bridge.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by consumer functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by a [`Bridge`](crate::Bridge) and its sessions.
#[derive(Debug, Error)]
pub enum Error {
    /// A session is already active on this bridge.
    #[error("cannot open a session: the bridge already has an active session")]
    Reentrant,

    /// The consumer function failed while draining the session.
    #[error("consumer failed: {0}")]
    Consumer(#[from] ConsumerError),

    /// The consumer returned without draining while items were still being written.
    #[error("consumer stopped reading before the session was closed")]
    ConsumerStopped,

    /// A bounded hand-off buffer must hold at least one item.
    #[error("invalid hand-off capacity: bounded buffers need room for at least one item")]
    InvalidCapacity,

    /// The worker thread could not be started.
    #[error("failed to spawn consumer thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl Error {
    /// Returns the consumer failure, if this error carries one.
    pub fn consumer_error(&self) -> Option<&ConsumerError> {
        match self {
            Error::Consumer(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for bridge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The failure recorded for a session's consumer.
///
/// Cloning is cheap: every `write` after the failure and the final close
/// report the same underlying error.
#[derive(Clone)]
pub struct ConsumerError {
    inner: Arc<dyn std::error::Error + Send + Sync + 'static>,
}

impl ConsumerError {
    pub(crate) fn new(error: BoxError) -> Self {
        Self {
            inner: Arc::from(error),
        }
    }

    /// Builds the error recorded when the consumer panics.
    pub(crate) fn panicked(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            format!("consumer panicked: {s}")
        } else if let Some(s) = payload.downcast_ref::<String>() {
            format!("consumer panicked: {s}")
        } else {
            "consumer panicked".to_string()
        };
        Self::new(message.into())
    }

    /// The error as returned by the consumer.
    pub fn get_ref(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.inner
    }

    /// Attempts to view the consumer's error as a concrete type.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.inner.downcast_ref::<E>()
    }
}

impl fmt::Debug for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

impl fmt::Display for ConsumerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

// Display already prints the inner error, so the chain continues below it.
impl std::error::Error for ConsumerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.inner.source()
    }
}
