//! Sessions: one open-to-close lifetime of a bridge.
//!
//! A session owns the producer half of a fresh hand-off channel and the
//! worker thread draining it. Closing always enqueues the end marker and
//! joins the worker, whether the producer finished normally, returned an
//! error, or is unwinding from a panic.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::channel::{HandOff, Message};
use crate::error::{ConsumerError, Error, Result};

/// Unique identifier for a session, used in log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a bridge currently has an open session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No session is open; `open` will succeed.
    Idle,
    /// A session is open; `open` fails until it is closed.
    Active,
}

#[derive(Default)]
struct Outcome {
    finished: bool,
    failure: Option<ConsumerError>,
}

/// Outcome slot shared between a session and its worker thread.
#[derive(Default)]
pub(crate) struct WorkerOutcome {
    state: Mutex<Outcome>,
    finished: Condvar,
}

impl WorkerOutcome {
    /// Record how the consumer finished and wake anyone waiting for it.
    pub(crate) fn record(&self, result: std::result::Result<(), ConsumerError>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.finished = true;
        if let Err(err) = result {
            state.failure.get_or_insert(err);
        }
        self.finished.notify_all();
    }

    /// The consumer failure recorded so far, if any.
    fn failure(&self) -> Option<ConsumerError> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failure
            .clone()
    }

    /// Block until the consumer has finished, then return its failure.
    fn wait(&self) -> Option<ConsumerError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while !state.finished {
            state = self
                .finished
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.failure.clone()
    }
}

/// An open session on a [`Bridge`](crate::Bridge).
///
/// Obtained from [`Bridge::open`](crate::Bridge::open), or handed to the
/// body of [`Bridge::scope`](crate::Bridge::scope). Call [`close`](Self::close)
/// to finish the session and learn whether the consumer succeeded. Dropping
/// an unclosed session closes it too, but can only log a consumer failure.
pub struct Session<'a, T> {
    id: SessionId,
    active: &'a AtomicBool,
    tx: HandOff<T>,
    outcome: Arc<WorkerOutcome>,
    worker: Option<JoinHandle<()>>,
    written: Cell<u64>,
}

impl<'a, T> Session<'a, T> {
    pub(crate) fn new(
        id: SessionId,
        active: &'a AtomicBool,
        tx: HandOff<T>,
        outcome: Arc<WorkerOutcome>,
        worker: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            active,
            tx,
            outcome,
            worker: Some(worker),
            written: Cell::new(0),
        }
    }

    /// This session's identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Number of items successfully handed to the consumer's queue.
    pub fn written(&self) -> u64 {
        self.written.get()
    }

    /// Hand `item` to the consumer.
    ///
    /// Blocks while a bounded buffer is full; on a thread with a tokio
    /// runtime context the buffer is polled rather than awaited. Fails with the consumer's
    /// error once the consumer has failed, and with
    /// [`Error::ConsumerStopped`] if it returned without draining.
    pub fn write(&self, item: T) -> Result<()> {
        if let Some(err) = self.outcome.failure() {
            return Err(Error::Consumer(err));
        }

        if self.tx.send(Message::Item(item)).is_err() {
            // The consumer dropped its items; wait for it to report why.
            return Err(match self.outcome.wait() {
                Some(err) => Error::Consumer(err),
                None => Error::ConsumerStopped,
            });
        }

        let written = self.written.get() + 1;
        self.written.set(written);
        trace!(session = %self.id, written, "item queued");
        Ok(())
    }

    /// Close the session: signal end of stream, wait for the consumer and
    /// report its failure, if any.
    pub fn close(mut self) -> Result<()> {
        self.finish()
    }

    fn finish(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        let consumer_gone = self.tx.send(Message::End).is_err();

        let joined = worker.join();
        self.active.store(false, Ordering::Release);

        if let Err(payload) = joined {
            self.outcome.record(Err(ConsumerError::panicked(&*payload)));
        }

        match self.outcome.failure() {
            Some(err) => {
                debug!(session = %self.id, written = self.written.get(), error = %err, "session closed with consumer failure");
                Err(Error::Consumer(err))
            }
            None => {
                if consumer_gone {
                    warn!(session = %self.id, "consumer returned before the end of the stream");
                }
                debug!(session = %self.id, written = self.written.get(), "session closed");
                Ok(())
            }
        }
    }
}

impl<T> Drop for Session<'_, T> {
    fn drop(&mut self) {
        if self.worker.is_none() {
            return;
        }
        if let Err(err) = self.finish() {
            if std::thread::panicking() {
                debug!(session = %self.id, error = %err, "consumer failure while unwinding");
            } else {
                warn!(session = %self.id, error = %err, "session dropped without close; consumer failure lost");
            }
        }
    }
}

impl<T> std::fmt::Debug for Session<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("written", &self.written.get())
            .field("open", &self.worker.is_some())
            .finish()
    }
}
