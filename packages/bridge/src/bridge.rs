//! The bridge: blocking writes on one thread, a lazy item stream on another.
//!
//! # Example
//!
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use webhdfs_bridge::{Bridge, Error, Items};
//!
//! let received = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&received);
//! let bridge = Bridge::new(move |items: Items<u32>| {
//!     sink.lock().unwrap().push(items.collect::<Vec<_>>());
//!     Ok(())
//! });
//!
//! bridge.scope(|session| -> Result<(), Error> {
//!     session.write(1)?;
//!     session.write(2)?;
//!     Ok(())
//! })?;
//!
//! assert_eq!(*received.lock().unwrap(), vec![vec![1, 2]]);
//! # Ok::<(), Error>(())
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::channel::{self, Items};
use crate::config::BridgeConfig;
use crate::error::{BoxError, ConsumerError, Error, Result};
use crate::session::{Session, SessionId, SessionState, WorkerOutcome};

/// A consumer function: drains one session's items on the worker thread.
pub type Consumer<T> = dyn Fn(Items<T>) -> std::result::Result<(), BoxError> + Send + Sync;

/// Lets a producer push items with blocking calls while a consumer function
/// reads them as one continuous stream on a background thread.
///
/// Each [`Session`] gets its own hand-off channel and worker thread. At most
/// one session is open per bridge at a time; sessions can be opened again
/// once the previous one is closed.
pub struct Bridge<T> {
    consumer: Arc<Consumer<T>>,
    config: BridgeConfig,
    active: AtomicBool,
}

impl<T: Send + 'static> Bridge<T> {
    /// Create a bridge with the default configuration.
    pub fn new<F>(consumer: F) -> Self
    where
        F: Fn(Items<T>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::with_config(BridgeConfig::default(), consumer)
    }

    /// Create a bridge with the given configuration.
    pub fn with_config<F>(config: BridgeConfig, consumer: F) -> Self
    where
        F: Fn(Items<T>) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        Self::from_shared(config, Arc::new(consumer))
    }

    /// Create a bridge around a consumer that may be shared with other bridges.
    pub fn from_shared(config: BridgeConfig, consumer: Arc<Consumer<T>>) -> Self {
        Self {
            consumer,
            config,
            active: AtomicBool::new(false),
        }
    }

    /// A new, idle bridge with the same consumer and configuration.
    ///
    /// Sessions on the two bridges are independent of each other.
    pub fn sibling(&self) -> Self {
        Self::from_shared(self.config.clone(), Arc::clone(&self.consumer))
    }

    /// This bridge's configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Whether a session is currently open.
    pub fn state(&self) -> SessionState {
        if self.active.load(Ordering::Acquire) {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    /// Open a session and start its consumer.
    ///
    /// Fails with [`Error::Reentrant`] while another session is open on
    /// this bridge. The consumer starts immediately on its own thread;
    /// items written before it begins reading are buffered.
    pub fn open(&self) -> Result<Session<'_, T>> {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Reentrant);
        }

        match self.start() {
            Ok(session) => Ok(session),
            Err(err) => {
                self.active.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    fn start(&self) -> Result<Session<'_, T>> {
        let (tx, items) = channel::hand_off(self.config.capacity)?;
        let id = SessionId::new();
        let outcome = Arc::new(WorkerOutcome::default());

        let consumer = Arc::clone(&self.consumer);
        let recorder = Arc::clone(&outcome);
        let worker = thread::Builder::new()
            .name(self.config.thread_name.clone())
            .spawn(move || {
                let result = match panic::catch_unwind(AssertUnwindSafe(|| consumer(items))) {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(err)) => Err(ConsumerError::new(err)),
                    Err(payload) => Err(ConsumerError::panicked(&*payload)),
                };
                if let Err(err) = &result {
                    debug!(session = %id, error = %err, "consumer failed");
                }
                recorder.record(result);
            })
            .map_err(Error::Spawn)?;

        debug!(session = %id, capacity = ?self.config.capacity, "session opened");
        Ok(Session::new(id, &self.active, tx, outcome, worker))
    }

    /// Run `body` inside a session, closing it on every exit path.
    ///
    /// The session is closed after `body` returns, or while unwinding if it
    /// panics. Errors are resolved as follows:
    ///
    /// - if the consumer failed, its error is returned, even when `body`
    ///   also failed (the producer's error is logged and dropped);
    /// - otherwise an error returned by `body` is passed through unchanged;
    /// - otherwise `body`'s value is returned.
    pub fn scope<R, P, F>(&self, body: F) -> std::result::Result<R, P>
    where
        F: FnOnce(&Session<'_, T>) -> std::result::Result<R, P>,
        P: From<Error> + fmt::Display,
    {
        let session = self.open()?;
        let id = session.id();
        let produced = body(&session);

        match (session.close(), produced) {
            (Ok(()), produced) => produced,
            (Err(err), Ok(_)) => Err(P::from(err)),
            (Err(err), Err(producer)) => {
                warn!(session = %id, error = %producer, "producer error superseded by consumer failure");
                Err(P::from(err))
            }
        }
    }
}

impl<T> fmt::Debug for Bridge<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("config", &self.config)
            .field("active", &self.active.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting() -> (Bridge<i32>, Arc<Mutex<Vec<Vec<i32>>>>) {
        let result = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&result);
        let bridge = Bridge::new(move |items: Items<i32>| {
            sink.lock().unwrap().push(items.collect());
            Ok(())
        });
        (bridge, result)
    }

    #[test]
    fn open_close_toggles_state() {
        let (bridge, result) = collecting();
        assert_eq!(bridge.state(), SessionState::Idle);

        let session = bridge.open().unwrap();
        assert_eq!(bridge.state(), SessionState::Active);
        session.write(5).unwrap();
        assert_eq!(session.written(), 1);
        session.close().unwrap();

        assert_eq!(bridge.state(), SessionState::Idle);
        assert_eq!(*result.lock().unwrap(), vec![vec![5]]);
    }

    #[test]
    fn open_while_active_is_rejected() {
        let (bridge, _) = collecting();
        let session = bridge.open().unwrap();

        assert!(matches!(bridge.open(), Err(Error::Reentrant)));

        session.close().unwrap();
        bridge.open().unwrap().close().unwrap();
    }

    #[test]
    fn drop_closes_session() {
        let (bridge, result) = collecting();
        {
            let session = bridge.open().unwrap();
            session.write(1).unwrap();
        }
        assert_eq!(bridge.state(), SessionState::Idle);
        assert_eq!(*result.lock().unwrap(), vec![vec![1]]);
    }

    #[test]
    fn zero_capacity_leaves_bridge_idle() {
        let bridge = Bridge::with_config(BridgeConfig::default().with_capacity(0), |items: Items<u8>| {
            items.for_each(drop);
            Ok(())
        });

        assert!(matches!(bridge.open(), Err(Error::InvalidCapacity)));
        assert_eq!(bridge.state(), SessionState::Idle);
    }

    #[test]
    fn worker_thread_is_named() {
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&names);
        let config = BridgeConfig::default().with_thread_name("chunk-upload");
        let bridge = Bridge::with_config(config, move |items: Items<u8>| {
            sink.lock()
                .unwrap()
                .push(thread::current().name().map(str::to_string));
            items.for_each(drop);
            Ok(())
        });

        bridge.open().unwrap().close().unwrap();
        assert_eq!(
            *names.lock().unwrap(),
            vec![Some("chunk-upload".to_string())]
        );
    }

    #[test]
    fn sibling_shares_consumer_but_not_state() {
        let (bridge, result) = collecting();
        let other = bridge.sibling();

        let first = bridge.open().unwrap();
        assert_eq!(other.state(), SessionState::Idle);
        let second = other.open().unwrap();

        first.write(1).unwrap();
        second.write(2).unwrap();
        first.close().unwrap();
        second.close().unwrap();

        let mut seen = result.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![vec![1], vec![2]]);
    }
}
