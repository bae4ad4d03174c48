//! Hand-off channel between a session's producer and its consumer.
//!
//! The producer side is [`HandOff`], the consumer side is [`Items`]. Both
//! wrap a tokio mpsc channel used from plain threads through its blocking
//! API. The end of the stream is an explicit [`Message::End`] rather than
//! the channel closing, so the consumer can tell a finished session from a
//! producer that vanished.
//!
//! `blocking_send` panics on a thread that is driving a tokio runtime. On
//! any thread with a runtime context, a full bounded buffer is polled with
//! `try_send` instead, so writing and closing never panic there.

use std::iter::FusedIterator;
use std::thread;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{Error, Result};

/// A value travelling through the hand-off channel.
#[derive(Debug)]
pub(crate) enum Message<T> {
    /// An item written by the producer.
    Item(T),
    /// The session is closing; no items follow.
    End,
}

enum Tx<T> {
    Bounded(mpsc::Sender<Message<T>>),
    Unbounded(mpsc::UnboundedSender<Message<T>>),
}

enum Rx<T> {
    Bounded(mpsc::Receiver<Message<T>>),
    Unbounded(mpsc::UnboundedReceiver<Message<T>>),
}

/// Pause between attempts while polling a full bounded buffer.
const FULL_BUFFER_BACKOFF: Duration = Duration::from_millis(1);

/// Producer half of the hand-off channel.
pub(crate) struct HandOff<T> {
    tx: Tx<T>,
}

/// Create a hand-off channel, bounded to `capacity` pending messages when given.
pub(crate) fn hand_off<T>(capacity: Option<usize>) -> Result<(HandOff<T>, Items<T>)> {
    let (tx, rx) = match capacity {
        Some(0) => return Err(Error::InvalidCapacity),
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity);
            (Tx::Bounded(tx), Rx::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Tx::Unbounded(tx), Rx::Unbounded(rx))
        }
    };

    Ok((
        HandOff { tx },
        Items {
            rx,
            finished: false,
            received: 0,
        },
    ))
}

impl<T> HandOff<T> {
    /// Send a message, blocking while a bounded buffer is full.
    ///
    /// Returns the message back when the consumer side is gone.
    pub(crate) fn send(&self, message: Message<T>) -> std::result::Result<(), Message<T>> {
        match &self.tx {
            Tx::Bounded(tx) if Handle::try_current().is_ok() => poll_send(tx, message),
            Tx::Bounded(tx) => tx.blocking_send(message).map_err(|e| e.0),
            Tx::Unbounded(tx) => tx.send(message).map_err(|e| e.0),
        }
    }
}

fn poll_send<M>(tx: &mpsc::Sender<M>, mut message: M) -> std::result::Result<(), M> {
    loop {
        match tx.try_send(message) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(returned)) => {
                message = returned;
                thread::sleep(FULL_BUFFER_BACKOFF);
            }
            Err(TrySendError::Closed(returned)) => return Err(returned),
        }
    }
}

/// The lazy sequence of items handed to a consumer function.
///
/// Yields items in the order they were written and ends at the session's
/// end-of-stream marker. Once it has returned `None` it keeps returning
/// `None`; a session's items can be drained only once.
pub struct Items<T> {
    rx: Rx<T>,
    finished: bool,
    received: u64,
}

impl<T> Items<T> {
    /// Number of items yielded so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Whether the end of the stream has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn recv(&mut self) -> Option<Message<T>> {
        match &mut self.rx {
            Rx::Bounded(rx) => rx.blocking_recv(),
            Rx::Unbounded(rx) => rx.blocking_recv(),
        }
    }
}

impl<T> Iterator for Items<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }

        match self.recv() {
            Some(Message::Item(item)) => {
                self.received += 1;
                Some(item)
            }
            // A dropped producer without an end marker still terminates the stream.
            Some(Message::End) | None => {
                self.finished = true;
                None
            }
        }
    }
}

impl<T> FusedIterator for Items<T> {}

impl<T> std::fmt::Debug for Items<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Items")
            .field("finished", &self.finished)
            .field("received", &self.received)
            .finish()
    }
}
