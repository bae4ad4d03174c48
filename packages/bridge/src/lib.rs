//! # webhdfs-bridge
//!
//! Synchronous writes bridged onto a background consumer.
//!
//! Some APIs want their input as a lazily produced stream (a chunked HTTP
//! request body, for instance) while the code producing the data wants to
//! push it with plain blocking calls. A [`Bridge`] joins the two: the
//! producer calls [`Session::write`], and a consumer function running on a
//! dedicated thread receives the written items as one [`Items`] iterator.
//!
//! ## Sessions
//!
//! ```text
//! Idle --open--> Active --close--> Idle --open--> Active ...
//! ```
//!
//! - `open` fails with [`Error::Reentrant`] if a session is already active.
//! - `close` always sends the end-of-stream marker and joins the worker,
//!   including when the producer failed or is panicking.
//! - A consumer failure makes later writes fail fast and is reported by
//!   `close`. When both sides fail, [`Bridge::scope`] reports the consumer's
//!   error.

pub mod bridge;
pub mod channel;
pub mod config;
pub mod error;
pub mod session;

pub use bridge::{Bridge, Consumer};
pub use channel::Items;
pub use config::BridgeConfig;
pub use error::{BoxError, ConsumerError, Error, Result};
pub use session::{Session, SessionId, SessionState};
