//! # webhdfs-http
//!
//! Chunked HTTP uploads fed by blocking writes.
//!
//! WebHDFS-style `CREATE`/`APPEND` calls want the file contents as a request
//! body, while the code producing those contents usually pushes them a piece
//! at a time. [`StreamingUpload`] connects the two through a
//! [`webhdfs_bridge::Bridge`]: chunks written in a session are streamed as
//! the body of one request running on a background thread.
//!
//! ```ignore
//! use std::sync::Arc;
//! use webhdfs_http::{ReqwestExecutor, StreamingUpload, UploadRequest};
//!
//! let upload = StreamingUpload::new(
//!     Arc::new(ReqwestExecutor::with_default_timeout()?),
//!     UploadRequest::post("http://datanode:9864/webhdfs/v1/logs/app.log").with_query("op", "APPEND"),
//! );
//!
//! let response = upload.upload_chunks(["first line\n", "second line\n"])?;
//! ```
//!
//! ## Pieces
//!
//! - [`UploadExecutor`] sends one request with a streamed body;
//!   [`ReqwestExecutor`] is the production implementation.
//! - [`ChunkReader`] reads a sequence of chunks as one byte stream.
//! - [`BodyWriter`] lets `std::io` code write into an open session.

pub mod body;
pub mod error;
pub mod executor;
pub mod types;
pub mod upload;

pub use body::{BodyWriter, ChunkReader};
pub use error::Error;
pub use executor::{ReqwestExecutor, UploadBody, UploadExecutor};
pub use types::{Method, UploadRequest, UploadResponse};
pub use upload::StreamingUpload;
