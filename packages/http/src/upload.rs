//! Streaming uploads: blocking chunk writes become one chunked request body.
//!
//! A [`StreamingUpload`] owns a [`Bridge`] whose consumer runs the upload on
//! the bridge's worker thread. Chunks written in a session are streamed as
//! the request body while the producer keeps writing.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use webhdfs_http::{ReqwestExecutor, StreamingUpload, UploadRequest};
//!
//! let request = UploadRequest::put("http://datanode:9864/webhdfs/v1/tmp/data.csv")
//!     .with_query("op", "CREATE")
//!     .with_query("overwrite", "true");
//! let upload = StreamingUpload::new(Arc::new(ReqwestExecutor::with_default_timeout()?), request);
//!
//! let response = upload.upload(|body| {
//!     for line in lines {
//!         body.write(line.into())?;
//!     }
//!     Ok(())
//! })?;
//! assert!(response.is_success());
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tracing::debug;
use webhdfs_bridge::{BoxError, Bridge, BridgeConfig, Items, Session};

use crate::body::ChunkReader;
use crate::error::Error;
use crate::executor::{UploadBody, UploadExecutor};
use crate::types::{UploadRequest, UploadResponse};

/// Name of the thread that runs each upload.
pub const UPLOAD_THREAD_NAME: &str = "webhdfs-upload";

type ResponseSlot = Arc<Mutex<Option<UploadResponse>>>;

/// A reusable upload target fed by blocking chunk writes.
///
/// Each call to [`upload`](Self::upload) sends one request. Calls must not
/// be nested; a nested call fails with a reentrancy error.
pub struct StreamingUpload {
    bridge: Bridge<Bytes>,
    response: ResponseSlot,
}

impl StreamingUpload {
    /// Create an upload of `request` run by `executor`, with an unbounded chunk buffer.
    pub fn new(executor: Arc<dyn UploadExecutor>, request: UploadRequest) -> Self {
        Self::with_config(
            BridgeConfig::default().with_thread_name(UPLOAD_THREAD_NAME),
            executor,
            request,
        )
    }

    /// Create an upload with the given bridge configuration.
    pub fn with_config(
        config: BridgeConfig,
        executor: Arc<dyn UploadExecutor>,
        request: UploadRequest,
    ) -> Self {
        let response: ResponseSlot = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&response);

        let bridge = Bridge::with_config(config, move |items: Items<Bytes>| -> Result<(), BoxError> {
            let body: UploadBody = Box::new(ChunkReader::new(items));
            let response = executor.upload(&request, body)?;
            debug!(url = %request.url, status = response.status, "upload finished");

            if !response.is_success() {
                return Err(Error::Status {
                    status: response.status,
                    status_text: response.status_text.clone(),
                    body: response.body_text.clone().unwrap_or_default(),
                }
                .into());
            }

            *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(response);
            Ok(())
        });

        Self { bridge, response }
    }

    /// The underlying bridge.
    pub fn bridge(&self) -> &Bridge<Bytes> {
        &self.bridge
    }

    /// Run one upload: `body` writes the chunks, the response is returned
    /// once the server has answered.
    ///
    /// If the upload itself fails, that failure is returned even when `body`
    /// failed too; use [`Error::upload_failure`] to inspect it. A non-2xx
    /// answer is reported as [`Error::Status`].
    pub fn upload<F>(&self, body: F) -> Result<UploadResponse, Error>
    where
        F: FnOnce(&Session<'_, Bytes>) -> Result<(), Error>,
    {
        let outcome = self.bridge.scope(body);
        let response = self
            .response
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        outcome?;
        response.ok_or(Error::MissingResponse)
    }

    /// Upload `chunks` in order.
    pub fn upload_chunks<I>(&self, chunks: I) -> Result<UploadResponse, Error>
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        self.upload(|session| {
            for chunk in chunks {
                session.write(chunk.into())?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockExecutor;

    fn request() -> UploadRequest {
        UploadRequest::put("http://datanode:9864/webhdfs/v1/tmp/out.txt").with_query("op", "CREATE")
    }

    #[test]
    fn chunks_arrive_as_one_body() {
        let executor = MockExecutor::new();
        let upload = StreamingUpload::new(Arc::new(executor.clone()), request());

        let response = upload
            .upload_chunks(["hello", ", ", "world"])
            .unwrap();

        assert_eq!(response.status, 201);
        let recorded = executor.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].body, b"hello, world");
        assert_eq!(recorded[0].request, request());
    }

    #[test]
    fn upload_is_reusable() {
        let executor = MockExecutor::new();
        let upload = StreamingUpload::new(Arc::new(executor.clone()), request());

        upload.upload_chunks([Bytes::from_static(b"one")]).unwrap();
        upload.upload_chunks([Bytes::from_static(b"two")]).unwrap();

        let bodies: Vec<_> = executor.recorded().into_iter().map(|r| r.body).collect();
        assert_eq!(bodies, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn error_status_becomes_upload_failure() {
        let executor =
            MockExecutor::new().with_response(MockExecutor::response(403, "Forbidden"));
        let upload = StreamingUpload::new(Arc::new(executor), request());

        let err = upload.upload_chunks([Bytes::from_static(b"x")]).unwrap_err();

        assert!(matches!(
            err.upload_failure(),
            Some(Error::Status { status: 403, .. })
        ));
    }

    #[test]
    fn transport_failure_wins_over_producer_error() {
        let executor = MockExecutor::new().fail_after(1, "broken pipe");
        let upload = StreamingUpload::new(Arc::new(executor), request());

        let err = upload
            .upload(|session| {
                session.write(Bytes::from_static(b"abc"))?;
                Err(Error::Io(std::io::Error::other("producer gave up")))
            })
            .unwrap_err();

        assert!(matches!(err.upload_failure(), Some(Error::Io(_))));
    }

    #[test]
    fn producer_error_passes_through() {
        let executor = MockExecutor::new();
        let upload = StreamingUpload::new(Arc::new(executor.clone()), request());

        let err = upload
            .upload(|session| {
                session.write(Bytes::from_static(b"partial"))?;
                Err(Error::Io(std::io::Error::other("source file vanished")))
            })
            .unwrap_err();

        assert!(err.upload_failure().is_none());
        assert_eq!(err.to_string(), "I/O error: source file vanished");
        // The server still saw a complete (if short) body.
        assert_eq!(executor.recorded()[0].body, b"partial");
    }

    #[test]
    fn upload_runs_on_named_thread() {
        let executor = MockExecutor::new();
        let upload = StreamingUpload::new(Arc::new(executor), request());
        assert_eq!(upload.bridge().config().thread_name, UPLOAD_THREAD_NAME);
    }
}
