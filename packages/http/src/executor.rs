//! Upload execution abstraction for testing.
//!
//! This module provides a trait for sending a streamed upload that can be
//! mocked in tests, avoiding the need for actual network calls.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Body, Client};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::Error;
use crate::types::{UploadRequest, UploadResponse};

/// A streamed request body. Reading it to the end drains the session's chunks.
pub type UploadBody = Box<dyn Read + Send + 'static>;

/// Trait for executing uploads.
///
/// Implementations must read `body` to the end (or fail); the producer
/// side of the session is blocked on the other end of it.
pub trait UploadExecutor: Send + Sync {
    /// Send `request` with `body` and return the response.
    fn upload(&self, request: &UploadRequest, body: UploadBody) -> Result<UploadResponse, Error>;
}

/// Production upload executor using reqwest's blocking client.
///
/// The body is sent with chunked transfer encoding since its length is
/// unknown up front.
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    /// Create a new executor with the given timeout.
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client })
    }

    /// Create with default timeout of 30 seconds.
    pub fn with_default_timeout() -> Result<Self, Error> {
        Self::new(Duration::from_secs(30))
    }

    /// Create from an existing reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl UploadExecutor for ReqwestExecutor {
    fn upload(&self, request: &UploadRequest, body: UploadBody) -> Result<UploadResponse, Error> {
        let url = Url::parse(&request.url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl {
                message: format!("unsupported scheme {:?} in {}", url.scheme(), request.url),
            });
        }
        let method: http::Method = request.method.into();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::try_from(name.as_str())?;
            let header_value = HeaderValue::try_from(value.as_str())?;
            headers.insert(header_name, header_value);
        }

        let mut req_builder = self.client.request(method, url);
        req_builder = req_builder.headers(headers);

        if !request.query.is_empty() {
            req_builder = req_builder.query(&request.query);
        }

        let response = req_builder.body(Body::new(body)).send()?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut resp_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.to_string(), v.to_string());
            }
        }

        let body_text = response.text()?;
        let body = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::Null);

        Ok(UploadResponse {
            status,
            status_text,
            headers: resp_headers,
            body,
            body_text: Some(body_text),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockExecutor;
    use super::*;

    fn body(bytes: &'static [u8]) -> UploadBody {
        Box::new(bytes)
    }

    #[test]
    fn mock_executor_drains_and_records_body() {
        let executor = MockExecutor::new();
        let request = UploadRequest::put("http://host/file").with_query("op", "CREATE");

        let response = executor.upload(&request, body(b"payload")).unwrap();

        assert_eq!(response.status, 201);
        let recorded = executor.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].request, request);
        assert_eq!(recorded[0].body, b"payload");
    }

    #[test]
    fn mock_executor_returns_configured_response() {
        let executor = MockExecutor::new().with_response(MockExecutor::response(403, "Forbidden"));
        let response = executor
            .upload(&UploadRequest::post("http://host/file"), body(b""))
            .unwrap();
        assert!(response.is_client_error());
    }

    #[test]
    fn mock_executor_fails_mid_body() {
        let executor = MockExecutor::new().fail_after(3, "connection reset");
        let err = executor
            .upload(&UploadRequest::put("http://host/file"), body(b"abcdef"))
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("connection reset"));
        assert!(executor.recorded().is_empty());
    }

    #[test]
    fn reqwest_executor_creation() {
        let executor = ReqwestExecutor::with_default_timeout();
        assert!(executor.is_ok());
    }

    #[test]
    fn reqwest_executor_rejects_relative_url() {
        let executor = ReqwestExecutor::new(Duration::from_secs(1)).unwrap();
        let err = executor
            .upload(&UploadRequest::put("not a url"), body(b""))
            .unwrap_err();
        assert!(matches!(err, Error::UrlParse(_)));
    }

    #[test]
    fn reqwest_executor_rejects_non_http_scheme() {
        let executor = ReqwestExecutor::with_client(Client::new());
        let err = executor
            .upload(&UploadRequest::put("ftp://datanode/file"), body(b""))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidUrl { .. }));
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn reqwest_executor_rejects_bad_header() {
        let executor = ReqwestExecutor::new(Duration::from_secs(1)).unwrap();
        let request = UploadRequest::put("http://localhost:1/file").with_header("bad header", "x");
        let err = executor.upload(&request, body(b"")).unwrap_err();
        assert!(matches!(err, Error::InvalidHeaderName(_)));
    }
}
