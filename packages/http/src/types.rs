use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Error;

/// HTTP method for uploads
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// Create or overwrite a file
    #[default]
    PUT,
    /// Append to an existing file
    POST,
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::PUT => http::Method::PUT,
            Method::POST => http::Method::POST,
        }
    }
}

/// Everything about an upload except its body.
///
/// The body is streamed from the chunks written to a
/// [`StreamingUpload`](crate::StreamingUpload) session.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UploadRequest {
    /// HTTP method (PUT or POST)
    #[serde(default)]
    pub method: Method,

    /// Absolute URL to upload to
    pub url: String,

    /// Query parameters
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub query: HashMap<String, String>,

    /// Request headers
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

impl UploadRequest {
    pub fn put(url: impl Into<String>) -> Self {
        Self {
            method: Method::PUT,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }
}

/// HTTP response to an upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    /// HTTP status code
    pub status: u16,

    /// Status text (e.g., "Created", "Forbidden")
    pub status_text: String,

    /// Response headers
    pub headers: HashMap<String, String>,

    /// Response body as JSON value
    /// Will be null if body was empty or not valid JSON
    pub body: serde_json::Value,

    /// Raw body as string (useful when body isn't JSON)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

impl UploadResponse {
    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Try to deserialize the body into a specific type
    pub fn json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, Error> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}
