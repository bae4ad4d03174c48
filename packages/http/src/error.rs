use webhdfs_bridge::Error as BridgeError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Invalid URL: {message}")]
    InvalidUrl { message: String },

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload rejected: HTTP {status} {status_text}: {body}")]
    Status {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("Upload finished without a response")]
    MissingResponse,

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl Error {
    /// The upload failure reported by the consumer thread, if this error carries one.
    pub fn upload_failure(&self) -> Option<&Error> {
        match self {
            Error::Bridge(err) => err.consumer_error()?.downcast_ref::<Error>(),
            _ => None,
        }
    }
}
