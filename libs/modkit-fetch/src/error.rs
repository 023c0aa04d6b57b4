use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use thiserror::Error;

/// Boxed error used for opaque causes (transport, TLS, XML codec).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Number of body characters shown by [`HttpError`]'s `Display` implementation.
pub const DISPLAY_BODY_SNIPPET_LIMIT: usize = 200;

/// Classification of URL validation failures.
///
/// Provides programmatic matching for different failure modes without
/// relying on unstable error message strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidUrlKind {
    /// URL could not be parsed (malformed syntax)
    ParseError,
    /// URL has no host component
    MissingHost,
    /// URL scheme is neither `http` nor `https`
    UnsupportedScheme,
}

/// Structured failure for a response whose status is outside `200..=299`.
///
/// The response body has already been drained and the connection released
/// when this value is constructed; `headers` is an owned snapshot.
///
/// # Example
///
/// ```ignore
/// match client.get(url).send().await?.bytes().await {
///     Err(modkit_fetch::Error::Http(e)) if e.status() == StatusCode::NOT_FOUND => {
///         println!("missing: {}", e.text());
///     }
///     other => { other?; }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct HttpError {
    /// Response status code
    pub status: StatusCode,
    /// Status line text, e.g. `"404 Not Found"`
    pub status_text: String,
    /// Full response body
    pub body: Bytes,
    /// Response headers
    pub headers: HeaderMap,
    /// Method of the originating request
    pub method: Method,
    /// URL of the originating request (query included)
    pub url: String,
}

impl HttpError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Response body as (lossy) UTF-8 text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = String::from_utf8_lossy(&self.body);
        let mut snippet: String = body.chars().take(DISPLAY_BODY_SNIPPET_LIMIT).collect();
        if body.chars().nth(DISPLAY_BODY_SNIPPET_LIMIT).is_some() {
            snippet.push_str("...");
        }
        write!(
            f,
            "{} {} returned {} ({snippet})",
            self.method,
            self.url,
            self.status.as_u16()
        )
    }
}

impl std::error::Error for HttpError {}

/// Request body could not be turned into bytes.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EncodingError {
    /// Body shape does not fit the resolved Content-Type
    #[error("body for '{content_type}' must be {expected}")]
    ShapeMismatch {
        content_type: String,
        expected: &'static str,
    },

    /// JSON serialization failed
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// XML serialization failed
    #[error("XML encoding failed: {0}")]
    Xml(#[source] BoxError),

    /// Form URL encoding failed
    #[error("form encoding failed: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    /// Reading a streamed body failed
    #[error("failed to read body stream: {0}")]
    Io(#[from] std::io::Error),
}

/// Successful response body could not be decoded into the requested type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to decode XML: {0}")]
    Xml(#[source] BoxError),
}

/// Errors returned by the client, the request assembler and the response helpers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Caller violated a request precondition (e.g. body on GET/DELETE)
    #[error("invalid {method} request: {reason}")]
    InvalidRequest { method: Method, reason: String },

    /// Invalid header name
    #[error("Invalid header name: {0}")]
    InvalidHeaderName(#[from] http::header::InvalidHeaderName),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Body encoding failed
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// URL could not be parsed or is not usable for HTTP
    ///
    /// Match on `kind`; `reason` is diagnostic text with no stable format.
    #[error("Invalid URL '{url}': {reason}")]
    MalformedUrl {
        url: String,
        kind: InvalidUrlKind,
        reason: String,
    },

    /// TLS setup failed while building the client
    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),

    /// Transport error (DNS, connect, TLS handshake, timeout, ...)
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    /// Response body exceeded the configured limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// Non-2xx response
    #[error(transparent)]
    Http(Box<HttpError>),

    /// 2xx response body did not match the requested shape
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl Error {
    /// Returns the structured status error, if this is one.
    #[must_use]
    pub fn http_error(&self) -> Option<&HttpError> {
        match self {
            Error::Http(e) => Some(&**e),
            _ => None,
        }
    }

    /// Returns the response status for [`Error::Http`].
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.http_error().map(HttpError::status)
    }
}

impl From<HttpError> for Error {
    fn from(err: HttpError) -> Self {
        Error::Http(Box::new(err))
    }
}
