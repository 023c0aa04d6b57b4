use crate::builder::HttpClientBuilder;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::options::RequestOptions;
use crate::request::{EncodedRequest, RequestBuilder, assemble};
use crate::response::HttpResponse;
use crate::transport::Transport;
use http::{HeaderMap, Method};
use std::fmt;
use std::sync::Arc;
use tower::ServiceExt;

/// HTTP client: default headers plus one pooled transport.
///
/// `HttpClient` is `Clone + Send + Sync`. Clones share the transport and its
/// connection pool; no per-call state is kept, so concurrent callers need no
/// locking. Separately built clients share nothing.
///
/// # Example
///
/// ```ignore
/// let client = HttpClient::builder()
///     .default_header("authorization", "Bearer token")
///     .request_timeout(Duration::from_secs(30))
///     .build()?;
///
/// let users: Vec<User> = client
///     .get("https://api.example.com/users")
///     .param("page", "1")
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[derive(Clone)]
pub struct HttpClient {
    transport: Transport,
    default_headers: Arc<HeaderMap>,
    max_body_size: usize,
}

impl HttpClient {
    pub(crate) fn from_parts(
        transport: Transport,
        default_headers: HeaderMap,
        max_body_size: usize,
    ) -> Self {
        Self {
            transport,
            default_headers: Arc::new(default_headers),
            max_body_size,
        }
    }

    /// Create a client with default configuration
    ///
    /// # Errors
    /// Returns an error if TLS initialization fails
    pub fn new() -> Result<Self, Error> {
        HttpClientBuilder::new().build()
    }

    /// Create a client from a [`ClientConfig`]
    ///
    /// # Errors
    /// Returns an error if a default header is invalid or TLS initialization fails
    pub fn with_config(config: ClientConfig) -> Result<Self, Error> {
        HttpClientBuilder::with_config(config).build()
    }

    /// Create a builder for configuring the client
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    /// Headers sent with every request (`User-Agent` included).
    #[must_use]
    pub fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }

    pub fn get(&self, url: &str) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post(&self, url: &str) -> RequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put(&self, url: &str) -> RequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn patch(&self, url: &str) -> RequestBuilder {
        self.request(Method::PATCH, url)
    }

    pub fn delete(&self, url: &str) -> RequestBuilder {
        self.request(Method::DELETE, url)
    }

    /// Start a request with an arbitrary method.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, url.to_owned())
    }

    /// Assemble and send a request described by `options`.
    ///
    /// # Errors
    ///
    /// See [`RequestBuilder::send`].
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        options: RequestOptions,
    ) -> Result<HttpResponse, Error> {
        let encoded = assemble(method, url, &self.default_headers, options).await?;
        self.dispatch(encoded).await
    }

    async fn dispatch(&self, encoded: EncodedRequest) -> Result<HttpResponse, Error> {
        let method = encoded.method.clone();
        let url = encoded.url.to_string();
        tracing::debug!(
            method = %method,
            host = encoded.url.host_str().unwrap_or_default(),
            path = encoded.url.path(),
            "dispatching request"
        );

        let request = encoded.into_http_request()?;
        let response = self.transport.clone().oneshot(request).await?;

        tracing::debug!(
            method = %method,
            status = response.status().as_u16(),
            "response received"
        );
        Ok(HttpResponse::new(response, method, url, self.max_body_size))
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("default_headers", &self.default_headers)
            .field("max_body_size", &self.max_body_size)
            .finish_non_exhaustive()
    }
}
