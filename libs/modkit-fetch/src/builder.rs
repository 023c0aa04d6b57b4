use crate::client::HttpClient;
use crate::config::{ClientConfig, TlsRootConfig};
use crate::error::Error;
use crate::headers::resolve_headers;
use crate::transport::{Transport, build_transport};
use http::header::USER_AGENT;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Builder for [`HttpClient`].
///
/// Setters mirror the fields of [`ClientConfig`]. Header parse errors are
/// held until [`build`](Self::build).
#[must_use]
pub struct HttpClientBuilder {
    config: ClientConfig,
    transport: Option<Transport>,
    error: Option<Error>,
}

impl HttpClientBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a builder with a specific configuration
    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            error: None,
        }
    }

    /// Add a header sent with every request
    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.config.default_headers.insert(name, value);
            }
            (Err(e), _) => self.error = Some(Error::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(Error::InvalidHeaderValue(e)),
        }
        self
    }

    /// Add headers sent with every request; the first value per name is used
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers {
            if let Some(name) = name {
                self.config.default_headers.insert(name, value);
            }
        }
        self
    }

    /// Set the idle connection limit per host (`0` disables reuse)
    pub fn max_idle_connections_per_host(mut self, max: usize) -> Self {
        self.config.max_idle_connections_per_host = max;
        self
    }

    /// Set the connect timeout (`Duration::ZERO` for none)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the total request timeout (`Duration::ZERO` for none)
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the user agent string
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set maximum response body size
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.config.max_body_size = size;
        self
    }

    pub fn tls_roots(mut self, roots: TlsRootConfig) -> Self {
        self.config.tls_roots = roots;
        self
    }

    /// Replace the network transport.
    ///
    /// Pool, timeout and TLS settings are then ignored; use
    /// [`boxed_transport`](crate::boxed_transport) to adapt a tower service.
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the client
    ///
    /// # Errors
    /// Returns a header error captured by a setter, an invalid `user_agent`,
    /// or [`Error::Tls`] if TLS initialization fails
    pub fn build(self) -> Result<HttpClient, Error> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let mut default_headers = resolve_headers(&self.config.default_headers, &HeaderMap::new());
        if !default_headers.contains_key(USER_AGENT) {
            default_headers.insert(USER_AGENT, HeaderValue::try_from(&self.config.user_agent)?);
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => build_transport(&self.config)?,
        };

        tracing::debug!(
            max_idle_connections_per_host = self.config.max_idle_connections_per_host,
            connect_timeout = ?self.config.connect_limit(),
            request_timeout = ?self.config.request_limit(),
            "http client built"
        );
        Ok(HttpClient::from_parts(
            transport,
            default_headers,
            self.config.max_body_size,
        ))
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
