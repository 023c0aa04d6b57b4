use http::HeaderMap;
use std::time::Duration;

/// Default User-Agent string for HTTP requests
pub const DEFAULT_USER_AGENT: &str = concat!("modkit-fetch/", env!("CARGO_PKG_VERSION"));

/// Default number of idle pooled connections kept per host
pub const DEFAULT_MAX_IDLE_CONNECTIONS_PER_HOST: usize = 5;

/// Default upper bound on a drained response body (10 MiB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    #[default]
    WebPki,
    /// Use OS native root certificate store
    Native,
}

/// Client-wide settings, fixed for the lifetime of one [`HttpClient`].
///
/// Every client owns exactly one transport built from this configuration;
/// nothing is shared between client instances.
///
/// [`HttpClient`]: crate::HttpClient
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Headers sent with every request (default: none)
    ///
    /// Only the first value of each header name is used. Per-request headers
    /// with the same name replace these.
    pub default_headers: HeaderMap,

    /// Maximum number of idle connections kept per host (default: 5)
    ///
    /// Setting this to `0` disables connection reuse.
    pub max_idle_connections_per_host: usize,

    /// Connection establishment timeout (default: zero, no limit)
    pub connect_timeout: Duration,

    /// Total request timeout, from dispatch to response headers (default: zero, no limit)
    pub request_timeout: Duration,

    /// Timeout for idle connections in the pool (default: 90 seconds)
    ///
    /// Set to `None` to use hyper-util's default idle timeout.
    pub pool_idle_timeout: Option<Duration>,

    /// User-Agent header value (default: `modkit-fetch/<version>`)
    ///
    /// Ignored when `default_headers` already carries a `User-Agent`.
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10 MiB)
    pub max_body_size: usize,

    /// TLS root certificate strategy (default: `WebPki`)
    pub tls_roots: TlsRootConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_headers: HeaderMap::new(),
            max_idle_connections_per_host: DEFAULT_MAX_IDLE_CONNECTIONS_PER_HOST,
            connect_timeout: Duration::ZERO,
            request_timeout: Duration::ZERO,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            tls_roots: TlsRootConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create configuration for testing with local mock servers
    ///
    /// Bounded timeouts so a misbehaving test fails instead of hanging.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            max_idle_connections_per_host: 4,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            pool_idle_timeout: Some(Duration::from_secs(10)),
            max_body_size: 1024 * 1024, // 1 MB
            ..Self::default()
        }
    }

    /// `connect_timeout` as an optional limit (zero means none).
    #[must_use]
    pub fn connect_limit(&self) -> Option<Duration> {
        non_zero(self.connect_timeout)
    }

    /// `request_timeout` as an optional limit (zero means none).
    #[must_use]
    pub fn request_limit(&self) -> Option<Duration> {
        non_zero(self.request_timeout)
    }
}

fn non_zero(duration: Duration) -> Option<Duration> {
    (!duration.is_zero()).then_some(duration)
}
