//! Transport executor: the pooled hyper client behind every [`HttpClient`].
//!
//! [`HttpClient`]: crate::HttpClient

use crate::config::{ClientConfig, TlsRootConfig};
use crate::error::{BoxError, Error};
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::sync::Arc;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceBuilder, ServiceExt};
use tower_http::decompression::DecompressionLayer;
use tower_http::follow_redirect::FollowRedirectLayer;

/// Boxed response body, decompressed when the server used a content coding.
pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

/// Type-erased `execute(request) -> response` capability.
///
/// Cloned per call; clones share the underlying connection pool.
pub type Transport = BoxCloneSyncService<Request<Full<Bytes>>, Response<ResponseBody>, Error>;

/// Adapt any tower service into a [`Transport`].
///
/// Service errors become [`Error::Transport`] with the cause as source.
///
/// ```ignore
/// let transport = boxed_transport(tower::service_fn(|req: Request<Full<Bytes>>| async move {
///     Ok::<_, Infallible>(Response::new(Full::new(Bytes::from_static(b"ok"))))
/// }));
/// let client = HttpClient::builder().transport(transport).build()?;
/// ```
#[must_use]
pub fn boxed_transport<S, B>(service: S) -> Transport
where
    S: Service<Request<Full<Bytes>>, Response = Response<B>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    let service = service
        .map_response(box_response_body)
        .map_err(|e: S::Error| Error::Transport(e.into()));
    BoxCloneSyncService::new(service)
}

fn box_response_body<B>(response: Response<B>) -> Response<ResponseBody>
where
    B: http_body::Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<BoxError>,
{
    response.map(|body| {
        let boxed: ResponseBody = body.map_err(Into::into).boxed();
        boxed
    })
}

/// Build the default transport from client configuration.
///
/// Stack, outer to inner: `Timeout` (when `request_timeout` is non-zero) ->
/// `Decompression` -> `FollowRedirect` -> pooled hyper client over an
/// HTTPS-or-HTTP connector.
///
/// # Errors
///
/// Returns [`Error::Tls`] if the TLS connector cannot be initialised.
pub fn build_transport(config: &ClientConfig) -> Result<Transport, Error> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(config.connect_limit());

    let https = build_https_connector(config.tls_roots, http)?;

    let mut client_builder = Client::builder(TokioExecutor::new());
    // pool_timer is required for pool_idle_timeout to take effect
    client_builder
        .pool_timer(TokioTimer::new())
        .pool_max_idle_per_host(config.max_idle_connections_per_host);
    if let Some(idle_timeout) = config.pool_idle_timeout {
        client_builder.pool_idle_timeout(idle_timeout);
    }
    let hyper_client = client_builder.build::<_, Full<Bytes>>(https);

    let service = ServiceBuilder::new()
        .layer(DecompressionLayer::new())
        .layer(FollowRedirectLayer::new())
        .service(hyper_client);

    let transport = match config.request_limit() {
        Some(timeout) => boxed_transport(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(timeout))
                .service(service),
        ),
        None => boxed_transport(service),
    };

    Ok(transport)
}

/// Crypto provider: the process default if one is installed, otherwise aws-lc-rs.
///
/// Never installs a global default.
fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

fn build_https_connector(
    tls_roots: TlsRootConfig,
    http: HttpConnector,
) -> Result<HttpsConnector<HttpConnector>, Error> {
    let provider = crypto_provider();
    let builder = match tls_roots {
        TlsRootConfig::WebPki => hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(provider)
            .map_err(|e| Error::Tls(Box::new(e)))?,
        TlsRootConfig::Native => hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_native_roots(provider)
            .map_err(|e| {
                tracing::warn!(error = %e, "failed to load native root certificates");
                Error::Tls(Box::new(e))
            })?,
    };

    Ok(builder
        .https_or_http()
        .enable_all_versions()
        .wrap_connector(http))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Refused;

    impl std::fmt::Display for Refused {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for Refused {}

    #[tokio::test]
    async fn test_boxed_transport_boxes_body() {
        let transport = boxed_transport(tower::service_fn(|req: Request<Full<Bytes>>| async move {
            let path = req.uri().path().to_owned();
            Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(path))))
        }));

        let request = Request::get("http://localhost/echo")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let response = transport.oneshot(request).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"/echo");
    }

    #[tokio::test]
    async fn test_boxed_transport_maps_errors_to_transport() {
        let transport = boxed_transport(tower::service_fn(|_req: Request<Full<Bytes>>| async {
            Err::<Response<Full<Bytes>>, _>(Refused)
        }));

        let request = Request::get("http://localhost/")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let err = transport.oneshot(request).await.unwrap_err();

        match &err {
            Error::Transport(source) => assert!(source.is::<Refused>()),
            other => panic!("expected Transport, got {other:?}"),
        }
        assert_eq!(err.source().unwrap().to_string(), "connection refused");
    }

    #[test]
    fn test_build_transport_with_defaults() {
        assert!(build_transport(&ClientConfig::default()).is_ok());
        assert!(build_transport(&ClientConfig::for_testing()).is_ok());
    }

    #[test]
    fn test_crypto_provider_available() {
        let provider = crypto_provider();
        assert!(!provider.cipher_suites.is_empty());
    }
}
