use crate::body::{
    APPLICATION_JSON, APPLICATION_XML, Body, FORM_URLENCODED, MULTIPART_FORM_DATA, MultipartForm,
    OCTET_STREAM, TEXT_PLAIN, encode_body,
};
use crate::client::HttpClient;
use crate::error::{EncodingError, Error, InvalidUrlKind};
use crate::headers::resolve_headers;
use crate::options::RequestOptions;
use crate::response::HttpResponse;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};
use http_body_util::Full;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tokio::io::AsyncRead;
use url::Url;

/// A request ready for the transport: resolved headers, final URL and payload.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    pub method: Method,
    /// URL with query parameters merged in
    pub url: Url,
    pub headers: HeaderMap,
    /// `None` when no body was supplied; distinct from an empty payload
    pub body: Option<Bytes>,
}

impl EncodedRequest {
    /// Convert into the `http` request type consumed by the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedUrl`] if the URL is not a valid `http::Uri`.
    pub fn into_http_request(self) -> Result<Request<Full<Bytes>>, Error> {
        let uri: Uri = self
            .url
            .as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| Error::MalformedUrl {
                url: self.url.to_string(),
                kind: InvalidUrlKind::ParseError,
                reason: e.to_string(),
            })?;

        let mut request = Request::new(Full::new(self.body.unwrap_or_default()));
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

/// Build an [`EncodedRequest`] from a method, URL, client defaults and per-call options.
///
/// Steps, in order:
/// 1. GET and DELETE with any body are rejected.
/// 2. Default and request headers are merged (request wins).
/// 3. The URL is parsed and `params` merged into its query.
/// 4. With a body and no `Content-Type`, `application/json` is assumed;
///    the body is encoded for the resolved type. A multipart boundary
///    replaces the resolved `Content-Type`.
///
/// # Errors
///
/// - [`Error::InvalidRequest`] for a body on GET/DELETE
/// - [`Error::MalformedUrl`] if the URL cannot be parsed or is not http(s)
/// - [`Error::Encoding`] if the body cannot be encoded
pub async fn assemble(
    method: Method,
    url: &str,
    defaults: &HeaderMap,
    options: RequestOptions,
) -> Result<EncodedRequest, Error> {
    let RequestOptions {
        headers,
        params,
        body,
    } = options;

    if body.is_some() && (method == Method::GET || method == Method::DELETE) {
        return Err(Error::InvalidRequest {
            method,
            reason: "GET and DELETE requests must not carry a body".to_owned(),
        });
    }

    let mut headers = resolve_headers(defaults, &headers);
    let url = build_url(url, &params)?;

    let body = match body {
        None => None,
        Some(body) => {
            let content_type = headers
                .entry(CONTENT_TYPE)
                .or_insert_with(|| HeaderValue::from_static(APPLICATION_JSON));
            let content_type = String::from_utf8_lossy(content_type.as_bytes()).into_owned();

            let encoded = encode_body(&content_type, body).await?;
            if let Some(replacement) = encoded.content_type {
                headers.insert(CONTENT_TYPE, HeaderValue::try_from(replacement)?);
            }
            Some(encoded.bytes)
        }
    };

    Ok(EncodedRequest {
        method,
        url,
        headers,
        body,
    })
}

fn malformed(url: &str, kind: InvalidUrlKind, reason: impl Into<String>) -> Error {
    Error::MalformedUrl {
        url: url.to_owned(),
        kind,
        reason: reason.into(),
    }
}

/// Parse `raw` and merge `params` into its query.
///
/// Existing pairs whose key appears in `params` are dropped; the rest are kept
/// in order. The query is left untouched when `params` is empty.
fn build_url(raw: &str, params: &BTreeMap<String, String>) -> Result<Url, Error> {
    let mut url =
        Url::parse(raw).map_err(|e| malformed(raw, InvalidUrlKind::ParseError, e.to_string()))?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(malformed(
            raw,
            InvalidUrlKind::UnsupportedScheme,
            format!("unsupported scheme '{scheme}', expected http or https"),
        ));
    }
    if !url.has_host() {
        return Err(malformed(raw, InvalidUrlKind::MissingHost, "missing host"));
    }

    if !params.is_empty() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !params.contains_key(key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept)
            .extend_pairs(params);
    }

    Ok(url)
}

/// HTTP request builder with fluent API
///
/// Created by [`HttpClient::get`], [`HttpClient::post`], etc. Header errors
/// are captured and returned from [`send()`](RequestBuilder::send).
///
/// Typed body helpers set `Content-Type` unless the request already has one:
///
/// | helper | Content-Type |
/// |---|---|
/// | [`json`](Self::json) | `application/json` |
/// | [`xml`](Self::xml) | `application/xml` |
/// | [`form`](Self::form) | `application/x-www-form-urlencoded` |
/// | [`multipart`](Self::multipart) | `multipart/form-data` |
/// | [`text`](Self::text) | `text/plain` |
/// | [`bytes`](Self::bytes), [`stream`](Self::stream) | `application/octet-stream` |
///
/// [`body`](Self::body) sets none; an unset type resolves to `application/json`.
///
/// # Example
///
/// ```ignore
/// let created: User = client
///     .post("https://api.example.com/users")
///     .header("x-request-id", "123")
///     .param("notify", "true")
///     .json(&NewUser { name: "Alice" })?
///     .send()
///     .await?
///     .json()
///     .await?;
/// ```
#[must_use = "RequestBuilder does nothing until .send() is called"]
pub struct RequestBuilder {
    client: HttpClient,
    method: Method,
    url: String,
    options: RequestOptions,
    /// Error captured during building (deferred to `send()`)
    error: Option<Error>,
}

impl RequestBuilder {
    pub(crate) fn new(client: HttpClient, method: Method, url: String) -> Self {
        Self {
            client,
            method,
            url,
            options: RequestOptions::default(),
            error: None,
        }
    }

    /// Set a request header, replacing a previous value of the same name.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if self.error.is_some() {
            return self;
        }

        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.options.headers.insert(name, value);
            }
            (Err(e), _) => self.error = Some(Error::InvalidHeaderName(e)),
            (_, Err(e)) => self.error = Some(Error::InvalidHeaderValue(e)),
        }
        self
    }

    /// Set several request headers; only the first value per name is used.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.options = std::mem::take(&mut self.options).with_headers(headers);
        self
    }

    /// Add a query parameter, replacing one of the same key in the URL.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.params.insert(key.into(), value.into());
        self
    }

    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.options = std::mem::take(&mut self.options).with_params(params);
        self
    }

    /// Set the body; its encoding is chosen by the resolved `Content-Type`.
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.options.body = Some(body.into());
        self
    }

    /// Replace headers, params and body with `options`.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// Serialize `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns a deferred header error, or [`EncodingError::Json`] if
    /// serialization fails.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, Error> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let bytes = serde_json::to_vec(value).map_err(EncodingError::Json)?;
        Ok(self.typed_body(APPLICATION_JSON, Body::Bytes(Bytes::from(bytes))))
    }

    /// Serialize `value` as the XML body.
    ///
    /// # Errors
    ///
    /// Returns a deferred header error, or [`EncodingError::Xml`] if
    /// serialization fails.
    pub fn xml<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self, Error> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let xml = quick_xml::se::to_string(value).map_err(|e| EncodingError::Xml(Box::new(e)))?;
        Ok(self.typed_body(APPLICATION_XML, Body::Text(xml)))
    }

    /// Encode `fields` (a map, struct or pair list) as a URL-encoded form body.
    ///
    /// # Errors
    ///
    /// Returns a deferred header error, or [`EncodingError::Form`] if
    /// encoding fails.
    ///
    /// ```ignore
    /// client
    ///     .post("https://auth.example.com/token")
    ///     .form(&[("grant_type", "client_credentials")])?
    ///     .send()
    ///     .await?;
    /// ```
    pub fn form<T: Serialize + ?Sized>(mut self, fields: &T) -> Result<Self, Error> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        let encoded = serde_urlencoded::to_string(fields).map_err(EncodingError::Form)?;
        // Kept as pairs so a multipart Content-Type still accepts them
        let pairs = url::form_urlencoded::parse(encoded.as_bytes())
            .into_owned()
            .collect();
        Ok(self.typed_body(FORM_URLENCODED, Body::Form(pairs)))
    }

    pub fn multipart(self, form: MultipartForm) -> Self {
        self.typed_body(MULTIPART_FORM_DATA, Body::Multipart(form))
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.typed_body(TEXT_PLAIN, Body::Text(text.into()))
    }

    pub fn bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.typed_body(OCTET_STREAM, Body::Bytes(bytes.into()))
    }

    /// Use an async reader as the body; it is drained before sending.
    pub fn stream<R>(self, reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        self.typed_body(OCTET_STREAM, Body::stream(reader))
    }

    fn typed_body(mut self, content_type: &'static str, body: Body) -> Self {
        self.options
            .headers
            .entry(CONTENT_TYPE)
            .or_insert_with(|| HeaderValue::from_static(content_type));
        self.options.body = Some(body);
        self
    }

    /// Assemble and send the request.
    ///
    /// Resolves on response headers; use the [`HttpResponse`] helpers to
    /// read and classify the body.
    ///
    /// # Errors
    ///
    /// - a header error captured while building
    /// - [`Error::InvalidRequest`], [`Error::MalformedUrl`] or
    ///   [`Error::Encoding`] from assembly, before any I/O
    /// - [`Error::Transport`] for connect, TLS, timeout or protocol failures
    pub async fn send(self) -> Result<HttpResponse, Error> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.client
            .execute(self.method, &self.url, self.options)
            .await
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("options", &self.options)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
