use crate::body::Body;
use http::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;

/// Per-call overrides: headers, query parameters and an optional body.
///
/// The builder methods on [`RequestBuilder`](crate::RequestBuilder) fill one of
/// these in; [`HttpClient::execute`](crate::HttpClient::execute) takes one directly.
///
/// ```ignore
/// let options = RequestOptions::default()
///     .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer t"))
///     .with_param("page", "2")
///     .with_body(Body::payload(new_user));
/// let resp = client.execute(Method::POST, url, options).await?;
/// ```
#[derive(Debug, Default)]
pub struct RequestOptions {
    /// Request headers; replace client defaults of the same name
    pub headers: HeaderMap,
    /// Query parameters merged into the URL
    pub params: BTreeMap<String, String>,
    /// Request body; `None` means no payload at all
    pub body: Option<Body>,
}

impl RequestOptions {
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Insert every header from `headers`, keeping the first value per name.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        // Entries without a name are extra values of the previous name
        for (name, value) in headers {
            if let Some(name) = name {
                self.headers.insert(name, value);
            }
        }
        self
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }
}
