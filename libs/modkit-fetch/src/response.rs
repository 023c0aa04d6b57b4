use crate::error::{DecodeError, Error, HttpError};
use crate::transport::ResponseBody;
use bytes::Bytes;
use http::{HeaderMap, Method, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;

/// HTTP response handle.
///
/// Every consuming helper drains the body to completion, then classifies
/// the status: `200..=299` yields the decoded body, anything else an
/// [`Error::Http`] carrying the drained body and a header snapshot. The body
/// stream is dropped on every exit path, releasing the connection.
///
/// # Example
///
/// ```ignore
/// let user: User = client.get(url).send().await?.json().await?;
///
/// match client.delete(url).send().await?.bytes().await {
///     Ok(_) => {}
///     Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => {}
///     Err(e) => return Err(e.into()),
/// }
/// ```
#[derive(Debug)]
pub struct HttpResponse {
    inner: Response<ResponseBody>,
    method: Method,
    url: String,
    max_body_size: usize,
}

impl HttpResponse {
    pub(crate) fn new(
        inner: Response<ResponseBody>,
        method: Method,
        url: String,
        max_body_size: usize,
    ) -> Self {
        Self {
            inner,
            method,
            url,
            max_body_size,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Method of the request that produced this response.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Final request URL, query included.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Take the raw response; no status check, no size limit.
    #[must_use]
    pub fn into_inner(self) -> Response<ResponseBody> {
        self.inner
    }

    /// Body bytes of a successful response.
    ///
    /// # Errors
    ///
    /// - [`Error::Http`] for a non-2xx status; its body keeps at most the
    ///   configured limit
    /// - [`Error::BodyTooLarge`] if a 2xx body exceeds the configured limit
    /// - [`Error::Transport`] if reading the body fails
    pub async fn bytes(self) -> Result<Bytes, Error> {
        self.checked_body().await
    }

    /// Body of a successful response as text; invalid UTF-8 is replaced.
    ///
    /// # Errors
    ///
    /// Same as [`bytes`](Self::bytes).
    pub async fn text(self) -> Result<String, Error> {
        let body = self.checked_body().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// Decode a successful JSON body.
    ///
    /// An empty body yields `T::default()` without parsing.
    ///
    /// # Errors
    ///
    /// Same as [`bytes`](Self::bytes), plus [`Error::Decode`] when a
    /// non-empty body is not valid JSON for `T`.
    pub async fn json<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned + Default,
    {
        let body = self.checked_body().await?;
        if body.is_empty() {
            return Ok(T::default());
        }
        serde_json::from_slice(&body).map_err(|e| DecodeError::Json(e).into())
    }

    /// Decode a successful XML body.
    ///
    /// An empty body yields `T::default()` without parsing.
    ///
    /// # Errors
    ///
    /// Same as [`json`](Self::json), with [`DecodeError::Xml`].
    pub async fn xml<T>(self) -> Result<T, Error>
    where
        T: DeserializeOwned + Default,
    {
        let body = self.checked_body().await?;
        if body.is_empty() {
            return Ok(T::default());
        }
        quick_xml::de::from_reader(body.as_ref()).map_err(|e| DecodeError::Xml(Box::new(e)).into())
    }

    async fn checked_body(self) -> Result<Bytes, Error> {
        let (parts, body) = self.inner.into_parts();
        let status = parts.status;

        if status.is_success() {
            let bytes = read_body_limited(body, self.max_body_size).await?;
            tracing::debug!(status = status.as_u16(), len = bytes.len(), "response body drained");
            return Ok(bytes);
        }

        let (bytes, actual) = read_body_truncated(body, self.max_body_size).await?;
        tracing::debug!(
            method = %self.method,
            status = status.as_u16(),
            len = actual,
            kept = bytes.len(),
            "non-success status"
        );
        Err(HttpError {
            status,
            status_text: status_text(status),
            body: bytes,
            headers: parts.headers,
            method: self.method,
            url: self.url,
        }
        .into())
    }
}

fn status_text(status: StatusCode) -> String {
    status.canonical_reason().map_or_else(
        || status.as_u16().to_string(),
        |reason| format!("{} {reason}", status.as_u16()),
    )
}

/// Read the whole body, failing once more than `limit` bytes arrive.
///
/// The limit applies to decoded bytes, after decompression.
async fn read_body_limited(body: ResponseBody, limit: usize) -> Result<Bytes, Error> {
    let mut collected = Vec::new();
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(Error::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            let actual = collected.len() + chunk.len();
            if actual > limit {
                return Err(Error::BodyTooLarge { limit, actual });
            }
            collected.extend_from_slice(chunk);
        }
    }

    Ok(Bytes::from(collected))
}

/// Drain the whole body, keeping at most `limit` bytes.
///
/// Returns the kept prefix and the total number of bytes read.
async fn read_body_truncated(body: ResponseBody, limit: usize) -> Result<(Bytes, usize), Error> {
    let mut kept = Vec::new();
    let mut actual = 0usize;
    let mut body = std::pin::pin!(body);

    while let Some(frame) = body.frame().await {
        let frame = frame.map_err(Error::Transport)?;
        if let Some(chunk) = frame.data_ref() {
            actual += chunk.len();
            let room = limit.saturating_sub(kept.len());
            kept.extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
    }

    Ok((Bytes::from(kept), actual))
}
