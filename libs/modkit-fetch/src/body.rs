//! Content-Type driven request body encoding.
//!
//! A [`Body`] is a tagged union of the shapes a caller can hand over. The
//! resolved `Content-Type` picks the encoding; shapes that make no sense for
//! that type are rejected with [`EncodingError::ShapeMismatch`].

use crate::error::{BoxError, EncodingError};
use bytes::{BufMut, Bytes, BytesMut};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::BuildHasher;
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const APPLICATION_JSON: &str = "application/json";
pub const APPLICATION_XML: &str = "application/xml";
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
pub const TEXT_PLAIN: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Encoding family selected from a `Content-Type` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Json,
    Xml,
    FormUrlEncoded,
    Multipart,
    Text,
    OctetStream,
    /// Unrecognised type; encoded like JSON
    Other,
}

impl MediaKind {
    /// Classify a `Content-Type` header value.
    ///
    /// Parameters such as `; charset=utf-8` are ignored and the essence is
    /// compared case-insensitively.
    #[must_use]
    pub fn from_content_type(value: &str) -> Self {
        let essence = value.split_once(';').map_or(value, |(essence, _)| essence);
        match essence.trim().to_ascii_lowercase().as_str() {
            APPLICATION_JSON => Self::Json,
            APPLICATION_XML | "text/xml" => Self::Xml,
            FORM_URLENCODED => Self::FormUrlEncoded,
            MULTIPART_FORM_DATA => Self::Multipart,
            TEXT_PLAIN => Self::Text,
            OCTET_STREAM => Self::OctetStream,
            _ => Self::Other,
        }
    }

    /// Whether pre-encoded text, bytes and streams pass through verbatim.
    fn accepts_pre_encoded(self) -> bool {
        !matches!(self, Self::FormUrlEncoded | Self::Multipart)
    }

    fn expected_shape(self) -> &'static str {
        match self {
            Self::Json | Self::Other => "a serializable value or pre-encoded text/bytes",
            Self::Xml => "a serializable value or pre-encoded XML text/bytes",
            Self::FormUrlEncoded => "a mapping of string to string or key/value pairs",
            Self::Multipart => "a mapping of field name to text or bytes",
            Self::Text => "a value with a string representation",
            Self::OctetStream => "raw bytes or a readable byte stream",
        }
    }
}

trait ErasedPayload: Send + Sync {
    fn to_json(&self) -> serde_json::Result<Vec<u8>>;
    fn to_json_value(&self) -> serde_json::Result<serde_json::Value>;
    fn to_xml(&self) -> Result<String, BoxError>;
    fn to_form(&self) -> Result<String, serde_urlencoded::ser::Error>;
}

impl<T: Serialize + Send + Sync> ErasedPayload for T {
    fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn to_json_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    fn to_xml(&self) -> Result<String, BoxError> {
        quick_xml::se::to_string(self).map_err(Into::into)
    }

    fn to_form(&self) -> Result<String, serde_urlencoded::ser::Error> {
        serde_urlencoded::to_string(self)
    }
}

/// Any serializable value, type-erased until the Content-Type is known.
#[derive(Clone)]
pub struct Payload {
    inner: Arc<dyn ErasedPayload>,
    type_name: &'static str,
}

impl Payload {
    #[must_use]
    pub fn new<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Plain-text rendering: strings bare, scalars as literals, composites as compact JSON.
    fn to_text(&self) -> serde_json::Result<String> {
        Ok(match self.inner.to_json_value()? {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.type_name).finish()
    }
}

/// Readable byte source, drained fully before the request is sent.
pub struct ByteStream(Pin<Box<dyn AsyncRead + Send + Sync>>);

impl ByteStream {
    #[must_use]
    pub fn new<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Self(Box::pin(reader))
    }

    async fn drain(mut self) -> std::io::Result<Bytes> {
        let mut buf = Vec::new();
        self.0.read_to_end(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByteStream(..)")
    }
}

/// Value of one multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormField {
    /// Plain form field
    Text(String),
    /// File part named after its field
    File(Bytes),
}

impl From<String> for FormField {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FormField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Bytes> for FormField {
    fn from(value: Bytes) -> Self {
        Self::File(value)
    }
}

impl From<Vec<u8>> for FormField {
    fn from(value: Vec<u8>) -> Self {
        Self::File(Bytes::from(value))
    }
}

/// Field name to value mapping for `multipart/form-data` bodies.
///
/// ```ignore
/// let form = MultipartForm::new()
///     .text("username", "John")
///     .file("avatar", png_bytes);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    fields: BTreeMap<String, FormField>,
}

impl MultipartForm {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.field(name, FormField::Text(value.into()))
    }

    #[must_use]
    pub fn file(self, name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.field(name, FormField::File(data.into()))
    }

    /// Set a field, replacing any previous value under the same name.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, value: FormField) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormField> {
        self.fields.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for MultipartForm
where
    K: Into<String>,
    V: Into<FormField>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Request body before encoding.
#[derive(Debug)]
#[non_exhaustive]
pub enum Body {
    /// Serializable value; encoded per Content-Type (JSON, XML, form or text)
    Payload(Payload),
    /// Pre-built form pairs
    Form(Vec<(String, String)>),
    /// Multipart fields
    Multipart(MultipartForm),
    /// Pre-encoded text, sent verbatim
    Text(String),
    /// Pre-encoded bytes, sent verbatim
    Bytes(Bytes),
    /// Byte stream, drained and sent verbatim
    Stream(ByteStream),
}

impl Body {
    /// Wrap any serializable value.
    #[must_use]
    pub fn payload<T>(value: T) -> Self
    where
        T: Serialize + Send + Sync + 'static,
    {
        Self::Payload(Payload::new(value))
    }

    /// Wrap an async reader.
    #[must_use]
    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        Self::Stream(ByteStream::new(reader))
    }

    fn shape(&self) -> &'static str {
        match self {
            Self::Payload(_) => "payload",
            Self::Form(_) => "form pairs",
            Self::Multipart(_) => "multipart form",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Stream(_) => "stream",
        }
    }
}

impl From<Payload> for Body {
    fn from(value: Payload) -> Self {
        Self::Payload(value)
    }
}

impl From<String> for Body {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<MultipartForm> for Body {
    fn from(value: MultipartForm) -> Self {
        Self::Multipart(value)
    }
}

impl From<ByteStream> for Body {
    fn from(value: ByteStream) -> Self {
        Self::Stream(value)
    }
}

impl From<Vec<(String, String)>> for Body {
    fn from(value: Vec<(String, String)>) -> Self {
        Self::Form(value)
    }
}

impl From<BTreeMap<String, String>> for Body {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Form(value.into_iter().collect())
    }
}

impl<S: BuildHasher> From<HashMap<String, String, S>> for Body {
    fn from(value: HashMap<String, String, S>) -> Self {
        // Sorted so the wire form does not depend on hash order
        let mut pairs: Vec<_> = value.into_iter().collect();
        pairs.sort();
        Self::Form(pairs)
    }
}

/// Output of [`encode_body`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBody {
    pub bytes: Bytes,
    /// Replacement `Content-Type`, set when encoding generated parameters
    /// (the multipart boundary)
    pub content_type: Option<String>,
}

impl EncodedBody {
    fn plain(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }
}

/// Encode `body` for the given `Content-Type` value.
///
/// # Errors
///
/// Returns [`EncodingError::ShapeMismatch`] when the body shape is not
/// accepted for the content type, or the serializer / stream error otherwise.
pub async fn encode_body(content_type: &str, body: Body) -> Result<EncodedBody, EncodingError> {
    let kind = MediaKind::from_content_type(content_type);

    let encoded = match (kind, body) {
        (MediaKind::Multipart, Body::Multipart(form)) => write_multipart(form.fields),
        (MediaKind::Multipart, Body::Form(pairs)) => write_multipart(
            pairs
                .into_iter()
                .map(|(name, value)| (name, FormField::Text(value))),
        ),
        (MediaKind::FormUrlEncoded, Body::Form(pairs)) => {
            EncodedBody::plain(serde_urlencoded::to_string(&pairs)?)
        }
        (MediaKind::FormUrlEncoded, Body::Payload(payload)) => {
            EncodedBody::plain(payload.inner.to_form()?)
        }
        (MediaKind::Json | MediaKind::Other | MediaKind::Text, Body::Form(pairs)) => {
            EncodedBody::plain(serde_json::to_vec(&pairs_to_map(pairs))?)
        }
        (MediaKind::Xml, Body::Form(pairs)) => EncodedBody::plain(
            quick_xml::se::to_string_with_root(FORM_XML_ROOT, &pairs_to_map(pairs))
                .map_err(|e| EncodingError::Xml(Box::new(e)))?,
        ),
        (kind, Body::Text(text)) if kind.accepts_pre_encoded() => EncodedBody::plain(text),
        (kind, Body::Bytes(bytes)) if kind.accepts_pre_encoded() => EncodedBody::plain(bytes),
        (kind, Body::Stream(stream)) if kind.accepts_pre_encoded() => {
            EncodedBody::plain(stream.drain().await?)
        }
        (MediaKind::Json | MediaKind::Other, Body::Payload(payload)) => {
            EncodedBody::plain(payload.inner.to_json()?)
        }
        (MediaKind::Xml, Body::Payload(payload)) => {
            EncodedBody::plain(payload.inner.to_xml().map_err(EncodingError::Xml)?)
        }
        (MediaKind::Text, Body::Payload(payload)) => EncodedBody::plain(payload.to_text()?),
        (_, body) => {
            tracing::debug!(
                content_type,
                shape = body.shape(),
                "body shape rejected for content type"
            );
            return Err(EncodingError::ShapeMismatch {
                content_type: content_type.to_owned(),
                expected: kind.expected_shape(),
            });
        }
    };

    Ok(encoded)
}

/// Root element for key/value pairs encoded as XML.
const FORM_XML_ROOT: &str = "form";

/// Pairs as a string map; a repeated key keeps its last value.
fn pairs_to_map(pairs: Vec<(String, String)>) -> BTreeMap<String, String> {
    pairs.into_iter().collect()
}

fn write_multipart<I>(fields: I) -> EncodedBody
where
    I: IntoIterator<Item = (String, FormField)>,
{
    let boundary = generate_boundary();
    let mut buf = BytesMut::new();

    for (name, field) in fields {
        let name = escape_field_name(&name);
        buf.put_slice(format!("--{boundary}\r\n").as_bytes());
        match field {
            FormField::Text(value) => {
                buf.put_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                buf.put_slice(value.as_bytes());
            }
            FormField::File(data) => {
                buf.put_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{name}\"\r\n\
                         Content-Type: {OCTET_STREAM}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                buf.put_slice(&data);
            }
        }
        buf.put_slice(b"\r\n");
    }
    buf.put_slice(format!("--{boundary}--\r\n").as_bytes());

    EncodedBody {
        bytes: buf.freeze(),
        content_type: Some(format!("{MULTIPART_FORM_DATA}; boundary={boundary}")),
    }
}

fn generate_boundary() -> String {
    let [a, b, c, d]: [u64; 4] = rand::rng().random();
    format!("{a:016x}{b:016x}{c:016x}{d:016x}")
}

fn escape_field_name(name: &str) -> String {
    name.replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
