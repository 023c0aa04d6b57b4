#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Ergonomic HTTP request/response layer for `ModKit`
//!
//! Each call goes through one pipeline:
//!
//! 1. **Header resolution**: client default headers merged with request
//!    headers, request wins, first value per name.
//! 2. **Body encoding** driven by the resolved `Content-Type`: JSON, XML,
//!    URL-encoded forms, multipart, plain text and raw bytes/streams.
//! 3. **Assembly**: body-on-GET/DELETE rejected, query parameters merged into
//!    the URL.
//! 4. **Transport**: pooled hyper client with rustls, transparent
//!    decompression and redirect following.
//! 5. **Classification**: the body is drained, `2xx` is decoded, anything
//!    else becomes a structured [`HttpError`].
//!
//! # Example
//!
//! ```ignore
//! use modkit_fetch::{HttpClient, MultipartForm};
//! use std::time::Duration;
//!
//! let client = HttpClient::builder()
//!     .default_header("x-tenant", "acme")
//!     .request_timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let created: User = client
//!     .post("https://example.com/users")
//!     .json(&NewUser { firstname: "Yousef", lastname: "Hejazi" })?
//!     .send()
//!     .await?
//!     .json()
//!     .await?;
//!
//! client
//!     .post("https://example.com/avatars")
//!     .multipart(MultipartForm::new().text("username", "John").file("avatar", png))
//!     .send()
//!     .await?
//!     .bytes()
//!     .await?;
//! ```
//!
//! Non-2xx responses surface from the body helpers:
//!
//! ```ignore
//! match client.get(url).send().await?.text().await {
//!     Err(e) if e.status() == Some(StatusCode::NOT_FOUND) => None,
//!     other => Some(other?),
//! }
//! ```

mod body;
mod builder;
mod client;
mod config;
mod error;
mod headers;
mod options;
mod request;
mod response;
mod transport;

pub use body::{
    APPLICATION_JSON, APPLICATION_XML, Body, ByteStream, EncodedBody, FORM_URLENCODED, FormField,
    MULTIPART_FORM_DATA, MediaKind, MultipartForm, OCTET_STREAM, Payload, TEXT_PLAIN, encode_body,
};
pub use builder::HttpClientBuilder;
pub use client::HttpClient;
pub use config::{
    ClientConfig, DEFAULT_MAX_BODY_SIZE, DEFAULT_MAX_IDLE_CONNECTIONS_PER_HOST, DEFAULT_USER_AGENT,
    TlsRootConfig,
};
pub use error::{BoxError, DecodeError, EncodingError, Error, HttpError, InvalidUrlKind};
pub use headers::resolve_headers;
pub use options::RequestOptions;
pub use request::{EncodedRequest, RequestBuilder, assemble};
pub use response::HttpResponse;
pub use transport::{ResponseBody, Transport, boxed_transport, build_transport};
