#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end request pipeline tests against a local mock server.

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use httpmock::prelude::{Method as MockMethod, MockServer};
use modkit_fetch::{
    APPLICATION_XML, Body, EncodingError, Error, FORM_URLENCODED, HttpClient, InvalidUrlKind,
    OCTET_STREAM, RequestOptions,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;

#[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
struct Person {
    firstname: String,
    lastname: String,
}

fn yousef() -> Person {
    Person {
        firstname: "Yousef".to_owned(),
        lastname: "Hejazi".to_owned(),
    }
}

fn client() -> HttpClient {
    HttpClient::builder()
        .default_header("accept", "application/json")
        .build()
        .unwrap()
}

#[tokio::test]
async fn xml_body_is_encoded_and_decoded() {
    let server = MockServer::start();
    let xml = "<Person><firstname>Yousef</firstname><lastname>Hejazi</lastname></Person>";
    let mock = server.mock(|when, then| {
        when.method(MockMethod::POST)
            .path("/people")
            .header("content-type", APPLICATION_XML)
            .body(xml);
        then.status(201)
            .header("content-type", APPLICATION_XML)
            .body(xml);
    });

    let person: Person = client()
        .post(&server.url("/people"))
        .xml(&yousef())
        .unwrap()
        .send()
        .await
        .unwrap()
        .xml()
        .await
        .unwrap();

    mock.assert();
    assert_eq!(person, yousef());
}

#[tokio::test]
async fn form_pairs_are_url_encoded() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(MockMethod::POST)
            .path("/login")
            .header("content-type", FORM_URLENCODED)
            .body("password=s3cret&username=john");
        then.status(204);
    });

    let options = RequestOptions::default()
        .with_header(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED))
        .with_body(vec![
            ("password".to_owned(), "s3cret".to_owned()),
            ("username".to_owned(), "john".to_owned()),
        ]);

    let body = client()
        .execute(Method::POST, &server.url("/login"), options)
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();

    mock.assert();
    assert!(body.is_empty());
}

#[tokio::test]
async fn params_override_existing_query_pairs() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(MockMethod::GET)
            .path("/items")
            .query_param("page", "2")
            .query_param("sort", "asc")
            .query_param("size", "50");
        then.status(200).body("[]");
    });

    let url = format!("{}?page=1&sort=asc", server.url("/items"));
    let items: Vec<String> = client()
        .get(&url)
        .param("page", "2")
        .param("size", "50")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    mock.assert();
    assert!(items.is_empty());
}

#[tokio::test]
async fn request_headers_override_client_defaults() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(MockMethod::GET)
            .path("/report")
            .header("accept", "text/csv")
            .header("x-tenant", "acme");
        then.status(200).body("id,name\n1,John\n");
    });

    let client = HttpClient::builder()
        .default_header("accept", "application/json")
        .default_header("x-tenant", "acme")
        .build()
        .unwrap();

    let mut overrides = HeaderMap::new();
    overrides.insert(ACCEPT, HeaderValue::from_static("text/csv"));

    let csv = client
        .get(&server.url("/report"))
        .headers(overrides)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    mock.assert();
    assert_eq!(csv, "id,name\n1,John\n");
}

#[tokio::test]
async fn pre_encoded_text_is_sent_verbatim_as_json() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(MockMethod::PUT)
            .path("/raw")
            .header("content-type", "application/json")
            .body(r#"{"already":"encoded"}"#);
        then.status(200);
    });

    client()
        .put(&server.url("/raw"))
        .body(r#"{"already":"encoded"}"#)
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();

    mock.assert();
}

#[tokio::test]
async fn stream_body_is_drained_before_sending() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(MockMethod::POST)
            .path("/upload")
            .header("content-type", OCTET_STREAM)
            .body("chunked payload");
        then.status(202);
    });

    let response = client()
        .post(&server.url("/upload"))
        .stream(std::io::Cursor::new(b"chunked payload".to_vec()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    response.bytes().await.unwrap();
    mock.assert();
}

#[tokio::test]
async fn shape_mismatch_fails_before_network() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path("/login");
        then.status(200);
    });

    let err = client()
        .post(&server.url("/login"))
        .header("content-type", FORM_URLENCODED)
        .text("username=john")
        .send()
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            Error::Encoding(EncodingError::ShapeMismatch { ref content_type, .. })
                if content_type == FORM_URLENCODED
        ),
        "got: {err:?}"
    );
    mock.assert_calls(0);
}

#[tokio::test]
async fn body_on_get_is_rejected_before_network() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.path("/items");
        then.status(200);
    });

    let options = RequestOptions::default().with_body(Body::payload(yousef()));
    let err = client()
        .execute(Method::GET, &server.url("/items"), options)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidRequest { ref method, .. } if method == Method::GET));
    mock.assert_calls(0);
}

#[tokio::test]
async fn unsupported_scheme_is_malformed_url() {
    let err = client().get("ftp://example.com/file").send().await.unwrap_err();
    assert!(matches!(
        err,
        Error::MalformedUrl {
            kind: InvalidUrlKind::UnsupportedScheme,
            ..
        }
    ));
}

#[tokio::test]
async fn server_error_carries_body_and_headers() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(MockMethod::DELETE).path("/users/7");
        then.status(500)
            .header("x-request-id", "req-42")
            .body("database unavailable");
    });

    let url = server.url("/users/7");
    let err = client()
        .delete(&url)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    let http = err.http_error().unwrap();
    assert_eq!(http.status_text, "500 Internal Server Error");
    assert_eq!(http.text(), "database unavailable");
    assert_eq!(http.headers().get("x-request-id").unwrap(), "req-42");
    assert_eq!(http.method, Method::DELETE);
    assert_eq!(http.url, url);

    let message = err.to_string();
    assert!(message.contains("DELETE"), "{message}");
    assert!(message.contains("database unavailable"), "{message}");
}

#[tokio::test]
async fn shape_mismatch_is_logged_at_debug() {
    #[derive(Clone, Default)]
    struct DebugCapture {
        messages: Arc<Mutex<Vec<String>>>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for DebugCapture {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::DEBUG {
                let mut visitor = MessageVisitor(String::new());
                event.record(&mut visitor);
                self.messages.lock().unwrap().push(visitor.0);
            }
        }
    }

    struct MessageVisitor(String);
    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    let capture = DebugCapture::default();
    let messages = capture.messages.clone();
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(capture));

    let err = modkit_fetch::encode_body("multipart/form-data", Body::from("plain"))
        .await
        .unwrap_err();
    assert!(matches!(err, EncodingError::ShapeMismatch { .. }));

    let captured = messages.lock().unwrap();
    assert!(
        captured.iter().any(|m| m.contains("body shape rejected")),
        "expected a shape mismatch event, got: {:?}",
        *captured
    );
}
