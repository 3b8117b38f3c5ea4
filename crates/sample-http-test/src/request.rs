//! Test request building.

use bytes::Bytes;
use http::{header, Method};
use http_body_util::Full;
use serde::Serialize;

use crate::error::TestError;

/// Builder for a request sent by a [`TestClient`](crate::TestClient) or a
/// [`TestConnection`](crate::TestConnection).
///
/// # Example
///
/// ```
/// use sample_http_test::TestRequest;
///
/// let request = TestRequest::post("/")
///     .form(&[("wait", "1s")])
///     .build()
///     .unwrap();
///
/// assert_eq!(request.method(), "POST");
/// ```
#[derive(Debug)]
#[must_use]
pub struct TestRequest {
    builder: http::request::Builder,
    body: Result<Bytes, TestError>,
}

impl TestRequest {
    /// Creates a request builder for `method` and `uri`.
    pub fn new(method: Method, uri: impl AsRef<str>) -> Self {
        Self {
            builder: http::Request::builder()
                .method(method)
                .uri(uri.as_ref())
                .header(header::HOST, "localhost"),
            body: Ok(Bytes::new()),
        }
    }

    /// Creates a new GET request.
    pub fn get(uri: impl AsRef<str>) -> Self {
        Self::new(Method::GET, uri)
    }

    /// Creates a new POST request.
    pub fn post(uri: impl AsRef<str>) -> Self {
        Self::new(Method::POST, uri)
    }

    /// Creates a new PUT request.
    pub fn put(uri: impl AsRef<str>) -> Self {
        Self::new(Method::PUT, uri)
    }

    /// Creates a new DELETE request.
    pub fn delete(uri: impl AsRef<str>) -> Self {
        Self::new(Method::DELETE, uri)
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Ok(body.into());
        self
    }

    /// Sets a urlencoded form body and its content type.
    pub fn form<T: Serialize + ?Sized>(mut self, form: &T) -> Self {
        self.body = serde_urlencoded::to_string(form)
            .map(Bytes::from)
            .map_err(TestError::from);
        self.builder = self
            .builder
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        self
    }

    /// Builds the HTTP request.
    pub fn build(self) -> Result<http::Request<Full<Bytes>>, TestError> {
        let body = self.body?;
        let length = body.len();
        Ok(self
            .builder
            .header(header::CONTENT_LENGTH, length)
            .body(Full::new(body))?)
    }
}
