//! Test response wrapper.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use tokio::time::Instant;

use crate::error::TestError;

/// A fully read response, with timings.
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    status: StatusCode,
    /// Response headers
    headers: HeaderMap,
    /// Response body bytes
    body: Bytes,
    /// Time until the first body frame arrived
    first_frame: Option<Duration>,
    /// Time until the body ended
    elapsed: Duration,
}

impl TestResponse {
    /// Reads `response` to the end, timing it from `sent_at`.
    pub(crate) async fn read(
        response: http::Response<Incoming>,
        sent_at: Instant,
    ) -> Result<Self, TestError> {
        let (parts, mut body) = response.into_parts();
        let mut bytes = BytesMut::new();
        let mut first_frame = None;

        while let Some(frame) = body.frame().await {
            if let Ok(data) = frame?.into_data() {
                first_frame.get_or_insert_with(|| sent_at.elapsed());
                bytes.extend_from_slice(&data);
            }
        }

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body: bytes.freeze(),
            first_frame,
            elapsed: sent_at.elapsed(),
        })
    }

    /// Creates a test response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes, elapsed: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            first_frame: None,
            elapsed,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
            .and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        Ok(String::from_utf8(self.body.to_vec())?)
    }

    /// Time from sending the request until the first body frame arrived.
    #[must_use]
    pub fn first_frame(&self) -> Option<Duration> {
        self.first_frame
    }

    /// Time from sending the request until the body ended.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Asserts that the status code equals the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {}, got {}",
            expected, self.status
        );
        self
    }

    /// Asserts that the body equals the expected text.
    ///
    /// # Panics
    ///
    /// Panics if the body doesn't match.
    pub fn assert_text(&self, expected: &str) -> &Self {
        assert_eq!(
            self.body,
            expected.as_bytes(),
            "Expected body {:?}, got {:?}",
            expected,
            String::from_utf8_lossy(&self.body)
        );
        self
    }

    /// Asserts that the response took at least `min`.
    ///
    /// # Panics
    ///
    /// Panics if the response finished sooner.
    pub fn assert_took_at_least(&self, min: Duration) -> &Self {
        assert!(
            self.elapsed >= min,
            "Expected response to take at least {:?}, took {:?}",
            min,
            self.elapsed
        );
        self
    }
}
