//! # Sample HTTP Test
//!
//! Test utilities for the sample HTTP server. Unlike an in-memory harness,
//! requests go over real TCP connections, so tests can observe what a
//! client sees during shutdown: refused connects, connections closed under
//! an in-flight request, and how long each response took.
//!
//! ## Key Features
//!
//! - **Real sockets**: one connection per request, or a reusable
//!   [`TestConnection`] for keep-alive scenarios
//! - **Request builder**: query strings, headers and urlencoded forms
//! - **Timings**: time to first body frame and to end of body
//!
//! ## Example
//!
//! ```ignore
//! use sample_http_test::{TestClient, TestRequest};
//! use std::time::Duration;
//!
//! #[tokio::test]
//! async fn test_wait() {
//!     let client = TestClient::new(addr);
//!
//!     let response = client
//!         .send(TestRequest::post("/").form(&[("wait", "50ms")]))
//!         .await
//!         .unwrap();
//!
//!     response
//!         .assert_text("hello world!\n")
//!         .assert_took_at_least(Duration::from_millis(50));
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/sample-http-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestConnection};
pub use error::TestError;
pub use request::TestRequest;
pub use response::TestResponse;
