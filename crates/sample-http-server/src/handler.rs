//! The hello-world request handler.
//!
//! Every request, whatever its method or path, gets `200 OK` and the body
//! `"hello world!\n"`, written as two frames with a pause in between:
//!
//! ```text
//! hello ──── wait ────▶ world!\n
//! ```
//!
//! The pause comes from the `wait` parameter, taken from a urlencoded form
//! body or the query string, and falls back to the server-wide default
//! when absent or unparseable. A bad `wait` never fails the request.
//!
//! The pause is a timer polled inside the response body, so it holds no
//! lock and does not block other connections or the accept loop.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, Request, Response};
use http_body_util::{BodyExt, Limited};
use hyper::body::{Body, Frame, SizeHint};
use tokio::time::Sleep;

use crate::duration::parse_duration;

/// First half of the body, written immediately.
pub const HELLO: &[u8] = b"hello ";

/// Second half of the body, written after the pause.
pub const WORLD: &[u8] = b"world!\n";

/// Name of the request parameter carrying the pause.
pub const WAIT_PARAM: &str = "wait";

/// Largest form body read when looking for `wait`.
pub const MAX_FORM_BYTES: usize = 10 << 20;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Responds to every request with a delayed `"hello world!\n"`.
#[derive(Debug, Clone)]
pub struct HelloHandler {
    default_wait: Duration,
}

impl HelloHandler {
    /// Creates a handler that pauses for `default_wait` unless told
    /// otherwise.
    #[must_use]
    pub fn new(default_wait: Duration) -> Self {
        Self { default_wait }
    }

    /// Returns the pause used when a request has no valid `wait`.
    #[must_use]
    pub fn default_wait(&self) -> Duration {
        self.default_wait
    }

    /// Handles one request.
    ///
    /// Returns as soon as the `wait` parameter is known; the pause itself
    /// happens while the body is streamed.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<HelloBody>
    where
        B: Body,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let requested = requested_wait(req).await;
        let wait = self.resolve_wait(requested.as_deref());

        tracing::debug!(%method, %path, requested = ?requested, ?wait, "serving hello");

        hello_response(wait)
    }

    /// Turns a raw `wait` value into the pause to use.
    #[must_use]
    pub fn resolve_wait(&self, raw: Option<&str>) -> Duration {
        let Some(raw) = raw else {
            return self.default_wait;
        };
        match parse_duration(raw) {
            Ok(wait) => wait,
            Err(e) => {
                tracing::debug!(raw, error = %e, default = ?self.default_wait, "invalid wait; using default");
                self.default_wait
            }
        }
    }
}

/// Builds the `200 OK` response that pauses for `wait` mid-body.
#[must_use]
pub fn hello_response(wait: Duration) -> Response<HelloBody> {
    let mut response = Response::new(HelloBody::new(wait));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Extracts the `wait` parameter; a form body wins over the query string.
async fn requested_wait<B>(req: Request<B>) -> Option<String>
where
    B: Body,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let from_query = req
        .uri()
        .query()
        .and_then(|q| form_value(q.as_bytes(), WAIT_PARAM));

    if has_form_body(req.method(), req.headers()) {
        match Limited::new(req.into_body(), MAX_FORM_BYTES).collect().await {
            Ok(collected) => {
                if let Some(value) = form_value(&collected.to_bytes(), WAIT_PARAM) {
                    return Some(value);
                }
            }
            Err(e) => tracing::debug!(error = %e, "failed to read form body"),
        }
    }

    from_query
}

fn has_form_body(method: &Method, headers: &HeaderMap) -> bool {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
}

/// Returns the first value for `key` in a urlencoded string.
fn form_value(encoded: &[u8], key: &str) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(encoded)
        .ok()?
        .into_iter()
        .find_map(|(k, v)| (k == key).then_some(v))
}

/// Response body: `"hello "`, a pause, then `"world!\n"`.
///
/// Dropping the body mid-pause (a client disconnect or a forced close)
/// simply cancels the timer.
pub struct HelloBody {
    wait: Duration,
    stage: Stage,
}

enum Stage {
    Hello,
    Paused(Pin<Box<Sleep>>),
    Done,
}

impl HelloBody {
    /// Creates a body that pauses for `wait` between its two frames.
    #[must_use]
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            stage: Stage::Hello,
        }
    }

    /// Returns the pause between frames.
    #[must_use]
    pub fn wait(&self) -> Duration {
        self.wait
    }
}

impl fmt::Debug for HelloBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            Stage::Hello => "hello",
            Stage::Paused(_) => "paused",
            Stage::Done => "done",
        };
        f.debug_struct("HelloBody")
            .field("wait", &self.wait)
            .field("stage", &stage)
            .finish()
    }
}

impl Body for HelloBody {
    type Data = Bytes;
    type Error = std::convert::Infallible;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        match &mut this.stage {
            Stage::Hello => {
                this.stage = Stage::Paused(Box::pin(tokio::time::sleep(this.wait)));
                Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(HELLO)))))
            }
            Stage::Paused(sleep) => {
                ready!(sleep.as_mut().poll(cx));
                this.stage = Stage::Done;
                Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(WORLD)))))
            }
            Stage::Done => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.stage, Stage::Done)
    }

    fn size_hint(&self) -> SizeHint {
        let remaining = match self.stage {
            Stage::Hello => HELLO.len() + WORLD.len(),
            Stage::Paused(_) => WORLD.len(),
            Stage::Done => 0,
        };
        SizeHint::with_exact(remaining as u64)
    }
}
