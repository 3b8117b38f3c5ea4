//! Test error types.

use std::io;

use thiserror::Error;

/// Errors that can occur while talking to a server under test.
#[derive(Debug, Error)]
pub enum TestError {
    /// The TCP connection could not be opened.
    #[error("connect error: {0}")]
    Connect(#[source] io::Error),

    /// Request building failed.
    #[error("request build error: {0}")]
    RequestBuild(#[from] http::Error),

    /// The form body could not be encoded.
    #[error("form encode error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),

    /// The HTTP exchange failed, including a connection closed mid-response.
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    /// The response body was not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl TestError {
    /// Returns `true` if the TCP connection could not be opened.
    #[must_use]
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_display() {
        let err = TestError::Connect(io::Error::from(io::ErrorKind::ConnectionRefused));
        assert!(err.is_connect());
        assert!(err.to_string().starts_with("connect error:"));
    }

    #[test]
    fn test_utf8_error() {
        let err: TestError = String::from_utf8(vec![0xff]).unwrap_err().into();
        assert!(!err.is_connect());
        assert!(err.to_string().contains("UTF-8"));
    }
}
