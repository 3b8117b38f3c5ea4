//! Test client for real-socket HTTP testing.

use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::Full;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::TestError;
use crate::request::TestRequest;
use crate::response::TestResponse;

/// A client that talks to a server bound on a real socket.
///
/// Every [`send`](TestClient::send) opens a fresh connection. Use
/// [`connect`](TestClient::connect) to reuse one connection across
/// requests.
///
/// # Example
///
/// ```ignore
/// use sample_http_test::TestClient;
///
/// let client = TestClient::new(bound.local_addr());
/// let response = client.get("/?wait=10ms").await?;
/// response.assert_text("hello world!\n");
/// ```
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct TestClient {
    addr: SocketAddr,
}

impl TestClient {
    /// Creates a client for the server at `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Returns the server address.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Sends a GET request for `uri` on a new connection.
    pub async fn get(&self, uri: impl AsRef<str>) -> Result<TestResponse, TestError> {
        self.send(TestRequest::get(uri)).await
    }

    /// Sends `request` on a new connection.
    pub async fn send(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let mut connection = self.connect().await?;
        connection.send(request).await
    }

    /// Opens a keep-alive connection.
    pub async fn connect(&self) -> Result<TestConnection, TestError> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(TestError::Connect)?;
        let (sender, conn) = http1::handshake(TokioIo::new(stream)).await?;
        let driver = tokio::spawn(conn);
        Ok(TestConnection { sender, driver })
    }
}

/// One HTTP/1.1 connection that can carry several requests in turn.
#[derive(Debug)]
pub struct TestConnection {
    sender: http1::SendRequest<Full<Bytes>>,
    driver: JoinHandle<Result<(), hyper::Error>>,
}

impl TestConnection {
    /// Sends `request` and reads the whole response.
    pub async fn send(&mut self, request: TestRequest) -> Result<TestResponse, TestError> {
        let request = request.build()?;
        self.sender.ready().await?;
        let sent_at = Instant::now();
        let response = self.sender.send_request(request).await?;
        TestResponse::read(response, sent_at).await
    }

    /// Sends a GET request for `uri`.
    pub async fn get(&mut self, uri: impl AsRef<str>) -> Result<TestResponse, TestError> {
        self.send(TestRequest::get(uri)).await
    }

    /// Returns `true` once the connection can no longer send requests.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.driver.is_finished()
    }

    /// Waits for the server to close the connection.
    pub async fn closed(self) {
        // The driver's own result does not matter, only that it ended
        let _ = self.driver.await;
    }
}
