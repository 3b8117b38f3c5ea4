//! Process-level tests: run the real binary and send it real signals.

#![cfg(unix)]

use std::io::{BufRead, BufReader};
use std::net::SocketAddr;
use std::process::{Child, ChildStdout, Command, ExitStatus, Output, Stdio};
use std::time::{Duration, Instant};

use http::StatusCode;
use sample_http_test::TestClient;

const BIN: &str = env!("CARGO_BIN_EXE_sample-http-app");
const BODY: &str = "hello world!\n";

fn command(envs: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(BIN);
    cmd.env_remove("RUST_LOG")
        .env_remove("WAIT_TIME")
        .env_remove("SHUTDOWN_TIMEOUT")
        .env_remove("LOG_FORMAT")
        .env("PORT", "0")
        .env("LOG_LEVEL", "info")
        .envs(envs.iter().copied())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

/// A running app that has printed its readiness line.
struct App {
    child: Child,
    addr: SocketAddr,
    _stdout: BufReader<ChildStdout>,
}

impl App {
    fn start(envs: &[(&str, &str)]) -> Self {
        let mut child = command(envs).spawn().expect("binary should start");
        let mut stdout = BufReader::new(child.stdout.take().expect("piped stdout"));

        let mut line = String::new();
        stdout.read_line(&mut line).expect("stdout should be readable");
        let port: u16 = line
            .trim_end()
            .strip_prefix("Serving on port: ")
            .unwrap_or_else(|| panic!("unexpected readiness line {line:?}"))
            .parse()
            .expect("port should be numeric");

        Self {
            child,
            addr: SocketAddr::from(([127, 0, 0, 1], port)),
            _stdout: stdout,
        }
    }

    fn client(&self) -> TestClient {
        TestClient::new(self.addr)
    }

    fn signal(&self, name: &str) {
        let status = Command::new("kill")
            .arg(format!("-{name}"))
            .arg(self.child.id().to_string())
            .status()
            .expect("kill should run");
        assert!(status.success(), "kill -{name} failed");
    }

    /// Waits for exit and returns the status and everything written to stderr.
    fn wait(mut self, timeout: Duration) -> (ExitStatus, String) {
        let deadline = Instant::now() + timeout;
        loop {
            if self.child.try_wait().expect("try_wait").is_some() {
                break;
            }
            if Instant::now() >= deadline {
                let _ = self.child.kill();
                let output = self.child.wait_with_output().expect("wait");
                panic!(
                    "app did not exit within {timeout:?}; stderr:\n{}",
                    String::from_utf8_lossy(&output.stderr)
                );
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        let output = self.child.wait_with_output().expect("wait_with_output");
        (output.status, String::from_utf8_lossy(&output.stderr).into_owned())
    }
}

fn run_to_exit(envs: &[(&str, &str)], args: &[&str]) -> Output {
    command(envs).args(args).output().expect("binary should run")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_in_flight_request_survives_sigterm() {
    let app = App::start(&[]);
    let client = app.client();

    let started = Instant::now();
    let in_flight = tokio::spawn(async move { client.get("/?wait=2s").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    app.signal("TERM");
    tokio::time::sleep(Duration::from_millis(100)).await;

    let refused = app.client().get("/").await;
    assert!(
        matches!(&refused, Err(e) if e.is_connect()),
        "new connection should be refused, got {refused:?}"
    );

    in_flight
        .await
        .unwrap()
        .expect("in-flight request should complete")
        .assert_status(StatusCode::OK)
        .assert_text(BODY);
    assert!(started.elapsed() >= Duration::from_secs(2));

    let (status, stderr) = tokio::task::spawn_blocking(move || app.wait(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(status.code(), Some(0), "stderr:\n{stderr}");
    assert!(!stderr.contains("shutdown forced"));
}

#[tokio::test]
async fn test_wait_time_sets_default_pause() {
    let app = App::start(&[("WAIT_TIME", "300ms")]);

    app.client()
        .get("/")
        .await
        .unwrap()
        .assert_text(BODY)
        .assert_took_at_least(Duration::from_millis(300));

    app.signal("TERM");
    let (status, _) = tokio::task::spawn_blocking(move || app.wait(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(status.code(), Some(0));
}

#[tokio::test]
async fn test_invalid_wait_time_is_ignored() {
    let app = App::start(&[("WAIT_TIME", "soon")]);

    let response = app.client().get("/").await.unwrap();
    response.assert_text(BODY);
    assert!(response.elapsed() < Duration::from_secs(2));

    app.signal("TERM");
    let (status, _) = tokio::task::spawn_blocking(move || app.wait(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(status.code(), Some(0));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_grace_deadline_forces_exit_zero() {
    let app = App::start(&[("SHUTDOWN_TIMEOUT", "200ms")]);
    let client = app.client();

    let in_flight = tokio::spawn(async move { client.get("/?wait=5s").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let signalled = Instant::now();
    app.signal("TERM");
    let (status, stderr) = tokio::task::spawn_blocking(move || app.wait(Duration::from_secs(3)))
        .await
        .unwrap();

    assert_eq!(status.code(), Some(0), "stderr:\n{stderr}");
    assert!(signalled.elapsed() < Duration::from_secs(3));
    assert!(
        stderr.contains("shutdown forced: 1 connection(s) still open"),
        "stderr:\n{stderr}"
    );
    assert!(in_flight.await.unwrap().is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_signal_is_ignored() {
    let app = App::start(&[]);
    let client = app.client();

    let in_flight = tokio::spawn(async move { client.get("/?wait=1s").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    app.signal("TERM");
    tokio::time::sleep(Duration::from_millis(50)).await;
    app.signal("INT");

    in_flight
        .await
        .unwrap()
        .expect("in-flight request should complete")
        .assert_text(BODY);

    let (status, stderr) = tokio::task::spawn_blocking(move || app.wait(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(status.code(), Some(0), "stderr:\n{stderr}");
    assert!(stderr.contains("already draining"), "stderr:\n{stderr}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sigterm_twice_keeps_draining() {
    let app = App::start(&[]);
    let client = app.client();

    let in_flight = tokio::spawn(async move { client.get("/?wait=1s").await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    app.signal("TERM");
    tokio::time::sleep(Duration::from_millis(50)).await;
    app.signal("TERM");

    in_flight
        .await
        .unwrap()
        .expect("in-flight request should complete")
        .assert_status(StatusCode::OK)
        .assert_text(BODY);

    let (status, stderr) = tokio::task::spawn_blocking(move || app.wait(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(status.code(), Some(0), "stderr:\n{stderr}");
    assert!(stderr.contains("already draining"), "stderr:\n{stderr}");
    assert!(!stderr.contains("shutdown forced"));
}

#[test]
fn test_sigint_drains_idle_server() {
    let app = App::start(&[]);
    app.signal("INT");

    let (status, stderr) = app.wait(Duration::from_secs(5));
    assert_eq!(status.code(), Some(0), "stderr:\n{stderr}");
}

#[test]
fn test_bind_failure_exits_one() {
    let holder = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = holder.local_addr().unwrap().port().to_string();

    let output = run_to_exit(&[("PORT", port.as_str())], &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty(), "no readiness line on failure");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to bind"), "stderr:\n{stderr}");
}

#[test]
fn test_invalid_port_exits_one() {
    let output = run_to_exit(&[("PORT", "http")], &[]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid port"), "stderr:\n{stderr}");
}

#[test]
fn test_invalid_shutdown_timeout_exits_one() {
    let output = run_to_exit(&[("SHUTDOWN_TIMEOUT", "forever")], &[]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SHUTDOWN_TIMEOUT"), "stderr:\n{stderr}");
}

#[test]
fn test_invalid_log_format_exits_one() {
    let output = run_to_exit(&[("LOG_FORMAT", "xml")], &[]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("xml"), "stderr:\n{stderr}");
}

#[test]
fn test_help_and_version() {
    let output = run_to_exit(&[], &["--help"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("USAGE"));

    let output = run_to_exit(&[], &["--version"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("sample-http-app "));
}

#[test]
fn test_unknown_argument_exits_one() {
    let output = run_to_exit(&[], &["--bogus"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown argument: --bogus"));
}
