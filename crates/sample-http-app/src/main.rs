//! Sample HTTP App - Entry point

use tracing::{error, info, warn};

use sample_http_app::cli::{self, Command};
use sample_http_app::AppError;
use sample_http_server::ServerConfig;
use sample_http_telemetry::{init_logging, LogConfig};

fn fail(err: &AppError) -> ! {
    eprintln!("{err}");
    std::process::exit(err.exit_code());
}

#[tokio::main]
async fn main() {
    // Parse arguments
    match cli::parse(std::env::args().skip(1)) {
        Ok(Command::Run) => {}
        Ok(Command::Help) => {
            print!("{}", cli::HELP);
            std::process::exit(0);
        }
        Ok(Command::Version) => {
            println!("sample-http-app {}", sample_http_app::VERSION);
            std::process::exit(0);
        }
        Err(e) => fail(&e),
    }

    // Initialize logging
    let log_config = LogConfig::from_env().unwrap_or_else(|e| fail(&e.into()));
    if let Err(e) = init_logging(&log_config) {
        fail(&e.into());
    }

    // Load configuration
    let config = ServerConfig::from_env().unwrap_or_else(|e| {
        let e = AppError::from(e);
        error!(error = %e, "invalid configuration");
        fail(&e)
    });

    info!(
        version = sample_http_app::VERSION,
        addr = config.http_addr(),
        default_wait_us = config.default_wait().as_micros() as u64,
        shutdown_timeout_ms = config.shutdown_timeout().as_millis() as u64,
        "starting sample-http-app"
    );

    match sample_http_app::run(config).await {
        Ok(report) => {
            if report.outcome.is_forced() {
                warn!(outcome = %report.outcome, "exiting after forced shutdown");
                eprintln!("{}", report.outcome);
            }
            info!(elapsed_ms = report.elapsed.as_millis() as u64, "shutdown complete");
        }
        Err(e) => {
            error!(error = %e, "server error");
            fail(&e);
        }
    }
}
