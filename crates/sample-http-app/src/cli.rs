//! Command-line arguments.

use crate::error::{AppError, AppResult};

/// What the command line asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start the server.
    Run,
    /// Print usage and exit.
    Help,
    /// Print the version and exit.
    Version,
}

/// Parses the arguments that follow the program name.
///
/// # Errors
///
/// Returns [`AppError::Usage`] for any argument other than the help and
/// version flags.
pub fn parse<I, S>(args: I) -> AppResult<Command>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut command = Command::Run;

    for arg in args {
        match arg.as_ref() {
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-v" => command = Command::Version,
            other => {
                return Err(AppError::Usage(format!(
                    "Unknown argument: {other}\nUse --help for usage information"
                )))
            }
        }
    }

    Ok(command)
}

/// Usage text for `--help`.
pub const HELP: &str = r"Sample HTTP App - hello world fixture server with graceful shutdown

USAGE:
    sample-http-app [OPTIONS]

Every request is answered with 'hello ', a pause, then 'world!'.
On SIGTERM or SIGINT the server stops accepting connections and waits
for in-flight requests before exiting.

OPTIONS:
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    PORT                   Listen port (default: 8080)
    WAIT_TIME              Default pause, e.g. 500ms or 2s (default: 10us)
    SHUTDOWN_TIMEOUT       Grace period for draining (default: 30s)
    LOG_LEVEL              Log filter directive (default: info)
    LOG_FORMAT             json or pretty (default: json)
    RUST_LOG               Log filter directive, overrides LOG_LEVEL

EXAMPLES:
    # Pause two seconds per request unless ?wait= says otherwise
    WAIT_TIME=2s sample-http-app

    curl 'localhost:8080/?wait=1.5s'
";
