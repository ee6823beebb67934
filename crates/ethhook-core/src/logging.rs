//! Structured logging setup shared by all three services, in the style of
//! the teacher's `network-proxy`/`dekaf` logging modules: JSON or
//! human-readable output to stderr, level controlled by `LOG_LEVEL`.

use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(format!("unknown log format '{other}', expected json or text")),
        }
    }
}

/// Initializes the global `tracing` subscriber. Call once at process start,
/// before parsing further configuration that might itself want to log.
pub fn init(format: LogFormat) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .expect("default log filter is valid");

    let builder = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(env_filter)
        .with_target(false);

    match format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .with_current_span(true)
            .init(),
        LogFormat::Text => builder.init(),
    }
}

/// Turns a fatal `Result` into a logged error and a process exit, the way
/// the teacher's `network-proxy::logging::Must::or_bail` does for startup
/// failures. Only used for errors the specification classifies as
/// surfaced (non-zero exit), never for recoverable I/O.
pub trait OrBail<T> {
    fn or_bail(self, message: &str) -> T;
}

impl<T, E> OrBail<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_bail(self, message: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                tracing::error!(error = %err, message);
                std::process::exit(1);
            }
        }
    }
}
