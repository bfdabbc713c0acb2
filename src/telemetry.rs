//! Logging initialization.
//!
//! Everything goes to stderr so stdout stays clean for `porter status`
//! output. Controlled by two environment variables:
//! - `PORTER_LOG`: an [`EnvFilter`] directive (`debug`, `porter=trace`, ...).
//!   Unset falls back to the level chosen on the command line.
//! - `PORTER_LOG_FORMAT`: `json` for one JSON object per event with span
//!   close timings, anything else for compact human-readable lines.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "PORTER_LOG";

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "PORTER_LOG_FORMAT";

/// Output format for log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// Read the format from [`FORMAT_ENV`].
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(std::env::var(FORMAT_ENV).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global subscriber.
///
/// `default_directive` is used when [`LOG_ENV`] is unset or invalid. Calling
/// this twice is harmless: the second install fails quietly and the first
/// subscriber stays in place.
pub fn init(default_directive: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directive));

    let result = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .without_time()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "subscriber already installed");
    }
}
