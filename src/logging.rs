use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "HEARTH_LOG";
pub const DEFAULT_LOG_FILTER: &str = "hearth=info";

/// Install the JSON stdout subscriber used by the platform bootstrap.
///
/// Safe to call more than once; only the first call installs anything.
/// Records from crates logging through `log` are forwarded as well.
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_from_env())
        .json()
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    let directives =
        std::env::var(LOG_FILTER_ENV).unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}
