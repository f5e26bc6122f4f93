use crate::cli::TracingFormat;
use crate::config::Config;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Configure and initialize logging for the application.
pub fn setup_logging(config: &Config, tracing_format: TracingFormat) {
    setup_logging_with_level(&config.log_level, tracing_format);
}

/// Initialize logging without a full configuration, used by offline subcommands.
///
/// Logs go to stderr so that subcommand output on stdout stays machine-readable.
pub fn setup_logging_with_level(base_level: &str, tracing_format: TracingFormat) {
    // RUST_LOG takes precedence over the configured level.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,oltsync={base_level}")));

    match tracing_format {
        TracingFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .compact(),
                )
                .init();
        }
        TracingFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .json()
                        .flatten_event(true)
                        .with_current_span(true),
                )
                .init();
        }
    }
}
