//! Tracing setup: stderr output plus an optional rotating file log.
//!
//! Diagnostics go to stderr so that result output on stdout stays
//! machine-readable. `RUST_LOG` controls filtering (default "info"),
//! e.g. `RUST_LOG=linkscout=debug,reqwest=warn`.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the tracing subscriber.
///
/// When `log_dir` is given, a daily-rotating plain-text log is written
/// there through a non-blocking appender in addition to stderr.
pub fn init(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(env_filter.clone());

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "linkscout.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            // The guard must outlive the program for the background
            // writer to keep flushing
            Box::leak(Box::new(guard));

            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_ansi(false)
                    .compact()
                    .with_filter(env_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
