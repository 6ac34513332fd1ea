//! tracing subscriber setup
//!
//! Log lines go to a rolling file (non-blocking) and, in text mode, to
//! stdout as well. The returned guard must stay alive for the duration of
//! the process or buffered lines are lost.

use crate::config::AppConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn file_appender(config: &AppConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => tracing_appender::rolling::daily(&config.log_dir, &config.log_file),
        _ => tracing_appender::rolling::never(&config.log_dir, &config.log_file),
    }
}

fn build_filter(config: &AppConfig) -> EnvFilter {
    // RUST_LOG wins over the config file when set
    let fallback = if config.enable_tracing {
        config.log_level.clone()
    } else {
        format!("{},corebank=off", config.log_level)
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(config));
    let registry = tracing_subscriber::registry().with(build_filter(config));

    if config.use_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true) // structured queries filter on target
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }

    guard
}
