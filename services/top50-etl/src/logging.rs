//!
//! src/logging.rs  Oct 19th, 2026 
//!
//! Initializes logger. Events go to stdout through a non-blocking writer,
//! the returned guard has to outlive the run or buffered lines are lost
//!
//!

use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use tracing_error::ErrorLayer;
use tracing_appender::non_blocking;

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::EtlError;

pub struct LoggingGuard(#[allow(dead_code)] tracing_appender::non_blocking::WorkerGuard);

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard, EtlError> {
    let (writer, guard) = non_blocking(std::io::stdout());
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()));

    let time = fmt::time::UtcTime::rfc_3339();
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(ErrorLayer::default());

    let result = match cfg.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_timer(time)
                    .with_target(cfg.include_target)
                    .with_file(cfg.include_file_line)
                    .with_line_number(cfg.include_file_line)
                    .json()
                    .flatten_event(true)
                    .with_current_span(true)
                    .with_span_list(true)
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_timer(time)
                    .with_ansi(cfg.with_ansi)
                    .with_target(cfg.include_target)
                    .with_file(cfg.include_file_line)
                    .with_line_number(cfg.include_file_line)
                    .pretty()
            )
            .try_init(),
    };

    result.map_err(|e| EtlError::Config(format!("logging init: {e}")))?;
    Ok( LoggingGuard(guard) )
}
