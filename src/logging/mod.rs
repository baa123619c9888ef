use crate::config::LogsConfig;
use crate::logging::format::Formatter;
pub use log_writer::LogWriter;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::Layer;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

mod format;
mod log_writer;

const CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

fn is_own_target(target: &str) -> bool {
    target == CRATE_NAME || target.starts_with(&format!("{CRATE_NAME}::"))
}

/// Install the global subscriber.
///
/// Events from this crate go to the log file when one is configured and to
/// stdout otherwise; warnings from dependencies always go to stdout.
pub fn registry_logs(config: &LogsConfig) -> anyhow::Result<Option<Arc<LogWriter>>> {
    let level = config.level;
    let mut layers = Vec::new();
    let writer = match &config.path {
        Some(path) => {
            let writer = Arc::new(LogWriter::open(path)?);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(Formatter::new(false))
                .with_writer(writer.file_writer())
                .with_filter(filter::filter_fn(move |metadata| {
                    is_own_target(metadata.target()) && metadata.level() <= &level
                }));
            layers.push(file_layer.boxed());
            Some(writer)
        }
        None => {
            let stdio_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .event_format(Formatter::new(true))
                .with_filter(filter::filter_fn(move |metadata| {
                    is_own_target(metadata.target()) && metadata.level() <= &level
                }));
            layers.push(stdio_layer.boxed());
            None
        }
    };
    // dependencies
    {
        let general_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .event_format(Formatter::new(true))
            .with_filter(filter::filter_fn(|metadata| {
                !is_own_target(metadata.target()) && metadata.level() <= &Level::WARN
            }));
        layers.push(general_layer.boxed());
    }
    tracing_subscriber::registry()
        .with(layers)
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(writer)
}
