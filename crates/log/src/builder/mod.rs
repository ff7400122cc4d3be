//! Logger builder implementation

use tracing_subscriber::fmt::writer::{BoxMakeWriter, TestWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::{Config, Format, Writer};
use crate::error::{LogError, LogResult};

/// Logger builder
#[derive(Debug)]
pub struct LoggerBuilder {
    config: Config,
}

/// Handle returned once the global subscriber is installed.
///
/// The subscriber lives for the rest of the process; the guard only records
/// what was installed.
#[derive(Debug)]
pub struct LoggerGuard {
    level: String,
    format: Format,
}

impl LoggerGuard {
    /// The filter directives the subscriber was built with.
    #[must_use]
    pub fn level(&self) -> &str {
        &self.level
    }

    /// The output format in use.
    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }
}

/// Applies the shared display options after the format has been chosen,
/// then boxes the layer so every format/time combination has one type.
macro_rules! create_fmt_layer {
    ($display:expr, $writer:expr, $($style:tt)+) => {{
        let display = $display;
        let layer = fmt::layer()
            $($style)+
            .with_ansi(display.colors)
            .with_target(display.target)
            .with_file(display.source)
            .with_line_number(display.source)
            .with_thread_ids(display.thread_ids)
            .with_writer($writer);
        if display.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Build and install the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - the filter string cannot be parsed
    /// - a global subscriber is already installed
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = EnvFilter::try_new(&self.config.level)
            .map_err(|e| LogError::Filter(format!("{}: {}", &self.config.level, e)))?;

        Registry::default()
            .with(filter)
            .with(fmt_layer(&self.config))
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        tracing::debug!(level = %self.config.level, format = ?self.config.format, "logger initialized");

        Ok(LoggerGuard {
            level: self.config.level,
            format: self.config.format,
        })
    }
}

fn fmt_layer<S>(config: &Config) -> Box<dyn Layer<S> + Send + Sync + 'static>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let writer = make_writer(config.writer);
    let display = &config.display;
    match config.format {
        Format::Pretty => create_fmt_layer!(display, writer, .pretty()),
        Format::Compact => create_fmt_layer!(display, writer, .compact()),
        Format::Json => create_fmt_layer!(display, writer, .json().flatten_event(display.flatten)),
    }
}

fn make_writer(writer: Writer) -> BoxMakeWriter {
    match writer {
        Writer::Stderr => BoxMakeWriter::new(std::io::stderr),
        Writer::Stdout => BoxMakeWriter::new(std::io::stdout),
        Writer::Test => BoxMakeWriter::new(TestWriter::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_is_rejected_before_install() {
        let config = Config {
            level: "conductor=loudest".to_string(),
            ..Config::test()
        };
        let err = LoggerBuilder::from_config(config).build().unwrap_err();
        assert!(matches!(err, LogError::Filter(ref msg) if msg.starts_with("conductor=loudest")));
    }

    #[test]
    fn second_install_reports_already_initialized() {
        // The first call may lose the race against another test; the second never wins.
        let _ = LoggerBuilder::from_config(Config::test()).build();
        let err = LoggerBuilder::from_config(Config::test()).build().unwrap_err();
        assert!(matches!(err, LogError::AlreadyInitialized(_)));
    }
}
