//! Subscriber assembly

use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::{Config, DisplayConfig, Format, Writer};
use crate::error::{LogError, LogResult};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Applies the shared display toggles, then boxes the layer.
macro_rules! finish_layer {
    ($layer:expr, $display:expr) => {{
        let layer = $layer
            .with_ansi($display.colors)
            .with_target($display.target)
            .with_file($display.source)
            .with_line_number($display.source)
            .with_thread_ids($display.thread_ids);
        if $display.time {
            layer.boxed()
        } else {
            layer.without_time().boxed()
        }
    }};
}

/// Logger builder
#[derive(Debug, Clone, Default)]
pub struct LoggerBuilder {
    config: Config,
}

/// Keeps the root span of the global fields entered.
///
/// Hold it for the life of the program; dropping it leaves the subscriber
/// installed but stops attaching the fields.
#[derive(Debug)]
#[must_use = "dropping the guard detaches the global fields"]
pub struct LoggerGuard {
    _root_span: Option<tracing::span::EnteredSpan>,
}

impl LoggerGuard {
    pub(crate) fn noop() -> Self {
        Self { _root_span: None }
    }
}

impl LoggerBuilder {
    /// Create builder from config
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    /// Override the filter directives.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// Override the output format.
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.config.format = format;
        self
    }

    /// Configuration the builder will install
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Install the global subscriber.
    ///
    /// # Errors
    ///
    /// - [`LogError::Filter`] if the directives do not parse
    /// - [`LogError::AlreadyInitialized`] if a global subscriber exists
    pub fn build(self) -> LogResult<LoggerGuard> {
        let filter = parse_filter(&self.config.level)?;
        let layer = fmt_layer(self.config.format, self.config.writer, &self.config.display);

        Registry::default()
            .with(layer)
            .with(filter)
            .try_init()
            .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

        let fields = &self.config.fields;
        let root_span = (!fields.is_empty()).then(|| {
            tracing::info_span!(
                "app",
                service = fields.service.as_deref().unwrap_or(""),
                env = fields.env.as_deref().unwrap_or(""),
                version = fields.version.as_deref().unwrap_or(""),
                instance = fields.instance.as_deref().unwrap_or("")
            )
            .entered()
        });

        Ok(LoggerGuard {
            _root_span: root_span,
        })
    }
}

pub(crate) fn parse_filter(level: &str) -> LogResult<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| LogError::Filter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

fn make_writer(writer: Writer) -> BoxMakeWriter {
    match writer {
        Writer::Stderr => BoxMakeWriter::new(std::io::stderr),
        Writer::Stdout => BoxMakeWriter::new(std::io::stdout),
        Writer::Test => BoxMakeWriter::new(tracing_subscriber::fmt::TestWriter::new()),
    }
}

fn fmt_layer(format: Format, writer: Writer, display: &DisplayConfig) -> BoxedLayer {
    let base = tracing_subscriber::fmt::layer().with_writer(make_writer(writer));
    match format {
        Format::Pretty => finish_layer!(base.pretty(), display),
        Format::Compact => finish_layer!(base.compact(), display),
        Format::Json => finish_layer!(
            base.json()
                .with_current_span(true)
                .with_span_list(display.span_list)
                .flatten_event(display.flatten),
            display
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_errors_name_the_directive() {
        let err = parse_filter("warden_lock=loud").unwrap_err();
        assert!(matches!(err, LogError::Filter { ref filter, .. } if filter == "warden_lock=loud"));
    }

    #[test]
    fn accepts_multi_directive_filters() {
        assert!(parse_filter("warden_lock=debug,warn").is_ok());
    }

    #[test]
    fn every_format_builds_a_layer() {
        let display = DisplayConfig::default();
        for format in [Format::Pretty, Format::Compact, Format::Json] {
            let _layer = fmt_layer(format, Writer::Test, &display);
        }
    }

    #[test]
    fn builder_overrides() {
        let builder = LoggerBuilder::from_config(Config::production())
            .with_level("debug")
            .with_format(Format::Compact);
        assert_eq!(builder.config().level, "debug");
        assert_eq!(builder.config().format, Format::Compact);
    }
}
