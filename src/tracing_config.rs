//! Tracing configuration module for structured logging
//!
//! Applications (the CLI) install a subscriber; the library only emits spans and events.
//! Span and event helpers below keep field names consistent across the capture pipeline.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable console output with colors (default for CLI)
    Console,
    /// Compact console output for CI environments
    Compact,
    /// JSON structured logging
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Configuration for tracing output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// Output to stderr (default)
    Console,
    /// Output to a file
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
    /// Output to both console and a daily-rolled file
    #[cfg(feature = "tracing-files")]
    Both(std::path::PathBuf),
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Environment filter string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

#[cfg(all(feature = "cli", feature = "tracing-files"))]
static FILE_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Initialize the global tracing subscriber
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        let filter = match &self.env_filter {
            Some(env_filter) => EnvFilter::try_new(env_filter)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

        let console = matches!(self.output, TracingOutput::Console);
        #[cfg(feature = "tracing-files")]
        let console = console || matches!(self.output, TracingOutput::Both(_));
        if console {
            layers.push(Self::console_layer(self.format));
        }

        #[cfg(feature = "tracing-files")]
        match &self.output {
            TracingOutput::File(path) => {
                let appender = tracing_appender::rolling::never(
                    path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    path.file_name()
                        .unwrap_or_else(|| std::ffi::OsStr::new("photo-matte.log")),
                );
                layers.push(Self::file_layer(appender));
            },
            TracingOutput::Both(path) => {
                let appender = tracing_appender::rolling::daily(
                    path.parent().unwrap_or_else(|| std::path::Path::new(".")),
                    path.file_stem()
                        .unwrap_or_else(|| std::ffi::OsStr::new("photo-matte")),
                );
                layers.push(Self::file_layer(appender));
            },
            TracingOutput::Console => {},
        }

        Registry::default().with(layers).with(filter).try_init()?;

        if let Some(session_id) = &self.session_id {
            tracing::info!(session_id = %session_id, "🚀 Photo matte session started");
        }

        Ok(())
    }

    #[cfg(feature = "cli")]
    fn console_layer(format: TracingFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
        use tracing_subscriber::fmt;

        match format {
            TracingFormat::Console => fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true)
                .with_target(false)
                .with_level(true)
                .compact()
                .boxed(),
            TracingFormat::Compact => fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .with_target(false)
                .compact()
                .boxed(),
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        }
    }

    #[cfg(all(feature = "cli", feature = "tracing-files"))]
    fn file_layer(
        appender: tracing_appender::rolling::RollingFileAppender,
    ) -> Box<dyn Layer<Registry> + Send + Sync> {
        use tracing_subscriber::fmt;

        let (writer, guard) = tracing_appender::non_blocking(appender);
        // Guard must live for the process or buffered lines are lost
        let _ = FILE_GUARD.set(guard);
        fmt::layer().with_ansi(false).with_writer(writer).compact().boxed()
    }
}

/// Initialize tracing with CLI-friendly defaults
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<()> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .with_session_id(uuid::Uuid::new_v4().to_string())
        .init()
}

/// Install a minimal env-filtered subscriber unless one is already set
#[cfg(feature = "cli")]
pub fn init_library_tracing() {
    if tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish(),
    )
    .is_ok()
    {
        tracing::debug!("📚 Library tracing initialized");
    }
}

/// Span creation helpers for the capture pipeline
pub mod spans {
    use crate::{capture::RequestId, types::MatteType};
    use tracing::{Level, Span};

    /// Span covering one event delivered to a capture request
    pub fn capture_session(request_id: &RequestId) -> Span {
        tracing::span!(Level::INFO, "capture_session", request_id = %request_id)
    }

    /// Span covering one matte composite
    pub fn compositing(matte_type: &MatteType) -> Span {
        tracing::span!(Level::DEBUG, "compositing", matte_type = %matte_type)
    }

    /// Span covering authorization and save of one capture
    pub fn persistence(request_id: &RequestId, resources: usize) -> Span {
        tracing::span!(
            Level::INFO,
            "persistence",
            request_id = %request_id,
            resources = resources
        )
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use crate::capture::{CaptureSummary, RequestId, TrackerState};
    use tracing::{debug, info};

    /// Log a tracker state change
    pub fn state_transition(request_id: &RequestId, from: TrackerState, to: TrackerState) {
        debug!(
            request_id = %request_id,
            from = %from,
            to = %to,
            "State transition"
        );
    }

    /// Log the final state of a capture request
    pub fn capture_completed(summary: &CaptureSummary) {
        info!(
            request_id = %summary.id,
            primary = summary.primary_image_bytes.is_some(),
            portrait = summary.portrait_matte.is_some(),
            segmentation = summary.segmentation_mattes.len(),
            persisted = summary.persistence.as_ref().is_some_and(|p| p.is_saved()),
            "✅ Capture completed"
        );
    }
}
