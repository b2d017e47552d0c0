//! Structured logging for Cinder
//!
//! Turns a [`LogConfig`] into the process-wide `tracing` subscriber: a
//! console layer (JSON, pretty or compact) and optionally a rolling JSONL
//! file.
//!
//! ```ignore
//! use cinder_logging::{CinderSubscriberBuilder, LogConfig};
//!
//! let _guard = CinderSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .try_init()?;
//! ```
//!
//! Paste content, passwords and keys must never be passed as fields. Log ids,
//! sizes and flags instead.

pub mod config;

pub use config::{ConsoleConfig, ConsoleFormat, FileConfig, JsonlConfig, LogConfig, RotationStrategy};

use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to create log directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open log file: {0}")]
    Appender(String),

    #[error("Invalid log filter: {0}")]
    Filter(String),

    #[error("A global subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Flushes buffered file output when dropped
#[must_use = "dropping the guard stops file logging"]
#[derive(Default)]
pub struct LoggingGuard {
    writers: Vec<WorkerGuard>,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("writers", &self.writers.len())
            .finish()
    }
}

/// Assembles the subscriber from a [`LogConfig`]
pub struct CinderSubscriberBuilder {
    config: LogConfig,
}

impl CinderSubscriberBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the base filter directive
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// `true` selects colored pretty output, `false` JSON lines
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.config.console.format = if pretty {
            ConsoleFormat::Pretty
        } else {
            ConsoleFormat::Json
        };
        self.config.console.ansi = pretty;
        self
    }

    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the subscriber without installing it
    ///
    /// `RUST_LOG`, when set and valid, replaces the configured directives.
    pub fn build(
        self,
    ) -> Result<(Box<dyn Subscriber + Send + Sync>, LoggingGuard), LoggingError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.config.filter_directives())
                .map_err(|e| LoggingError::Filter(e.to_string()))?,
        };

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = LoggingGuard::default();

        if self.config.console.enabled {
            layers.push(self.console_layer());
        }

        if let Some(file_config) = &self.config.file {
            let (writer, worker) = tracing_appender::non_blocking(file_appender(file_config)?);
            guard.writers.push(worker);
            layers.push(self.file_layer(writer));
        }

        let subscriber = Registry::default().with(layers).with(filter);
        Ok((Box::new(subscriber), guard))
    }

    /// Install the subscriber for the whole process
    ///
    /// Hold the returned guard until exit or buffered file lines are lost.
    pub fn try_init(self) -> Result<LoggingGuard, LoggingError> {
        let (subscriber, guard) = self.build()?;
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;
        Ok(guard)
    }

    fn console_layer(&self) -> BoxedLayer {
        let console = &self.config.console;
        let jsonl = &self.config.jsonl;
        match console.format {
            ConsoleFormat::Pretty => tracing_subscriber::fmt::layer()
                .pretty()
                .with_ansi(console.ansi)
                .boxed(),
            ConsoleFormat::Compact => tracing_subscriber::fmt::layer()
                .compact()
                .with_ansi(console.ansi)
                .boxed(),
            ConsoleFormat::Json => tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(jsonl.include_spans)
                .flatten_event(jsonl.flatten_events)
                .with_file(jsonl.include_location)
                .with_line_number(jsonl.include_location)
                .boxed(),
        }
    }

    fn file_layer(&self, writer: NonBlocking) -> BoxedLayer {
        let jsonl = &self.config.jsonl;
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(jsonl.include_spans)
            .flatten_event(jsonl.flatten_events)
            .with_file(jsonl.include_location)
            .with_line_number(jsonl.include_location)
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    }
}

impl Default for CinderSubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling JSONL appender; `Never` writes a single `<prefix>.jsonl`
fn file_appender(config: &FileConfig) -> Result<RollingFileAppender, LoggingError> {
    std::fs::create_dir_all(&config.directory)?;

    let rotation = match config.rotation {
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
        RotationStrategy::Never => Rotation::NEVER,
    };

    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("jsonl");
    if let Some(max_files) = config.max_files {
        builder = builder.max_log_files(max_files);
    }

    builder
        .build(&config.directory)
        .map_err(|e| LoggingError::Appender(e.to_string()))
}

/// Quiet logging for tests; later calls are no-ops
pub fn init_testing() {
    let _ = CinderSubscriberBuilder::new()
        .with_config(LogConfig::testing())
        .try_init();
}
