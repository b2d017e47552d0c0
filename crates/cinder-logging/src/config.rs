//! Logging settings
//!
//! Deserializes from the `[log]` table of the server config; every field has
//! a default so a partial table is enough.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Targets that are chatty at `debug` and rarely useful when tracing pastes
const DEPENDENCY_TARGETS: &[&str] = &["hyper", "h2", "tower", "redb"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Base filter directive, e.g. `info` or `info,cinder_paste=debug`.
    /// `RUST_LOG` replaces it entirely when set.
    pub level: String,

    /// Cap HTTP and database internals at `warn`
    pub quiet_dependencies: bool,

    pub console: ConsoleConfig,

    /// Rolling JSONL files, off unless configured
    pub file: Option<FileConfig>,

    pub jsonl: JsonlConfig,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            quiet_dependencies: true,
            console: ConsoleConfig::default(),
            file: None,
            jsonl: JsonlConfig::default(),
        }
    }
}

impl LogConfig {
    /// Colored human-readable console at `debug`
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            console: ConsoleConfig {
                enabled: true,
                format: ConsoleFormat::Pretty,
                ansi: true,
            },
            ..Self::default()
        }
    }

    /// Daily JSONL files under `log_dir`, a month kept, console off
    pub fn production(log_dir: PathBuf) -> Self {
        Self {
            console: ConsoleConfig {
                enabled: false,
                ..ConsoleConfig::default()
            },
            file: Some(FileConfig {
                directory: log_dir,
                max_files: Some(30),
                ..FileConfig::default()
            }),
            ..Self::default()
        }
    }

    /// Warnings only, compact, so test output stays readable
    pub fn testing() -> Self {
        Self {
            level: "warn".to_string(),
            console: ConsoleConfig {
                enabled: true,
                format: ConsoleFormat::Compact,
                ansi: false,
            },
            ..Self::default()
        }
    }

    /// Filter string handed to `EnvFilter` when `RUST_LOG` is unset
    pub fn filter_directives(&self) -> String {
        let mut directives = self.level.clone();
        if self.quiet_dependencies {
            for target in DEPENDENCY_TARGETS {
                directives.push_str(&format!(",{}=warn", target));
            }
        }
        directives
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub format: ConsoleFormat,
    /// Color escapes; ignored by the JSON format
    pub ansi: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ConsoleFormat::Json,
            ansi: false,
        }
    }
}

/// Shape of console lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleFormat {
    /// One JSON object per line
    #[default]
    Json,
    /// Multi-line, for a developer's terminal
    Pretty,
    /// Single-line text
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub directory: PathBuf,
    /// Files are named `<prefix>.<date>.jsonl`, or `<prefix>.jsonl` without rotation
    pub prefix: String,
    pub rotation: RotationStrategy,
    /// Oldest files beyond this count are deleted on rotation
    pub max_files: Option<usize>,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            prefix: "cinder".to_string(),
            rotation: RotationStrategy::Daily,
            max_files: Some(7),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Fields included in each JSON line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonlConfig {
    /// Put event fields at the top level instead of under `fields`
    pub flatten_events: bool,
    /// Attach the list of entered spans, e.g. the `paste_id` of a read
    pub include_spans: bool,
    pub include_location: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            flatten_events: true,
            include_spans: true,
            include_location: false,
        }
    }
}
