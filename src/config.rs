use serde::{Deserialize, Serialize};

use crate::RotationConfig;

/// Configuration for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Enable console logging
    #[serde(default)]
    pub console: bool,
    /// Log level or filter directive (e.g., "info", "debug,hyper=warn")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Rotating file output
    #[serde(default)]
    pub file: Option<FileLogConfig>,
}

impl LogConfig {
    /// Create a new LogConfig with defaults
    pub fn new() -> Self {
        Self {
            console: false,
            level: default_log_level(),
            file: None,
        }
    }

    /// Enable console logging
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    /// Set log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set file logging configuration
    pub fn with_file(mut self, file: FileLogConfig) -> Self {
        self.file = Some(file);
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where the log file lives and how it rotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLogConfig {
    /// Path of the live log file
    pub path: std::path::PathBuf,
    #[serde(default)]
    pub rotation: RotationConfig,
}

impl FileLogConfig {
    pub fn new<P: Into<std::path::PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            rotation: RotationConfig::default(),
        }
    }

    /// Set rotation behaviour
    pub fn with_rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = rotation;
        self
    }
}
