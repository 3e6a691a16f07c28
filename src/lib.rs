//! # Logroll
//!
//! An append-only file writer that rotates its backing file by size or by
//! calendar day, names archives predictably, and optionally gzips them in the
//! background.
//!
//! ## Features
//!
//! - Size and daily rotation, evaluated before each write
//! - Archive names with the timestamp as suffix (`app.log.2026-01-09`) or
//!   before the extension (`app.2026-01-09.log`)
//! - Background gzip compression of archives
//! - Integration with the `tracing` ecosystem (feature `subscriber`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::io::Write;
//! use logroll::{RotatingWriter, RotationConfig};
//!
//! let config = RotationConfig::new()
//!     .with_rotate_daily(true)
//!     .with_maximum_size(10 * 1024 * 1024)
//!     .with_compress(true);
//! let mut writer = RotatingWriter::new("/var/log/app/main.log", config)?;
//! writer.write_all(b"service started\n")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compress;
pub mod config;
pub mod error;
pub mod rotation;
pub mod writer;

#[cfg(feature = "subscriber")]
pub mod tracing_init;

pub use config::{FileLogConfig, LogConfig};
pub use error::{Error, Result};
pub use rotation::{DEFAULT_TIME_FORMAT, RotationConfig, RotationReason, make_dest_name};
pub use writer::RotatingWriter;

#[cfg(feature = "subscriber")]
pub use tracing_init::{init_logging, shutdown_logging};
