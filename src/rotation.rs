use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize, de};
use time::{OffsetDateTime, Time, format_description};

use crate::{Error, Result};

/// Timestamp format used for archive names when `time_format` is empty.
///
/// Day granularity, lexically sortable: `2026-01-09`.
pub const DEFAULT_TIME_FORMAT: &str = "[year]-[month]-[day]";

/// Parse a size string with an optional unit (K/M/G, case-insensitive). A bare number is bytes.
fn parse_size(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim();
    let Some(last) = s.chars().last() else {
        return Err("empty size string".to_string());
    };

    let (num_str, multiplier) = if last.is_ascii_alphabetic() {
        let multiplier = match last.to_ascii_uppercase() {
            'K' => 1024,
            'M' => 1024 * 1024,
            'G' => 1024 * 1024 * 1024,
            unit => return Err(format!("invalid unit: {}, supported: K/M/G", unit)),
        };
        (s[..s.len() - 1].trim_end(), multiplier)
    } else {
        (s, 1)
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number: {}", num_str))?;

    num.checked_mul(multiplier)
        .ok_or_else(|| "size too large".to_string())
}

/// Size value that can be a number of bytes or a string with units.
#[derive(Deserialize)]
#[serde(untagged)]
enum SizeValue {
    Number(u64),
    String(String),
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match SizeValue::deserialize(deserializer)? {
        SizeValue::Number(n) => Ok(n),
        SizeValue::String(s) => parse_size(&s).map_err(de::Error::custom),
    }
}

/// When and how a [`RotatingWriter`](crate::RotatingWriter) archives its file.
///
/// The zero value never rotates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rotate when the calendar day changes.
    pub rotate_daily: bool,
    /// Rotate once the file holds at least this many bytes. 0 disables size rotation.
    ///
    /// Config files may give a number of bytes or a string with a unit: `"512K"`, `"10M"`, `"1g"`.
    #[serde(deserialize_with = "deserialize_size")]
    pub maximum_size: u64,
    /// `time` format description for the archive timestamp. Empty means [`DEFAULT_TIME_FORMAT`].
    pub time_format: String,
    /// Place the timestamp before the extension (`app.2026-01-09.log`) instead of
    /// after the whole name (`app.log.2026-01-09`).
    pub time_format_as_prefix: bool,
    /// Gzip each archive in the background and remove the uncompressed copy.
    pub compress: bool,
}

impl RotationConfig {
    /// Create a configuration that never rotates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable daily rotation.
    pub fn with_rotate_daily(mut self, rotate_daily: bool) -> Self {
        self.rotate_daily = rotate_daily;
        self
    }

    /// Set the size threshold in bytes.
    pub fn with_maximum_size(mut self, maximum_size: u64) -> Self {
        self.maximum_size = maximum_size;
        self
    }

    /// Set the archive timestamp format.
    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }

    /// Insert the timestamp before the extension.
    pub fn with_time_format_as_prefix(mut self, as_prefix: bool) -> Self {
        self.time_format_as_prefix = as_prefix;
        self
    }

    /// Enable or disable gzip compression of archives.
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// The format description actually used for archive names.
    pub fn effective_time_format(&self) -> &str {
        if self.time_format.is_empty() {
            DEFAULT_TIME_FORMAT
        } else {
            &self.time_format
        }
    }

    /// Whether any rotation trigger is configured.
    pub fn is_enabled(&self) -> bool {
        self.rotate_daily || self.maximum_size > 0
    }

    /// Check that the time format parses and renders to a single path component.
    pub fn validate(&self) -> Result<()> {
        let fmt = self.effective_time_format();
        let items = format_description::parse(fmt)
            .map_err(|e| Error::Config(format!("invalid time_format {:?}: {}", fmt, e)))?;
        let sample = OffsetDateTime::UNIX_EPOCH
            .format(&items)
            .map_err(time::error::Error::from)?;
        if sample.is_empty() || sample.contains(['/', '\\']) {
            return Err(Error::Config(format!(
                "time_format {:?} must render to a non-empty file name component",
                fmt
            )));
        }
        Ok(())
    }

    /// Decide whether the file must be rotated before the next append.
    ///
    /// Daily rotation wins when both triggers fire; either way the caller rotates once.
    pub fn rotation_due(
        &self,
        current_size: u64,
        last_mod: OffsetDateTime,
        now: OffsetDateTime,
    ) -> Option<RotationReason> {
        // Calendar dates, each in its own offset: a UTC offset change (daylight
        // saving) must neither start a new day early nor delay midnight.
        if self.rotate_daily && now.date() > last_mod.date() {
            Some(RotationReason::Daily)
        } else if self.maximum_size > 0 && current_size >= self.maximum_size {
            Some(RotationReason::Size)
        } else {
            None
        }
    }
}

/// Why a rotation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationReason {
    /// The calendar day changed since the file was opened.
    Daily,
    /// The file reached `maximum_size`.
    Size,
    /// The caller asked for it.
    Forced,
}

impl RotationReason {
    /// The timestamp the archive is named after.
    ///
    /// A daily rotation archives the day that just ended, so it uses the old anchor.
    pub fn archive_timestamp(
        self,
        last_mod: OffsetDateTime,
        now: OffsetDateTime,
    ) -> OffsetDateTime {
        match self {
            Self::Daily => last_mod,
            Self::Size | Self::Forced => midnight(now),
        }
    }

    /// Short name used in log fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Size => "size",
            Self::Forced => "forced",
        }
    }
}

/// Current wall-clock time, local when the offset can be determined.
pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Truncate a timestamp to the start of its calendar day.
pub fn midnight(timestamp: OffsetDateTime) -> OffsetDateTime {
    timestamp.replace_time(Time::MIDNIGHT)
}

fn render_timestamp(timestamp: OffsetDateTime, fmt: &str) -> String {
    format_description::parse(fmt)
        .ok()
        .and_then(|items| timestamp.format(&items).ok())
        .unwrap_or_else(|| {
            // Only reachable with a config that failed validate().
            let date = timestamp.date();
            format!(
                "{:04}-{:02}-{:02}",
                date.year(),
                u8::from(date.month()),
                date.day()
            )
        })
}

/// Compute the archive name for `path` rotated at `timestamp`.
///
/// - `/var/log/main.log` -> `/var/log/main.log.2026-01-09`
/// - with `time_format_as_prefix`: `/var/log/main.2026-01-09.log`
///
/// Pure: touches no files and cannot fail.
pub fn make_dest_name(path: &Path, timestamp: OffsetDateTime, config: &RotationConfig) -> PathBuf {
    let stamp = render_timestamp(timestamp, config.effective_time_format());

    if !config.time_format_as_prefix {
        let mut name = path.as_os_str().to_os_string();
        name.push(".");
        name.push(&stamp);
        return PathBuf::from(name);
    }

    let mut name = OsString::from(path.file_stem().unwrap_or_default());
    name.push(".");
    name.push(&stamp);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}
