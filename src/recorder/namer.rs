//! Segment file naming.
//!
//! A file name is the configured pattern with `{device}` replaced by the
//! device id and `{date}` by the window-start formatted in UTC, followed by a
//! zero-padded sequence number before the extension. The sequence is bumped
//! when a name is already taken, so plain lexicographic order of a device's
//! files is their creation order:
//!
//! ```text
//! 20221028_101500_AWC1-0000.log
//! 20221028_101500_AWC1-0001.log
//! ```

use crate::device::DeviceId;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

const FALLBACK_DATE_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Digits of the sequence number in file names.
pub const SEQUENCE_WIDTH: usize = 4;

/// Sequence numbers available per window (`0000` to `9999`).
pub const MAX_SEQUENCE: u32 = 10_000;

/// Maps a device and window-start to a segment path.
pub trait SegmentNamer: Send + Sync {
    /// Path of the `sequence`-th candidate name for this window. Higher
    /// sequences are used when earlier candidates exist.
    fn segment_path(&self, device: &DeviceId, window_start: DateTime<Utc>, sequence: u32)
        -> PathBuf;
}

/// Window-start and sequence recovered from a segment file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ParsedName {
    /// Window-start, truncated to the date format's resolution
    pub window_start: DateTime<Utc>,
    /// Collision sequence, 0 for the first file of a window
    pub sequence: u32,
}

/// Pattern-based namer, e.g. `{date}_{device}.log` in a fixed folder.
#[derive(Debug, Clone)]
pub struct PatternNamer {
    folder: PathBuf,
    pattern: String,
    date_format: String,
}

impl PatternNamer {
    /// Namer writing into `folder`.
    pub fn new(
        folder: impl Into<PathBuf>,
        pattern: impl Into<String>,
        date_format: impl Into<String>,
    ) -> Self {
        Self {
            folder: folder.into(),
            pattern: pattern.into(),
            date_format: date_format.into(),
        }
    }

    /// Output folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// File name (without folder) for a window.
    pub fn file_name(&self, device: &DeviceId, window_start: DateTime<Utc>, sequence: u32) -> String {
        let (prefix, post) = self.split(device);
        let (stem_suffix, extension) = split_extension(&post);

        let mut name = prefix;
        name.push_str(&self.format_date(window_start));
        name.push_str(stem_suffix);
        let _ = write!(name, "-{:0width$}", sequence, width = SEQUENCE_WIDTH);
        name.push_str(extension);
        name
    }

    /// Recover the window-start and sequence from a file name produced for
    /// `device`. A name without a sequence reads as sequence 0. Returns `None`
    /// for unrelated files.
    pub fn parse(&self, device: &DeviceId, file_name: &str) -> Option<ParsedName> {
        let (prefix, post) = self.split(device);
        let (stem_suffix, extension) = split_extension(&post);
        let rest = file_name
            .strip_prefix(prefix.as_str())?
            .strip_suffix(extension)?;

        if let Some(window_start) = rest
            .strip_suffix(stem_suffix)
            .and_then(|date| self.parse_date(date))
        {
            return Some(ParsedName {
                window_start,
                sequence: 0,
            });
        }

        let (head, digits) = rest.rsplit_once('-')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let sequence = digits.parse().ok()?;
        let date = head.strip_suffix(stem_suffix)?;
        Some(ParsedName {
            window_start: self.parse_date(date)?,
            sequence,
        })
    }

    fn split(&self, device: &DeviceId) -> (String, String) {
        let expanded = self.pattern.replace("{device}", device.as_str());
        match expanded.split_once("{date}") {
            Some((pre, post)) => (pre.to_string(), post.to_string()),
            None => (expanded, String::new()),
        }
    }

    fn format_date(&self, window_start: DateTime<Utc>) -> String {
        let mut date = String::new();
        if write!(date, "{}", window_start.format(&self.date_format)).is_err() {
            date.clear();
            let _ = write!(date, "{}", window_start.format(FALLBACK_DATE_FORMAT));
        }
        date
    }

    fn parse_date(&self, date: &str) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(date, &self.date_format)
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(date, &self.date_format)
                    .ok()
                    .and_then(|day| day.and_hms_opt(0, 0, 0))
            })
            .map(|naive| naive.and_utc())
    }
}

impl SegmentNamer for PatternNamer {
    fn segment_path(
        &self,
        device: &DeviceId,
        window_start: DateTime<Utc>,
        sequence: u32,
    ) -> PathBuf {
        self.folder.join(self.file_name(device, window_start, sequence))
    }
}

/// Split `_AWC1.log` into (`_AWC1`, `.log`).
fn split_extension(post: &str) -> (&str, &str) {
    match post.rfind('.') {
        Some(idx) => post.split_at(idx),
        None => (post, ""),
    }
}
