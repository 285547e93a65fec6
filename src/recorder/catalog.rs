//! Listing recorded segments.
//!
//! Readers of the output folder rely on two properties: every file starts with
//! the header, and a device's files sort by window-start. This module recovers
//! that order from file names using the same pattern that produced them.

use super::namer::PatternNamer;
use crate::device::DeviceId;
use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;

/// A segment file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Full path of the file
    pub path: PathBuf,
    /// Window-start decoded from the file name
    pub window_start: DateTime<Utc>,
    /// Collision sequence decoded from the file name
    pub sequence: u32,
}

/// All segments of `device` in the namer's folder, oldest first.
///
/// A missing folder yields an empty list.
pub fn list_segments(namer: &PatternNamer, device: &DeviceId) -> io::Result<Vec<SegmentEntry>> {
    let entries = match std::fs::read_dir(namer.folder()) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut segments = Vec::new();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(parsed) = namer.parse(device, name) {
            segments.push(SegmentEntry {
                path: entry.path(),
                window_start: parsed.window_start,
                sequence: parsed.sequence,
            });
        }
    }

    segments.sort_by(|a, b| {
        (a.window_start, a.sequence)
            .cmp(&(b.window_start, b.sequence))
            .then_with(|| a.path.cmp(&b.path))
    });
    Ok(segments)
}

/// Most recent segment of `device`, if any.
pub fn latest_segment(namer: &PatternNamer, device: &DeviceId) -> io::Result<Option<SegmentEntry>> {
    Ok(list_segments(namer, device)?.pop())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_lists_in_window_order() {
        let dir = tempfile::tempdir().unwrap();
        let namer = PatternNamer::new(dir.path(), "{date}_{device}.log", "%Y%m%d_%H%M%S");
        let device = DeviceId::new("AWC1");
        let t0 = Utc.with_ymd_and_hms(2022, 10, 28, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2022, 10, 28, 11, 0, 0).unwrap();

        for (start, seq) in [(t1, 0), (t0, 1), (t0, 0)] {
            std::fs::write(namer.folder().join(namer.file_name(&device, start, seq)), "h\n").unwrap();
        }
        std::fs::write(dir.path().join("20221028_100000_AWC2.log"), "h\n").unwrap();
        std::fs::write(dir.path().join("README"), "x").unwrap();

        let listed = list_segments(&namer, &device).unwrap();
        let order: Vec<_> = listed.iter().map(|s| (s.window_start, s.sequence)).collect();
        assert_eq!(order, vec![(t0, 0), (t0, 1), (t1, 0)]);

        let latest = latest_segment(&namer, &device).unwrap().unwrap();
        assert_eq!(latest.window_start, t1);
    }

    #[test]
    fn test_missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let namer = PatternNamer::new(dir.path().join("absent"), "{date}_{device}.log", "%Y%m%d");
        assert!(list_segments(&namer, &DeviceId::new("AWC1")).unwrap().is_empty());
    }
}
