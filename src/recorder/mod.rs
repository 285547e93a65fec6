//! Rotating, header-tagged segment writer
//!
//! The recorder maps an unbounded line stream onto a sequence of segment
//! files, one device at a time:
//!
//! ```text
//!   header ──► start_segment ──► [header]               (new file)
//!   line   ──► record ──┬──────► [header, .., line]     (before boundary)
//!                       └─ due ► close, open, [header, line]
//! ```
//!
//! Rotation is decided lazily, on each incoming line, by comparing the clock
//! with `window_start + interval`. A segment therefore always covers at least
//! one full interval and may cover more when the device is quiet around the
//! boundary.
//!
//! The pieces are composed rather than inherited:
//! - [`RotationPolicy`] computes window-starts and boundaries
//! - [`SegmentNamer`] turns (device, window-start) into a path
//! - [`Clock`] provides the wall-clock time

pub mod catalog;
pub mod clock;
pub mod namer;
pub mod policy;
pub mod segment;

pub use catalog::{latest_segment, list_segments, SegmentEntry};
pub use clock::{Clock, ManualClock, SystemClock};
pub use namer::{ParsedName, PatternNamer, SegmentNamer, MAX_SEQUENCE};
pub use policy::{RotationPolicy, RotationUnit, WindowAlignment};
pub use segment::LogSegment;

use crate::config::Settings;
use crate::device::DeviceId;
use crate::error::{AppResult, LoggerError};
use chrono::{DateTime, Utc};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Writes one device's lines into time-rotated segments.
pub struct RotatingRecorder {
    device: DeviceId,
    policy: RotationPolicy,
    namer: Box<dyn SegmentNamer>,
    clock: Arc<dyn Clock>,
    current: Option<LogSegment>,
    last_window_start: Option<DateTime<Utc>>,
    segments_opened: u64,
}

impl RotatingRecorder {
    /// Create a recorder. No file is opened until the first header arrives.
    pub fn new(
        device: DeviceId,
        policy: RotationPolicy,
        namer: impl SegmentNamer + 'static,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            device,
            policy,
            namer: Box::new(namer),
            clock,
            current: None,
            last_window_start: None,
            segments_opened: 0,
        }
    }

    /// Recorder using the storage and rotation settings.
    pub fn from_settings(device: DeviceId, settings: &Settings, clock: Arc<dyn Clock>) -> Self {
        Self::new(device, settings.rotation, settings.namer(), clock)
    }

    /// Close any open segment and open a new one headed by `header`.
    ///
    /// Called when a (re)connection delivers a header. Returns the new path.
    pub fn start_segment(&mut self, header: &str) -> AppResult<PathBuf> {
        let now = self.clock.now();
        self.roll(now, header.to_string())
    }

    /// Append a data line, rotating first when the window has elapsed.
    pub fn record(&mut self, line: &str) -> AppResult<()> {
        let now = self.clock.now();
        let rotation = match &self.current {
            Some(segment) if self.policy.is_due(segment.window_start(), now) => {
                Some(segment.header().to_string())
            }
            Some(_) => None,
            None => return Err(LoggerError::NoOpenSegment(self.device.to_string())),
        };
        if let Some(header) = rotation {
            self.roll(now, header)?;
        }

        match self.current.as_mut() {
            Some(segment) => segment.write_line(line),
            None => Err(LoggerError::NoOpenSegment(self.device.to_string())),
        }
    }

    /// Flush and close the open segment, if any.
    pub fn close(&mut self) -> AppResult<()> {
        if let Some(segment) = self.current.take() {
            debug!(
                device = %self.device,
                path = %segment.path().display(),
                lines = segment.data_lines(),
                "Segment closed"
            );
            segment.close()?;
        }
        Ok(())
    }

    /// The segment currently receiving lines.
    pub fn current(&self) -> Option<&LogSegment> {
        self.current.as_ref()
    }

    /// Header of the current segment.
    pub fn header(&self) -> Option<&str> {
        self.current.as_ref().map(LogSegment::header)
    }

    /// Number of segments opened so far.
    pub fn segments_opened(&self) -> u64 {
        self.segments_opened
    }

    /// Device this recorder writes for.
    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    fn roll(&mut self, now: DateTime<Utc>, header: String) -> AppResult<PathBuf> {
        self.close()?;

        // Window-starts never move backwards, even if the wall clock does.
        let mut window_start = self.policy.window_start(now);
        if let Some(last) = self.last_window_start {
            window_start = window_start.max(last);
        }

        let segment = self.open_segment(window_start, &header)?;
        let path = segment.path().to_path_buf();
        info!(device = %self.device, path = %path.display(), "New segment created");

        self.last_window_start = Some(window_start);
        self.current = Some(segment);
        self.segments_opened += 1;
        Ok(path)
    }

    fn open_segment(&self, window_start: DateTime<Utc>, header: &str) -> AppResult<LogSegment> {
        let mut last_path = PathBuf::new();
        for sequence in 0..MAX_SEQUENCE {
            let path = self.namer.segment_path(&self.device, window_start, sequence);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|source| LoggerError::Segment {
                    path: path.clone(),
                    source,
                })?;
            }
            match LogSegment::create(&path, window_start, header) {
                Ok(segment) => return Ok(segment),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(device = %self.device, path = %path.display(), "Segment name taken");
                    last_path = path;
                }
                Err(source) => return Err(LoggerError::Segment { path, source }),
            }
        }
        Err(LoggerError::Segment {
            path: last_path,
            source: io::Error::new(
                io::ErrorKind::AlreadyExists,
                "no free segment name for this window",
            ),
        })
    }
}

impl Drop for RotatingRecorder {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::path::Path;

    const HEADER: &str = "Timestamp_UTC; P[W]; Q[VAr]";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 10, 28, 10, 0, 0).unwrap()
    }

    fn recorder(dir: &Path, policy: RotationPolicy, clock: &ManualClock) -> RotatingRecorder {
        RotatingRecorder::new(
            DeviceId::new("AWC1"),
            policy,
            PatternNamer::new(dir, "{date}_{device}.log", "%Y%m%d_%H%M%S"),
            Arc::new(clock.clone()),
        )
    }

    fn lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_record_without_header_fails() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::default(), &clock);
        assert!(matches!(rec.record("x"), Err(LoggerError::NoOpenSegment(_))));
    }

    #[test]
    fn test_boundary_splits_lines_without_loss() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::new(RotationUnit::Seconds, 20), &clock);

        let first = rec.start_segment(HEADER).unwrap();
        for line in ["L1", "L2", "L3"] {
            clock.advance(TimeDelta::seconds(5));
            rec.record(line).unwrap();
        }
        clock.advance(TimeDelta::seconds(6)); // 21 s after window-start
        rec.record("L4").unwrap();
        rec.record("L5").unwrap();
        let second = rec.current().unwrap().path().to_path_buf();
        rec.close().unwrap();

        assert_ne!(first, second);
        assert_eq!(lines(&first), vec![HEADER, "L1", "L2", "L3"]);
        assert_eq!(lines(&second), vec![HEADER, "L4", "L5"]);
        assert_eq!(rec.segments_opened(), 2);
    }

    #[test]
    fn test_never_rotates_before_interval() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::new(RotationUnit::Minutes, 1), &clock);
        rec.start_segment(HEADER).unwrap();

        for _ in 0..59 {
            clock.advance(TimeDelta::seconds(1));
            rec.record("data").unwrap();
        }
        assert_eq!(rec.segments_opened(), 1);

        clock.advance(TimeDelta::seconds(1));
        rec.record("data").unwrap();
        assert_eq!(rec.segments_opened(), 2);
        assert_eq!(rec.current().unwrap().window_start(), t0() + TimeDelta::seconds(60));
    }

    #[test]
    fn test_quiet_period_extends_segment() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::new(RotationUnit::Seconds, 20), &clock);
        let first = rec.start_segment(HEADER).unwrap();

        // Nothing arrives for five windows; a single rotation happens on the next line.
        clock.advance(TimeDelta::seconds(100));
        rec.record("late").unwrap();
        assert_eq!(rec.segments_opened(), 2);
        assert_eq!(lines(&first), vec![HEADER]);
    }

    #[test]
    fn test_new_header_starts_new_segment() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::default(), &clock);

        let first = rec.start_segment("A;B").unwrap();
        rec.record("1;2").unwrap();
        clock.advance(TimeDelta::seconds(3));
        let second = rec.start_segment("A;B;C").unwrap();
        rec.record("1;2;3").unwrap();
        clock.advance(TimeDelta::hours(2));
        rec.record("4;5;6").unwrap();
        let third = rec.current().unwrap().path().to_path_buf();

        assert_eq!(lines(&first), vec!["A;B", "1;2"]);
        assert_eq!(lines(&second), vec!["A;B;C", "1;2;3"]);
        assert_eq!(lines(&third), vec!["A;B;C", "4;5;6"]);
    }

    #[test]
    fn test_same_second_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::default(), &clock);

        let a = rec.start_segment(HEADER).unwrap();
        let b = rec.start_segment(HEADER).unwrap();
        let c = rec.start_segment(HEADER).unwrap();
        assert_eq!(a.file_name().unwrap(), "20221028_100000_AWC1-0000.log");
        assert_eq!(b.file_name().unwrap(), "20221028_100000_AWC1-0001.log");
        assert_eq!(c.file_name().unwrap(), "20221028_100000_AWC1-0002.log");
    }

    #[test]
    fn test_sorted_file_names_follow_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::default(), &clock);

        // Header-then-EOF reconnects within one second of each other
        let mut created: Vec<String> = (0..12)
            .map(|_| rec.start_segment(HEADER).unwrap())
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        clock.advance(TimeDelta::seconds(1));
        let next = rec.start_segment(HEADER).unwrap();
        created.push(next.file_name().unwrap().to_string_lossy().into_owned());

        let mut on_disk: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        on_disk.sort();
        assert_eq!(on_disk, created);
    }

    #[test]
    fn test_files_from_earlier_runs_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("20221028_100000_AWC1-0000.log");
        std::fs::write(&existing, "previous run\n").unwrap();

        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::default(), &clock);
        let path = rec.start_segment(HEADER).unwrap();

        assert_ne!(path, existing);
        assert_eq!(lines(&existing), vec!["previous run"]);
    }

    #[test]
    fn test_window_start_never_decreases() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0());
        let mut rec = recorder(dir.path(), RotationPolicy::new(RotationUnit::Seconds, 10), &clock);
        rec.start_segment(HEADER).unwrap();

        clock.set(t0() - TimeDelta::minutes(5));
        rec.start_segment(HEADER).unwrap();
        assert_eq!(rec.current().unwrap().window_start(), t0());

        let listed = list_segments(
            &PatternNamer::new(dir.path(), "{date}_{device}.log", "%Y%m%d_%H%M%S"),
            &DeviceId::new("AWC1"),
        )
        .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.windows(2).all(|w| w[0].window_start <= w[1].window_start));
    }

    #[test]
    fn test_aligned_windows_in_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new(t0() + TimeDelta::seconds(1_234));
        let mut rec = recorder(
            dir.path(),
            RotationPolicy::new(RotationUnit::Minutes, 15).aligned(),
            &clock,
        );
        let path = rec.start_segment(HEADER).unwrap();
        assert_eq!(path.file_name().unwrap(), "20221028_101500_AWC1-0000.log");

        clock.set(t0() + TimeDelta::minutes(30));
        rec.record("x").unwrap();
        assert_eq!(
            rec.current().unwrap().path().file_name().unwrap(),
            "20221028_103000_AWC1-0000.log"
        );
    }

    #[test]
    fn test_creates_output_folder() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("captures").join("awc");
        let clock = ManualClock::new(t0());
        let mut rec = recorder(&nested, RotationPolicy::default(), &clock);
        let path = rec.start_segment(HEADER).unwrap();
        assert!(path.starts_with(&nested));
        assert!(path.exists());
    }
}
