//! One rotated output file.

use crate::error::{AppResult, LoggerError};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// An open, append-only segment file whose first line is the header.
///
/// Created with create-new semantics, so an existing file is never reopened.
/// Dropping or closing the segment ends it for good.
#[derive(Debug)]
pub struct LogSegment {
    path: PathBuf,
    window_start: DateTime<Utc>,
    header: String,
    writer: BufWriter<File>,
    data_lines: u64,
}

impl LogSegment {
    /// Create `path` and write `header` as its first line.
    ///
    /// Fails with `io::ErrorKind::AlreadyExists` when the file exists.
    pub fn create(path: &Path, window_start: DateTime<Utc>, header: &str) -> io::Result<Self> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let mut segment = Self {
            path: path.to_path_buf(),
            window_start,
            header: header.to_string(),
            writer: BufWriter::new(file),
            data_lines: 0,
        };
        segment.put(header)?;
        Ok(segment)
    }

    /// Append one data line and flush it to the file.
    pub fn write_line(&mut self, line: &str) -> AppResult<()> {
        self.put(line).map_err(|source| LoggerError::Segment {
            path: self.path.clone(),
            source,
        })?;
        self.data_lines += 1;
        Ok(())
    }

    /// Flush and close the file.
    pub fn close(mut self) -> AppResult<()> {
        self.writer.flush().map_err(|source| LoggerError::Segment {
            path: self.path.clone(),
            source,
        })
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start of the window this segment covers.
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// Header written as the first line.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Number of data lines written after the header.
    pub fn data_lines(&self) -> u64 {
        self.data_lines
    }

    fn put(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_is_first_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg.log");
        let mut segment = LogSegment::create(&path, Utc::now(), "Timestamp_UTC; P[W]").unwrap();
        segment.write_line("28.10.2022 10:00:00; 1200").unwrap();
        assert_eq!(segment.data_lines(), 1);
        segment.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Timestamp_UTC; P[W]\n28.10.2022 10:00:00; 1200\n");
    }

    #[test]
    fn test_existing_file_is_never_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seg.log");
        std::fs::write(&path, "old\n").unwrap();

        let err = LogSegment::create(&path, Utc::now(), "header").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old\n");
    }
}
