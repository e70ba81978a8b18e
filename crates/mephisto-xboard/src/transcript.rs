//! Append-only log of the GUI exchange.
//!
//! Each line carries a wall-clock prefix so a session can be replayed
//! against the GUI's own log. Lines are flushed as they are written.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%d %b %Y %X - ";

pub struct Transcript {
    sink: Box<dyn Write + Send>,
    path: Option<PathBuf>,
}

impl Transcript {
    /// Open (or append to) `log_<driver>.txt` inside `dir`.
    pub fn open(dir: &Path, driver: &str) -> io::Result<Self> {
        let path = dir.join(format!("log_{driver}.txt"));
        let file: File = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("Transcript: {}", path.display());
        Ok(Self {
            sink: Box::new(file),
            path: Some(path),
        })
    }

    /// Transcript over an arbitrary sink.
    pub fn from_writer(sink: Box<dyn Write + Send>) -> Self {
        Self { sink, path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record_input(&mut self, line: &str) {
        self.write_line(&format!("GUI    Input : {line}"));
    }

    pub fn record_output(&mut self, line: &str) {
        self.write_line(&format!("Engine Output: {line}"));
    }

    pub fn note(&mut self, message: &str) {
        self.write_line(message);
    }

    fn write_line(&mut self, text: &str) {
        let stamp = Local::now().format(TIMESTAMP_FORMAT);
        let result = writeln!(self.sink, "{stamp}{text}").and_then(|()| self.sink.flush());
        if let Err(e) = result {
            // Losing the transcript must not end the session.
            log::warn!("Transcript write failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xboard::SharedBuffer;

    #[test]
    fn test_lines_are_prefixed_and_tagged() {
        let buffer = SharedBuffer::new();
        let mut transcript = Transcript::from_writer(Box::new(buffer.clone()));
        transcript.record_input("new");
        transcript.record_output("move e2e4");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - GUI    Input : new"), "{}", lines[0]);
        assert!(lines[1].ends_with(" - Engine Output: move e2e4"), "{}", lines[1]);
        // "16 Oct 2026 12:00:00 - " has the year in the third field.
        let fields: Vec<&str> = lines[0].split_whitespace().collect();
        assert_eq!(fields[2].len(), 4);
        assert_eq!(fields[4], "-");
    }

    #[test]
    fn test_open_appends_to_driver_file() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut t = Transcript::open(dir.path(), "mm50").unwrap();
            t.note("first");
        }
        {
            let mut t = Transcript::open(dir.path(), "mm50").unwrap();
            assert_eq!(t.path(), Some(dir.path().join("log_mm50.txt").as_path()));
            t.note("second");
        }
        let text = std::fs::read_to_string(dir.path().join("log_mm50.txt")).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("first") && text.contains("second"));
    }
}
