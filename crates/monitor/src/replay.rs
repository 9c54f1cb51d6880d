//! Landmark recording playback
//!
//! Stands in for the live landmark provider: one JSON [`LandmarkFrame`]
//! per line, e.g. `{"width":640,"height":480,"face":[[0.41,0.37], ...]}`.
//! Blank lines are skipped; a frame without `face` means no face.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use dms::{DmsError, LandmarkFrame, LandmarkSource};
use tracing::info;

/// Reads landmark frames from newline-delimited JSON
pub struct ReplaySource<R> {
    lines: Lines<R>,
    line_no: usize,
}

impl ReplaySource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, DmsError> {
        let file = File::open(path)
            .map_err(|e| DmsError::Source(format!("{}: {}", path.display(), e)))?;
        info!("Replaying landmarks from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> ReplaySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> LandmarkSource for ReplaySource<R> {
    fn next_frame(&mut self) -> Result<Option<LandmarkFrame>, DmsError> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.map_err(|e| DmsError::Source(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            return serde_json::from_str(&line)
                .map(Some)
                .map_err(|e| DmsError::Source(format!("line {}: {}", self.line_no, e)));
        }
        Ok(None)
    }
}
