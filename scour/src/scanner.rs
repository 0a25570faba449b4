//! Memory-mapped, binary-safe content scanning.
//!
//! A scanner is built once per run (the regex, when used, is compiled
//! before any tasks are submitted) and shared read-only by all workers.
//! Each scan owns its file handle and mapping and releases them on every
//! exit path.
//!
//! The substring modes are intentionally asymmetric: a case-sensitive scan
//! reports only the first match in a file, while a case-insensitive scan
//! re-reads the file line by line and reports every matching line. Folding
//! case over a shared mapping in place would require doubling memory, so
//! the insensitive path trades the single-match fast path for a full
//! per-line pass.

use memmap2::Mmap;
use regex::bytes::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::trace;

use crate::errors::{SearchError, SearchResult};
use crate::patterns::{find_bytes, looks_like_binary};
use crate::results::SearchMatch;

/// How file contents are matched.
#[derive(Debug)]
pub enum ScanMode {
    /// Exact byte substring; case folding per the scanner flag.
    Substring(String),
    /// Compiled regular expression, matched against the whole buffer.
    Regex(Regex),
    /// Presence check of the exact byte pattern; path-only result.
    RawBytes(Vec<u8>),
}

/// Scans file contents for one pattern in one mode.
#[derive(Debug)]
pub struct ContentScanner {
    mode: ScanMode,
    case_insensitive: bool,
}

impl ContentScanner {
    pub fn new(mode: ScanMode, case_insensitive: bool) -> Self {
        Self {
            mode,
            case_insensitive,
        }
    }

    /// Scans `path`, invoking `emit` for each match found.
    ///
    /// Binary files are skipped unless the mode is [`ScanMode::RawBytes`].
    /// A zero-length file yields no matches.
    pub fn scan_file<F>(&self, path: &Path, emit: F) -> SearchResult<()>
    where
        F: Fn(SearchMatch),
    {
        trace!("scanning {}", path.display());

        if !matches!(self.mode, ScanMode::RawBytes(_)) && looks_like_binary(path) {
            return Ok(());
        }

        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let len = file.metadata().map_err(|e| SearchError::from_io(path, e))?.len();
        if len == 0 {
            return Ok(());
        }
        let map = unsafe { Mmap::map(&file) }.map_err(SearchError::IoError)?;

        match &self.mode {
            ScanMode::Substring(pattern) => {
                if self.case_insensitive {
                    // The mapping stays unused here; the per-line pass
                    // re-reads the file as text.
                    drop(map);
                    self.scan_lines_case_insensitive(path, pattern, emit)?;
                } else if let Some(offset) = find_bytes(&map, pattern.as_bytes()) {
                    let (line, line_number) = extract_line(&map, offset);
                    emit(SearchMatch::content_match(
                        path.to_path_buf(),
                        line,
                        line_number,
                    ));
                }
            }
            ScanMode::Regex(re) => {
                if let Some(m) = re.find(&map) {
                    let (line, line_number) = extract_line(&map, m.start());
                    emit(SearchMatch::content_match(
                        path.to_path_buf(),
                        line,
                        line_number,
                    ));
                }
            }
            ScanMode::RawBytes(needle) => {
                if find_bytes(&map, needle).is_some() {
                    emit(SearchMatch::presence_match(path.to_path_buf()));
                }
            }
        }

        Ok(())
    }

    /// Reports every line containing the lower-cased pattern.
    fn scan_lines_case_insensitive<F>(
        &self,
        path: &Path,
        pattern: &str,
        emit: F,
    ) -> SearchResult<()>
    where
        F: Fn(SearchMatch),
    {
        let file = File::open(path).map_err(|e| SearchError::from_io(path, e))?;
        let mut reader = BufReader::new(file);
        let needle = pattern.to_lowercase();

        let mut buf = Vec::new();
        let mut line_number = 0usize;
        loop {
            buf.clear();
            let n = reader.read_until(b'\n', &mut buf).map_err(SearchError::IoError)?;
            if n == 0 {
                break;
            }
            line_number += 1;
            if buf.last() == Some(&b'\n') {
                buf.pop();
            }
            let line = String::from_utf8_lossy(&buf);
            if line.to_lowercase().contains(&needle) {
                emit(SearchMatch::content_match(
                    path.to_path_buf(),
                    line.into_owned(),
                    line_number,
                ));
            }
        }
        Ok(())
    }
}

/// Reconstructs the line enclosing `offset` and its 1-based line number.
fn extract_line(data: &[u8], offset: usize) -> (String, usize) {
    let start = data[..offset]
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |p| p + 1);
    let end = data[offset..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |p| offset + p);
    let line = String::from_utf8_lossy(&data[start..end]).into_owned();
    let line_number = 1 + data[..start].iter().filter(|&&b| b == b'\n').count();
    (line, line_number)
}
