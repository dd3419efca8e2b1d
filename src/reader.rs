use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use log::{debug, warn};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::HitError;
use crate::hit::{HitRecord, ParseOptions};

/// Open a hit file, decompressing `.gz`/`.bgz` inputs
pub fn open_hit_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    // Check by file extension (faster than reading magic bytes)
    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz" || ext == "bgz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// One non-blank input line
#[derive(Debug, Clone, PartialEq)]
pub enum HitLine {
    /// `#` comment or header, passed through verbatim
    Header(String),
    /// A parsed record and its input line without the line terminator
    Record { record: HitRecord, raw: String },
}

/// Streaming reader that skips malformed lines instead of failing
pub struct HitReader<R: BufRead> {
    reader: R,
    opts: ParseOptions,
    line_no: usize,
    diagnostics: Vec<HitError>,
}

impl<R: BufRead> HitReader<R> {
    pub fn new(reader: R, opts: ParseOptions) -> Self {
        HitReader {
            reader,
            opts,
            line_no: 0,
            diagnostics: Vec::new(),
        }
    }

    /// Next header or valid record; `None` at end of input
    ///
    /// Only I/O failures are returned as errors. Unparseable lines,
    /// including lines that are not valid UTF-8, are recorded as
    /// diagnostics and skipped.
    pub fn read_line(&mut self) -> Result<Option<HitLine>> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    let e = HitError::parse(self.line_no, format!("invalid UTF-8: {e}"));
                    warn!("Skipping malformed hit record: {e}");
                    self.diagnostics.push(e);
                    continue;
                }
            };

            let trimmed = line.trim_end_matches(&['\n', '\r'][..]);
            if trimmed.starts_with('#') {
                return Ok(Some(HitLine::Header(trimmed.to_string())));
            }
            if trimmed.trim().is_empty() {
                continue;
            }

            match HitRecord::parse_line(trimmed, self.line_no, &self.opts) {
                Ok(record) => {
                    return Ok(Some(HitLine::Record {
                        record,
                        raw: trimmed.to_string(),
                    }))
                }
                Err(e) => {
                    warn!("Skipping malformed hit record: {e}");
                    self.diagnostics.push(e);
                }
            }
        }
    }

    /// Diagnostics gathered so far
    pub fn diagnostics(&self) -> &[HitError] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<HitError> {
        self.diagnostics
    }
}

/// A fully decoded hit file
#[derive(Debug, Clone, Default)]
pub struct HitFile {
    pub headers: Vec<String>,
    pub hits: Vec<HitRecord>,
    /// Input line of each hit, parallel to `hits`
    pub lines: Vec<String>,
    pub diagnostics: Vec<HitError>,
}

impl HitFile {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Decode every line of a reader
pub fn read_hits<R: BufRead>(reader: R, opts: ParseOptions) -> Result<HitFile> {
    let mut reader = HitReader::new(reader, opts);
    let mut file = HitFile::default();

    while let Some(line) = reader.read_line()? {
        match line {
            HitLine::Header(h) => file.headers.push(h),
            HitLine::Record { record, raw } => {
                file.hits.push(record);
                file.lines.push(raw);
            }
        }
    }
    file.diagnostics = reader.into_diagnostics();

    debug!(
        "Read {} hit records, {} header lines, {} skipped",
        file.hits.len(),
        file.headers.len(),
        file.diagnostics.len()
    );
    Ok(file)
}

/// Read hits from a file (auto-detects gzip compression)
pub fn read_hit_file<P: AsRef<Path>>(path: P, opts: ParseOptions) -> Result<HitFile> {
    let path = path.as_ref();
    let input = open_hit_input(path)?;
    read_hits(input, opts).with_context(|| format!("Failed to read {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_bad_lines_do_not_stop_the_stream() {
        let text = "# LAST version 1060\n\
                    500\tchr1\t100\t50\t+\t1000\tctgA\t0\t50\t+\t50\t50\n\
                    garbage line\n\
                    \n\
                    300\tchr2\t0\t20\t+\t1000\tctgA\t10\t20\t+\t50\t20\n\
                    300\tchr2\t0\t20\t+\t1000\tctgA\tten\t20\t+\t50\t20\n";
        let file = read_hits(Cursor::new(text), ParseOptions::default()).unwrap();

        assert_eq!(file.headers, vec!["# LAST version 1060"]);
        assert_eq!(file.hits.len(), 2);
        assert_eq!(file.diagnostics.len(), 2);
        assert!(matches!(file.diagnostics[0], HitError::Parse { line: 3, .. }));
        assert!(matches!(file.diagnostics[1], HitError::Parse { line: 6, .. }));
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut bytes = b"500\tchr1\t100\t50\t+\t1000\tctgA\t0\t50\t+\t50\t50\n".to_vec();
        bytes.extend_from_slice(b"400\tchr\xff\t0\t20\t+\t1000\tctgA\t10\t20\t+\t50\t20\n");
        bytes.extend_from_slice(b"300\tchr2\t0\t20\t+\t1000\tctgB\t10\t20\t+\t50\t20\n");
        let file = read_hits(Cursor::new(bytes), ParseOptions::default()).unwrap();

        let names: Vec<&str> = file.hits.iter().map(|h| h.name1.as_str()).collect();
        assert_eq!(names, vec!["chr1", "chr2"]);
        assert_eq!(file.diagnostics.len(), 1);
        assert!(matches!(file.diagnostics[0], HitError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_raw_lines_are_kept_verbatim() {
        let text = "500 chr1 +100 50 + 1000 ctgA 0 50 + 50 50\r\n# trailer\n";
        let file = read_hits(Cursor::new(text), ParseOptions::default()).unwrap();
        assert_eq!(file.hits[0].start1, 100);
        assert_eq!(file.lines, vec!["500 chr1 +100 50 + 1000 ctgA 0 50 + 50 50"]);
    }

    #[test]
    fn test_crlf_lines() {
        let text = "#h\r\n10\tchr1\t0\t5\t+\t10\tctgA\t0\t5\t+\t5\t5\r\n";
        let file = read_hits(Cursor::new(text), ParseOptions::default()).unwrap();
        assert_eq!(file.headers, vec!["#h"]);
        assert_eq!(file.hits[0].blocks.len(), 1);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_hit_file("/nonexistent/hits.txt", ParseOptions::default()).is_err());
    }
}
