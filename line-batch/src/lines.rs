//! Line-oriented record sources.
//!
//! Each line of text becomes one `String` record, numbered from 1. Line
//! terminators (`\n` or `\r\n`) are stripped. The total count is the number
//! of lines, computed when the source is opened.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};

use batch_pipelines::{Record, RecordSource, SourceError};

enum Origin {
    Text(String),
    File(PathBuf),
}

/// Source reading lines from an in-memory string or a file.
pub struct LineSource {
    origin: Origin,
    reader: Option<Box<dyn BufRead + Send>>,
    lookahead: Option<io::Result<String>>,
    total: Option<u64>,
    number: u64,
}

impl LineSource {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::with_origin(Origin::Text(text.into()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::with_origin(Origin::File(path.as_ref().to_path_buf()))
    }

    fn with_origin(origin: Origin) -> Self {
        Self {
            origin,
            reader: None,
            lookahead: None,
            total: None,
            number: 0,
        }
    }

    /// Pull the next line into the lookahead slot, unless already there.
    fn fill(&mut self) {
        if self.lookahead.is_some() {
            return;
        }
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        let mut line = String::new();
        self.lookahead = match reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                trim_line_ending(&mut line);
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        };
    }
}

fn trim_line_ending(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

fn count_lines(reader: impl BufRead) -> io::Result<u64> {
    let mut count = 0;
    for line in reader.lines() {
        line?;
        count += 1;
    }
    Ok(count)
}

impl RecordSource for LineSource {
    type Payload = String;

    fn open(&mut self) -> Result<(), SourceError> {
        let reader: Box<dyn BufRead + Send> = match &self.origin {
            Origin::Text(text) => {
                self.total = Some(text.lines().count() as u64);
                Box::new(Cursor::new(text.clone().into_bytes()))
            }
            Origin::File(path) => {
                self.total = Some(count_lines(BufReader::new(File::open(path)?))?);
                Box::new(BufReader::new(File::open(path)?))
            }
        };
        self.reader = Some(reader);
        Ok(())
    }

    /// An I/O error during lookahead counts as "more to read" so that
    /// `read_next` can surface it.
    fn has_next(&mut self) -> bool {
        self.fill();
        self.lookahead.is_some()
    }

    fn read_next(&mut self) -> Result<Record<String>, SourceError> {
        self.fill();
        let number = self.number + 1;
        match self.lookahead.take() {
            Some(Ok(line)) => {
                self.number = number;
                Ok(Record::numbered(number, line))
            }
            Some(Err(e)) => Err(SourceError::Io(e)),
            None => Err(SourceError::Malformed {
                number,
                detail: "read past the last line".to_string(),
            }),
        }
    }

    fn total_count(&self) -> Option<u64> {
        self.total
    }

    fn description(&self) -> String {
        match &self.origin {
            Origin::Text(_) => "In-Memory String".to_string(),
            Origin::File(path) => format!("File: {}", path.display()),
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.reader = None;
        self.lookahead = None;
        Ok(())
    }
}
