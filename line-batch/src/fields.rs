//! Stages for delimited text lines.

use batch_pipelines::{
    MappingError, Record, RecordFilter, RecordMapper, RecordValidator, ValidationError,
};

/// Excludes blank lines, and lines starting with a prefix when one is set.
#[derive(Debug, Clone, Default)]
pub struct LineFilter {
    keep_blank: bool,
    exclude_prefix: Option<String>,
}

impl LineFilter {
    pub fn new(keep_blank: bool, exclude_prefix: Option<String>) -> Self {
        Self {
            keep_blank,
            exclude_prefix: exclude_prefix.filter(|p| !p.is_empty()),
        }
    }
}

impl RecordFilter<String> for LineFilter {
    fn excludes(&mut self, record: &Record<String>) -> bool {
        let line = record.payload();
        if !self.keep_blank && line.trim().is_empty() {
            return true;
        }
        self.exclude_prefix
            .as_deref()
            .is_some_and(|prefix| line.starts_with(prefix))
    }

    fn name(&self) -> &str {
        "LINE-FILTER"
    }
}

/// Splits a line into trimmed fields.
///
/// With an expected field count, lines with any other count are unusable.
#[derive(Debug, Clone)]
pub struct DelimitedMapper {
    delimiter: char,
    expected: Option<usize>,
}

impl DelimitedMapper {
    pub fn new(delimiter: char, expected: Option<usize>) -> Self {
        Self {
            delimiter,
            expected,
        }
    }
}

impl RecordMapper<String> for DelimitedMapper {
    type Output = Vec<String>;

    fn map(&mut self, record: Record<String>) -> Result<Record<Vec<String>>, MappingError> {
        let delimiter = self.delimiter;
        let record = record.map(|line| {
            line.split(delimiter)
                .map(|field| field.trim().to_string())
                .collect::<Vec<_>>()
        });
        match self.expected {
            Some(expected) if record.payload().len() != expected => Err(MappingError::new(
                format!("expected {expected} fields, found {}", record.payload().len()),
            )),
            _ => Ok(record),
        }
    }

    fn name(&self) -> &str {
        "DELIMITED"
    }
}

/// Rejects records whose field at `index` is missing or blank.
#[derive(Debug, Clone, Copy)]
pub struct RequiredField {
    index: usize,
}

impl RequiredField {
    pub fn new(index: usize) -> Self {
        Self { index }
    }
}

impl RecordValidator<Vec<String>> for RequiredField {
    fn validate(&mut self, record: &Record<Vec<String>>) -> Result<(), ValidationError> {
        match record.payload().get(self.index) {
            Some(field) if !field.is_empty() => Ok(()),
            Some(_) => Err(ValidationError::new(format!("field {} is empty", self.index))),
            None => Err(ValidationError::new(format!("field {} is missing", self.index))),
        }
    }

    fn name(&self) -> &str {
        "REQUIRED"
    }
}
