//! Streaming marker file parser.
//!
//! Reads one line at a time and yields `MarkerRecord`s; only the current
//! line is held in memory.

use crate::error::{MetaError, Result};
use crate::marker::{MarkerRecord, StudyObservation};
use crate::streaming::parsing::{is_missing_token, parse_finite, should_skip_line, study_columns};
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// A streaming marker reader.
pub struct MarkerReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: String,
    max_num_studies: usize,
    warnings: usize,
}

impl MarkerReader<File> {
    /// Open a marker file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> MarkerReader<R> {
    /// Create a new marker reader from any readable source.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, 64 * 1024)
    }

    /// Create a marker reader with custom buffer capacity.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            line_number: 0,
            buffer: String::with_capacity(1024),
            max_num_studies: 0,
            warnings: 0,
        }
    }

    /// Largest number of study columns seen on any data line so far.
    pub fn max_num_studies(&self) -> usize {
        self.max_num_studies
    }

    /// Number of lines that had a dropped trailing column.
    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// Read the next marker record.
    pub fn read_record(&mut self) -> Result<Option<MarkerRecord>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let tokens: Vec<&str> = self.buffer.split_whitespace().collect();
            if should_skip_line(&tokens) {
                continue;
            }

            let (num_studies, dropped) = study_columns(tokens.len());
            if dropped {
                self.warnings += 1;
                warn!(
                    "Line {}: number of columns must be odd including rsid; last column is ignored",
                    self.line_number
                );
            }
            self.max_num_studies = self.max_num_studies.max(num_studies);

            return parse_studies(&tokens, num_studies)
                .map(Some)
                .map_err(|message| MetaError::Parse {
                    line: self.line_number,
                    message,
                    content: self.buffer.trim_end().to_string(),
                });
        }
    }

    /// Get an iterator over all records.
    pub fn records(self) -> MarkerRecordIter<R> {
        MarkerRecordIter { reader: self }
    }
}

/// Build a record from a split line holding `num_studies` complete pairs.
fn parse_studies(tokens: &[&str], num_studies: usize) -> std::result::Result<MarkerRecord, String> {
    let mut record = MarkerRecord::new(tokens[0]);
    record.studies.reserve(num_studies);

    for i in 0..num_studies {
        let effect_token = tokens[2 * i + 1];
        let se_token = tokens[2 * i + 2];

        if is_missing_token(effect_token) || is_missing_token(se_token) {
            record.studies.push(StudyObservation::Missing);
            continue;
        }

        let (effect, std_err) = match (parse_finite(effect_token), parse_finite(se_token)) {
            (Some(e), Some(s)) => (e, s),
            _ => {
                return Err(
                    "Incorrect float value in following line. Possibly not a double".to_string(),
                )
            }
        };
        if std_err <= 0.0 {
            return Err(format!(
                "Standard error cannot be <= zero ({}th column is {}) in the following line",
                2 * i + 3,
                std_err
            ));
        }
        // Inverse-variance weights need a representable variance and precision.
        let variance = std_err * std_err;
        if !variance.is_normal() || !variance.recip().is_normal() {
            return Err(format!(
                "Standard error squared is out of floating-point range ({}th column is {}) in the following line",
                2 * i + 3,
                std_err
            ));
        }
        record.studies.push(StudyObservation::observed(effect, std_err));
    }

    Ok(record)
}

/// Iterator over marker records.
pub struct MarkerRecordIter<R: Read> {
    reader: MarkerReader<R>,
}

impl<R: Read> MarkerRecordIter<R> {
    /// Access the underlying reader (for run-level counters).
    pub fn reader(&self) -> &MarkerReader<R> {
        &self.reader
    }
}

impl<R: Read> Iterator for MarkerRecordIter<R> {
    type Item = Result<MarkerRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// Parse all records from an in-memory string.
pub fn parse_markers(content: &str) -> Result<Vec<MarkerRecord>> {
    MarkerReader::new(content.as_bytes()).records().collect()
}
