//! Reader for plain-text sample matrices.
//!
//! # File Format
//!
//! ```text
//! # Gaussian controls on unit-square-p1, 25 dofs
//! 0.13 -0.52 1.07 ...
//! 0.88  0.01 -0.3 ...
//! ```
//!
//! One sample per line, whitespace separated, `#` starts a comment line.
//! Every data line must have the same number of values.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use thiserror::Error;

/// Error type for sample file parsing and dataset assembly.
#[derive(Debug, Error)]
pub enum SampleFileError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Parse error with line number
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Line with a different number of values than the first data line
    #[error("Line {line} has {found} values, expected {expected}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// Empty file (no data records)
    #[error("Sample file contains no data")]
    EmptyFile,

    /// Control and reference matrices of different shape
    #[error("Controls have shape {controls:?} but references have shape {references:?}")]
    ReferenceCount {
        controls: (usize, usize),
        references: (usize, usize),
    },
}

/// Row-major `f32` matrix read from a sample file.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleMatrix {
    /// Number of samples
    pub rows: usize,
    /// Values per sample
    pub cols: usize,
    /// Row-major values
    pub values: Vec<f32>,
}

/// Read a sample matrix file.
///
/// # Example
///
/// ```ignore
/// use amortized_fem::data::{read_sample_matrix, SampleSet};
/// use std::path::Path;
///
/// let controls = read_sample_matrix(Path::new("gaussian-controls.txt"))?;
/// let set = SampleSet::from_controls(controls);
/// ```
pub fn read_sample_matrix(path: &Path) -> Result<SampleMatrix, SampleFileError> {
    parse_sample_matrix(File::open(path)?)
}

/// Parse a sample matrix from any reader.
pub fn parse_sample_matrix<R: Read>(input: R) -> Result<SampleMatrix, SampleFileError> {
    let reader = BufReader::new(input);
    let mut values = Vec::new();
    let mut cols: Option<usize> = None;
    let mut rows = 0;

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let start = values.len();
        for token in line.split_whitespace() {
            let v: f32 = token.parse().map_err(|_| SampleFileError::ParseError {
                line: line_num + 1,
                message: format!("Invalid value '{}'", token),
            })?;
            values.push(v);
        }

        let found = values.len() - start;
        match cols {
            None => cols = Some(found),
            Some(expected) if expected != found => {
                return Err(SampleFileError::RaggedRow {
                    line: line_num + 1,
                    expected,
                    found,
                });
            }
            Some(_) => {}
        }
        rows += 1;
    }

    match cols {
        Some(cols) if rows > 0 => Ok(SampleMatrix { rows, cols, values }),
        _ => Err(SampleFileError::EmptyFile),
    }
}
