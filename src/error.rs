use std::fmt;
use std::io;

use thiserror::Error;

/// Where in a source file an error was detected.
///
/// Rendered as a message prefix (`motifs.csv:4: `) so errors can be
/// diagnosed without re-running the parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: Option<String>,
    /// 1-based line number.
    pub line: Option<u64>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u64) -> Self {
        Location {
            file: Some(file.into()),
            line: Some(line),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}: "),
            (Some(file), None) => write!(f, "{file}: "),
            (None, Some(line)) => write!(f, "line {line}: "),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("not ready to parse: no {missing} file has been provided")]
    NotReady { missing: &'static str },

    #[error("{at}malformed CSV: {message}")]
    MalformedCsv { at: Location, message: String },

    #[error("{at}duplicate accession '{accession}'")]
    DuplicateAccession { at: Location, accession: String },

    #[error("{at}{subject}: expected {expected}, found {actual}")]
    DimensionMismatch {
        at: Location,
        /// What was counted, e.g. `values in row 'A1'` or `data rows`.
        subject: String,
        expected: usize,
        actual: usize,
    },

    #[error("cannot read {file}: {source}")]
    FileAccess {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("{file} has already been parsed by this pipeline")]
    AlreadyParsed { file: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Create a new MalformedCsv error without location.
    pub fn malformed(message: impl Into<String>) -> Self {
        IngestError::MalformedCsv {
            at: Location::default(),
            message: message.into(),
        }
    }

    /// Create a new MalformedCsv error at a file and line.
    pub fn malformed_at(file: &str, line: u64, message: impl Into<String>) -> Self {
        IngestError::MalformedCsv {
            at: Location::new(file, line),
            message: message.into(),
        }
    }

    /// Fill in the location of a row-level error raised without one.
    pub fn at(mut self, file: &str, line: u64) -> Self {
        match &mut self {
            IngestError::MalformedCsv { at, .. }
            | IngestError::DuplicateAccession { at, .. }
            | IngestError::DimensionMismatch { at, .. } => {
                if at.file.is_none() {
                    at.file = Some(file.to_string());
                }
                if at.line.is_none() {
                    at.line = Some(line);
                }
            }
            _ => {}
        }
        self
    }

    /// Same as [`IngestError::at`] for errors that have no line of their own.
    pub fn in_file(mut self, file: &str) -> Self {
        match &mut self {
            IngestError::MalformedCsv { at, .. }
            | IngestError::DuplicateAccession { at, .. }
            | IngestError::DimensionMismatch { at, .. } => {
                if at.file.is_none() {
                    at.file = Some(file.to_string());
                }
            }
            _ => {}
        }
        self
    }

    /// Convert a `csv` crate error, keeping I/O failures as `FileAccess`.
    pub(crate) fn from_csv(file: &str, err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line());
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(source) => IngestError::FileAccess {
                file: file.to_string(),
                source,
            },
            _ => IngestError::MalformedCsv {
                at: Location {
                    file: Some(file.to_string()),
                    line,
                },
                message,
            },
        }
    }
}
