//! Error types for the timeseries extractor
//!
//! Errors fall into three groups:
//!
//! - configuration problems (bad regex, bad template, empty selection) which are
//!   raised before any extraction starts
//! - reader failures for a single series, which the batch executor records and
//!   skips past
//! - I/O and template failures in the middle of a run, which abort it
//!
//! Cancellation is not an error; see [`crate::core::executor::RunOutcome`].

use crate::core::selection::ElementType;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the extractor
#[derive(Error, Debug)]
pub enum ExtractError {
    /// No source files were given
    #[error("No input files selected.")]
    NoFiles,

    /// A source file does not exist
    #[error("Input file not found: '{}'", .0.display())]
    MissingFile(PathBuf),

    /// No (type, id, param) triple is selected
    #[error("Please select at least one element and parameter before running.")]
    EmptySelection,

    /// Include or exclude filter does not compile
    #[error("Invalid {kind} pattern '{pattern}': {source}")]
    InvalidRegex {
        kind: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Numeric format string is not of the form `%.Nf`
    #[error("Invalid float format '{0}' (expected something like '%.6f')")]
    InvalidFloatFormat(String),

    /// Timestamp pattern cannot format or parse timestamps
    #[error("Invalid time format '{pattern}': {message}")]
    InvalidTimeFormat { pattern: String, message: String },

    /// Unrecognized element type name
    #[error("Unknown element type '{0}' (expected node, link, subcatchment, system or pollutant)")]
    UnknownElementType(String),

    /// Unrecognized output format name
    #[error("Unknown output format '{0}' (expected tsf, dat or csv)")]
    UnknownFormat(String),

    /// Unrecognized combine mode name
    #[error("Unknown combine mode '{0}' (expected separate, combined-per-element or merge-across-files)")]
    UnknownCombineMode(String),

    /// Filename template could not be resolved
    #[error(transparent)]
    Template(#[from] FilenameTemplateError),

    /// Two planned outputs resolve to the same file
    #[error("Two planned outputs resolve to the same path '{}'", .0.display())]
    DuplicateOutputPath(PathBuf),

    /// Two parameters written to one file map to the same column name
    #[error("{element_type} parameters '{first}' and '{second}' both map to column '{column}'")]
    DuplicateColumn {
        element_type: ElementType,
        column: String,
        first: String,
        second: String,
    },

    /// The reader has no such series in the file
    #[error("Could not extract {element_type},{id},{param} from '{}': {message}", .file.display())]
    SeriesNotFound {
        file: PathBuf,
        element_type: ElementType,
        id: String,
        param: String,
        message: String,
    },

    /// The source file could not be read or parsed
    #[error("Failed to read source '{}': {message}", .file.display())]
    SourceError { file: PathBuf, message: String },

    /// A previously written output could not be parsed back
    #[error("Malformed output file '{}': {message}", .path.display())]
    MalformedOutput { path: PathBuf, message: String },

    /// Writing an output file failed
    #[error("Failed to write '{}': {message}", .path.display())]
    WriteError { path: PathBuf, message: String },

    /// A worker is already running on this controller
    #[error("Another {0} is already in progress")]
    Busy(&'static str),

    /// General I/O error
    #[error("IO error: {0}")]
    IoError(String),
}

impl ExtractError {
    /// True for errors that stem from the selection or configuration rather than
    /// from the data. These are raised before any work starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ExtractError::NoFiles
                | ExtractError::MissingFile(_)
                | ExtractError::EmptySelection
                | ExtractError::InvalidRegex { .. }
                | ExtractError::InvalidFloatFormat(_)
                | ExtractError::InvalidTimeFormat { .. }
                | ExtractError::UnknownElementType(_)
                | ExtractError::UnknownFormat(_)
                | ExtractError::UnknownCombineMode(_)
                | ExtractError::Template(_)
                | ExtractError::DuplicateOutputPath(_)
                | ExtractError::DuplicateColumn { .. }
        )
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ExtractError>;

impl From<std::io::Error> for ExtractError {
    fn from(err: std::io::Error) -> Self {
        ExtractError::IoError(err.to_string())
    }
}

/// Errors raised while resolving a filename template
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilenameTemplateError {
    /// The template names a placeholder outside the recognized set
    #[error("Unknown placeholder '{{{name}}}' in filename template '{template}' (allowed: {{prefix}}, {{suffix}}, {{type}}, {{id}}, {{param}}, {{short}})")]
    UnknownPlaceholder { name: String, template: String },

    /// A `{` without a closing `}`
    #[error("Unterminated placeholder in filename template '{template}'")]
    Unterminated { template: String },

    /// The literal text of the template contains a path separator or reserved character
    #[error("Filename template '{template}' contains reserved character '{ch}'")]
    ReservedCharacter { ch: char, template: String },

    /// Substitution produced nothing usable as a file name
    #[error("Filename template '{template}' resolves to an empty filename")]
    EmptyFilename { template: String },
}
