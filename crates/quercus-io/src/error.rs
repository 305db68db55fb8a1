use std::path::PathBuf;

/// Errors from schema, row and query file ingestion.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Returned when an input file cannot be opened.
    #[error("unable to open file {path}")]
    FileNotFound {
        /// Path of the file that could not be opened.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a line cannot be read mid-file.
    #[error("unable to read line from {path}")]
    ReadLine {
        /// Path of the file being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a schema file declares no input attributes.
    #[error("schema file {path} declares no input attributes")]
    NoInputAttributes {
        /// Path of the schema file.
        path: PathBuf,
    },

    /// Returned when a data row has the wrong number of fields.
    #[error(
        "{path}:{line_number}: expected {expected} fields, got {got} \
         ({rows_read} rows read so far): {line}"
    )]
    RowShape {
        /// Path of the offending file.
        path: PathBuf,
        /// One-based line number of the offending row.
        line_number: usize,
        /// Rows successfully read before the error.
        rows_read: usize,
        /// The expected field count.
        expected: usize,
        /// The actual field count.
        got: usize,
        /// The offending line.
        line: String,
    },

    /// Returned when a continuous field fails numeric parsing in
    /// training data.
    #[error("{path}:{line_number}: column {column}: unparsable continuous value {token:?}")]
    BadContinuousValue {
        /// Path of the offending file.
        path: PathBuf,
        /// One-based line number of the offending row.
        line_number: usize,
        /// Zero-based column of the offending field.
        column: usize,
        /// The token that failed to parse.
        token: String,
    },

    /// Returned when the prediction output file cannot be written.
    #[error("unable to write predictions to {path}")]
    WriteOutput {
        /// Path of the output file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
