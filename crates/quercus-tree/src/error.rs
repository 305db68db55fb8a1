use std::path::PathBuf;

/// Errors from tree and forest induction.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Returned when a schema has no input attribute besides the class.
    #[error("schema needs at least one input attribute and the class attribute")]
    SchemaTooSmall,

    /// Returned when the class attribute is not discrete.
    #[error("the class attribute must be discrete")]
    ClassNotDiscrete,

    /// Returned when a data point has a different width than the schema.
    #[error("data point {point_index} has {got} values, expected {expected}")]
    PointWidthMismatch {
        /// The expected number of values (one per attribute).
        expected: usize,
        /// The actual number of values in the point.
        got: usize,
        /// The zero-based index of the offending point.
        point_index: usize,
    },

    /// Returned when the training dataset has zero points.
    #[error("training dataset has zero data points")]
    EmptyDataset,

    /// Returned when tree_count is zero.
    #[error("tree_count must be at least 1, got {tree_count}")]
    InvalidTreeCount {
        /// The invalid tree_count value provided.
        tree_count: usize,
    },

    /// Returned when the dataset is too small to partition into folds.
    #[error("cross-validation needs at least {folds} rows, got {rows}")]
    TooFewRowsForValidation {
        /// The number of rows in the dataset.
        rows: usize,
        /// The number of folds requested.
        folds: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
