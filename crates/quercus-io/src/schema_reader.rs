//! `.names` schema file parsing.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use quercus_tree::{Attribute, AttributeKind, AttributeSchema};

use crate::error::IoError;

/// Reads an attribute schema from a `.names` file.
///
/// Expected format:
/// - the first line lists the class values and is skipped (class values
///   are discovered from the data);
/// - every following `name: tag` line declares one input attribute, in
///   data-column order. The tag `continuous.` marks a continuous
///   attribute, `ignore.` an ignored one, anything else is discrete;
/// - lines starting with `|` are comments; lines without a colon are
///   skipped.
///
/// The class attribute is appended automatically as the last attribute.
pub struct SchemaReader {
    path: PathBuf,
}

impl SchemaReader {
    /// Create a reader for the given `.names` file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Parse the schema file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | file cannot be opened |
    /// | [`IoError::ReadLine`] | read failure mid-file |
    /// | [`IoError::NoInputAttributes`] | no attribute line found |
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<AttributeSchema, IoError> {
        let file = File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let mut inputs = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IoError::ReadLine {
                path: self.path.clone(),
                source: e,
            })?;
            // First line holds the class values.
            if index == 0 {
                continue;
            }
            if line.starts_with('|') {
                continue;
            }
            let mut parts = line.splitn(2, ':');
            let (Some(name), Some(tag)) = (parts.next(), parts.next()) else {
                continue;
            };
            let kind = match tag.trim() {
                "continuous." => AttributeKind::Continuous,
                "ignore." => AttributeKind::Ignore,
                _ => AttributeKind::Discrete,
            };
            inputs.push(Attribute::new(name.trim(), kind));
        }

        debug!(n_inputs = inputs.len(), "schema file parsed");
        AttributeSchema::from_inputs(inputs).map_err(|_| IoError::NoInputAttributes {
            path: self.path.clone(),
        })
    }
}
