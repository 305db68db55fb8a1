//! Prediction output: each query line echoed with its predicted label.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::error::IoError;

/// Writes classified query records to the output file, one
/// `original-line,label` row per record.
pub struct PredictionWriter {
    path: PathBuf,
}

impl PredictionWriter {
    /// Create a writer targeting the given output path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Return the output path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write all predictions.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteOutput`] when the file cannot be created
    /// or written.
    #[instrument(skip(self, predictions), fields(path = %self.path.display()))]
    pub fn write(&self, predictions: &[(String, String)]) -> Result<(), IoError> {
        let write_all = || -> std::io::Result<()> {
            let file = File::create(&self.path)?;
            let mut writer = BufWriter::new(file);
            for (line, label) in predictions {
                writeln!(writer, "{line},{label}")?;
            }
            writer.flush()
        };
        write_all().map_err(|e| IoError::WriteOutput {
            path: self.path.clone(),
            source: e,
        })?;

        info!(n_predictions = predictions.len(), "predictions written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::PredictionWriter;

    #[test]
    fn lines_echo_with_label_appended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.tmp");
        let predictions = vec![
            ("red, 2.0".to_string(), "yes".to_string()),
            ("blue, 4.0".to_string(), "no".to_string()),
        ];
        PredictionWriter::new(&path).write(&predictions).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "red, 2.0,yes\nblue, 4.0,no\n");
    }
}
