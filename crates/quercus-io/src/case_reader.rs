//! `.cases` query file parsing: unlabeled records for classification.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use quercus_tree::{
    AttributeKind, AttributeSchema, DataPoint, DomainTable, ImputationTables, MISSING,
};

use crate::error::IoError;

/// Reads unlabeled query records: one field per input attribute, no class
/// column.
///
/// Missing or unparsable continuous fields impute to the stored mean;
/// missing discrete fields to the stored most-common code. Novel discrete
/// values are admitted with fresh codes. Each record is returned with its
/// raw line so callers can echo it into the output file.
pub struct CaseReader<'a> {
    path: PathBuf,
    schema: &'a AttributeSchema,
    imputation: &'a ImputationTables,
}

impl<'a> CaseReader<'a> {
    /// Create a reader for the given `.cases` file.
    pub fn new(
        path: &Path,
        schema: &'a AttributeSchema,
        imputation: &'a ImputationTables,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            schema,
            imputation,
        }
    }

    /// Read and encode all query records.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | file cannot be opened |
    /// | [`IoError::ReadLine`] | read failure mid-file |
    /// | [`IoError::RowShape`] | wrong field count on a row |
    #[instrument(skip(self, domains), fields(path = %self.path.display()))]
    pub fn read(&self, domains: &mut DomainTable) -> Result<Vec<(String, DataPoint)>, IoError> {
        let file = File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let reader = BufReader::new(file);
        let expected = self.schema.len() - 1;

        let mut cases = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IoError::ReadLine {
                path: self.path.clone(),
                source: e,
            })?;
            if line.trim().is_empty() || line.starts_with("//") {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != expected {
                return Err(IoError::RowShape {
                    path: self.path.clone(),
                    line_number: index + 1,
                    rows_read: cases.len(),
                    expected,
                    got: fields.len(),
                    line,
                });
            }

            // One slot per attribute; the class slot stays zero.
            let mut codes = vec![0usize; self.schema.len()];
            for (attribute, token) in fields.iter().enumerate() {
                codes[attribute] = match self.schema.kind(attribute) {
                    AttributeKind::Continuous => {
                        let value = if *token == MISSING || *token == "NaN" {
                            self.imputation.mean(attribute)
                        } else {
                            token
                                .parse()
                                .unwrap_or_else(|_| self.imputation.mean(attribute))
                        };
                        domains.domain_mut(attribute).code_of_number(value)
                    }
                    AttributeKind::Discrete => {
                        if *token == MISSING || *token == "NaN" {
                            self.imputation.most_common(attribute)
                        } else {
                            domains.domain_mut(attribute).code_of(token)
                        }
                    }
                    AttributeKind::Ignore => 0,
                };
            }
            cases.push((line, DataPoint::new(codes)));
        }

        info!(n_cases = cases.len(), "query records read");
        Ok(cases)
    }
}
