//! `.data`/`.test` row file parsing and encoding.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use quercus_tree::{AttributeKind, AttributeSchema, DataPoint, DomainTable, MISSING};

use crate::error::IoError;

/// Reads comma-separated data rows and encodes them through the attribute
/// domains.
///
/// Lines starting with `//` and blank lines are skipped. Every other line
/// must carry exactly one field per schema attribute, class last. Domains
/// grow as new values are observed.
pub struct RowReader<'a> {
    path: PathBuf,
    schema: &'a AttributeSchema,
}

impl<'a> RowReader<'a> {
    /// Create a reader for the given row file.
    pub fn new(path: &Path, schema: &'a AttributeSchema) -> Self {
        Self {
            path: path.to_path_buf(),
            schema,
        }
    }

    /// Read and encode all rows.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FileNotFound`] | file cannot be opened |
    /// | [`IoError::ReadLine`] | read failure mid-file |
    /// | [`IoError::RowShape`] | wrong field count on a row |
    /// | [`IoError::BadContinuousValue`] | continuous field fails to parse |
    #[instrument(skip(self, domains), fields(path = %self.path.display()))]
    pub fn read(&self, domains: &mut DomainTable) -> Result<Vec<DataPoint>, IoError> {
        let file = File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;
        let reader = BufReader::new(file);

        let mut points = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| IoError::ReadLine {
                path: self.path.clone(),
                source: e,
            })?;
            if line.trim().is_empty() || line.starts_with("//") {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != self.schema.len() {
                return Err(IoError::RowShape {
                    path: self.path.clone(),
                    line_number: index + 1,
                    rows_read: points.len(),
                    expected: self.schema.len(),
                    got: fields.len(),
                    line,
                });
            }

            let mut codes = Vec::with_capacity(fields.len());
            for (attribute, token) in fields.iter().enumerate() {
                let code = match self.schema.kind(attribute) {
                    AttributeKind::Continuous => {
                        if *token == MISSING || *token == "NaN" {
                            domains.domain_mut(attribute).code_of(MISSING)
                        } else {
                            let value: f64 = token.parse().map_err(|_| {
                                IoError::BadContinuousValue {
                                    path: self.path.clone(),
                                    line_number: index + 1,
                                    column: attribute,
                                    token: (*token).to_string(),
                                }
                            })?;
                            domains.domain_mut(attribute).code_of_number(value)
                        }
                    }
                    AttributeKind::Discrete | AttributeKind::Ignore => {
                        domains.domain_mut(attribute).code_of(token)
                    }
                };
                codes.push(code);
            }
            points.push(DataPoint::new(codes));
        }

        info!(n_rows = points.len(), "data rows read");
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use quercus_tree::{Attribute, AttributeKind, AttributeSchema, DomainTable, MISSING};

    use super::RowReader;
    use crate::error::IoError;

    fn schema() -> AttributeSchema {
        AttributeSchema::from_inputs(vec![
            Attribute::new("color", AttributeKind::Discrete),
            Attribute::new("weight", AttributeKind::Continuous),
        ])
        .unwrap()
    }

    fn write_rows(dir: &TempDir, content: &str) -> std::path::PathBuf {
        let path = dir.path().join("test.data");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn rows_encode_through_domains() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(
            &dir,
            "// a comment\n\
             red, 1.5, yes\n\
             \n\
             blue, 2.5, no\n\
             red, 1.5, no\n",
        );
        let schema = schema();
        let mut domains = DomainTable::new(3);
        let points = RowReader::new(&path, &schema).read(&mut domains).unwrap();

        assert_eq!(points.len(), 3);
        // "red" and 1.5 reuse their codes.
        assert_eq!(points[0].code(0), points[2].code(0));
        assert_eq!(points[0].code(1), points[2].code(1));
        assert_eq!(domains.domain(0).len(), 2);
        assert_eq!(domains.domain(1).number_of(points[1].code(1)), Some(2.5));
        assert_eq!(domains.domain(2).len(), 2);
    }

    #[test]
    fn missing_continuous_becomes_sentinel() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(&dir, "red, ?, yes\nblue, NaN, no\n");
        let schema = schema();
        let mut domains = DomainTable::new(3);
        let points = RowReader::new(&path, &schema).read(&mut domains).unwrap();
        let sentinel = domains.domain(1).code_for(MISSING).unwrap();
        assert_eq!(points[0].code(1), sentinel);
        assert_eq!(points[1].code(1), sentinel);
    }

    #[test]
    fn row_shape_error_reports_progress() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(&dir, "red, 1.5, yes\nblue, 2.5\n");
        let schema = schema();
        let mut domains = DomainTable::new(3);
        let err = RowReader::new(&path, &schema)
            .read(&mut domains)
            .unwrap_err();
        assert!(matches!(
            err,
            IoError::RowShape {
                line_number: 2,
                rows_read: 1,
                expected: 3,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn unparsable_continuous_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(&dir, "red, heavy, yes\n");
        let schema = schema();
        let mut domains = DomainTable::new(3);
        let err = RowReader::new(&path, &schema)
            .read(&mut domains)
            .unwrap_err();
        assert!(matches!(
            err,
            IoError::BadContinuousValue {
                line_number: 1,
                column: 1,
                ..
            }
        ));
    }
}
