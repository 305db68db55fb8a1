//! Model persistence: gzip-compressed bincode with a versioned envelope.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tracing::{debug, info, instrument};

use crate::dataset::DataPoint;
use crate::domain::DomainTable;
use crate::error::TreeError;
use crate::forest::Forest;
use crate::importance::AttributeImportance;
use crate::impute::ImputationTables;
use crate::node::Tree;
use crate::schema::AttributeSchema;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// What was trained: a single tree or an ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum ModelKind {
    /// A single decision tree.
    Tree(Tree),
    /// A random forest.
    Forest(Forest),
}

/// A complete trained model: everything needed to classify new points.
///
/// Round-trips through [`Model::save`]/[`Model::load`] unchanged.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Model {
    schema: AttributeSchema,
    domains: DomainTable,
    imputation: ImputationTables,
    importances: Vec<AttributeImportance>,
    kind: ModelKind,
}

/// Versioned envelope wrapped around the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    model: Model,
}

impl Model {
    /// Assemble a model from its trained parts.
    #[must_use]
    pub fn new(
        schema: AttributeSchema,
        domains: DomainTable,
        imputation: ImputationTables,
        importances: Vec<AttributeImportance>,
        kind: ModelKind,
    ) -> Self {
        Self {
            schema,
            domains,
            imputation,
            importances,
            kind,
        }
    }

    /// Return the schema.
    #[must_use]
    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    /// Return the domain tables.
    #[must_use]
    pub fn domains(&self) -> &DomainTable {
        &self.domains
    }

    /// Return the domain tables mutably (query-time encoding of novel
    /// values grows them).
    pub fn domains_mut(&mut self) -> &mut DomainTable {
        &mut self.domains
    }

    /// Return the imputation tables.
    #[must_use]
    pub fn imputation(&self) -> &ImputationTables {
        &self.imputation
    }

    /// Return the attribute importances recorded at training time.
    #[must_use]
    pub fn importances(&self) -> &[AttributeImportance] {
        &self.importances
    }

    /// Return the trained tree or forest.
    #[must_use]
    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    /// Split borrows for query-time encoding: the schema and imputation
    /// tables are read while the domains grow for novel values.
    pub fn query_context(&mut self) -> (&AttributeSchema, &mut DomainTable, &ImputationTables) {
        (&self.schema, &mut self.domains, &self.imputation)
    }

    /// Predict the class code for an encoded point.
    #[must_use]
    pub fn classify(&self, point: &DataPoint) -> usize {
        match &self.kind {
            ModelKind::Tree(tree) => tree.classify(point, &self.domains),
            ModelKind::Forest(forest) => forest.classify(point, &self.domains),
        }
    }

    /// Decode a class code into its raw label.
    #[must_use]
    pub fn class_label(&self, code: usize) -> Option<&str> {
        self.domains.domain(self.schema.class_index()).value_of(code)
    }

    /// Save the model as gzip-compressed bincode.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::WriteModel`] | file create, write or flush failed |
    /// | [`TreeError::SerializeModel`] | bincode encoding failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TreeError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| TreeError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            model: self.clone(),
        };
        bincode::serialize_into(&mut encoder, &envelope)
            .map_err(|e| TreeError::SerializeModel { source: e })?;
        encoder.finish().map_err(|e| TreeError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(n_attributes = self.schema.len(), "model saved");
        Ok(())
    }

    /// Load a model, verifying the format version.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::ReadModel`] | file open failed |
    /// | [`TreeError::DeserializeModel`] | bincode decoding failed |
    /// | [`TreeError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TreeError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;
        let decoder = GzDecoder::new(BufReader::new(file));

        let envelope: ModelEnvelope =
            bincode::deserialize_from(decoder).map_err(|e| TreeError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(TreeError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        debug!(
            n_attributes = envelope.model.schema.len(),
            "model loaded"
        );
        Ok(envelope.model)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{Model, ModelKind};
    use crate::dataset::{DataPoint, Dataset};
    use crate::domain::DomainTable;
    use crate::error::TreeError;
    use crate::grow::TreeConfig;
    use crate::impute;
    use crate::schema::{Attribute, AttributeKind, AttributeSchema};

    fn trained_model() -> (Model, Vec<DataPoint>) {
        let schema = AttributeSchema::from_inputs(vec![
            Attribute::new("color", AttributeKind::Discrete),
            Attribute::new("shape", AttributeKind::Discrete),
        ])
        .unwrap();
        let mut domains = DomainTable::new(3);
        let rows = [
            ("red", "round", "yes"),
            ("red", "square", "yes"),
            ("blue", "round", "no"),
            ("blue", "square", "no"),
        ];
        let points: Vec<DataPoint> = rows
            .iter()
            .map(|(color, shape, class)| {
                DataPoint::new(vec![
                    domains.domain_mut(0).code_of(color),
                    domains.domain_mut(1).code_of(shape),
                    domains.domain_mut(2).code_of(class),
                ])
            })
            .collect();
        let ds = Dataset::new(schema, domains, points.clone()).unwrap();
        let imputation = impute::compute(&ds);
        let fit = TreeConfig::new().fit(&ds).unwrap();
        let (tree, importances) = fit.into_parts();
        let (schema, domains, _) = ds.into_parts();
        (
            Model::new(schema, domains, imputation, importances, ModelKind::Tree(tree)),
            points,
        )
    }

    #[test]
    fn round_trip_preserves_predictions_and_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.tree");
        let (model, points) = trained_model();

        model.save(&path).unwrap();
        let loaded = Model::load(&path).unwrap();

        for point in &points {
            assert_eq!(model.classify(point), loaded.classify(point));
        }
        assert_eq!(model.schema().len(), loaded.schema().len());
        assert_eq!(
            model.domains().domain(0).len(),
            loaded.domains().domain(0).len()
        );
        assert_eq!(model.importances().len(), loaded.importances().len());
        assert_eq!(
            model.class_label(model.classify(&points[0])),
            Some("yes")
        );
    }

    #[test]
    fn load_missing_file_error() {
        let err = Model::load("/tmp/quercus-no-such-model.tree").unwrap_err();
        assert!(matches!(err, TreeError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.tree");
        std::fs::write(&path, b"definitely not a gzip stream").unwrap();
        let err = Model::load(&path).unwrap_err();
        assert!(matches!(err, TreeError::DeserializeModel { .. }));
    }
}
