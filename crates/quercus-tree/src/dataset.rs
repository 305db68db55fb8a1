//! Encoded data points and the training dataset they live in.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::domain::DomainTable;
use crate::error::TreeError;
use crate::schema::AttributeSchema;

/// A fixed-width vector of domain codes, one per attribute, class last.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DataPoint {
    codes: Vec<usize>,
}

impl DataPoint {
    /// Create a data point from its attribute codes.
    #[must_use]
    pub fn new(codes: Vec<usize>) -> Self {
        Self { codes }
    }

    /// Return the code of `attribute`.
    #[must_use]
    pub fn code(&self, attribute: usize) -> usize {
        self.codes[attribute]
    }

    /// Return all codes.
    #[must_use]
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Return the number of attribute slots.
    #[must_use]
    pub fn width(&self) -> usize {
        self.codes.len()
    }
}

/// A training dataset: schema, attribute domains, and encoded points.
///
/// The schema and domains describe the whole universe the model is built
/// in; held-out test points are kept outside the dataset and encoded
/// through the same domains.
#[derive(Debug)]
pub struct Dataset {
    schema: AttributeSchema,
    domains: DomainTable,
    points: Vec<DataPoint>,
}

impl Dataset {
    /// Assemble a dataset, validating point widths against the schema.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PointWidthMismatch`] when any point has a
    /// different number of codes than the schema has attributes.
    pub fn new(
        schema: AttributeSchema,
        domains: DomainTable,
        points: Vec<DataPoint>,
    ) -> Result<Self, TreeError> {
        let expected = schema.len();
        for (point_index, point) in points.iter().enumerate() {
            if point.width() != expected {
                return Err(TreeError::PointWidthMismatch {
                    expected,
                    got: point.width(),
                    point_index,
                });
            }
        }
        Ok(Self {
            schema,
            domains,
            points,
        })
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

    /// Return the domain tables mutably (ingestion-time growth only).
    pub fn domains_mut(&mut self) -> &mut DomainTable {
        &mut self.domains
    }

    /// Return the training points.
    #[must_use]
    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    /// Return the number of training points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Return `true` if the dataset holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Return the number of distinct class values observed so far.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.domains.domain(self.schema.class_index()).len()
    }

    /// Count class occurrences over the points selected by `rows`.
    #[must_use]
    pub fn class_frequencies(&self, rows: &[usize]) -> Vec<usize> {
        let class = self.schema.class_index();
        let mut frequencies = vec![0usize; self.n_classes()];
        for &row in rows {
            frequencies[self.points[row].code(class)] += 1;
        }
        frequencies
    }

    /// Count class occurrences over an arbitrary point slice.
    #[must_use]
    pub fn class_frequencies_of(&self, points: &[DataPoint]) -> Vec<usize> {
        let class = self.schema.class_index();
        let mut frequencies = vec![0usize; self.n_classes()];
        for point in points {
            frequencies[point.code(class)] += 1;
        }
        frequencies
    }

    /// Shuffle the points and split off the trailing fraction as a test set.
    ///
    /// Keeps `train_fraction` of the points (rounded down) for training and
    /// returns the rest.
    pub fn split_off_test(&mut self, train_fraction: f64, rng: &mut impl Rng) -> Vec<DataPoint> {
        self.points.shuffle(rng);
        let keep = (self.points.len() as f64 * train_fraction) as usize;
        self.points.split_off(keep)
    }

    /// Fold previously held-out points back into the training set.
    pub fn absorb(&mut self, points: Vec<DataPoint>) {
        self.points.extend(points);
    }

    /// Decompose into schema, domains and points.
    #[must_use]
    pub fn into_parts(self) -> (AttributeSchema, DomainTable, Vec<DataPoint>) {
        (self.schema, self.domains, self.points)
    }
}
