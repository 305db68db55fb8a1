//! 10-fold cross-validation for trees and forests.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{info, instrument};

use crate::dataset::{DataPoint, Dataset};
use crate::error::TreeError;
use crate::forest::{self, Forest, ForestConfig};
use crate::grow::{self, GrowContext, TreeConfig};

/// Number of folds.
pub const FOLD_COUNT: usize = 10;

/// Cross-validation configuration.
///
/// Folds are fixed at ten; the shuffle that assigns rows to folds is
/// seeded so fold composition reproduces across runs.
#[derive(Debug, Clone)]
pub struct CrossValidation {
    seed: u64,
}

/// Aggregated cross-validation outcome.
#[derive(Debug, Clone)]
pub struct CrossValidationResult {
    /// Error percentage of each fold, in fold order.
    pub fold_errors: Vec<f64>,
    /// Mean of the fold error percentages.
    pub mean_error: f64,
    /// Population standard deviation of the fold errors over √10.
    pub std_error: f64,
}

impl CrossValidation {
    /// Create a cross-validation config with the default seed.
    #[must_use]
    pub fn new() -> Self {
        Self { seed: 13579 }
    }

    /// Set the shuffle seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the shuffle seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Cross-validate single-tree induction.
    ///
    /// Builds one tree per fold on the other nine folds, one dedicated
    /// worker per fold, and evaluates each on its held-out fold.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::EmptyDataset`] | zero data points |
    /// | [`TreeError::TooFewRowsForValidation`] | fewer rows than folds |
    #[instrument(skip_all, fields(n_points = dataset.len()))]
    pub fn evaluate_trees(
        &self,
        dataset: &Dataset,
        config: &TreeConfig,
    ) -> Result<CrossValidationResult, TreeError> {
        let chunks = self.chunk_rows(dataset)?;
        let selected: Vec<usize> = dataset.schema().input_indices().collect();

        let fold_errors: Vec<f64> = (0..FOLD_COUNT)
            .into_par_iter()
            .map(|fold| {
                let train = training_rows(&chunks, fold);
                let ctx = GrowContext {
                    dataset,
                    criterion: config.criterion,
                    redraw_features: false,
                    gate: None,
                };
                let (tree, _) = grow::grow(&ctx, &train, &selected, &[], 0);
                fold_error(dataset, &chunks[fold], |point| {
                    tree.classify(point, dataset.domains())
                })
            })
            .collect();

        let result = aggregate(fold_errors);
        info!(
            mean_error = result.mean_error,
            std_error = result.std_error,
            "tree cross-validation complete"
        );
        Ok(result)
    }

    /// Cross-validate forest induction: one forest per fold.
    ///
    /// # Errors
    ///
    /// Same conditions as [`CrossValidation::evaluate_trees`].
    #[instrument(skip_all, fields(n_points = dataset.len(), n_trees = config.tree_count))]
    pub fn evaluate_forests(
        &self,
        dataset: &Dataset,
        config: &ForestConfig,
    ) -> Result<CrossValidationResult, TreeError> {
        let chunks = self.chunk_rows(dataset)?;

        let fold_errors: Vec<f64> = (0..FOLD_COUNT)
            .into_par_iter()
            .map(|fold| {
                let train = training_rows(&chunks, fold);
                let (trees, _) = forest::grow_forest(dataset, &train, config);
                let ensemble = Forest::new(trees, dataset.n_classes());
                fold_error(dataset, &chunks[fold], |point| {
                    ensemble.classify(point, dataset.domains())
                })
            })
            .collect();

        let result = aggregate(fold_errors);
        info!(
            mean_error = result.mean_error,
            std_error = result.std_error,
            "forest cross-validation complete"
        );
        Ok(result)
    }

    /// Shuffle all rows and cut them into ten near-equal chunks.
    ///
    /// The first `n % 10` chunks receive one row more than the rest.
    fn chunk_rows(&self, dataset: &Dataset) -> Result<Vec<Vec<usize>>, TreeError> {
        let n = dataset.len();
        if n == 0 {
            return Err(TreeError::EmptyDataset);
        }
        if n < FOLD_COUNT {
            return Err(TreeError::TooFewRowsForValidation {
                rows: n,
                folds: FOLD_COUNT,
            });
        }

        let mut rows: Vec<usize> = (0..n).collect();
        rows.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let chunk_size = n / FOLD_COUNT;
        let remainder = n % FOLD_COUNT;
        let mut chunks: Vec<Vec<usize>> = rows
            .chunks(chunk_size)
            .take(FOLD_COUNT)
            .map(<[usize]>::to_vec)
            .collect();
        for (offset, &row) in rows[n - remainder..].iter().enumerate() {
            chunks[offset].push(row);
        }
        Ok(chunks)
    }
}

impl Default for CrossValidation {
    fn default() -> Self {
        Self::new()
    }
}

fn training_rows(chunks: &[Vec<usize>], held_out: usize) -> Vec<usize> {
    chunks
        .iter()
        .enumerate()
        .filter(|&(fold, _)| fold != held_out)
        .flat_map(|(_, chunk)| chunk.iter().copied())
        .collect()
}

/// Error percentage of `predict` over the held-out rows.
fn fold_error(
    dataset: &Dataset,
    test_rows: &[usize],
    predict: impl Fn(&DataPoint) -> usize,
) -> f64 {
    let class = dataset.schema().class_index();
    let errors = test_rows
        .iter()
        .filter(|&&row| {
            let point = &dataset.points()[row];
            predict(point) != point.code(class)
        })
        .count();
    errors as f64 / test_rows.len() as f64 * 100.0
}

fn aggregate(fold_errors: Vec<f64>) -> CrossValidationResult {
    let folds = fold_errors.len() as f64;
    let mean_error = fold_errors.iter().sum::<f64>() / folds;
    let variance = fold_errors
        .iter()
        .map(|&e| (e - mean_error) * (e - mean_error))
        .sum::<f64>()
        / folds;
    let std_error = variance.sqrt() / folds.sqrt();
    CrossValidationResult {
        fold_errors,
        mean_error,
        std_error,
    }
}

#[cfg(test)]
mod tests {
    use super::{CrossValidation, FOLD_COUNT, aggregate};
    use crate::dataset::{DataPoint, Dataset};
    use crate::domain::DomainTable;
    use crate::error::TreeError;
    use crate::forest::ForestConfig;
    use crate::grow::TreeConfig;
    use crate::schema::{Attribute, AttributeKind, AttributeSchema};

    fn separable_dataset(n_per_class: usize) -> Dataset {
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("color", AttributeKind::Discrete)])
                .unwrap();
        let mut domains = DomainTable::new(2);
        let mut points = Vec::new();
        for _ in 0..n_per_class {
            points.push(DataPoint::new(vec![
                domains.domain_mut(0).code_of("red"),
                domains.domain_mut(1).code_of("yes"),
            ]));
            points.push(DataPoint::new(vec![
                domains.domain_mut(0).code_of("blue"),
                domains.domain_mut(1).code_of("no"),
            ]));
        }
        Dataset::new(schema, domains, points).unwrap()
    }

    #[test]
    fn chunks_cover_every_row_exactly_once() {
        let ds = separable_dataset(13); // 26 rows: 6 chunks of 3, 4 of 2
        let chunks = CrossValidation::new().chunk_rows(&ds).unwrap();
        assert_eq!(chunks.len(), FOLD_COUNT);

        let sizes: Vec<usize> = chunks.iter().map(Vec::len).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1, "sizes: {sizes:?}");

        let mut all: Vec<usize> = chunks.iter().flatten().copied().collect();
        all.sort_unstable();
        let expected: Vec<usize> = (0..ds.len()).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn chunking_is_seed_deterministic() {
        let ds = separable_dataset(12);
        let a = CrossValidation::new().with_seed(5).chunk_rows(&ds).unwrap();
        let b = CrossValidation::new().with_seed(5).chunk_rows(&ds).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn too_few_rows_rejected() {
        let ds = separable_dataset(4); // 8 rows
        let err = CrossValidation::new()
            .evaluate_trees(&ds, &TreeConfig::new())
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::TooFewRowsForValidation { rows: 8, folds: 10 }
        ));
    }

    #[test]
    fn separable_data_validates_with_zero_error() {
        let ds = separable_dataset(20);
        let result = CrossValidation::new()
            .evaluate_trees(&ds, &TreeConfig::new())
            .unwrap();
        assert_eq!(result.fold_errors.len(), FOLD_COUNT);
        assert!(result.mean_error.abs() < 1e-12);
        assert!(result.std_error.abs() < 1e-12);
    }

    #[test]
    fn forest_validation_on_separable_data() {
        let ds = separable_dataset(20);
        let config = ForestConfig::new(5).unwrap().with_seed(42);
        let result = CrossValidation::new()
            .evaluate_forests(&ds, &config)
            .unwrap();
        assert_eq!(result.fold_errors.len(), FOLD_COUNT);
        assert!(result.mean_error.abs() < 1e-12);
    }

    #[test]
    fn aggregate_matches_hand_computation() {
        let errors = vec![10.0, 20.0, 10.0, 20.0, 10.0, 20.0, 10.0, 20.0, 10.0, 20.0];
        let result = aggregate(errors);
        assert!((result.mean_error - 15.0).abs() < 1e-12);
        // Population stddev is 5; SE = 5 / √10.
        assert!((result.std_error - 5.0 / 10.0_f64.sqrt()).abs() < 1e-12);
    }
}
