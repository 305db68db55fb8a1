//! Random forest construction with per-node feature subsampling.

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::dataset::{DataPoint, Dataset};
use crate::domain::DomainTable;
use crate::error::TreeError;
use crate::grow::{self, GrowContext};
use crate::importance::{self, AttributeImportance};
use crate::node::Tree;
use crate::split::{self, SplitCriterion};

/// An ordered ensemble of independently grown trees combined by
/// majority vote.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Forest {
    trees: Vec<Tree>,
    n_classes: usize,
}

impl Forest {
    pub(crate) fn new(trees: Vec<Tree>, n_classes: usize) -> Self {
        Self { trees, n_classes }
    }

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the tree roots in build order.
    #[must_use]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Return the number of classes at training time.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Tally one vote per tree for `point`.
    ///
    /// Each tree votes with its own prediction, empty-leaf fallback
    /// included. The returned vector has one count per class.
    #[must_use]
    pub fn vote_counts(&self, point: &DataPoint, domains: &DomainTable) -> Vec<usize> {
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.classify(point, domains)] += 1;
        }
        votes
    }

    /// Predict the class code for `point` by majority vote.
    ///
    /// Ties resolve to the lowest class index: the scan only moves on a
    /// strictly greater count.
    #[must_use]
    pub fn classify(&self, point: &DataPoint, domains: &DomainTable) -> usize {
        let votes = self.vote_counts(point, domains);
        let mut winner = 0usize;
        let mut winner_votes = votes.first().copied().unwrap_or(0);
        for (class, &count) in votes.iter().enumerate().skip(1) {
            if count > winner_votes {
                winner_votes = count;
                winner = class;
            }
        }
        winner
    }
}

/// Configuration for random forest training.
///
/// Construct via [`ForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter   | Default     |
/// |-------------|-------------|
/// | `criterion` | `Certainty` |
/// | `seed`      | 13579       |
#[derive(Debug, Clone)]
pub struct ForestConfig {
    pub(crate) tree_count: usize,
    pub(crate) criterion: SplitCriterion,
    pub(crate) seed: u64,
}

impl ForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::InvalidTreeCount`] if `tree_count` is zero.
    pub fn new(tree_count: usize) -> Result<Self, TreeError> {
        if tree_count == 0 {
            return Err(TreeError::InvalidTreeCount { tree_count });
        }
        Ok(Self {
            tree_count,
            criterion: SplitCriterion::Certainty,
            seed: 13579,
        })
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the base seed for feature-subset draws.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the number of trees.
    #[must_use]
    pub fn tree_count(&self) -> usize {
        self.tree_count
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the base seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Train a forest over the whole dataset.
    ///
    /// Every tree is grown on the full training set restricted to a
    /// randomly drawn feature subset, redrawn again at every discrete
    /// split below it; trees are built concurrently.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyDataset`] when the dataset has no points.
    #[instrument(skip(self, dataset), fields(n_trees = self.tree_count, n_points = dataset.len()))]
    pub fn fit(&self, dataset: &Dataset) -> Result<ForestFit, TreeError> {
        if dataset.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        let rows: Vec<usize> = (0..dataset.len()).collect();
        let (trees, records) = grow_forest(dataset, &rows, self);
        let baseline = split::class_certainty(dataset, &rows);
        info!(n_trees = trees.len(), "random forest built");
        Ok(ForestFit {
            forest: Forest::new(trees, dataset.n_classes()),
            importances: importance::rank(records, baseline),
        })
    }
}

/// A trained forest with the importance records collected while growing it.
#[derive(Debug)]
pub struct ForestFit {
    forest: Forest,
    importances: Vec<AttributeImportance>,
}

impl ForestFit {
    /// Borrow the trained forest.
    #[must_use]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Consume the fit and return the trained forest.
    #[must_use]
    pub fn into_forest(self) -> Forest {
        self.forest
    }

    /// Return the ranked attribute importances.
    #[must_use]
    pub fn importances(&self) -> &[AttributeImportance] {
        &self.importances
    }

    /// Decompose into the forest and the importance list.
    #[must_use]
    pub fn into_parts(self) -> (Forest, Vec<AttributeImportance>) {
        (self.forest, self.importances)
    }
}

/// Grow `config.tree_count` trees over the subset selected by `rows`, one
/// dedicated worker per tree, and merge their importance records.
pub(crate) fn grow_forest(
    dataset: &Dataset,
    rows: &[usize],
    config: &ForestConfig,
) -> (Vec<Tree>, Vec<(usize, f64)>) {
    let schema = dataset.schema();
    let subset_size = feature_subset_size(schema.usable_input_count());
    debug!(subset_size, "drawing per-tree feature subsets");

    let results: Vec<(Tree, Vec<(usize, f64)>)> = (0..config.tree_count)
        .into_par_iter()
        .map(|index| {
            let tree_seed = config.seed.wrapping_add(1 + index as u64);
            let selected = grow::draw_attribute_subset(schema, subset_size, tree_seed);
            let ctx = GrowContext {
                dataset,
                criterion: config.criterion,
                redraw_features: true,
                gate: None,
            };
            grow::grow(&ctx, rows, &selected, &[], tree_seed)
        })
        .collect();

    let mut trees = Vec::with_capacity(config.tree_count);
    let mut records = Vec::new();
    for (tree, tree_records) in results {
        trees.push(tree);
        records.extend(tree_records);
    }
    (trees, records)
}

/// Feature-subset size for a forest: ⌊log₂(usable + 1)⌋.
pub(crate) fn feature_subset_size(usable_attributes: usize) -> usize {
    ((usable_attributes as f64 + 1.0).ln() / 2.0_f64.ln()) as usize
}
