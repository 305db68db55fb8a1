//! The decomposition engine: recursive attribute selection and
//! partitioning, with a soft-capped parallel fan-out over sibling subtrees.

use std::collections::HashMap;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::dataset::Dataset;
use crate::domain::MISSING;
use crate::error::TreeError;
use crate::importance::{self, AttributeImportance};
use crate::node::{NodeId, Split, Tree};
use crate::probability;
use crate::schema::{AttributeKind, AttributeSchema};
use crate::scheduler::SpawnGate;
use crate::split::{self, AttributeScore, SplitCriterion};

/// Configuration for growing a single decision tree.
///
/// Construct via [`TreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter         | Default     |
/// |-------------------|-------------|
/// | `criterion`       | `Certainty` |
/// | `seed`            | 13579       |
/// | `subtree_workers` | 500         |
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub(crate) criterion: SplitCriterion,
    pub(crate) seed: u64,
    pub(crate) subtree_workers: usize,
}

impl TreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            criterion: SplitCriterion::Certainty,
            seed: 13579,
            subtree_workers: 500,
        }
    }

    /// Set the split quality criterion.
    #[must_use]
    pub fn with_criterion(mut self, criterion: SplitCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// Set the random seed for reproducibility.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the soft cap on concurrent subtree workers.
    ///
    /// Zero decomposes the whole tree on the calling thread.
    #[must_use]
    pub fn with_subtree_workers(mut self, subtree_workers: usize) -> Self {
        self.subtree_workers = subtree_workers;
        self
    }

    /// Return the split criterion.
    #[must_use]
    pub fn criterion(&self) -> SplitCriterion {
        self.criterion
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Return the subtree worker cap.
    #[must_use]
    pub fn subtree_workers(&self) -> usize {
        self.subtree_workers
    }

    /// Grow a decision tree over the whole dataset.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::EmptyDataset`] when the dataset has no points.
    #[instrument(skip(self, dataset), fields(n_points = dataset.len()))]
    pub fn fit(&self, dataset: &Dataset) -> Result<TreeFit, TreeError> {
        if dataset.is_empty() {
            return Err(TreeError::EmptyDataset);
        }
        let rows: Vec<usize> = (0..dataset.len()).collect();
        let selected: Vec<usize> = dataset.schema().input_indices().collect();
        let gate = SpawnGate::new(self.subtree_workers);
        let ctx = GrowContext {
            dataset,
            criterion: self.criterion,
            redraw_features: false,
            gate: Some(&gate),
        };
        let (tree, records) = grow(&ctx, &rows, &selected, &[], self.seed);
        debug!(
            nodes = tree.populated_node_count(),
            rules = tree.rule_count(),
            "decision tree built"
        );
        let baseline = split::class_certainty(dataset, &rows);
        Ok(TreeFit {
            tree,
            importances: importance::rank(records, baseline),
        })
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A grown tree with the importance records collected while growing it.
#[derive(Debug)]
pub struct TreeFit {
    tree: Tree,
    importances: Vec<AttributeImportance>,
}

impl TreeFit {
    /// Borrow the grown tree.
    #[must_use]
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Consume the fit and return the grown tree.
    #[must_use]
    pub fn into_tree(self) -> Tree {
        self.tree
    }

    /// Return the ranked attribute importances.
    #[must_use]
    pub fn importances(&self) -> &[AttributeImportance] {
        &self.importances
    }

    /// Decompose into the tree and the importance list.
    #[must_use]
    pub fn into_parts(self) -> (Tree, Vec<AttributeImportance>) {
        (self.tree, self.importances)
    }
}

/// Shared, read-only state for one tree build.
pub(crate) struct GrowContext<'a> {
    pub(crate) dataset: &'a Dataset,
    pub(crate) criterion: SplitCriterion,
    /// Redraw a fresh random attribute subset for every child (forest mode).
    pub(crate) redraw_features: bool,
    /// Permit gate for the sibling fan-out; `None` always runs inline.
    pub(crate) gate: Option<&'a SpawnGate>,
}

/// One child subtree waiting to be grown.
struct ChildJob {
    rows: Vec<usize>,
    selected: Vec<usize>,
    seed: u64,
}

/// Recursively decompose the subset selected by `rows`.
///
/// Returns the subtree (its own arena, rooted at 0) together with the
/// `(attribute, score)` records of every split made below it. `used` holds
/// the discrete attributes already split on along the path from the real
/// root, which may not be reused.
pub(crate) fn grow(
    ctx: &GrowContext<'_>,
    rows: &[usize],
    selected: &[usize],
    used: &[usize],
    seed: u64,
) -> (Tree, Vec<(usize, f64)>) {
    let counts = ctx.dataset.class_frequencies(rows);
    let mut tree = Tree::with_root(counts.clone());
    let mut records = Vec::new();

    if rows.len() <= 1 || is_single_class(&counts) {
        return (tree, records);
    }

    let Some((attribute, score)) = select_attribute(ctx, rows, selected, used) else {
        return (tree, records);
    };

    let root = tree.root();
    tree.node_mut(root).score = score.score;
    records.push((attribute, score.score));
    let schema = ctx.dataset.schema();

    match schema.kind(attribute) {
        AttributeKind::Discrete => {
            tree.node_mut(root).split = Some(Split::Discrete { attribute });

            // One child per globally observed, non-missing domain value.
            let domain = ctx.dataset.domains().domain(attribute);
            let branches: Vec<usize> = (0..domain.len())
                .filter(|&code| domain.value_of(code) != Some(MISSING))
                .collect();
            let slot_of: HashMap<usize, usize> = branches
                .iter()
                .enumerate()
                .map(|(slot, &code)| (code, slot))
                .collect();
            let mut partitions: Vec<Vec<usize>> = vec![Vec::new(); branches.len()];
            for &row in rows {
                let code = ctx.dataset.points()[row].code(attribute);
                if let Some(&slot) = slot_of.get(&code) {
                    partitions[slot].push(row);
                }
            }

            let mut used_below = used.to_vec();
            used_below.push(attribute);
            let jobs: Vec<ChildJob> = partitions
                .into_iter()
                .enumerate()
                .map(|(j, rows)| {
                    let seed = seed.wrapping_add(1 + j as u64);
                    ChildJob {
                        rows,
                        selected: child_selection(ctx, selected, seed),
                        seed,
                    }
                })
                .collect();
            let branch_values: Vec<Option<usize>> = branches.into_iter().map(Some).collect();
            run_children(ctx, &mut tree, root, jobs, branch_values, &used_below, &mut records);
        }
        AttributeKind::Continuous => {
            let threshold = score
                .threshold
                .expect("continuous scores always carry a threshold");
            tree.node_mut(root).split = Some(Split::Continuous {
                attribute,
                threshold,
            });

            let domain = ctx.dataset.domains().domain(attribute);
            let mut below = Vec::new();
            let mut above = Vec::new();
            for &row in rows {
                let code = ctx.dataset.points()[row].code(attribute);
                match domain.number_of(code) {
                    Some(value) if value <= threshold => below.push(row),
                    Some(_) => above.push(row),
                    // Unimputed missing values cannot be routed.
                    None => {}
                }
            }

            // A one-sided partition still gets both children, but neither
            // is decomposed further.
            if below.is_empty() || above.is_empty() {
                for part in [below, above] {
                    let counts = ctx.dataset.class_frequencies(&part);
                    tree.graft(root, Tree::with_root(counts));
                }
                return (tree, records);
            }

            let jobs: Vec<ChildJob> = [below, above]
                .into_iter()
                .enumerate()
                .map(|(j, rows)| {
                    let seed = seed.wrapping_add(1 + j as u64);
                    ChildJob {
                        rows,
                        selected: child_selection(ctx, selected, seed),
                        seed,
                    }
                })
                .collect();
            run_children(ctx, &mut tree, root, jobs, vec![None, None], used, &mut records);
        }
        AttributeKind::Ignore => unreachable!("ignored attributes are never selected"),
    }

    (tree, records)
}

/// Pick the best-scoring usable attribute for the subset, or `None` when
/// the node is terminal.
fn select_attribute(
    ctx: &GrowContext<'_>,
    rows: &[usize],
    selected: &[usize],
    used: &[usize],
) -> Option<(usize, AttributeScore)> {
    let schema = ctx.dataset.schema();
    let class = schema.class_index();
    let tables = probability::compute(ctx.dataset, rows);

    let mut best: Option<(usize, AttributeScore)> = None;
    for &attribute in selected {
        if attribute == class {
            continue;
        }
        if schema.kind(attribute) == AttributeKind::Discrete && used.contains(&attribute) {
            continue;
        }
        let Some(score) = ctx.criterion.score(ctx.dataset, rows, attribute, &tables) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some((_, incumbent)) => ctx.criterion.prefers(score.score, incumbent.score),
        };
        if better {
            best = Some((attribute, score));
        }
    }
    best
}

/// Grow all child jobs, spawning a worker per child while the gate has
/// permits and running the rest inline, then graft the results in order.
fn run_children(
    ctx: &GrowContext<'_>,
    tree: &mut Tree,
    parent: NodeId,
    jobs: Vec<ChildJob>,
    branch_values: Vec<Option<usize>>,
    used: &[usize],
    records: &mut Vec<(usize, f64)>,
) {
    let mut results: Vec<Option<(Tree, Vec<(usize, f64)>)>> =
        jobs.iter().map(|_| None).collect();

    match ctx.gate {
        Some(gate) if jobs.len() >= 2 => {
            rayon::scope(|s| {
                for (slot, job) in results.iter_mut().zip(jobs) {
                    match gate.try_acquire() {
                        Some(permit) => s.spawn(move |_| {
                            let _permit = permit;
                            *slot = Some(grow(ctx, &job.rows, &job.selected, used, job.seed));
                        }),
                        None => {
                            *slot = Some(grow(ctx, &job.rows, &job.selected, used, job.seed));
                        }
                    }
                }
            });
        }
        _ => {
            for (slot, job) in results.iter_mut().zip(jobs) {
                *slot = Some(grow(ctx, &job.rows, &job.selected, used, job.seed));
            }
        }
    }

    for (result, branch_value) in results.into_iter().zip(branch_values) {
        let (subtree, subtree_records) =
            result.expect("every child job leaves a grown subtree in its slot");
        let child = tree.graft(parent, subtree);
        tree.node_mut(child).branch_value = branch_value;
        records.extend(subtree_records);
    }
}

/// The attribute set a child recurses with: the parent's set, or a freshly
/// drawn random subset of the same size in forest mode.
fn child_selection(ctx: &GrowContext<'_>, selected: &[usize], seed: u64) -> Vec<usize> {
    if ctx.redraw_features {
        draw_attribute_subset(ctx.dataset.schema(), selected.len(), seed)
    } else {
        selected.to_vec()
    }
}

/// Draw `size` distinct non-ignored input attributes without replacement
/// from a generator seeded with `seed`.
pub(crate) fn draw_attribute_subset(
    schema: &AttributeSchema,
    size: usize,
    seed: u64,
) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let class = schema.class_index();
    let mut subset = Vec::with_capacity(size);
    while subset.len() < size {
        let candidate = rng.gen_range(0..class);
        if schema.kind(candidate) != AttributeKind::Ignore && !subset.contains(&candidate) {
            subset.push(candidate);
        }
    }
    subset
}

fn is_single_class(counts: &[usize]) -> bool {
    counts.iter().filter(|&&c| c != 0).count() <= 1
}

#[cfg(test)]
mod tests {
    use super::{TreeConfig, draw_attribute_subset, is_single_class};
    use crate::dataset::{DataPoint, Dataset};
    use crate::domain::DomainTable;
    use crate::node::{Split, Tree};
    use crate::schema::{Attribute, AttributeKind, AttributeSchema};
    use crate::split::SplitCriterion;

    fn color_shape_dataset() -> Dataset {
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
        let points = rows
            .iter()
            .map(|(color, shape, class)| {
                DataPoint::new(vec![
                    domains.domain_mut(0).code_of(color),
                    domains.domain_mut(1).code_of(shape),
                    domains.domain_mut(2).code_of(class),
                ])
            })
            .collect();
        Dataset::new(schema, domains, points).unwrap()
    }

    fn assert_conservation(tree: &Tree) {
        for index in 0..tree.len() {
            let node = tree.node(crate::node::NodeId::new(index));
            if node.is_leaf() {
                continue;
            }
            let child_sum: usize = node
                .children()
                .iter()
                .map(|&c| tree.node(c).n_samples())
                .sum();
            assert_eq!(node.n_samples(), child_sum, "node {index}");
        }
    }

    #[test]
    fn color_separates_perfectly() {
        let ds = color_shape_dataset();
        for criterion in [
            SplitCriterion::Certainty,
            SplitCriterion::Entropy,
            SplitCriterion::Gini,
        ] {
            let fit = TreeConfig::new()
                .with_criterion(criterion)
                .fit(&ds)
                .unwrap();
            let tree = fit.tree();
            assert_eq!(
                tree.node(tree.root()).split(),
                Some(Split::Discrete { attribute: 0 }),
                "{criterion:?}"
            );
            assert_eq!(tree.len(), 3);
            assert_conservation(tree);
            // Zero training errors.
            let class = ds.schema().class_index();
            for point in ds.points() {
                assert_eq!(
                    tree.classify(point, ds.domains()),
                    point.code(class)
                );
            }
        }
    }

    #[test]
    fn pure_node_stays_a_leaf() {
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("color", AttributeKind::Discrete)])
                .unwrap();
        let mut domains = DomainTable::new(2);
        let points = vec![
            DataPoint::new(vec![
                domains.domain_mut(0).code_of("red"),
                domains.domain_mut(1).code_of("yes"),
            ]),
            DataPoint::new(vec![
                domains.domain_mut(0).code_of("blue"),
                domains.domain_mut(1).code_of("yes"),
            ]),
        ];
        let ds = Dataset::new(schema, domains, points).unwrap();
        for criterion in [
            SplitCriterion::Certainty,
            SplitCriterion::Entropy,
            SplitCriterion::Gini,
        ] {
            let fit = TreeConfig::new()
                .with_criterion(criterion)
                .fit(&ds)
                .unwrap();
            assert_eq!(fit.tree().len(), 1, "{criterion:?}");
        }
    }

    #[test]
    fn single_point_stays_a_leaf() {
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("color", AttributeKind::Discrete)])
                .unwrap();
        let mut domains = DomainTable::new(2);
        let points = vec![DataPoint::new(vec![
            domains.domain_mut(0).code_of("red"),
            domains.domain_mut(1).code_of("yes"),
        ])];
        let ds = Dataset::new(schema, domains, points).unwrap();
        let fit = TreeConfig::new().fit(&ds).unwrap();
        assert_eq!(fit.tree().len(), 1);
    }

    #[test]
    fn continuous_split_at_midpoint() {
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("x", AttributeKind::Continuous)])
                .unwrap();
        let mut domains = DomainTable::new(2);
        let rows = [(1.0, "no"), (2.0, "no"), (5.0, "yes"), (6.0, "yes")];
        let points = rows
            .iter()
            .map(|&(x, class)| {
                DataPoint::new(vec![
                    domains.domain_mut(0).code_of_number(x),
                    domains.domain_mut(1).code_of(class),
                ])
            })
            .collect();
        let ds = Dataset::new(schema, domains, points).unwrap();
        let fit = TreeConfig::new().fit(&ds).unwrap();
        let tree = fit.tree();
        assert_eq!(
            tree.node(tree.root()).split(),
            Some(Split::Continuous {
                attribute: 0,
                threshold: 3.5
            })
        );
        assert_conservation(tree);
        let class = ds.schema().class_index();
        for point in ds.points() {
            assert_eq!(
                tree.classify(point, ds.domains()),
                point.code(class)
            );
        }
    }

    #[test]
    fn one_sided_threshold_stops_decomposition() {
        // Adjacent representable values whose midpoint rounds up to the
        // larger one: every point lands in the ≤ child.
        let low = 1.0 + f64::EPSILON;
        let high = 1.0 + 2.0 * f64::EPSILON;
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("x", AttributeKind::Continuous)])
                .unwrap();
        let mut domains = DomainTable::new(2);
        let points = vec![
            DataPoint::new(vec![
                domains.domain_mut(0).code_of_number(low),
                domains.domain_mut(1).code_of("no"),
            ]),
            DataPoint::new(vec![
                domains.domain_mut(0).code_of_number(high),
                domains.domain_mut(1).code_of("yes"),
            ]),
        ];
        let ds = Dataset::new(schema, domains, points).unwrap();
        // Entropy accepts the degenerate candidate; Certainty would score
        // it zero and leave the root a leaf.
        let fit = TreeConfig::new()
            .with_criterion(SplitCriterion::Entropy)
            .fit(&ds)
            .unwrap();
        let tree = fit.tree();
        // Root plus the two attached children; the empty side is a leaf and
        // nothing recursed.
        assert_eq!(tree.len(), 3);
        let root = tree.node(tree.root());
        let below = tree.node(root.children()[0]);
        let above = tree.node(root.children()[1]);
        assert_eq!(below.n_samples(), 2);
        assert!(above.is_unpopulated());
        assert!(below.is_leaf());
    }

    #[test]
    fn discrete_attributes_not_reused_on_a_path() {
        // Color alone cannot separate; shape must be used below it, and
        // color must not appear again under itself.
        let schema = AttributeSchema::from_inputs(vec![
            Attribute::new("color", AttributeKind::Discrete),
            Attribute::new("shape", AttributeKind::Discrete),
        ])
        .unwrap();
        let mut domains = DomainTable::new(3);
        let rows = [
            ("red", "round", "yes"),
            ("red", "square", "no"),
            ("blue", "round", "no"),
            ("blue", "square", "yes"),
        ];
        let points = rows
            .iter()
            .map(|(color, shape, class)| {
                DataPoint::new(vec![
                    domains.domain_mut(0).code_of(color),
                    domains.domain_mut(1).code_of(shape),
                    domains.domain_mut(2).code_of(class),
                ])
            })
            .collect();
        let ds = Dataset::new(schema, domains, points).unwrap();
        let fit = TreeConfig::new()
            .with_criterion(SplitCriterion::Entropy)
            .fit(&ds)
            .unwrap();
        let tree = fit.tree();

        fn check_path(tree: &Tree, id: crate::node::NodeId, mut seen: Vec<usize>) {
            let node = tree.node(id);
            if let Some(split) = node.split() {
                assert!(
                    !seen.contains(&split.attribute()),
                    "attribute {} reused on a path",
                    split.attribute()
                );
                seen.push(split.attribute());
            }
            for &child in node.children() {
                check_path(tree, child, seen.clone());
            }
        }
        check_path(tree, tree.root(), Vec::new());

        // XOR data classifies perfectly with both attributes.
        let class = ds.schema().class_index();
        for point in ds.points() {
            assert_eq!(
                tree.classify(point, ds.domains()),
                point.code(class)
            );
        }
        assert_conservation(tree);
    }

    #[test]
    fn importances_record_every_split() {
        let ds = color_shape_dataset();
        let fit = TreeConfig::new().fit(&ds).unwrap();
        assert_eq!(fit.importances().len(), 1);
        assert_eq!(fit.importances()[0].attribute, 0);
        assert!((fit.importances()[0].score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_dataset_error() {
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("x", AttributeKind::Discrete)])
                .unwrap();
        let ds = Dataset::new(schema, DomainTable::new(2), vec![]).unwrap();
        assert!(TreeConfig::new().fit(&ds).is_err());
    }

    #[test]
    fn drawn_subsets_are_deterministic_and_distinct() {
        let schema = AttributeSchema::from_inputs(vec![
            Attribute::new("a", AttributeKind::Discrete),
            Attribute::new("b", AttributeKind::Ignore),
            Attribute::new("c", AttributeKind::Continuous),
            Attribute::new("d", AttributeKind::Discrete),
        ])
        .unwrap();
        let first = draw_attribute_subset(&schema, 2, 99);
        let second = draw_attribute_subset(&schema, 2, 99);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|&a| a != 1 && a < 4));
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn single_class_detection() {
        assert!(is_single_class(&[0, 3, 0]));
        assert!(is_single_class(&[0, 0, 0]));
        assert!(!is_single_class(&[1, 3, 0]));
    }

    #[test]
    fn inline_growth_matches_parallel_growth() {
        let ds = color_shape_dataset();
        let parallel = TreeConfig::new().fit(&ds).unwrap();
        let inline = TreeConfig::new().with_subtree_workers(0).fit(&ds).unwrap();
        assert_eq!(parallel.tree().len(), inline.tree().len());
        let class = ds.schema().class_index();
        for point in ds.points() {
            assert_eq!(
                parallel.tree().classify(point, ds.domains()),
                inline.tree().classify(point, ds.domains())
            );
            assert_eq!(
                inline.tree().classify(point, ds.domains()),
                point.code(class)
            );
        }
    }
}
