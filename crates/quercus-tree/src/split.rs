//! Split-quality criteria: Certainty, Entropy and Gini scoring for discrete
//! and continuous attributes.

use std::collections::HashMap;

use crate::dataset::Dataset;
use crate::probability::ProbabilityTables;
use crate::schema::AttributeKind;

/// Criterion for measuring the quality of a split.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq,
    serde::Serialize, serde::Deserialize,
)]
pub enum SplitCriterion {
    /// Σ│P(v,c) − P(v)/|classes|│ — higher is better.
    Certainty,
    /// Σ P(v) · (−Σ P(c|v)·ln P(c|v)) — lower is better.
    Entropy,
    /// Σ P(v) · (1 − Σ P(c|v)²) — lower is better.
    Gini,
}

/// The score an attribute earned for a data subset, with the chosen
/// threshold when the attribute is continuous.
#[derive(Debug, Clone, Copy)]
pub struct AttributeScore {
    /// Raw criterion score.
    pub score: f64,
    /// Winning threshold for a continuous attribute.
    pub threshold: Option<f64>,
}

impl SplitCriterion {
    /// Return `true` when `candidate` beats `incumbent` under this
    /// criterion. Strict comparison: the first attribute to reach a score
    /// keeps it on ties.
    #[must_use]
    pub fn prefers(self, candidate: f64, incumbent: f64) -> bool {
        match self {
            SplitCriterion::Certainty => candidate > incumbent,
            SplitCriterion::Entropy | SplitCriterion::Gini => candidate < incumbent,
        }
    }

    /// Score `attribute` over the subset selected by `rows`.
    ///
    /// Returns `None` when the attribute yields no usable score: a
    /// continuous attribute with no threshold candidates, or a Certainty
    /// score of exactly zero.
    #[must_use]
    pub(crate) fn score(
        self,
        dataset: &Dataset,
        rows: &[usize],
        attribute: usize,
        tables: &ProbabilityTables,
    ) -> Option<AttributeScore> {
        if rows.is_empty() {
            return None;
        }
        match dataset.schema().kind(attribute) {
            AttributeKind::Discrete => self.score_discrete(dataset, attribute, tables),
            AttributeKind::Continuous => self.score_continuous(dataset, rows, attribute),
            AttributeKind::Ignore => None,
        }
    }

    fn score_discrete(
        self,
        dataset: &Dataset,
        attribute: usize,
        tables: &ProbabilityTables,
    ) -> Option<AttributeScore> {
        let table = tables.attribute(attribute)?;
        let n_classes = dataset.n_classes();
        let score = match self {
            SplitCriterion::Certainty => {
                let mut total = 0.0;
                for (code, &p_value) in table.value.iter().enumerate() {
                    for class in 0..n_classes {
                        total += (table.joint[code][class] - p_value / n_classes as f64).abs();
                    }
                }
                total
            }
            SplitCriterion::Entropy => {
                let mut total = 0.0;
                for (code, &p_value) in table.value.iter().enumerate() {
                    let mut h = 0.0;
                    for class in 0..n_classes {
                        let p = table.conditional[code][class];
                        if p != 0.0 {
                            h += -p * p.ln();
                        }
                    }
                    total += p_value * h;
                }
                total
            }
            SplitCriterion::Gini => {
                let mut total = 0.0;
                for (code, &p_value) in table.value.iter().enumerate() {
                    let mut sum_sq = 0.0;
                    for class in 0..n_classes {
                        let p = table.conditional[code][class];
                        sum_sq += p * p;
                    }
                    total += p_value * (1.0 - sum_sq);
                }
                total
            }
        };
        if self == SplitCriterion::Certainty && score == 0.0 {
            return None;
        }
        Some(AttributeScore {
            score,
            threshold: None,
        })
    }

    fn score_continuous(
        self,
        dataset: &Dataset,
        rows: &[usize],
        attribute: usize,
    ) -> Option<AttributeScore> {
        let n_classes = dataset.n_classes();
        let candidates = candidate_thresholds(dataset, rows, attribute);
        if candidates.is_empty() {
            return None;
        }
        let candidates = keep_median_candidates(candidates);

        // One pass over the subset accumulates below/above totals and
        // per-class counts for every retained candidate.
        let mut tallies: Vec<ThresholdTally> = candidates
            .into_iter()
            .map(|threshold| ThresholdTally::new(threshold, n_classes))
            .collect();
        let domain = dataset.domains().domain(attribute);
        let class_index = dataset.schema().class_index();
        let mut n = 0usize;
        for &row in rows {
            let point = &dataset.points()[row];
            let Some(value) = domain.number_of(point.code(attribute)) else {
                continue;
            };
            n += 1;
            let class = point.code(class_index);
            for tally in tallies.iter_mut() {
                if value <= tally.threshold {
                    tally.below += 1;
                    tally.class_below[class] += 1;
                } else {
                    tally.above += 1;
                    tally.class_above[class] += 1;
                }
            }
        }

        let mut best: Option<AttributeScore> = None;
        for tally in &tallies {
            let score = self.combine(tally, n, n_classes);
            let better = match best {
                None => self != SplitCriterion::Certainty || score > 0.0,
                Some(incumbent) => self.prefers(score, incumbent.score),
            };
            if better {
                best = Some(AttributeScore {
                    score,
                    threshold: Some(tally.threshold),
                });
            }
        }
        best
    }

    /// Combine one candidate's below/above counts into a criterion score.
    fn combine(self, tally: &ThresholdTally, n: usize, n_classes: usize) -> f64 {
        let n = n as f64;
        let p_below = tally.below as f64 / n;
        let p_above = tally.above as f64 / n;
        match self {
            SplitCriterion::Certainty => {
                let mut below = 0.0;
                let mut above = 0.0;
                for class in 0..n_classes {
                    let joint_below = tally.class_below[class] as f64 / n;
                    let joint_above = tally.class_above[class] as f64 / n;
                    below += (joint_below - p_below / n_classes as f64).abs();
                    above += (joint_above - p_above / n_classes as f64).abs();
                }
                below + above
            }
            SplitCriterion::Entropy => {
                let mut h_below = 0.0;
                let mut h_above = 0.0;
                for class in 0..n_classes {
                    let joint_below = tally.class_below[class] as f64 / n;
                    let joint_above = tally.class_above[class] as f64 / n;
                    if joint_below != 0.0 && p_below != 0.0 {
                        let p = joint_below / p_below;
                        h_below += -p * p.ln();
                    }
                    if joint_above != 0.0 && p_above != 0.0 {
                        let p = joint_above / p_above;
                        h_above += -p * p.ln();
                    }
                }
                h_below * p_below + h_above * p_above
            }
            SplitCriterion::Gini => {
                let mut sq_below = 0.0;
                let mut sq_above = 0.0;
                for class in 0..n_classes {
                    if p_below != 0.0 {
                        let p = tally.class_below[class] as f64 / n / p_below;
                        sq_below += p * p;
                    }
                    if p_above != 0.0 {
                        let p = tally.class_above[class] as f64 / n / p_above;
                        sq_above += p * p;
                    }
                }
                (1.0 - sq_below) * p_below + (1.0 - sq_above) * p_above
            }
        }
    }
}

/// Running counts for one candidate threshold.
struct ThresholdTally {
    threshold: f64,
    below: usize,
    above: usize,
    class_below: Vec<usize>,
    class_above: Vec<usize>,
}

impl ThresholdTally {
    fn new(threshold: f64, n_classes: usize) -> Self {
        Self {
            threshold,
            below: 0,
            above: 0,
            class_below: vec![0; n_classes],
            class_above: vec![0; n_classes],
        }
    }
}

/// The class situation of one distinct attribute value: the class it maps
/// to and whether that mapping is unambiguous within the subset.
#[derive(Clone, Copy)]
struct ValueClass {
    class: usize,
    pure: bool,
}

/// Build the candidate thresholds for a continuous attribute: the midpoints
/// between consecutive distinct values where the class changes or either
/// side is impure.
fn candidate_thresholds(dataset: &Dataset, rows: &[usize], attribute: usize) -> Vec<f64> {
    let domain = dataset.domains().domain(attribute);
    let class_index = dataset.schema().class_index();

    let mut by_code: HashMap<usize, ValueClass> = HashMap::new();
    for &row in rows {
        let point = &dataset.points()[row];
        let code = point.code(attribute);
        if domain.number_of(code).is_none() {
            continue;
        }
        let class = point.code(class_index);
        by_code
            .entry(code)
            .and_modify(|entry| {
                if entry.class != class && entry.pure {
                    *entry = ValueClass { class, pure: false };
                }
            })
            .or_insert(ValueClass { class, pure: true });
    }

    let mut values: Vec<(f64, ValueClass)> = by_code
        .into_iter()
        .map(|(code, vc)| (domain.number_of(code).unwrap_or(f64::NAN), vc))
        .collect();
    values.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut thresholds = Vec::new();
    for pair in values.windows(2) {
        let (value, left) = pair[0];
        let (next, right) = pair[1];
        if right.class != left.class || !right.pure || !left.pure {
            thresholds.push((value + next) / 2.0);
        }
    }
    thresholds
}

/// Reduce the candidate list to the one (odd count) or two (even count)
/// thresholds nearest the median index. Scoring every candidate is far more
/// expensive and rarely changes the chosen split.
fn keep_median_candidates(thresholds: Vec<f64>) -> Vec<f64> {
    let center = thresholds.len() / 2;
    if thresholds.len() % 2 != 0 {
        vec![thresholds[center]]
    } else {
        vec![thresholds[center], thresholds[center - 1]]
    }
}

/// The class-certainty baseline of a population: Σ│P(c) − 1/|classes|│.
///
/// Reported alongside attribute importances so a split score can be read
/// against how skewed the class distribution already was.
#[must_use]
pub fn class_certainty(dataset: &Dataset, rows: &[usize]) -> f64 {
    let n = rows.len();
    if n == 0 {
        return 0.0;
    }
    let frequencies = dataset.class_frequencies(rows);
    let n_classes = frequencies.len();
    frequencies
        .iter()
        .map(|&f| (f as f64 / n as f64 - 1.0 / n_classes as f64).abs())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{SplitCriterion, candidate_thresholds, class_certainty, keep_median_candidates};
    use crate::dataset::{DataPoint, Dataset};
    use crate::domain::DomainTable;
    use crate::probability;
    use crate::schema::{Attribute, AttributeKind, AttributeSchema};

    /// Two discrete inputs; Color separates the classes perfectly, Shape
    /// not at all.
    fn discrete_dataset() -> Dataset {
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

    /// One continuous input: 1→no, 2→no, 5→yes, 6→yes.
    fn continuous_dataset() -> Dataset {
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
        Dataset::new(schema, domains, points).unwrap()
    }

    #[test]
    fn certainty_prefers_the_separating_attribute() {
        let ds = discrete_dataset();
        let rows: Vec<usize> = (0..4).collect();
        let tables = probability::compute(&ds, &rows);
        let color = SplitCriterion::Certainty
            .score(&ds, &rows, 0, &tables)
            .unwrap();
        // Perfect separation: each (v, c) cell is |1/2 − 1/4| and there are
        // four cells, so the total is 1.0.
        assert!((color.score - 1.0).abs() < 1e-12);
        // Shape tells nothing: every cell cancels exactly, score 0 → None.
        assert!(SplitCriterion::Certainty.score(&ds, &rows, 1, &tables).is_none());
    }

    #[test]
    fn entropy_is_zero_for_the_separating_attribute() {
        let ds = discrete_dataset();
        let rows: Vec<usize> = (0..4).collect();
        let tables = probability::compute(&ds, &rows);
        let color = SplitCriterion::Entropy
            .score(&ds, &rows, 0, &tables)
            .unwrap();
        assert!(color.score.abs() < 1e-12);
        let shape = SplitCriterion::Entropy
            .score(&ds, &rows, 1, &tables)
            .unwrap();
        assert!((shape.score - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn gini_matches_hand_computation() {
        let ds = discrete_dataset();
        let rows: Vec<usize> = (0..4).collect();
        let tables = probability::compute(&ds, &rows);
        let color = SplitCriterion::Gini.score(&ds, &rows, 0, &tables).unwrap();
        assert!(color.score.abs() < 1e-12);
        let shape = SplitCriterion::Gini.score(&ds, &rows, 1, &tables).unwrap();
        assert!((shape.score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_class_change_yields_the_midpoint() {
        let ds = continuous_dataset();
        let rows: Vec<usize> = (0..4).collect();
        let thresholds = candidate_thresholds(&ds, &rows, 0);
        assert_eq!(thresholds, vec![3.5]);
        for criterion in [
            SplitCriterion::Certainty,
            SplitCriterion::Entropy,
            SplitCriterion::Gini,
        ] {
            let tables = probability::compute(&ds, &rows);
            let score = criterion.score(&ds, &rows, 0, &tables).unwrap();
            assert_eq!(score.threshold, Some(3.5), "{criterion:?}");
        }
    }

    #[test]
    fn pure_single_value_has_no_candidates() {
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("x", AttributeKind::Continuous)])
                .unwrap();
        let mut domains = DomainTable::new(2);
        let points = vec![
            DataPoint::new(vec![
                domains.domain_mut(0).code_of_number(1.0),
                domains.domain_mut(1).code_of("yes"),
            ]),
            DataPoint::new(vec![
                domains.domain_mut(0).code_of_number(1.0),
                domains.domain_mut(1).code_of("yes"),
            ]),
        ];
        let ds = Dataset::new(schema, domains, points).unwrap();
        let rows: Vec<usize> = (0..2).collect();
        let tables = probability::compute(&ds, &rows);
        assert!(candidate_thresholds(&ds, &rows, 0).is_empty());
        for criterion in [
            SplitCriterion::Certainty,
            SplitCriterion::Entropy,
            SplitCriterion::Gini,
        ] {
            assert!(criterion.score(&ds, &rows, 0, &tables).is_none());
        }
    }

    #[test]
    fn impure_value_creates_candidates_on_both_sides() {
        let schema =
            AttributeSchema::from_inputs(vec![Attribute::new("x", AttributeKind::Continuous)])
                .unwrap();
        let mut domains = DomainTable::new(2);
        let rows = [(1.0, "no"), (2.0, "yes"), (2.0, "no"), (3.0, "no")];
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
        let rows: Vec<usize> = (0..4).collect();
        // The value 2 maps to both classes, so both adjacent midpoints are
        // candidates even though the surrounding classes agree.
        assert_eq!(candidate_thresholds(&ds, &rows, 0), vec![1.5, 2.5]);
    }

    #[test]
    fn median_reduction_keeps_one_or_two() {
        assert_eq!(keep_median_candidates(vec![1.0]), vec![1.0]);
        assert_eq!(keep_median_candidates(vec![1.0, 2.0, 3.0]), vec![2.0]);
        // Even count: center then center-1, in that order.
        assert_eq!(keep_median_candidates(vec![1.0, 2.0, 3.0, 4.0]), vec![3.0, 2.0]);
    }

    #[test]
    fn class_certainty_baseline() {
        let ds = discrete_dataset();
        let rows: Vec<usize> = (0..4).collect();
        // Balanced two-class population: |1/2 − 1/2| twice.
        assert!(class_certainty(&ds, &rows).abs() < 1e-12);
        // Skewed subset: three of one class over rows {0,1,2}.
        let skewed = class_certainty(&ds, &[0, 1, 2]);
        assert!((skewed - (2.0f64 / 3.0 - 0.5).abs() * 2.0).abs() < 1e-12);
    }
}
