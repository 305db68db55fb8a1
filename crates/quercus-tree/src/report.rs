//! Train/test evaluation: error counts and per-class tallies.

use crate::dataset::{DataPoint, Dataset};
use crate::forest::Forest;
use crate::node::Tree;

/// Misclassification tallies for one class.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClassTally {
    /// The class code.
    pub class: usize,
    /// Points of other classes predicted as this class.
    pub false_positives: usize,
    /// Points of this class predicted as another class.
    pub false_negatives: usize,
}

/// Evaluation of a model over one data partition.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EvaluationReport {
    /// Number of points evaluated.
    pub total: usize,
    /// Correct predictions.
    pub correct: usize,
    /// Incorrect predictions.
    pub errors: usize,
    /// Incorrect predictions as a percentage of `total`.
    pub error_rate: f64,
    /// Per-class false positive/negative counts.
    pub per_class: Vec<ClassTally>,
}

/// Evaluate a single tree over `points`.
#[must_use]
pub fn evaluate_tree(tree: &Tree, dataset: &Dataset, points: &[DataPoint]) -> EvaluationReport {
    evaluate(dataset, points, |point| {
        tree.classify(point, dataset.domains())
    })
}

/// Evaluate a forest over `points`.
#[must_use]
pub fn evaluate_forest(
    forest: &Forest,
    dataset: &Dataset,
    points: &[DataPoint],
) -> EvaluationReport {
    evaluate(dataset, points, |point| {
        forest.classify(point, dataset.domains())
    })
}

fn evaluate(
    dataset: &Dataset,
    points: &[DataPoint],
    predict: impl Fn(&DataPoint) -> usize,
) -> EvaluationReport {
    let class_index = dataset.schema().class_index();
    let n_classes = dataset.n_classes();
    let mut false_positives = vec![0usize; n_classes];
    let mut false_negatives = vec![0usize; n_classes];
    let mut errors = 0usize;

    for point in points {
        let actual = point.code(class_index);
        let predicted = predict(point);
        if predicted != actual {
            errors += 1;
            false_negatives[actual] += 1;
            if predicted < n_classes {
                false_positives[predicted] += 1;
            }
        }
    }

    let total = points.len();
    let error_rate = if total == 0 {
        0.0
    } else {
        errors as f64 * 100.0 / total as f64
    };
    EvaluationReport {
        total,
        correct: total - errors,
        errors,
        error_rate,
        per_class: (0..n_classes)
            .map(|class| ClassTally {
                class,
                false_positives: false_positives[class],
                false_negatives: false_negatives[class],
            })
            .collect(),
    }
}
