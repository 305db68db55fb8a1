//! Missing-value imputation: per-attribute means and most-common values.

use crate::dataset::Dataset;
use crate::domain::MISSING;
use crate::schema::AttributeKind;

/// Per-attribute imputation values computed from the training set.
///
/// `means` holds the mean of the decoded values for continuous attributes;
/// `most_common` holds the highest-frequency code for discrete attributes.
/// Slots for attributes of the other kind (and ignored ones) stay zero.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ImputationTables {
    means: Vec<f64>,
    most_common: Vec<usize>,
}

impl ImputationTables {
    /// Return the mean for a continuous attribute.
    #[must_use]
    pub fn mean(&self, attribute: usize) -> f64 {
        self.means[attribute]
    }

    /// Return the most common code for a discrete attribute.
    #[must_use]
    pub fn most_common(&self, attribute: usize) -> usize {
        self.most_common[attribute]
    }
}

/// Compute imputation tables over the training points.
#[must_use]
pub fn compute(dataset: &Dataset) -> ImputationTables {
    let schema = dataset.schema();
    let class = schema.class_index();
    let mut means = vec![0.0; class];
    let mut most_common = vec![0usize; class];

    for attribute in 0..class {
        match schema.kind(attribute) {
            AttributeKind::Continuous => means[attribute] = mean_value(dataset, attribute),
            AttributeKind::Discrete => {
                most_common[attribute] = most_common_value(dataset, attribute);
            }
            AttributeKind::Ignore => {}
        }
    }
    ImputationTables { means, most_common }
}

/// Mean of the decoded values, skipping entries that are not numeric
/// (the missing sentinel before imputation).
fn mean_value(dataset: &Dataset, attribute: usize) -> f64 {
    let domain = dataset.domains().domain(attribute);
    let mut sum = 0.0;
    let mut count = 0usize;
    for point in dataset.points() {
        if let Some(value) = domain.number_of(point.code(attribute)) {
            sum += value;
            count += 1;
        }
    }
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Highest-frequency code, the missing sentinel excluded; first wins ties.
fn most_common_value(dataset: &Dataset, attribute: usize) -> usize {
    let domain = dataset.domains().domain(attribute);
    let mut frequencies = vec![0usize; domain.len()];
    for point in dataset.points() {
        frequencies[point.code(attribute)] += 1;
    }
    let mut best = 0usize;
    let mut best_count = 0usize;
    for (code, &count) in frequencies.iter().enumerate() {
        if domain.value_of(code) == Some(MISSING) {
            continue;
        }
        if count > best_count {
            best_count = count;
            best = code;
        }
    }
    best
}

/// Rewrite every missing-sentinel domain entry to its imputation value.
///
/// Already-encoded points keep their codes; a code that used to decode to
/// the sentinel decodes to the mean (continuous) or the most-common raw
/// value (discrete) afterwards.
pub fn impute_missing(dataset: &mut Dataset, tables: &ImputationTables) {
    let class = dataset.schema().class_index();
    for attribute in 0..class {
        let kind = dataset.schema().kind(attribute);
        let domain = dataset.domains_mut().domain_mut(attribute);
        let Some(missing_code) = domain.code_for(MISSING) else {
            continue;
        };
        match kind {
            AttributeKind::Continuous => {
                let mean = tables.mean(attribute);
                domain.rewrite(missing_code, mean.to_string(), Some(mean));
            }
            AttributeKind::Discrete => {
                let replacement = domain
                    .value_of(tables.most_common(attribute))
                    .unwrap_or(MISSING)
                    .to_string();
                domain.rewrite(missing_code, replacement, None);
            }
            AttributeKind::Ignore => {}
        }
    }
}
