//! Single-pass probability tables for one data subset.

use crate::dataset::Dataset;
use crate::schema::AttributeKind;

/// The three probability views for one attribute over a data subset.
///
/// Indexed by value code (outer) and class code (inner). Conditional
/// probabilities are defined as zero for values with no occurrences in the
/// subset, so no `NaN` ever leaves this module.
#[derive(Debug, Clone)]
pub struct Probabilities {
    /// P(attribute = v).
    pub value: Vec<f64>,
    /// P(attribute = v ∧ class = c).
    pub joint: Vec<Vec<f64>>,
    /// P(class = c | attribute = v).
    pub conditional: Vec<Vec<f64>>,
}

/// Per-attribute probability tables; `None` for ignored attributes and the
/// class attribute itself.
#[derive(Debug)]
pub struct ProbabilityTables {
    per_attribute: Vec<Option<Probabilities>>,
}

impl ProbabilityTables {
    /// Return the table for `attribute`, if one was computed.
    #[must_use]
    pub fn attribute(&self, attribute: usize) -> Option<&Probabilities> {
        self.per_attribute.get(attribute).and_then(Option::as_ref)
    }
}

/// Compute all per-attribute tables for the subset selected by `rows`.
///
/// One counting pass over the subset, then a normalization pass dividing by
/// the subset size.
#[must_use]
pub fn compute(dataset: &Dataset, rows: &[usize]) -> ProbabilityTables {
    let schema = dataset.schema();
    let class = schema.class_index();
    let n_classes = dataset.n_classes();
    let n = rows.len() as f64;

    let mut per_attribute: Vec<Option<Probabilities>> = (0..class)
        .map(|attribute| {
            if schema.kind(attribute) == AttributeKind::Ignore {
                return None;
            }
            let n_values = dataset.domains().domain(attribute).len();
            Some(Probabilities {
                value: vec![0.0; n_values],
                joint: vec![vec![0.0; n_classes]; n_values],
                conditional: vec![vec![0.0; n_classes]; n_values],
            })
        })
        .collect();

    // Counting pass.
    for &row in rows {
        let point = &dataset.points()[row];
        let class_code = point.code(class);
        for (attribute, table) in per_attribute.iter_mut().enumerate() {
            let Some(table) = table else { continue };
            let code = point.code(attribute);
            table.value[code] += 1.0;
            table.joint[code][class_code] += 1.0;
        }
    }

    // Normalize and derive conditionals, guarding empty values.
    for table in per_attribute.iter_mut().flatten() {
        for v in table.value.iter_mut() {
            *v /= n;
        }
        for joint_row in table.joint.iter_mut() {
            for j in joint_row.iter_mut() {
                *j /= n;
            }
        }
        for (code, conditional_row) in table.conditional.iter_mut().enumerate() {
            let p_value = table.value[code];
            for (class_code, c) in conditional_row.iter_mut().enumerate() {
                *c = if p_value == 0.0 {
                    0.0
                } else {
                    table.joint[code][class_code] / p_value
                };
            }
        }
    }

    ProbabilityTables { per_attribute }
}
