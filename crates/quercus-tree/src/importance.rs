//! Attribute-importance accumulation across decomposition workers.

/// One decomposition event: the attribute chosen for a split, the raw
/// criterion score it earned, and the class-certainty baseline of the
/// invocation's root population for comparison.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct AttributeImportance {
    /// Index of the decomposition attribute.
    pub attribute: usize,
    /// Raw split score recorded on the node.
    pub score: f64,
    /// Class-certainty baseline of the root population.
    pub baseline: f64,
}

/// Attach the baseline to raw `(attribute, score)` records and sort them
/// by score, best first.
#[must_use]
pub(crate) fn rank(records: Vec<(usize, f64)>, baseline: f64) -> Vec<AttributeImportance> {
    let mut ranked: Vec<AttributeImportance> = records
        .into_iter()
        .map(|(attribute, score)| AttributeImportance {
            attribute,
            score,
            baseline,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}
