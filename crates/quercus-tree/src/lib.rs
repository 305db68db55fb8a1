//! Decision tree and random forest induction over integer-coded tabular
//! data.
//!
//! Provides ID3-style recursive decomposition with three interchangeable
//! split criteria (Certainty, Entropy, Gini), native continuous-attribute
//! thresholds, random forest ensembles with per-node feature subsampling,
//! 10-fold cross-validation, missing-value imputation, and gzip-compressed
//! model persistence. Subtree fan-out, forest trees and validation folds
//! each parallelize via rayon.

mod dataset;
mod domain;
mod error;
mod forest;
mod grow;
mod importance;
mod impute;
mod node;
mod probability;
mod report;
mod schema;
mod scheduler;
mod serialize;
mod split;
mod validate;

pub use dataset::{DataPoint, Dataset};
pub use domain::{Domain, DomainTable, MISSING};
pub use error::TreeError;
pub use forest::{Forest, ForestConfig, ForestFit};
pub use grow::{TreeConfig, TreeFit};
pub use importance::AttributeImportance;
pub use impute::{ImputationTables, compute as compute_imputation, impute_missing};
pub use node::{Node, NodeId, Split, Tree};
pub use probability::{Probabilities, ProbabilityTables, compute as compute_probabilities};
pub use report::{ClassTally, EvaluationReport, evaluate_forest, evaluate_tree};
pub use schema::{Attribute, AttributeKind, AttributeSchema};
pub use scheduler::{SpawnGate, SpawnPermit};
pub use serialize::{Model, ModelKind};
pub use split::{SplitCriterion, class_certainty};
pub use validate::{CrossValidation, CrossValidationResult, FOLD_COUNT};
