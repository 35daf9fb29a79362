//! Pre-fitted model artifacts: the feature scaler and the classifiers.
//!
//! Nothing here fits a model. Artifacts are JSON documents exported by the
//! training side and loaded read-only by [`store::ModelStore`].

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

pub mod knn;
pub mod scaler;
pub mod store;
pub mod svm;
pub mod tree;

pub use scaler::Scaler;
pub use store::ModelStore;

// ---------------------------------------------------------------------------
// Classifier selector
// ---------------------------------------------------------------------------

/// Which algorithm variant to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, clap::ValueEnum)]
pub enum ClassifierKind {
    #[value(name = "decision-tree")]
    DecisionTree,
    #[value(name = "svm")]
    Svm,
    #[value(name = "knn")]
    Knn,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 3] = [
        ClassifierKind::DecisionTree,
        ClassifierKind::Svm,
        ClassifierKind::Knn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ClassifierKind::DecisionTree => "decision-tree",
            ClassifierKind::Svm => "svm",
            ClassifierKind::Knn => "knn",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "decision-tree" | "tree" | "dt" => Ok(ClassifierKind::DecisionTree),
            "svm" => Ok(ClassifierKind::Svm),
            "knn" => Ok(ClassifierKind::Knn),
            other => Err(format!(
                "unknown model '{other}' (decision-tree, svm, knn)"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier interface
// ---------------------------------------------------------------------------

/// A pre-fitted classifier. Implementations are immutable after load, so a
/// single instance can serve concurrent read-only callers.
pub trait Classifier: Send + Sync {
    fn kind(&self) -> ClassifierKind;

    /// Class labels in the column order of [`Classifier::predict_proba`].
    fn classes(&self) -> &[i64];

    fn n_features(&self) -> usize;

    /// One label per input row.
    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<i64>, ClassifierError>;

    /// Per-class probabilities, one row per input row, or `None` when the
    /// model cannot produce them.
    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Result<Array2<f64>, ClassifierError>>;
}

pub(crate) fn check_features(expected: usize, x: &ArrayView2<f64>) -> Result<(), ClassifierError> {
    if x.ncols() == expected {
        Ok(())
    } else {
        Err(ClassifierError::DimensionMismatch {
            expected,
            got: x.ncols(),
        })
    }
}

/// Label of the largest entry; the first class wins ties.
pub(crate) fn argmax_class(classes: &[i64], weights: &[f64]) -> i64 {
    let mut best = 0;
    for (i, w) in weights.iter().enumerate() {
        if *w > weights[best] {
            best = i;
        }
    }
    classes[best]
}

fn check_classes(classes: &[i64]) -> Result<(), String> {
    if classes.len() < 2 {
        return Err(format!("need at least two classes, got {}", classes.len()));
    }
    for (i, c) in classes.iter().enumerate() {
        if classes[..i].contains(c) {
            return Err(format!("duplicate class label {c}"));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// On-disk classifier artifact
// ---------------------------------------------------------------------------

/// A classifier document, tagged by algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    DecisionTree(tree::TreeArtifact),
    Svm(svm::SvmArtifact),
    Knn(knn::KnnArtifact),
}

impl ClassifierArtifact {
    pub fn kind(&self) -> ClassifierKind {
        match self {
            ClassifierArtifact::DecisionTree(_) => ClassifierKind::DecisionTree,
            ClassifierArtifact::Svm(_) => ClassifierKind::Svm,
            ClassifierArtifact::Knn(_) => ClassifierKind::Knn,
        }
    }

    /// Validate and build the runtime classifier.
    pub fn build(self) -> Result<Box<dyn Classifier>, String> {
        Ok(match self {
            ClassifierArtifact::DecisionTree(a) => Box::new(tree::DecisionTree::from_artifact(a)?),
            ClassifierArtifact::Svm(a) => Box::new(svm::SupportVectorClassifier::from_artifact(a)?),
            ClassifierArtifact::Knn(a) => Box::new(knn::KNearestNeighbors::from_artifact(a)?),
        })
    }
}
