use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{Classifier, ClassifierKind, argmax_class, check_classes, check_features};
use crate::error::ClassifierError;

/// Leaf marker in `children_left` / `children_right`.
pub const LEAF: i64 = -1;

/// Flattened binary tree, one entry per node in each array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub classes: Vec<i64>,
    pub n_features: usize,
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-class sample weight reaching each node.
    pub value: Vec<Vec<f64>>,
}

/// A fitted decision-tree classifier.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    classes: Vec<i64>,
    n_features: usize,
    nodes: Vec<Node>,
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        proba: Vec<f64>,
    },
}

impl DecisionTree {
    pub fn from_artifact(a: TreeArtifact) -> Result<Self, String> {
        check_classes(&a.classes)?;
        let n = a.children_left.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        for (name, len) in [
            ("children_right", a.children_right.len()),
            ("feature", a.feature.len()),
            ("threshold", a.threshold.len()),
            ("value", a.value.len()),
        ] {
            if len != n {
                return Err(format!("{name} has {len} entries, expected {n}"));
            }
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (left, right) = (a.children_left[i], a.children_right[i]);
            if left == LEAF || right == LEAF {
                if left != right {
                    return Err(format!("node {i} has only one child"));
                }
                nodes.push(Node::Leaf {
                    proba: normalize(&a.value[i], a.classes.len())
                        .map_err(|e| format!("node {i}: {e}"))?,
                });
                continue;
            }

            let child = |c: i64| -> Result<usize, String> {
                // Children always come after their parent in the flattened layout.
                if c <= i as i64 || c >= n as i64 {
                    Err(format!("node {i} has invalid child {c}"))
                } else {
                    Ok(c as usize)
                }
            };
            let feature = a.feature[i];
            if feature < 0 || feature >= a.n_features as i64 {
                return Err(format!("node {i} splits on unknown feature {feature}"));
            }
            if !a.threshold[i].is_finite() {
                return Err(format!("node {i} has a non-finite threshold"));
            }
            nodes.push(Node::Split {
                feature: feature as usize,
                threshold: a.threshold[i],
                left: child(left)?,
                right: child(right)?,
            });
        }

        Ok(DecisionTree {
            classes: a.classes,
            n_features: a.n_features,
            nodes,
        })
    }

    fn leaf_proba(&self, row: ArrayView1<f64>) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { proba } => return proba,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

fn normalize(weights: &[f64], n_classes: usize) -> Result<Vec<f64>, String> {
    if weights.len() != n_classes {
        return Err(format!(
            "{} class weights for {n_classes} classes",
            weights.len()
        ));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err("class weights must be finite and non-negative".to_string());
    }
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err("leaf has zero total weight".to_string());
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

impl Classifier for DecisionTree {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::DecisionTree
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<i64>, ClassifierError> {
        check_features(self.n_features, &x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| argmax_class(&self.classes, self.leaf_proba(row)))
            .collect())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Result<Array2<f64>, ClassifierError>> {
        Some(check_features(self.n_features, &x).map(|()| {
            let mut out = Array2::zeros((x.nrows(), self.classes.len()));
            for (i, row) in x.rows().into_iter().enumerate() {
                for (j, p) in self.leaf_proba(row).iter().enumerate() {
                    out[[i, j]] = *p;
                }
            }
            out
        }))
    }
}
