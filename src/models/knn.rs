use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{Classifier, ClassifierKind, argmax_class, check_classes, check_features};
use crate::error::ClassifierError;

/// Stored (already scaled) training samples with their labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnArtifact {
    pub classes: Vec<i64>,
    pub k: usize,
    pub samples: Vec<Vec<f64>>,
    pub labels: Vec<i64>,
}

/// Uniform-weight k-nearest-neighbours vote under Euclidean distance.
#[derive(Debug, Clone)]
pub struct KNearestNeighbors {
    classes: Vec<i64>,
    k: usize,
    samples: Array2<f64>,
    /// Index into `classes` for each sample.
    label_idx: Vec<usize>,
}

impl KNearestNeighbors {
    pub fn from_artifact(a: KnnArtifact) -> Result<Self, String> {
        check_classes(&a.classes)?;
        let n = a.samples.len();
        if a.labels.len() != n {
            return Err(format!("{} labels for {n} samples", a.labels.len()));
        }
        if a.k == 0 || a.k > n {
            return Err(format!("k must be between 1 and {n}, got {}", a.k));
        }
        let width = a.samples[0].len();
        if width == 0 || a.samples.iter().any(|s| s.len() != width) {
            return Err("samples must share one non-zero width".to_string());
        }

        let label_idx = a
            .labels
            .iter()
            .map(|l| {
                a.classes
                    .iter()
                    .position(|c| c == l)
                    .ok_or_else(|| format!("label {l} is not a declared class"))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let flat: Vec<f64> = a.samples.into_iter().flatten().collect();
        if flat.iter().any(|v| !v.is_finite()) {
            return Err("samples must be finite".to_string());
        }
        let samples = Array2::from_shape_vec((n, width), flat)
            .map_err(|e| format!("samples: {e}"))?;

        Ok(KNearestNeighbors {
            classes: a.classes,
            k: a.k,
            samples,
            label_idx,
        })
    }

    /// Neighbour share per class for one row. Distance ties keep sample order.
    fn vote(&self, row: ArrayView1<f64>) -> Vec<f64> {
        let mut dists: Vec<(f64, usize)> = self
            .samples
            .rows()
            .into_iter()
            .zip(&self.label_idx)
            .map(|(s, &li)| {
                let d: f64 = s.iter().zip(row.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (d, li)
            })
            .collect();
        dists.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut counts = vec![0.0; self.classes.len()];
        for (_, li) in dists.iter().take(self.k) {
            counts[*li] += 1.0;
        }
        counts.iter().map(|c| c / self.k as f64).collect()
    }
}

impl Classifier for KNearestNeighbors {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Knn
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.samples.ncols()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<i64>, ClassifierError> {
        check_features(self.n_features(), &x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| argmax_class(&self.classes, &self.vote(row)))
            .collect())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Result<Array2<f64>, ClassifierError>> {
        Some(check_features(self.n_features(), &x).map(|()| {
            let mut out = Array2::zeros((x.nrows(), self.classes.len()));
            for (i, row) in x.rows().into_iter().enumerate() {
                for (j, p) in self.vote(row).into_iter().enumerate() {
                    out[[i, j]] = p;
                }
            }
            out
        }))
    }
}
