use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{Classifier, ClassifierKind, check_classes, check_features};
use crate::error::ClassifierError;

/// Kernel function and its hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    Linear,
    Rbf { gamma: f64 },
    Poly { gamma: f64, coef0: f64, degree: i32 },
}

impl Kernel {
    fn eval(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            Kernel::Linear => a.dot(&b),
            Kernel::Rbf { gamma } => {
                let dist2: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
                (-gamma * dist2).exp()
            }
            Kernel::Poly {
                gamma,
                coef0,
                degree,
            } => (gamma * a.dot(&b) + coef0).powi(*degree),
        }
    }
}

/// Binary support-vector classifier document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmArtifact {
    /// Exactly two labels; a positive decision value selects `classes[1]`.
    pub classes: Vec<i64>,
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coef: Vec<f64>,
    pub intercept: f64,
    /// Platt scaling; both present or both absent.
    #[serde(default)]
    pub prob_a: Option<f64>,
    #[serde(default)]
    pub prob_b: Option<f64>,
}

/// A fitted binary SVM.
#[derive(Debug, Clone)]
pub struct SupportVectorClassifier {
    classes: Vec<i64>,
    kernel: Kernel,
    support_vectors: Array2<f64>,
    dual_coef: Vec<f64>,
    intercept: f64,
    platt: Option<(f64, f64)>,
}

impl SupportVectorClassifier {
    pub fn from_artifact(a: SvmArtifact) -> Result<Self, String> {
        check_classes(&a.classes)?;
        if a.classes.len() != 2 {
            return Err(format!(
                "only binary SVMs are supported, got {} classes",
                a.classes.len()
            ));
        }
        let n_sv = a.support_vectors.len();
        if n_sv == 0 {
            return Err("no support vectors".to_string());
        }
        if a.dual_coef.len() != n_sv {
            return Err(format!(
                "{} dual coefficients for {n_sv} support vectors",
                a.dual_coef.len()
            ));
        }
        let width = a.support_vectors[0].len();
        if width == 0 || a.support_vectors.iter().any(|sv| sv.len() != width) {
            return Err("support vectors must share one non-zero width".to_string());
        }
        let flat: Vec<f64> = a.support_vectors.into_iter().flatten().collect();
        if flat
            .iter()
            .chain(&a.dual_coef)
            .chain(std::iter::once(&a.intercept))
            .any(|v| !v.is_finite())
        {
            return Err("SVM parameters must be finite".to_string());
        }
        let support_vectors = Array2::from_shape_vec((n_sv, width), flat)
            .map_err(|e| format!("support vectors: {e}"))?;

        let platt = match (a.prob_a, a.prob_b) {
            (Some(pa), Some(pb)) => Some((pa, pb)),
            (None, None) => None,
            _ => return Err("prob_a and prob_b must be given together".to_string()),
        };

        Ok(SupportVectorClassifier {
            classes: a.classes,
            kernel: a.kernel,
            support_vectors,
            dual_coef: a.dual_coef,
            intercept: a.intercept,
            platt,
        })
    }

    /// Signed distance to the separating surface.
    pub fn decision_function(&self, row: ArrayView1<f64>) -> f64 {
        self.support_vectors
            .rows()
            .into_iter()
            .zip(&self.dual_coef)
            .map(|(sv, c)| c * self.kernel.eval(sv, row))
            .sum::<f64>()
            + self.intercept
    }

    fn decisions(&self, x: &ArrayView2<f64>) -> Result<Vec<f64>, ClassifierError> {
        check_features(self.support_vectors.ncols(), x)?;
        let values: Vec<f64> = x.rows().into_iter().map(|r| self.decision_function(r)).collect();
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::Numerical(
                "decision value overflowed".to_string(),
            ));
        }
        Ok(values)
    }
}

impl Classifier for SupportVectorClassifier {
    fn kind(&self) -> ClassifierKind {
        ClassifierKind::Svm
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.support_vectors.ncols()
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<i64>, ClassifierError> {
        Ok(self
            .decisions(&x)?
            .into_iter()
            .map(|f| if f > 0.0 { self.classes[1] } else { self.classes[0] })
            .collect())
    }

    fn predict_proba(&self, x: ArrayView2<f64>) -> Option<Result<Array2<f64>, ClassifierError>> {
        let (pa, pb) = self.platt?;
        Some(self.decisions(&x).map(|values| {
            let mut out = Array2::zeros((values.len(), 2));
            for (i, f) in values.iter().enumerate() {
                let p1 = 1.0 / (1.0 + (pa * f + pb).exp());
                out[[i, 0]] = 1.0 - p1;
                out[[i, 1]] = p1;
            }
            out
        }))
    }
}
