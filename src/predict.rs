use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};

use ndarray::ArrayView2;
use serde::Serialize;

use crate::error::{InferenceError, ModelUnavailableError};
use crate::models::{Classifier, ClassifierKind, ModelStore};

/// Label value of the "equipment will fail" class.
pub const FAILURE_CLASS: i64 = 1;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Display label: `0` is safe, anything else is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Safe,
    Failure,
}

impl Label {
    pub fn from_class(class: i64) -> Self {
        if class == 0 { Label::Safe } else { Label::Failure }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Safe => f.write_str("SAFE"),
            Label::Failure => f.write_str("FAILURE"),
        }
    }
}

/// Certainty in the predicted class, in percent.
pub fn confidence_pct(label: Label, failure_probability: f64) -> f64 {
    match label {
        Label::Safe => 100.0 - failure_probability * 100.0,
        Label::Failure => failure_probability * 100.0,
    }
}

/// Round to two decimals for display.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One row's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: Label,
    pub failure_probability: f64,
    /// `false` when the classifier could not supply probabilities and
    /// `failure_probability` is the `0` placeholder.
    pub probability_available: bool,
}

impl PredictionResult {
    /// Failure probability in percent, `None` when the classifier gave none.
    pub fn failure_probability_pct(&self) -> Option<f64> {
        self.probability_available
            .then(|| self.failure_probability * 100.0)
    }

    /// Confidence in percent, `None` when the classifier gave no
    /// probabilities. The `0` placeholder never turns into a confidence.
    pub fn confidence_pct(&self) -> Option<f64> {
        self.probability_available
            .then(|| confidence_pct(self.label, self.failure_probability))
    }
}

/// Raw outputs for a batch, one entry per input row.
#[derive(Debug, Clone, PartialEq)]
pub struct Predictions {
    pub model: ClassifierKind,
    pub labels: Vec<i64>,
    pub failure_probabilities: Vec<f64>,
    pub probability_available: bool,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn results(&self) -> impl Iterator<Item = PredictionResult> + '_ {
        self.labels
            .iter()
            .zip(&self.failure_probabilities)
            .map(|(&class, &p)| PredictionResult {
                label: Label::from_class(class),
                failure_probability: p,
                probability_available: self.probability_available,
            })
    }
}

/// Column of the failure class in a classifier's probability matrix.
/// Looked up by label, never assumed to be the second column.
pub fn failure_class_index(classes: &[i64]) -> Option<usize> {
    classes.iter().position(|&c| c == FAILURE_CLASS)
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// Dispatches scaled inputs to a classifier held by a [`ModelStore`].
#[derive(Clone, Copy)]
pub struct Predictor<'a> {
    store: &'a ModelStore,
}

impl<'a> Predictor<'a> {
    pub fn new(store: &'a ModelStore) -> Self {
        Self { store }
    }

    /// Run `model` on a scaled matrix. Rejected before any inference when
    /// the scaler or the selected classifier is unavailable.
    pub fn predict(
        &self,
        x: ArrayView2<f64>,
        model: ClassifierKind,
    ) -> Result<Predictions, PredictError> {
        self.store.require_scaler()?;
        let classifier = self.store.require_classifier(model)?;
        let out = run_classifier(classifier, model, x)?;
        log::debug!(
            "{model}: {} rows, probabilities {}",
            out.len(),
            if out.probability_available { "available" } else { "unavailable" }
        );
        Ok(out)
    }
}

/// Errors from [`Predictor::predict`].
#[derive(Debug, thiserror::Error)]
pub enum PredictError {
    #[error(transparent)]
    ModelUnavailable(#[from] ModelUnavailableError),

    #[error(transparent)]
    Inference(#[from] InferenceError),
}

fn run_classifier(
    classifier: &dyn Classifier,
    model: ClassifierKind,
    x: ArrayView2<f64>,
) -> Result<Predictions, InferenceError> {
    let n = x.nrows();
    let panicked = |payload: Box<dyn std::any::Any + Send>| InferenceError::Panicked {
        model,
        message: panic_message(payload.as_ref()),
    };

    let labels = catch_unwind(AssertUnwindSafe(|| classifier.predict(x)))
        .map_err(panicked)?
        .map_err(|source| InferenceError::Classifier { model, source })?;
    if labels.len() != n {
        return Err(InferenceError::Shape {
            model,
            what: "labels",
            expected: n,
            got: labels.len(),
        });
    }

    let failure_col = failure_class_index(classifier.classes());
    let proba = match failure_col {
        Some(_) => catch_unwind(AssertUnwindSafe(|| classifier.predict_proba(x)))
            .map_err(panicked)?
            .transpose()
            .map_err(|source| InferenceError::Classifier { model, source })?,
        None => {
            log::warn!(
                "{model} has no class {FAILURE_CLASS} in {:?}; reporting zero failure probability",
                classifier.classes()
            );
            None
        }
    };

    let (failure_probabilities, probability_available) = match (proba, failure_col) {
        (Some(p), Some(col)) => {
            if p.ncols() != classifier.classes().len() {
                return Err(InferenceError::Shape {
                    model,
                    what: "probability columns",
                    expected: classifier.classes().len(),
                    got: p.ncols(),
                });
            }
            if p.nrows() != n {
                return Err(InferenceError::Shape {
                    model,
                    what: "probability rows",
                    expected: n,
                    got: p.nrows(),
                });
            }
            (p.column(col).to_vec(), true)
        }
        (None, Some(_)) => {
            log::warn!("{model} cannot produce probabilities; failure probability reported as 0");
            (vec![0.0; n], false)
        }
        (_, None) => (vec![0.0; n], false),
    };

    Ok(Predictions {
        model,
        labels,
        failure_probabilities,
        probability_available,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
