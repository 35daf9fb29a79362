use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::ScalerError;

// ---------------------------------------------------------------------------
// Linear feature scaler
// ---------------------------------------------------------------------------

/// Fitted parameters, tagged by the transform that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerParams {
    /// `(x - mean) / scale`
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// `(x - data_min) / (data_max - data_min)`
    MinMax { data_min: Vec<f64>, data_max: Vec<f64> },
}

/// On-disk scaler artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerArtifact {
    /// Column order the scaler was fitted on, when recorded.
    #[serde(default)]
    pub feature_names: Vec<String>,
    #[serde(flatten)]
    pub params: ScalerParams,
}

/// A pre-fitted per-column affine transform `x' = (x - offset) / scale`.
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    feature_names: Vec<String>,
    offset: Vec<f64>,
    scale: Vec<f64>,
}

impl Scaler {
    /// Build from an artifact, checking shapes and finiteness. Zero-width
    /// columns (constant during fitting) divide by one.
    pub fn from_artifact(artifact: ScalerArtifact) -> Result<Self, String> {
        let (offset, scale) = match artifact.params {
            ScalerParams::Standard { mean, scale } => {
                if mean.len() != scale.len() {
                    return Err(format!(
                        "mean has {} entries but scale has {}",
                        mean.len(),
                        scale.len()
                    ));
                }
                (mean, scale)
            }
            ScalerParams::MinMax { data_min, data_max } => {
                if data_min.len() != data_max.len() {
                    return Err(format!(
                        "data_min has {} entries but data_max has {}",
                        data_min.len(),
                        data_max.len()
                    ));
                }
                let range = data_min.iter().zip(&data_max).map(|(lo, hi)| hi - lo).collect();
                (data_min, range)
            }
        };

        if offset.is_empty() {
            return Err("scaler has no columns".to_string());
        }
        if offset.iter().chain(&scale).any(|v| !v.is_finite()) {
            return Err("scaler parameters must be finite".to_string());
        }
        if !artifact.feature_names.is_empty() && artifact.feature_names.len() != offset.len() {
            return Err(format!(
                "{} feature names for {} columns",
                artifact.feature_names.len(),
                offset.len()
            ));
        }

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Scaler {
            feature_names: artifact.feature_names,
            offset,
            scale,
        })
    }

    /// Standardization scaler, mostly for tests and tooling.
    pub fn standard(feature_names: &[&str], mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
        Self::from_artifact(ScalerArtifact {
            feature_names: feature_names.iter().map(|s| s.to_string()).collect(),
            params: ScalerParams::Standard { mean, scale },
        })
    }

    pub fn width(&self) -> usize {
        self.offset.len()
    }

    /// Recorded fit-time column order (empty when the artifact had none).
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ScalerError> {
        self.check_width(x.ncols())?;
        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.offset[j]) / self.scale[j];
            }
        }
        Ok(out)
    }

    pub fn inverse_transform(&self, x: ArrayView2<f64>) -> Result<Array2<f64>, ScalerError> {
        self.check_width(x.ncols())?;
        let mut out = x.to_owned();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (j, v) in row.iter_mut().enumerate() {
                *v = *v * self.scale[j] + self.offset[j];
            }
        }
        Ok(out)
    }

    fn check_width(&self, got: usize) -> Result<(), ScalerError> {
        if got == self.width() {
            Ok(())
        } else {
            Err(ScalerError {
                expected: self.width(),
                got,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn standard_transform_centres_and_scales() {
        let s = Scaler::standard(&["a", "b"], vec![10.0, 0.0], vec![2.0, 4.0]).unwrap();
        let out = s.transform(array![[12.0, 8.0]].view()).unwrap();
        assert_abs_diff_eq!(out, array![[1.0, 2.0]], epsilon = 1e-12);
    }

    #[test]
    fn min_max_maps_range_to_unit_interval() {
        let s = Scaler::from_artifact(ScalerArtifact {
            feature_names: vec![],
            params: ScalerParams::MinMax {
                data_min: vec![0.0, 100.0],
                data_max: vec![10.0, 300.0],
            },
        })
        .unwrap();
        let out = s.transform(array![[5.0, 300.0]].view()).unwrap();
        assert_abs_diff_eq!(out, array![[0.5, 1.0]], epsilon = 1e-12);
    }

    #[test]
    fn zero_scale_is_treated_as_one() {
        let s = Scaler::standard(&["a"], vec![3.0], vec![0.0]).unwrap();
        let out = s.transform(array![[5.0]].view()).unwrap();
        assert_abs_diff_eq!(out[[0, 0]], 2.0);
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let s = Scaler::standard(&["a", "b"], vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let err = s.transform(array![[1.0, 2.0, 3.0]].view()).unwrap_err();
        assert_eq!(err, ScalerError { expected: 2, got: 3 });
    }

    #[test]
    fn artifact_shape_errors() {
        assert!(Scaler::standard(&["a"], vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(Scaler::standard(&["a", "b"], vec![0.0], vec![1.0]).is_err());
        assert!(Scaler::standard(&[], vec![], vec![]).is_err());
        assert!(Scaler::standard(&["a"], vec![f64::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn artifact_json_roundtrips_through_serde() {
        let json = r#"{"feature_names": ["a", "b"], "kind": "standard", "mean": [1.0, 2.0], "scale": [0.5, 0.25]}"#;
        let artifact: ScalerArtifact = serde_json::from_str(json).unwrap();
        let s = Scaler::from_artifact(artifact).unwrap();
        assert_eq!(s.feature_names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(s.width(), 2);
    }
}
