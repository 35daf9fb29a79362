use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::scaler::{Scaler, ScalerArtifact};
use super::{Classifier, ClassifierArtifact, ClassifierKind};
use crate::config::ModelConfig;
use crate::error::{ArtifactError, ModelUnavailableError, UnavailableModel};
use crate::features::FeatureSet;

// ---------------------------------------------------------------------------
// Slots
// ---------------------------------------------------------------------------

/// One model position in the store: loaded, or empty with the load error.
pub enum Slot<T> {
    Loaded(T),
    Unavailable(ArtifactError),
}

impl<T> Slot<T> {
    fn from_result(r: Result<T, ArtifactError>) -> Self {
        match r {
            Ok(v) => Slot::Loaded(v),
            Err(reason) => Slot::Unavailable(reason),
        }
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Slot::Loaded(v) => Some(v),
            Slot::Unavailable(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ArtifactError> {
        match self {
            Slot::Loaded(_) => None,
            Slot::Unavailable(e) => Some(e),
        }
    }

    fn detail(&self, loaded: impl FnOnce(&T) -> String) -> String {
        match self {
            Slot::Loaded(v) => loaded(v),
            Slot::Unavailable(e) => e.to_string(),
        }
    }
}

/// Load outcome for one artifact, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotStatus {
    pub name: String,
    pub loaded: bool,
    pub detail: String,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.loaded { "loaded" } else { "UNAVAILABLE" };
        write!(f, "{:<14} {:<12} {}", self.name, state, self.detail)
    }
}

// ---------------------------------------------------------------------------
// ModelStore
// ---------------------------------------------------------------------------

/// The scaler and classifiers loaded once at start-up. Immutable after
/// construction; a missing or invalid artifact leaves its slot empty and
/// nothing is ever substituted for it.
pub struct ModelStore {
    feature_set: FeatureSet,
    scaler: Slot<Scaler>,
    classifiers: BTreeMap<ClassifierKind, Slot<Box<dyn Classifier>>>,
}

impl ModelStore {
    /// Load every configured artifact from the model directory. Each load is
    /// independent. Never writes to the directory.
    pub fn load(config: &ModelConfig, feature_set: FeatureSet) -> Self {
        log::info!("Loading models from {}", config.dir.display());

        let scaler = load_scaler(&config.dir.join(&config.scaler_file), feature_set);
        match &scaler {
            Ok(s) => log::info!("Scaler loaded ({} features)", s.width()),
            Err(e) => log::error!("Scaler unavailable: {}", error_chain(e)),
        }

        let classifiers = ClassifierKind::ALL
            .iter()
            .map(|&kind| {
                let path = config.dir.join(config.classifier_file(kind));
                let result = load_classifier(&path, kind, feature_set);
                match &result {
                    Ok(_) => log::info!("{kind} classifier loaded from {}", path.display()),
                    Err(e) => log::warn!("{kind} classifier unavailable: {}", error_chain(e)),
                }
                (kind, result)
            })
            .collect();

        Self::from_parts(feature_set, scaler, classifiers)
    }

    /// Assemble a store from already-built parts.
    pub fn from_parts(
        feature_set: FeatureSet,
        scaler: Result<Scaler, ArtifactError>,
        classifiers: Vec<(ClassifierKind, Result<Box<dyn Classifier>, ArtifactError>)>,
    ) -> Self {
        let mut slots: BTreeMap<_, _> = ClassifierKind::ALL
            .iter()
            .map(|&k| (k, Slot::Unavailable(ArtifactError::NotConfigured)))
            .collect();
        for (kind, result) in classifiers {
            slots.insert(kind, Slot::from_result(result));
        }
        ModelStore {
            feature_set,
            scaler: Slot::from_result(scaler),
            classifiers: slots,
        }
    }

    pub fn feature_set(&self) -> FeatureSet {
        self.feature_set
    }

    pub fn scaler(&self) -> Option<&Scaler> {
        self.scaler.get()
    }

    pub fn classifier(&self, kind: ClassifierKind) -> Option<&dyn Classifier> {
        self.classifiers
            .get(&kind)
            .and_then(Slot::get)
            .map(|c| c.as_ref())
    }

    /// The scaler, or the reason it cannot be used.
    pub fn require_scaler(&self) -> Result<&Scaler, ModelUnavailableError> {
        match &self.scaler {
            Slot::Loaded(s) => Ok(s),
            Slot::Unavailable(e) => Err(ModelUnavailableError {
                model: UnavailableModel::Scaler,
                reason: e.to_string(),
            }),
        }
    }

    /// The selected classifier, or the reason it cannot be used.
    pub fn require_classifier(
        &self,
        kind: ClassifierKind,
    ) -> Result<&dyn Classifier, ModelUnavailableError> {
        match self.classifiers.get(&kind) {
            Some(Slot::Loaded(c)) => Ok(c.as_ref()),
            Some(Slot::Unavailable(e)) => Err(ModelUnavailableError {
                model: UnavailableModel::Classifier(kind),
                reason: e.to_string(),
            }),
            None => Err(ModelUnavailableError {
                model: UnavailableModel::Classifier(kind),
                reason: ArtifactError::NotConfigured.to_string(),
            }),
        }
    }

    /// Load outcome of every slot, scaler first.
    pub fn status(&self) -> Vec<SlotStatus> {
        let mut out = vec![SlotStatus {
            name: "scaler".to_string(),
            loaded: self.scaler.get().is_some(),
            detail: self.scaler.detail(|s| format!("{} features", s.width())),
        }];
        for (kind, slot) in &self.classifiers {
            out.push(SlotStatus {
                name: kind.to_string(),
                loaded: slot.get().is_some(),
                detail: slot.detail(|c| format!("classes {:?}", c.classes())),
            });
        }
        out
    }

    /// Whether the store can serve at least one prediction path.
    pub fn is_usable(&self) -> bool {
        self.scaler.get().is_some() && self.classifiers.values().any(|s| s.get().is_some())
    }

    /// The load error behind an empty scaler slot.
    pub fn scaler_error(&self) -> Option<&ArtifactError> {
        self.scaler.error()
    }

    /// The load error behind an empty classifier slot.
    pub fn classifier_error(&self, kind: ClassifierKind) -> Option<&ArtifactError> {
        self.classifiers.get(&kind).and_then(Slot::error)
    }
}

// ---------------------------------------------------------------------------
// Artifact loading
// ---------------------------------------------------------------------------

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let text = std::fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn invalid(path: &Path, reason: String) -> ArtifactError {
    ArtifactError::Invalid {
        path: PathBuf::from(path),
        reason,
    }
}

/// `error: cause: cause` rendering for log lines.
fn error_chain(e: &ArtifactError) -> String {
    let mut out = e.to_string();
    let mut source = std::error::Error::source(e);
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// Load the scaler and check it was fitted on the configured feature order.
pub fn load_scaler(path: &Path, feature_set: FeatureSet) -> Result<Scaler, ArtifactError> {
    let artifact: ScalerArtifact = read_artifact(path)?;
    let scaler = Scaler::from_artifact(artifact).map_err(|r| invalid(path, r))?;

    let expected = feature_set.columns();
    if scaler.feature_names().is_empty() {
        if scaler.width() != expected.len() {
            return Err(invalid(
                path,
                format!(
                    "scaler has {} columns, feature set {:?} needs {}",
                    scaler.width(),
                    feature_set,
                    expected.len()
                ),
            ));
        }
        log::warn!(
            "{} records no feature names; assuming order {:?}",
            path.display(),
            expected
        );
    } else if scaler.feature_names() != expected.as_slice() {
        return Err(invalid(
            path,
            format!(
                "fitted on {:?}, expected {:?}",
                scaler.feature_names(),
                expected
            ),
        ));
    }
    Ok(scaler)
}

/// Load one classifier and check its kind and input width.
pub fn load_classifier(
    path: &Path,
    kind: ClassifierKind,
    feature_set: FeatureSet,
) -> Result<Box<dyn Classifier>, ArtifactError> {
    let artifact: ClassifierArtifact = read_artifact(path)?;
    if artifact.kind() != kind {
        return Err(invalid(
            path,
            format!("contains a {} model, expected {kind}", artifact.kind()),
        ));
    }
    let classifier = artifact.build().map_err(|r| invalid(path, r))?;
    if classifier.n_features() != feature_set.width() {
        return Err(invalid(
            path,
            format!(
                "expects {} features, feature set {:?} has {}",
                classifier.n_features(),
                feature_set,
                feature_set.width()
            ),
        ));
    }
    Ok(classifier)
}
