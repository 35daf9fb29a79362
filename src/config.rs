use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::features::{FeatureRange, FeatureSet, RangeTable};
use crate::models::ClassifierKind;

pub const CONFIG_ENV: &str = "MAINT_PREDICT_CONFIG";
pub const MODEL_DIR_ENV: &str = "MAINT_MODEL_DIR";
pub const FEATURE_SET_ENV: &str = "MAINT_FEATURE_SET";

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// Where the persisted artifacts live.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub scaler_file: String,
    pub decision_tree_file: String,
    pub svm_file: String,
    pub knn_file: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            scaler_file: "scaler.json".to_string(),
            decision_tree_file: "decision_tree.json".to_string(),
            svm_file: "svm.json".to_string(),
            knn_file: "knn_model.json".to_string(),
        }
    }
}

impl ModelConfig {
    pub fn classifier_file(&self, kind: ClassifierKind) -> &str {
        match kind {
            ClassifierKind::DecisionTree => &self.decision_tree_file,
            ClassifierKind::Svm => &self.svm_file,
            ClassifierKind::Knn => &self.knn_file,
        }
    }
}

/// Everything read once at start-up. Immutable afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppConfig {
    pub models: ModelConfig,
    pub feature_set: FeatureSet,
    pub ranges: RangeTable,
}

impl AppConfig {
    /// Defaults, then the TOML file (explicit path or `MAINT_PREDICT_CONFIG`),
    /// then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = Self::default();

        let env_path = env_non_empty(CONFIG_ENV).map(PathBuf::from);
        if let Some(path) = path.map(Path::to_path_buf).or(env_path) {
            cfg.apply_file_config(&path)?;
        }
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    fn apply_file_config(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed reading config file {}", path.display()))?;
        let file_cfg: FileConfig = toml::from_str(&raw)
            .with_context(|| format!("failed parsing TOML config {}", path.display()))?;
        log::debug!("Applying config file {}", path.display());

        self.apply_file_models(file_cfg.models);
        self.apply_file_features(file_cfg.features)?;
        Ok(())
    }

    fn apply_file_models(&mut self, models: Option<FileModelConfig>) {
        let Some(models) = models else {
            return;
        };
        if let Some(v) = models.dir {
            self.models.dir = v;
        }
        if let Some(v) = non_empty(models.scaler_file) {
            self.models.scaler_file = v;
        }
        if let Some(v) = non_empty(models.decision_tree_file) {
            self.models.decision_tree_file = v;
        }
        if let Some(v) = non_empty(models.svm_file) {
            self.models.svm_file = v;
        }
        if let Some(v) = non_empty(models.knn_file) {
            self.models.knn_file = v;
        }
    }

    fn apply_file_features(&mut self, features: Option<FileFeatureConfig>) -> Result<()> {
        let Some(features) = features else {
            return Ok(());
        };
        if let Some(set) = features.set {
            self.feature_set = set;
        }
        for (name, [min, max]) in features.ranges {
            if !(min.is_finite() && max.is_finite() && min <= max) {
                bail!("invalid range for {name}: [{min}, {max}]");
            }
            self.ranges.set(FeatureRange::new(&name, min, max));
        }
        if let Some(domain) = features.type_domain {
            self.ranges
                .set_type_domain(domain)
                .map_err(|e| anyhow::anyhow!("invalid [features]: {e}"))?;
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(v) = env_non_empty(MODEL_DIR_ENV) {
            self.models.dir = PathBuf::from(v);
        }
        if let Some(v) = env_non_empty(FEATURE_SET_ENV) {
            self.feature_set = v
                .parse()
                .map_err(|e: String| anyhow::anyhow!("invalid {FEATURE_SET_ENV}: {e}"))?;
        }
        Ok(())
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|v| non_empty(Some(v)))
}

// ---------------------------------------------------------------------------
// TOML file layout
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    models: Option<FileModelConfig>,
    features: Option<FileFeatureConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileModelConfig {
    dir: Option<PathBuf>,
    scaler_file: Option<String>,
    decision_tree_file: Option<String>,
    svm_file: Option<String>,
    knn_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileFeatureConfig {
    set: Option<FeatureSet>,
    #[serde(default)]
    ranges: BTreeMap<String, [f64; 2]>,
    type_domain: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::TORQUE;
    use std::io::Write;
    use std::sync::{Mutex, OnceLock};

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_env() {
        for v in [CONFIG_ENV, MODEL_DIR_ENV, FEATURE_SET_ENV] {
            std::env::remove_var(v);
        }
    }

    fn write_config(text: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f
    }

    #[test]
    fn defaults_without_file() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();

        let cfg = AppConfig::load(None).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.models.dir, PathBuf::from("models"));
        assert_eq!(cfg.feature_set, FeatureSet::Numeric);
        assert_eq!(cfg.ranges.get(TORQUE).unwrap().max, 76.6);
    }

    #[test]
    fn file_config_is_applied() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();

        let f = write_config(
            "[models]\ndir = \"/srv/models\"\nsvm_file = \"svm_v2.json\"\n\
             [features]\nset = \"with_type\"\ntype_domain = [\"L\", \"M\"]\n\
             [features.ranges]\ntorque_nm = [5.0, 60.0]\n",
        );
        let cfg = AppConfig::load(Some(f.path())).unwrap();
        assert_eq!(cfg.models.dir, PathBuf::from("/srv/models"));
        assert_eq!(cfg.models.classifier_file(ClassifierKind::Svm), "svm_v2.json");
        assert_eq!(cfg.models.scaler_file, "scaler.json");
        assert_eq!(cfg.feature_set, FeatureSet::WithType);
        assert_eq!(cfg.ranges.get(TORQUE).unwrap().min, 5.0);
        assert_eq!(cfg.ranges.type_domain(), &["L".to_string(), "M".to_string()]);
    }

    #[test]
    fn env_overrides_file() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();

        let f = write_config("[models]\ndir = \"/srv/models\"\n");
        std::env::set_var(CONFIG_ENV, f.path());
        std::env::set_var(MODEL_DIR_ENV, "/opt/models");
        std::env::set_var(FEATURE_SET_ENV, "with-type");

        let cfg = AppConfig::load(None).unwrap();
        clear_env();

        assert_eq!(cfg.models.dir, PathBuf::from("/opt/models"));
        assert_eq!(cfg.feature_set, FeatureSet::WithType);
    }

    #[test]
    fn rejects_inverted_range_and_unknown_keys() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();

        let f = write_config("[features.ranges]\ntorque_nm = [80.0, 3.0]\n");
        assert!(AppConfig::load(Some(f.path())).is_err());

        let f = write_config("[model]\ndir = \"x\"\n");
        assert!(AppConfig::load(Some(f.path())).is_err());
    }

    #[test]
    fn type_domain_outside_known_codes_is_rejected() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();

        let f = write_config("[features]\ntype_domain = [\"L\", \"XL\"]\n");
        let err = AppConfig::load(Some(f.path())).unwrap_err();
        assert!(format!("{err:#}").contains("'XL'"), "{err:#}");

        let f = write_config("[features]\ntype_domain = []\n");
        assert!(AppConfig::load(Some(f.path())).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let _guard = env_lock().lock().expect("env lock");
        clear_env();

        let err = AppConfig::load(Some(Path::new("/nonexistent/maint.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("failed reading config file"));
    }
}
