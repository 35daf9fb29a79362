use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Canonical field names
// ---------------------------------------------------------------------------

pub const TYPE: &str = "type";
pub const AIR_TEMPERATURE: &str = "air_temperature_k";
pub const PROCESS_TEMPERATURE: &str = "process_temperature_k";
pub const ROTATIONAL_SPEED: &str = "rotational_speed_rpm";
pub const TORQUE: &str = "torque_nm";
pub const TOOL_WEAR: &str = "tool_wear_min";

/// The five sensor fields, in the order the scaler was fitted on.
pub const NUMERIC_FEATURES: [&str; 5] = [
    AIR_TEMPERATURE,
    PROCESS_TEMPERATURE,
    ROTATIONAL_SPEED,
    TORQUE,
    TOOL_WEAR,
];

// ---------------------------------------------------------------------------
// FeatureSet – which input contract the loaded artifacts were fitted on
// ---------------------------------------------------------------------------

/// The feature contract shared by the validator, the preprocessor and the
/// persisted scaler/classifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// Five numeric sensor readings.
    #[default]
    Numeric,
    /// Categorical equipment `type` followed by the five numeric readings.
    WithType,
}

impl FeatureSet {
    /// Column names in canonical vector order.
    pub fn columns(self) -> Vec<&'static str> {
        match self {
            FeatureSet::Numeric => NUMERIC_FEATURES.to_vec(),
            FeatureSet::WithType => std::iter::once(TYPE).chain(NUMERIC_FEATURES).collect(),
        }
    }

    pub fn width(self) -> usize {
        match self {
            FeatureSet::Numeric => NUMERIC_FEATURES.len(),
            FeatureSet::WithType => NUMERIC_FEATURES.len() + 1,
        }
    }

    pub fn uses_type(self) -> bool {
        self == FeatureSet::WithType
    }
}

impl FromStr for FeatureSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "numeric" => Ok(FeatureSet::Numeric),
            "with_type" => Ok(FeatureSet::WithType),
            other => Err(format!("unknown feature set '{other}' (numeric, with_type)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Equipment type (categorical)
// ---------------------------------------------------------------------------

/// Product quality variant: low, medium or high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentType {
    L,
    M,
    H,
}

impl EquipmentType {
    pub const ALL: [EquipmentType; 3] = [EquipmentType::L, EquipmentType::M, EquipmentType::H];

    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "L" => Some(EquipmentType::L),
            "M" => Some(EquipmentType::M),
            "H" => Some(EquipmentType::H),
            _ => None,
        }
    }

    /// Integer encoding fed to the scaler.
    pub fn code(self) -> f64 {
        match self {
            EquipmentType::L => 0.0,
            EquipmentType::M => 1.0,
            EquipmentType::H => 2.0,
        }
    }
}

/// Encode a raw type cell. Unknown codes map to the `L` encoding.
pub fn encode_type(code: &str) -> f64 {
    EquipmentType::parse(code).map(EquipmentType::code).unwrap_or(0.0)
}

impl fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EquipmentType::L => "L",
            EquipmentType::M => "M",
            EquipmentType::H => "H",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Range table
// ---------------------------------------------------------------------------

/// Valid numeric bounds for one feature (inclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub feature_name: String,
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    pub fn new(feature_name: &str, min: f64, max: f64) -> Self {
        Self {
            feature_name: feature_name.to_string(),
            min,
            max,
        }
    }

    /// NaN never lies inside a range.
    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Static bounds for every validated feature plus the categorical domain.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTable {
    ranges: BTreeMap<String, FeatureRange>,
    type_domain: Vec<String>,
}

impl Default for RangeTable {
    fn default() -> Self {
        Self::new(
            vec![
                FeatureRange::new(AIR_TEMPERATURE, 295.0, 305.0),
                FeatureRange::new(PROCESS_TEMPERATURE, 305.0, 315.0),
                FeatureRange::new(ROTATIONAL_SPEED, 1168.0, 2772.0),
                FeatureRange::new(TORQUE, 3.8, 76.6),
                FeatureRange::new(TOOL_WEAR, 0.0, 240.0),
            ],
            vec!["L".into(), "M".into(), "H".into()],
        )
    }
}

impl RangeTable {
    pub fn new(ranges: Vec<FeatureRange>, type_domain: Vec<String>) -> Self {
        Self {
            ranges: ranges
                .into_iter()
                .map(|r| (r.feature_name.clone(), r))
                .collect(),
            type_domain,
        }
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureRange> {
        self.ranges.get(feature)
    }

    /// Replace (or add) the bounds of one feature.
    pub fn set(&mut self, range: FeatureRange) {
        self.ranges.insert(range.feature_name.clone(), range);
    }

    pub fn type_domain(&self) -> &[String] {
        &self.type_domain
    }

    /// Restrict the accepted type codes. The domain can only narrow
    /// `L`/`M`/`H`, since those are the only codes with an encoding.
    pub fn set_type_domain(&mut self, domain: Vec<String>) -> Result<(), String> {
        if domain.is_empty() {
            return Err("type_domain must not be empty".into());
        }
        if let Some(bad) = domain.iter().find(|c| EquipmentType::parse(c).is_none()) {
            return Err(format!("type_domain code '{bad}' is not one of L, M, H"));
        }
        self.type_domain = domain;
        Ok(())
    }

    /// Ranges in canonical feature order first, then any extra entries.
    pub fn iter(&self) -> impl Iterator<Item = &FeatureRange> {
        let canonical = NUMERIC_FEATURES.iter().filter_map(|f| self.ranges.get(*f));
        let extra = self
            .ranges
            .values()
            .filter(|r| !NUMERIC_FEATURES.contains(&r.feature_name.as_str()));
        canonical.chain(extra)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One raw input value as supplied by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Unvalidated field map: field name → value.
pub type RawRecord = BTreeMap<String, FieldValue>;

/// A validated single-prediction input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub air_temperature_k: f64,
    pub process_temperature_k: f64,
    pub rotational_speed_rpm: f64,
    pub torque_nm: f64,
    pub tool_wear_min: f64,
    /// Present only under [`FeatureSet::WithType`].
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub equipment_type: Option<EquipmentType>,
}

impl EquipmentRecord {
    /// Extract the typed record from a raw map. Range checks are the
    /// validator's job; this only enforces presence and type.
    pub fn from_raw(raw: &RawRecord, set: FeatureSet) -> Result<Self, ValidationError> {
        let number = |field: &str| -> Result<f64, ValidationError> {
            let value = raw.get(field).ok_or_else(|| ValidationError::MissingField {
                field: field.to_string(),
            })?;
            value.as_f64().ok_or_else(|| ValidationError::NotNumeric {
                field: field.to_string(),
                value: value.to_string(),
            })
        };

        let equipment_type = if set.uses_type() {
            let value = raw.get(TYPE).ok_or_else(|| ValidationError::MissingField {
                field: TYPE.to_string(),
            })?;
            let text = value.to_string();
            Some(
                EquipmentType::parse(&text).ok_or_else(|| ValidationError::InvalidCategory {
                    field: TYPE.to_string(),
                    allowed: EquipmentType::ALL.iter().map(|t| t.to_string()).collect(),
                    value: text,
                })?,
            )
        } else {
            None
        };

        Ok(Self {
            air_temperature_k: number(AIR_TEMPERATURE)?,
            process_temperature_k: number(PROCESS_TEMPERATURE)?,
            rotational_speed_rpm: number(ROTATIONAL_SPEED)?,
            torque_nm: number(TORQUE)?,
            tool_wear_min: number(TOOL_WEAR)?,
            equipment_type,
        })
    }

    /// Values in canonical order for the given feature set. A missing type
    /// under [`FeatureSet::WithType`] encodes as `L`.
    pub fn to_vector(&self, set: FeatureSet) -> Vec<f64> {
        let mut v = Vec::with_capacity(set.width());
        if set.uses_type() {
            v.push(self.equipment_type.map(EquipmentType::code).unwrap_or(0.0));
        }
        v.extend([
            self.air_temperature_k,
            self.process_temperature_k,
            self.rotational_speed_rpm,
            self.torque_nm,
            self.tool_wear_min,
        ]);
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, FieldValue)]) -> RawRecord {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn numeric_raw() -> RawRecord {
        raw(&[
            (AIR_TEMPERATURE, FieldValue::Number(299.9)),
            (PROCESS_TEMPERATURE, FieldValue::Number(309.7)),
            (ROTATIONAL_SPEED, FieldValue::Number(2027.0)),
            (TORQUE, FieldValue::Number(40.2)),
            (TOOL_WEAR, FieldValue::Number(126.0)),
        ])
    }

    #[test]
    fn columns_follow_canonical_order() {
        assert_eq!(FeatureSet::Numeric.columns(), NUMERIC_FEATURES.to_vec());
        let with_type = FeatureSet::WithType.columns();
        assert_eq!(with_type[0], TYPE);
        assert_eq!(&with_type[1..], &NUMERIC_FEATURES);
        assert_eq!(FeatureSet::WithType.width(), 6);
    }

    #[test]
    fn type_encoding_defaults_unknown_to_zero() {
        assert_eq!(encode_type("L"), 0.0);
        assert_eq!(encode_type("M"), 1.0);
        assert_eq!(encode_type("H"), 2.0);
        assert_eq!(encode_type("X"), 0.0);
        assert_eq!(encode_type(""), 0.0);
    }

    #[test]
    fn feature_set_parses_both_spellings() {
        assert_eq!("numeric".parse::<FeatureSet>(), Ok(FeatureSet::Numeric));
        assert_eq!("with-type".parse::<FeatureSet>(), Ok(FeatureSet::WithType));
        assert!("other".parse::<FeatureSet>().is_err());
    }

    #[test]
    fn record_from_raw_builds_vector_in_order() {
        let rec = EquipmentRecord::from_raw(&numeric_raw(), FeatureSet::Numeric).unwrap();
        assert_eq!(rec.to_vector(FeatureSet::Numeric), vec![299.9, 309.7, 2027.0, 40.2, 126.0]);
        assert_eq!(rec.equipment_type, None);
    }

    #[test]
    fn record_from_raw_with_type_prepends_code() {
        let mut r = numeric_raw();
        r.insert(TYPE.into(), FieldValue::Text("H".into()));
        let rec = EquipmentRecord::from_raw(&r, FeatureSet::WithType).unwrap();
        assert_eq!(rec.to_vector(FeatureSet::WithType)[0], 2.0);
    }

    #[test]
    fn record_from_raw_reports_missing_field() {
        let mut r = numeric_raw();
        r.remove(TORQUE);
        let err = EquipmentRecord::from_raw(&r, FeatureSet::Numeric).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: TORQUE.into()
            }
        );
    }

    #[test]
    fn range_table_iterates_canonical_first() {
        let mut table = RangeTable::default();
        table.set(FeatureRange::new("humidity", 0.0, 100.0));
        let names: Vec<_> = table.iter().map(|r| r.feature_name.as_str()).collect();
        assert_eq!(&names[..5], &NUMERIC_FEATURES);
        assert_eq!(names[5], "humidity");
    }

    #[test]
    fn type_domain_only_narrows_known_codes() {
        let mut table = RangeTable::default();
        assert!(table.set_type_domain(vec!["M".into(), "H".into()]).is_ok());
        assert_eq!(table.type_domain(), &["M".to_string(), "H".to_string()]);

        let err = table.set_type_domain(vec!["L".into(), "X".into()]).unwrap_err();
        assert!(err.contains("'X'"), "{err}");
        assert!(table.set_type_domain(vec![]).is_err());
        assert_eq!(table.type_domain(), &["M".to_string(), "H".to_string()]);
    }

    #[test]
    fn nan_is_never_in_range() {
        let r = FeatureRange::new(TORQUE, 3.8, 76.6);
        assert!(!r.contains(f64::NAN));
        assert!(r.contains(3.8));
        assert!(r.contains(76.6));
    }
}
