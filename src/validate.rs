use crate::error::ValidationError;
use crate::features::{FeatureSet, FieldValue, RangeTable, RawRecord, TYPE};

// ---------------------------------------------------------------------------
// Validator – range and domain checks against the static range table
// ---------------------------------------------------------------------------

/// Checks candidate records against a [`RangeTable`]. Stateless apart from
/// the borrowed table; never panics on malformed input.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    table: &'a RangeTable,
    set: FeatureSet,
}

impl<'a> Validator<'a> {
    pub fn new(table: &'a RangeTable, set: FeatureSet) -> Self {
        Self { table, set }
    }

    /// Check every field that has a declared range. Fields absent from the
    /// table are accepted as-is. The categorical `type` field is checked
    /// against the domain only when the feature set uses it.
    pub fn validate(&self, record: &RawRecord) -> Result<(), ValidationError> {
        for (field, value) in record {
            if field == TYPE {
                if self.set.uses_type() {
                    self.check_category(value)?;
                }
                continue;
            }

            let Some(range) = self.table.get(field) else {
                continue;
            };

            let number = value.as_f64().ok_or_else(|| ValidationError::NotNumeric {
                field: field.clone(),
                value: value.to_string(),
            })?;

            if !range.contains(number) {
                return Err(ValidationError::OutOfRange {
                    field: field.clone(),
                    min: range.min,
                    max: range.max,
                    value: number,
                });
            }
        }
        Ok(())
    }

    /// `(ok, message)` form of [`Validator::validate`] for display surfaces.
    pub fn check(&self, record: &RawRecord) -> (bool, String) {
        match self.validate(record) {
            Ok(()) => (true, "valid".to_string()),
            Err(e) => (false, e.to_string()),
        }
    }

    fn check_category(&self, value: &FieldValue) -> Result<(), ValidationError> {
        let code = value.to_string();
        let domain = self.table.type_domain();
        if domain.iter().any(|d| *d == code) {
            Ok(())
        } else {
            Err(ValidationError::InvalidCategory {
                field: TYPE.to_string(),
                allowed: domain.to_vec(),
                value: code,
            })
        }
    }
}
