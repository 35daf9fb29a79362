use ndarray::{Array1, Array2, Axis};

use crate::data::model::{CellValue, Table};
use crate::error::{BatchError, MissingColumnsError, ScalerError};
use crate::features::{EquipmentRecord, FeatureSet, TYPE, encode_type};
use crate::models::Scaler;

// ---------------------------------------------------------------------------
// Single record
// ---------------------------------------------------------------------------

/// Scale one validated record into a `1 × width` matrix in canonical order.
pub fn prepare_single(
    record: &EquipmentRecord,
    scaler: &Scaler,
    set: FeatureSet,
) -> Result<Array2<f64>, ScalerError> {
    let x = Array1::from(record.to_vector(set)).insert_axis(Axis(0));
    scaler.transform(x.view())
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// Unscaled feature matrix of a table, in canonical column order.
pub fn feature_matrix(table: &Table, set: FeatureSet) -> Result<Array2<f64>, BatchError> {
    let required = set.columns();
    let missing = table.missing_columns(&required);
    if !missing.is_empty() {
        return Err(MissingColumnsError { missing }.into());
    }

    let indices: Vec<(usize, &str)> = required
        .iter()
        .filter_map(|c| table.column_index(c).map(|i| (i, *c)))
        .collect();

    let mut x = Array2::zeros((table.len(), required.len()));
    for (r, row) in table.rows.iter().enumerate() {
        for (j, (col_idx, name)) in indices.iter().enumerate() {
            let cell = row.get(*col_idx).unwrap_or(&CellValue::Null);
            x[[r, j]] = if *name == TYPE {
                match cell {
                    CellValue::String(s) => encode_type(s),
                    _ => 0.0,
                }
            } else {
                cell.as_f64().ok_or_else(|| BatchError::NotNumeric {
                    row: r,
                    column: name.to_string(),
                    value: cell.to_string(),
                })?
            };
        }
    }
    Ok(x)
}

/// Scale a whole table in one transform call. Returns the scaled matrix and
/// an untouched copy of the input for re-attaching results.
pub fn prepare_batch(
    table: &Table,
    scaler: &Scaler,
    set: FeatureSet,
) -> Result<(Array2<f64>, Table), BatchError> {
    let x = feature_matrix(table, set)?;
    let scaled = scaler.transform(x.view())?;
    Ok((scaled, table.clone()))
}
