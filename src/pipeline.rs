//! End-to-end request handling: validate → preprocess → predict → annotate.

use crate::data::model::{CellValue, Table};
use crate::error::{InferenceError, PipelineError};
use crate::features::{EquipmentRecord, FeatureSet, FieldValue, RangeTable, RawRecord};
use crate::models::{ClassifierKind, ModelStore};
use crate::predict::{PredictError, PredictionResult, Predictions, Predictor, round2};
use crate::preprocess::{prepare_batch, prepare_single};
use crate::validate::Validator;

pub const STATUS_COLUMN: &str = "predicted_status";
pub const PROBABILITY_COLUMN: &str = "failure_probability_pct";
pub const CONFIDENCE_COLUMN: &str = "confidence_pct";

impl From<PredictError> for PipelineError {
    fn from(e: PredictError) -> Self {
        match e {
            PredictError::ModelUnavailable(e) => PipelineError::ModelUnavailable(e),
            PredictError::Inference(e) => PipelineError::Inference(e),
        }
    }
}

/// Validate, scale and classify one interactive reading.
pub fn predict_record(
    store: &ModelStore,
    ranges: &RangeTable,
    raw: &RawRecord,
    model: ClassifierKind,
) -> Result<PredictionResult, PipelineError> {
    let set = store.feature_set();
    Validator::new(ranges, set).validate(raw)?;
    let record = EquipmentRecord::from_raw(raw, set)?;

    let scaler = store.require_scaler()?;
    let x = prepare_single(&record, scaler, set)?;
    let out = Predictor::new(store).predict(x.view(), model)?;

    let result = out
        .results()
        .next()
        .ok_or(InferenceError::Shape {
            model,
            what: "labels",
            expected: 1,
            got: 0,
        })?;
    log::debug!(
        "{model}: {} (failure probability {:.4})",
        result.label,
        result.failure_probability
    );
    Ok(result)
}

/// Scale and classify every row of a table. Returns the original table with
/// the status, failure probability and confidence columns appended.
pub fn predict_table(
    store: &ModelStore,
    ranges: &RangeTable,
    table: &Table,
    model: ClassifierKind,
) -> Result<Table, PipelineError> {
    let set = store.feature_set();
    let scaler = store.require_scaler()?;
    let (x, original) = prepare_batch(table, scaler, set)?;
    warn_out_of_range(ranges, table, set);

    let out = Predictor::new(store).predict(x.view(), model)?;
    log::info!("{model}: classified {} rows", out.len());
    Ok(annotate(original, &out))
}

/// Append the three result columns. Original columns are left untouched.
/// Without classifier probabilities both percentage cells are left empty.
pub fn annotate(mut table: Table, predictions: &Predictions) -> Table {
    let results: Vec<PredictionResult> = predictions.results().collect();
    let pct = |v: Option<f64>| v.map_or(CellValue::Null, |v| CellValue::Float(round2(v)));

    table.push_column(
        STATUS_COLUMN,
        results
            .iter()
            .map(|r| CellValue::String(r.label.to_string()))
            .collect(),
    );
    table.push_column(
        PROBABILITY_COLUMN,
        results
            .iter()
            .map(|r| pct(r.failure_probability_pct()))
            .collect(),
    );
    table.push_column(
        CONFIDENCE_COLUMN,
        results
            .iter()
            .map(|r| pct(r.confidence_pct()))
            .collect(),
    );
    table
}

/// Out-of-range batch rows are still predicted; they are only reported.
fn warn_out_of_range(ranges: &RangeTable, table: &Table, set: FeatureSet) {
    let validator = Validator::new(ranges, set);
    let columns = set.columns();
    for (r, row) in table.rows.iter().enumerate() {
        let raw: RawRecord = columns
            .iter()
            .filter_map(|c| {
                let cell = table.column_index(c).and_then(|i| row.get(i))?;
                Some((*c, cell))
            })
            .map(|(c, cell)| {
                let value = match cell {
                    CellValue::String(s) => FieldValue::Text(s.clone()),
                    other => other
                        .as_f64()
                        .map(FieldValue::Number)
                        .unwrap_or_else(|| FieldValue::Text(other.to_string())),
                };
                (c.to_string(), value)
            })
            .collect();
        if let Err(e) = validator.validate(&raw) {
            log::warn!("row {r}: {e}");
        }
    }
}
