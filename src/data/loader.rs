use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Array, AsArray, BooleanArray, StringArray};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float16Type, Float32Type, Float64Type, Int8Type, Int16Type,
    Int32Type, Int64Type, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CellValue, Table};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a batch table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – header row followed by one reading per row
/// * `.json`    – `[{ "air_temperature_k": 299.1, ... }, ...]`
/// * `.parquet` – flat scalar columns (as written by Pandas or Polars)
pub fn load_table(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported file extension: .{other}"),
    }
    .with_context(|| format!("loading {}", path.display()))?;

    log::debug!(
        "Loaded {} rows with columns {:?} from {}",
        table.len(),
        table.headers,
        path.display()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<Table> {
    let reader = csv::Reader::from_path(path).context("opening CSV")?;
    read_csv(reader)
}

/// Parse CSV from any reader (file, stdin, in-memory bytes).
pub fn read_csv<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<Table> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(record.iter().map(CellValue::from_text).collect());
    }

    Ok(Table::new(headers, rows))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON (`df.to_json(orient='records')`). Columns are the
/// union of keys, in first-seen order.
fn load_json(path: &Path) -> Result<Table> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    parse_json(&text)
}

pub fn parse_json(text: &str) -> Result<Table> {
    let root: JsonValue = serde_json::from_str(text).context("parsing JSON")?;
    let records = root
        .as_array()
        .context("Expected top-level JSON array")?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .with_context(|| format!("Row {i} is not a JSON object"))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map(json_to_cell).unwrap_or(CellValue::Null))
                .collect()
        })
        .collect();

    Ok(Table::new(headers, rows))
}

fn json_to_cell(val: &JsonValue) -> CellValue {
    match val {
        JsonValue::String(s) => CellValue::String(s.clone()),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                CellValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                CellValue::Float(f)
            } else {
                CellValue::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => CellValue::Bool(*b),
        JsonValue::Null => CellValue::Null,
        other => CellValue::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load every record batch of a Parquet file into one table. Column order
/// follows the file schema.
fn load_parquet(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("reading parquet metadata")?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| extract_cell(col, row))
                    .collect(),
            );
        }
    }

    Ok(Table::new(headers, rows))
}

/// Extract a single cell from an Arrow column at a given row. Numeric and
/// boolean columns keep their type; anything else is rendered the way
/// arrow displays it.
fn extract_cell(col: &Arc<dyn Array>, row: usize) -> CellValue {
    if col.is_null(row) {
        return CellValue::Null;
    }
    let int = |v: Option<i64>| v.map_or(CellValue::Null, CellValue::Integer);
    let float = |v: Option<f64>| v.map_or(CellValue::Null, CellValue::Float);
    match col.data_type() {
        DataType::Utf8 => col
            .as_any()
            .downcast_ref::<StringArray>()
            .map(|s| CellValue::String(s.value(row).to_string()))
            .unwrap_or(CellValue::Null),
        DataType::LargeUtf8 => CellValue::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int8 => int(value::<Int8Type>(col, row).map(i64::from)),
        DataType::Int16 => int(value::<Int16Type>(col, row).map(i64::from)),
        DataType::Int32 => int(value::<Int32Type>(col, row).map(i64::from)),
        DataType::Int64 => int(value::<Int64Type>(col, row)),
        DataType::UInt8 => int(value::<UInt8Type>(col, row).map(i64::from)),
        DataType::UInt16 => int(value::<UInt16Type>(col, row).map(i64::from)),
        DataType::UInt32 => int(value::<UInt32Type>(col, row).map(i64::from)),
        // Beyond i64 the decimal text is kept.
        DataType::UInt64 => match value::<UInt64Type>(col, row) {
            Some(v) => i64::try_from(v)
                .map_or_else(|_| CellValue::String(v.to_string()), CellValue::Integer),
            None => CellValue::Null,
        },
        DataType::Float16 => float(value::<Float16Type>(col, row).map(|v| v.to_f64())),
        DataType::Float32 => float(value::<Float32Type>(col, row).map(f64::from)),
        DataType::Float64 => float(value::<Float64Type>(col, row)),
        DataType::Boolean => col
            .as_any()
            .downcast_ref::<BooleanArray>()
            .map(|a| CellValue::Bool(a.value(row)))
            .unwrap_or(CellValue::Null),
        _ => display_cell(col.as_ref(), row),
    }
}

fn value<T: ArrowPrimitiveType>(col: &Arc<dyn Array>, row: usize) -> Option<T::Native> {
    col.as_primitive_opt::<T>().map(|a| a.value(row))
}

/// Dates, timestamps, decimals and the rest, as text.
fn display_cell(col: &dyn Array, row: usize) -> CellValue {
    match ArrayFormatter::try_new(col, &FormatOptions::default()) {
        Ok(f) => CellValue::String(f.value(row).to_string()),
        Err(e) => {
            log::warn!("cannot display {} value: {e}", col.data_type());
            CellValue::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn csv_keeps_column_order_and_text() {
        let data = "machine,torque_nm,note\nM-1,40.2,ok\nM-2,12,\n";
        let reader = csv::Reader::from_reader(data.as_bytes());
        let t = read_csv(reader).unwrap();
        assert_eq!(t.headers, vec!["machine", "torque_nm", "note"]);
        assert_eq!(t.rows[0][1], CellValue::String("40.2".into()));
        assert_eq!(t.rows[1][1].as_f64(), Some(12.0));
        assert_eq!(t.rows[1][2], CellValue::Null);
    }

    #[test]
    fn csv_pass_through_columns_are_written_back_unchanged() {
        let data = "lot,price,big_id,note\n007,1.50,12345678901234567890,1e3\n";
        let t = read_csv(csv::Reader::from_reader(data.as_bytes())).unwrap();

        let mut out = Vec::new();
        crate::data::writer::write_csv(&t, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), data);
    }

    #[test]
    fn json_union_of_keys_with_nulls() {
        let t = parse_json(r#"[{"a": 1, "b": "x"}, {"a": 2.5, "c": true}]"#).unwrap();
        assert_eq!(t.headers, vec!["a", "b", "c"]);
        assert_eq!(t.rows[0][2], CellValue::Null);
        assert_eq!(t.rows[1][0], CellValue::Float(2.5));
        assert_eq!(t.rows[1][2], CellValue::Bool(true));
    }

    #[test]
    fn json_rejects_non_array_root() {
        assert!(parse_json(r#"{"a": 1}"#).is_err());
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let err = load_table(Path::new("readings.xlsx")).unwrap_err();
        assert!(format!("{err:#}").contains(".xlsx"));
    }

    #[test]
    fn load_table_reads_csv_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "torque_nm,tool_wear_min").unwrap();
        writeln!(file, "40.2,126").unwrap();
        let t = load_table(file.path()).unwrap();
        assert_eq!(t.len(), 1);
        assert_eq!(t.rows[0][1], CellValue::String("126".into()));
    }

    #[test]
    fn load_table_reads_parquet_file() {
        use arrow::array::{Float64Array, StringArray};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("machine", DataType::Utf8, false),
            Field::new("torque_nm", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["M-1", "M-2"])),
                Arc::new(Float64Array::from(vec![Some(40.2), None])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let t = load_table(file.path()).unwrap();
        assert_eq!(t.headers, vec!["machine", "torque_nm"]);
        assert_eq!(t.rows[0][0], CellValue::String("M-1".into()));
        assert_eq!(t.rows[0][1], CellValue::Float(40.2));
        assert_eq!(t.rows[1][1], CellValue::Null);
    }

    #[test]
    fn parquet_narrow_integers_and_dates_keep_their_values() {
        use arrow::array::{Date32Array, Float32Array, Int16Array, UInt64Array};
        use arrow::datatypes::{Field, Schema};
        use arrow::record_batch::RecordBatch;
        use parquet::arrow::ArrowWriter;

        let schema = Arc::new(Schema::new(vec![
            Field::new("torque_nm", DataType::Int16, false),
            Field::new("air_temperature_k", DataType::Float32, false),
            Field::new("serial", DataType::UInt64, false),
            Field::new("shift_date", DataType::Date32, false),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Int16Array::from(vec![40])),
                Arc::new(Float32Array::from(vec![298.5])),
                Arc::new(UInt64Array::from(vec![u64::MAX])),
                // 2024-03-01
                Arc::new(Date32Array::from(vec![19783])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let t = load_table(file.path()).unwrap();
        assert_eq!(t.rows[0][0], CellValue::Integer(40));
        assert_eq!(t.rows[0][1], CellValue::Float(298.5));
        assert_eq!(t.rows[0][2], CellValue::String(u64::MAX.to_string()));
        assert_eq!(t.rows[0][3], CellValue::String("2024-03-01".into()));
    }
}
