use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use super::model::Table;

/// Write a table as CSV (header row first) to any writer.
pub fn write_csv<W: Write>(table: &Table, out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer
        .write_record(&table.headers)
        .context("writing CSV header")?;
    for (row_no, row) in table.rows.iter().enumerate() {
        writer
            .write_record(row.iter().map(|c| c.to_string()))
            .with_context(|| format!("writing CSV row {row_no}"))?;
    }
    writer.flush().context("flushing CSV output")?;
    Ok(())
}

/// Write a table as CSV to `path`, replacing any existing file.
pub fn write_csv_file(table: &Table, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating {}", path.display()))?;
    write_csv(table, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    #[test]
    fn writes_header_then_rows() {
        let t = Table::new(
            vec!["id".into(), "status".into()],
            vec![
                vec![CellValue::Integer(1), CellValue::String("SAFE".into())],
                vec![CellValue::Integer(2), CellValue::Null],
            ],
        );
        let mut buf = Vec::new();
        write_csv(&t, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "id,status\n1,SAFE\n2,\n");
    }
}
