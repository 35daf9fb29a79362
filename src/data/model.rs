use std::fmt;

// ---------------------------------------------------------------------------
// CellValue – a single cell of a batch table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring common dataframe dtypes. Extra
/// columns pass through untouched: text sources keep their exact text and
/// numbers are only parsed when a feature column is read.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Integer(i) => write!(f, "{i}"),
            CellValue::Float(v) => write!(f, "{v}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl CellValue {
    /// Interpret the cell as an `f64` for scaling.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Cell for a raw text field. The text is kept as written; an empty
    /// field is `Null`.
    pub fn from_text(s: &str) -> CellValue {
        if s.is_empty() {
            CellValue::Null
        } else {
            CellValue::String(s.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Table – the loaded batch input
// ---------------------------------------------------------------------------

/// Column-ordered table of rows. Every row has exactly `headers.len()`
/// cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table, padding short rows with `Null` and truncating long
    /// ones so the rectangular shape holds.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Table { headers, rows }
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Required columns absent from this table, in the order given.
    pub fn missing_columns(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|c| self.column_index(c).is_none())
            .map(|c| c.to_string())
            .collect()
    }

    /// Append a column. `values` must have one entry per row.
    pub fn push_column(&mut self, name: &str, values: Vec<CellValue>) {
        debug_assert_eq!(values.len(), self.rows.len());
        self.headers.push(name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_cells_stay_verbatim() {
        assert_eq!(CellValue::from_text(""), CellValue::Null);
        assert_eq!(CellValue::from_text("007"), CellValue::String("007".into()));
        assert_eq!(CellValue::from_text("007").to_string(), "007");
        assert_eq!(CellValue::from_text("1.50").as_f64(), Some(1.5));
        assert_eq!(CellValue::from_text("M").as_f64(), None);
    }

    #[test]
    fn new_pads_ragged_rows() {
        let t = Table::new(
            vec!["a".into(), "b".into()],
            vec![vec![CellValue::Integer(1)], vec![]],
        );
        assert_eq!(t.rows[0], vec![CellValue::Integer(1), CellValue::Null]);
        assert_eq!(t.rows[1].len(), 2);
    }

    #[test]
    fn missing_columns_reports_only_absent() {
        let t = Table::new(vec!["a".into(), "c".into()], vec![]);
        assert_eq!(t.missing_columns(&["a", "b", "c", "d"]), vec!["b", "d"]);
    }

    #[test]
    fn push_column_extends_every_row() {
        let mut t = Table::new(
            vec!["a".into()],
            vec![vec![CellValue::Integer(1)], vec![CellValue::Integer(2)]],
        );
        t.push_column("b", vec![CellValue::Bool(true), CellValue::Bool(false)]);
        assert_eq!(t.headers, vec!["a", "b"]);
        assert_eq!(t.rows[1][1], CellValue::Bool(false));
        assert_eq!(t.len(), 2);
    }
}
