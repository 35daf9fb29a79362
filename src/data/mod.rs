/// Data layer: batch tables, loading and writing.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader  │  parse file → Table
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Table   │  ordered headers, rows of CellValue
///   └──────────┘
///        │   (preprocess → predict → annotate)
///        ▼
///   ┌──────────┐
///   │  writer  │  Table → CSV
///   └──────────┘
/// ```

pub mod loader;
pub mod model;
pub mod writer;
