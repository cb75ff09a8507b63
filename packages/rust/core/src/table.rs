//! In-memory typed table parsed from CSV.
//!
//! Every column is typed once at parse time from its non-empty cells, trying
//! integer → float → boolean → date → text in that order.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::warn;

use insightflow_shared::{ColumnType, InsightFlowError, Result};

/// Cell spellings treated as missing values (compared case-insensitively).
const MISSING_MARKERS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDateTime),
    Text(String),
}

/// Hashable identity of a non-empty cell, used for distinct counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DistinctKey {
    Integer(i64),
    FloatBits(u64),
    Boolean(bool),
    Date(NaiveDateTime),
    Text(String),
}

impl Value {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Numeric view of the cell; `None` for empty and non-numeric cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Temporal view of the cell. Text cells are parsed on demand.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Date(d) => Some(*d),
            Self::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Identity for distinct counting. Whole floats compare equal to integers.
    pub fn distinct_key(&self) -> Option<DistinctKey> {
        match self {
            Self::Empty => None,
            Self::Integer(i) => Some(DistinctKey::Integer(*i)),
            Self::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some(DistinctKey::Integer(*f as i64))
            }
            Self::Float(f) => Some(DistinctKey::FloatBits(f.to_bits())),
            Self::Boolean(b) => Some(DistinctKey::Boolean(*b)),
            Self::Date(d) => Some(DistinctKey::Date(*d)),
            Self::Text(s) => Some(DistinctKey::Text(s.clone())),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Columns and tables
// ---------------------------------------------------------------------------

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Normalized column name.
    pub name: String,
    pub column_type: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    /// Build a column from raw cell text, inferring its type.
    pub fn from_raw(name: impl Into<String>, cells: Vec<String>) -> Self {
        let column_type = infer_type(&cells);
        let values = cells
            .into_iter()
            .map(|cell| convert_cell(cell, column_type))
            .collect();
        Self {
            name: name.into(),
            column_type,
            values,
        }
    }

    /// Non-empty cells.
    pub fn present(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().filter(|v| !v.is_empty())
    }
}

/// Ordered set of equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Assemble a table from columns, normalizing names and applying the
    /// duplicate-name policy: a later column whose normalized name collides
    /// with an earlier one replaces it in the earlier position.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map_or(0, |c| c.values.len());
        if let Some(bad) = columns.iter().find(|c| c.values.len() != row_count) {
            return Err(InsightFlowError::intake(format!(
                "column '{}' has {} values, expected {row_count}",
                bad.name,
                bad.values.len()
            )));
        }

        let mut merged: Vec<Column> = Vec::with_capacity(columns.len());
        for mut column in columns {
            column.name = normalize_column_name(&column.name);
            match merged.iter_mut().find(|c| c.name == column.name) {
                Some(existing) => {
                    warn!(column = %column.name, "duplicate normalized column name, keeping the later column");
                    *existing = column;
                }
                None => merged.push(column),
            }
        }

        Ok(Self {
            columns: merged,
            row_count,
        })
    }

    /// Parse CSV text (header row required) from any reader.
    pub fn from_csv_reader(reader: impl Read) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()
            .map_err(|e| InsightFlowError::intake(format!("error reading CSV header: {e}")))?
            .iter()
            .map(str::to_string)
            .collect();

        if headers.is_empty() {
            return Err(InsightFlowError::intake("no columns to parse from source"));
        }

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for (i, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| {
                InsightFlowError::intake(format!("error reading CSV record {}: {e}", i + 1))
            })?;
            for (column, field) in cells.iter_mut().zip(record.iter()) {
                column.push(field.to_string());
            }
        }

        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column::from_raw(name, raw))
            .collect();

        Self::from_columns(columns)
    }

    /// Parse an in-memory CSV payload.
    pub fn from_csv_bytes(data: &[u8]) -> Result<Self> {
        Self::from_csv_reader(data)
    }

    /// Parse a CSV file on disk.
    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            InsightFlowError::intake(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_csv_reader(std::io::BufReader::new(file))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up a column by normalized name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Canonical column token: trimmed, lower-cased, whitespace replaced by `_`.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Parse the date and datetime shapes accepted in CSV input.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    // Offset timestamps keep their wall-clock time.
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local())
}

fn is_missing(cell: &str) -> bool {
    MISSING_MARKERS
        .iter()
        .any(|m| cell.eq_ignore_ascii_case(m))
}

/// Floats other than `inf`/`nan` spellings, which stay text.
fn parse_finite(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn infer_type(cells: &[String]) -> ColumnType {
    let present: Vec<&str> = cells
        .iter()
        .map(String::as_str)
        .filter(|c| !is_missing(c))
        .collect();

    if present.is_empty() {
        ColumnType::Empty
    } else if present.iter().all(|c| c.parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if present.iter().all(|c| parse_finite(c).is_some()) {
        ColumnType::Float
    } else if present.iter().all(|c| parse_bool(c).is_some()) {
        ColumnType::Boolean
    } else if present.iter().all(|c| parse_datetime(c).is_some()) {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

fn convert_cell(cell: String, column_type: ColumnType) -> Value {
    if is_missing(&cell) {
        return Value::Empty;
    }
    let parsed = match column_type {
        ColumnType::Integer => cell.parse().ok().map(Value::Integer),
        ColumnType::Float => parse_finite(&cell).map(Value::Float),
        ColumnType::Boolean => parse_bool(&cell).map(Value::Boolean),
        ColumnType::Date => parse_datetime(&cell).map(Value::Date),
        ColumnType::Text | ColumnType::Empty => None,
    };
    parsed.unwrap_or(Value::Text(cell))
}
