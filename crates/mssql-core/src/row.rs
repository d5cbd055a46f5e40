use std::fmt;

use crate::error::CoreError;

/// Database-neutral scalar produced by a [`DataSource`](crate::DataSource).
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Anything the adapter does not map, kept as its debug form.
    Other(String),
}

impl Cell {
    fn kind(&self) -> &'static str {
        match self {
            Cell::Null => "null",
            Cell::Bool(_) => "bool",
            Cell::Int(_) => "int",
            Cell::Float(_) => "float",
            Cell::Text(_) => "text",
            Cell::Other(_) => "other",
        }
    }

    /// Ints, floats and bits; `Null` is rejected.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Bool(v) => write!(f, "{v}"),
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(v) => write!(f, "'{v}'"),
            Cell::Other(v) => f.write_str(v),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

/// One result row, cells in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow(pub Vec<Cell>);

impl RawRow {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self(cells)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn cell(&self, index: usize) -> Result<&Cell, CoreError> {
        self.0.get(index).ok_or(CoreError::MissingColumn { index })
    }

    /// Numeric column, see [`Cell::as_f64`].
    pub fn f64_at(&self, index: usize) -> Result<f64, CoreError> {
        let cell = self.cell(index)?;
        cell.as_f64().ok_or_else(|| type_error(index, "number", cell))
    }

    pub fn text_at(&self, index: usize) -> Result<String, CoreError> {
        let cell = self.cell(index)?;
        cell.as_text()
            .map(str::to_string)
            .ok_or_else(|| type_error(index, "text", cell))
    }

    /// Text column that may legitimately be `NULL`.
    pub fn opt_text_at(&self, index: usize) -> Result<Option<String>, CoreError> {
        match self.cell(index)? {
            Cell::Null => Ok(None),
            cell => cell
                .as_text()
                .map(|v| Some(v.to_string()))
                .ok_or_else(|| type_error(index, "text", cell)),
        }
    }
}

/// Builds a row from a list of cell-convertible values.
///
/// ```
/// use mssql_core::{row, Cell};
/// let r = row!["db1", 5_i64];
/// assert_eq!(r.0[0], Cell::Text("db1".into()));
/// ```
#[macro_export]
macro_rules! row {
    ($($cell:expr),* $(,)?) => {
        $crate::RawRow::new(vec![$($crate::Cell::from($cell)),*])
    };
}

fn type_error(index: usize, expected: &'static str, found: &Cell) -> CoreError {
    CoreError::ColumnType {
        index,
        expected,
        found: found.kind().to_string(),
    }
}

/// Typed shape of one query's rows.
pub trait FromRow: Sized + Send + Sync + 'static {
    /// Exact number of columns the query produces.
    const COLUMNS: usize;

    fn decode(row: &RawRow) -> Result<Self, CoreError>;

    /// Checks the column count, then decodes.
    fn from_row(row: &RawRow) -> Result<Self, CoreError> {
        if row.len() > Self::COLUMNS {
            return Err(CoreError::UnexpectedColumns {
                expected: Self::COLUMNS,
                got: row.len(),
            });
        }
        Self::decode(row)
    }
}
