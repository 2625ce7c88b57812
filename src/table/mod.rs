//! Table access for column detection.
//!
//! The rest of the crate only sees tables through [`TableSource`]: an ordered
//! list of [`Column`]s, each carrying its header identifier, a visibility flag,
//! and its cell values as optional strings. How a table is parsed is up to the
//! provider; [`XlsxTable`] reads Excel workbooks and [`InMemoryTable`] holds
//! columns that are already in memory.
//!
//! # Example
//!
//! ```
//! use tabfetch::table::{InMemoryTable, TableSource};
//!
//! let table = InMemoryTable::new("products")
//!     .with_column("Name", ["Lamp", "Chair"])
//!     .with_hidden_column("Internal", ["x", "y"]);
//! let columns = table.columns().unwrap();
//! assert_eq!(columns.len(), 2);
//! assert!(!columns[1].visible);
//! ```

mod error;
mod xlsx;

use std::fmt;

use serde::Serialize;

pub use error::TableError;
pub use xlsx::XlsxTable;

/// Stable identifier of a column: the text of its header cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    /// Creates an identifier from header text.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the header text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ColumnId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ColumnId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// One column of a table, read-only to the detection code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Header identifier.
    pub id: ColumnId,
    /// `false` when the source marks the column hidden.
    pub visible: bool,
    /// Cell values in row order; `None` for empty cells.
    pub values: Vec<Option<String>>,
}

impl Column {
    /// Creates a visible column.
    pub fn new(id: impl Into<ColumnId>, values: Vec<Option<String>>) -> Self {
        Self {
            id: id.into(),
            visible: true,
            values,
        }
    }

    /// Creates a hidden column.
    pub fn hidden(id: impl Into<ColumnId>, values: Vec<Option<String>>) -> Self {
        Self {
            id: id.into(),
            visible: false,
            values,
        }
    }

    /// Iterates the non-empty values.
    pub fn present_values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().filter_map(Option::as_deref)
    }
}

/// A readable table of columns.
pub trait TableSource {
    /// Human-readable name used in logs and reports.
    fn name(&self) -> &str;

    /// Reads every column, hidden ones included, in sheet order.
    ///
    /// # Errors
    ///
    /// Returns [`TableError`] when the source cannot be read at all.
    fn columns(&self) -> Result<Vec<Column>, TableError>;
}

/// Table backed by columns already in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTable {
    name: String,
    columns: Vec<Column>,
}

impl InMemoryTable {
    /// Creates an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a visible column; empty strings are stored as empty cells.
    #[must_use]
    pub fn with_column<I, S>(mut self, id: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.push(Column::new(id, collect_cells(values)));
        self
    }

    /// Appends a hidden column.
    #[must_use]
    pub fn with_hidden_column<I, S>(mut self, id: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.push(Column::hidden(id, collect_cells(values)));
        self
    }

    /// Appends a prepared column.
    #[must_use]
    pub fn with(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }
}

fn collect_cells<I, S>(values: I) -> Vec<Option<String>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .map(|value| (!value.is_empty()).then_some(value))
        .collect()
}

impl TableSource for InMemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn columns(&self) -> Result<Vec<Column>, TableError> {
        Ok(self.columns.clone())
    }
}
