//! Cell values and row access.

use anyhow::{Result, anyhow};

/// A single cell value. `None` in any variant is SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Uint32(Option<u32>),
    Uint64(Option<u64>),
    Float(Option<f32>),
    Double(Option<f64>),
    Str(Option<String>),
    Binary(Option<Vec<u8>>),
    /// `%Y-%m-%d`
    Date(Option<String>),
    /// `%H:%M:%S%.f`
    Time(Option<String>),
    /// RFC 3339 or `%Y-%m-%d %H:%M:%S%.f`
    Timestamp(Option<String>),
}

impl DataType {
    /// Whether the value is SQL NULL.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Boolean(None)
                | Self::Int32(None)
                | Self::Int64(None)
                | Self::Uint32(None)
                | Self::Uint64(None)
                | Self::Float(None)
                | Self::Double(None)
                | Self::Str(None)
                | Self::Binary(None)
                | Self::Date(None)
                | Self::Time(None)
                | Self::Timestamp(None)
        )
    }
}

/// A named cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: DataType,
}

/// A materialized result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub fields: Vec<Field>,
}

impl Row {
    /// Appends a named cell.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: DataType) -> Self {
        self.fields.push(Field {
            name: name.into(),
            value,
        });
        self
    }
}

/// Positional access to the current row of a result set.
///
/// Implemented by the materialized [`Row`] and by streaming cursors, so a
/// mapper works the same way over both.
pub trait RowAccess {
    /// Number of columns in the row.
    fn column_count(&self) -> usize;

    /// Label of the column at `index`.
    fn column_label(&self, index: usize) -> Option<&str>;

    /// Value of the column at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of range or the cell cannot be
    /// read.
    fn value(&self, index: usize) -> Result<DataType>;

    /// Index of the column labeled `label`, compared case-insensitively.
    fn find(&self, label: &str) -> Option<usize> {
        (0..self.column_count()).find(|&index| {
            self.column_label(index).is_some_and(|name| name.eq_ignore_ascii_case(label))
        })
    }
}

impl dyn RowAccess + '_ {
    /// Reads and converts the named column.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is missing or the value cannot be
    /// converted to `T`.
    pub fn get<T: crate::FetchValue>(&self, column: &str) -> Result<T> {
        let index = self.find(column).ok_or_else(|| anyhow!("missing column '{column}'"))?;
        T::fetch(&self.value(index)?)
    }
}

impl RowAccess for Row {
    fn column_count(&self) -> usize {
        self.fields.len()
    }

    fn column_label(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(|field| field.name.as_str())
    }

    fn value(&self, index: usize) -> Result<DataType> {
        self.fields
            .get(index)
            .map(|field| field.value.clone())
            .ok_or_else(|| anyhow!("column index {index} out of range"))
    }
}
