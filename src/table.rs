// 🧮 Tabular Data Model - typed cells and per-category tables

use crate::error::{EtlError, Result};
use crate::schema::{Category, DATE_COLUMN};
use chrono::NaiveDate;
use serde::Serialize;

// ============================================================================
// VALUE
// ============================================================================

/// One typed cell. `Float(NaN)` is the explicit "undefined" result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of Int/Float cells
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Text written to CSV: dates as YYYY-MM-DD, NaN as `NaN`, Null as empty.
    /// Whole floats keep a trailing `.0` so they read back as floats.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) if v.is_nan() => "NaN".to_string(),
            Value::Float(v) if v.is_finite() && v.fract() == 0.0 => format!("{:.1}", v),
            Value::Float(v) => v.to_string(),
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

// ============================================================================
// CATEGORY TABLE
// ============================================================================

/// In-memory rows for one category, columns in catalog order
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryTable {
    pub category: Category,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl CategoryTable {
    pub fn new(category: Category, columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        CategoryTable {
            category,
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column the caller cannot work without
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name).ok_or_else(|| EtlError::MissingColumn {
            category: self.category.name().to_string(),
            column: name.to_string(),
        })
    }

    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Most recent date in `Date`, ignoring Null cells
    pub fn max_date(&self) -> Option<NaiveDate> {
        let index = self.column_index(DATE_COLUMN)?;
        self.column_values(index).filter_map(Value::as_date).max()
    }

    /// Insert a column holding the same value on every row
    pub fn insert_constant_column(&mut self, position: usize, name: &str, value: Value) {
        self.columns.insert(position, name.to_string());
        for row in &mut self.rows {
            row.insert(position, value.clone());
        }
    }

    /// Project onto the named columns, in the given order
    pub fn select(&self, names: &[&str]) -> Result<CategoryTable> {
        let indices = names
            .iter()
            .map(|n| self.require_column(n))
            .collect::<Result<Vec<_>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();

        Ok(CategoryTable::new(
            self.category,
            names.iter().map(|n| n.to_string()).collect(),
            rows,
        ))
    }
}

// ============================================================================
// TESTS
// ============================================================================
