// 🔤 Column Normalizer - positional rename + type coercion
//
// Source column order is trusted: the N-th raw column becomes the N-th
// catalog column. A column-count mismatch fails loudly instead of
// silently mislabeling data.

use crate::error::{EtlError, Result};
use crate::reader::RawSheet;
use crate::schema::{Category, ColumnSpec, ColumnType};
use crate::table::{CategoryTable, Value};
use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

// ============================================================================
// NORMALIZE
// ============================================================================

/// Rename a raw sheet to its category schema and coerce every cell
pub fn normalize(category: Category, sheet: RawSheet) -> Result<CategoryTable> {
    let sheet = select_known_headers(category, sheet);
    let specs = category.source_columns();

    if sheet.headers.len() != specs.len() {
        return Err(EtlError::ColumnCount {
            category: category.name().to_string(),
            expected: specs.len(),
            found: sheet.headers.len(),
        });
    }

    let rows = conform_rows(category, specs, sheet.rows)?;

    Ok(CategoryTable::new(
        category,
        specs.iter().map(|s| s.name.to_string()).collect(),
        rows,
    ))
}

/// Pick out a known header set (competitor exports carry extra columns)
fn select_known_headers(category: Category, sheet: RawSheet) -> RawSheet {
    for wanted in category.header_selections() {
        let indices: Option<Vec<usize>> = wanted
            .iter()
            .map(|w| {
                sheet
                    .headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(w))
            })
            .collect();

        if let Some(indices) = indices {
            debug!(category = %category, columns = indices.len(), "Selected known header set");
            let rows = sheet
                .rows
                .into_iter()
                .map(|row| {
                    indices
                        .iter()
                        .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                        .collect()
                })
                .collect();
            return RawSheet {
                headers: wanted.iter().map(|w| w.to_string()).collect(),
                rows,
            };
        }
    }

    sheet
}

/// Coerce rows to the given column specs, dropping rows with no data at all.
/// Used for fresh sheets and for series read back from disk.
pub fn conform_rows(
    category: Category,
    specs: &[ColumnSpec],
    rows: Vec<Vec<Value>>,
) -> Result<Vec<Vec<Value>>> {
    let mut out = Vec::with_capacity(rows.len());

    for mut row in rows {
        row.resize(specs.len(), Value::Null);

        let coerced = row
            .into_iter()
            .zip(specs)
            .map(|(value, spec)| coerce(category, spec, value))
            .collect::<Result<Vec<_>>>()?;

        // Blank text coerces to Null, so emptiness is judged after coercion
        if coerced.iter().all(Value::is_null) {
            continue;
        }
        out.push(coerced);
    }

    Ok(out)
}

// ============================================================================
// COERCION
// ============================================================================

/// Convert one cell to its column's declared type
pub fn coerce(category: Category, spec: &ColumnSpec, value: Value) -> Result<Value> {
    let fail = |raw: &str| EtlError::parse(category.name(), spec.name, raw);

    match (spec.kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (_, Value::Text(s)) if s.trim().is_empty() => Ok(Value::Null),

        (ColumnType::Date, Value::Date(d)) => Ok(Value::Date(d)),
        (ColumnType::Date, Value::Text(s)) => parse_date(&s).map(Value::Date).ok_or_else(|| fail(&s)),
        (ColumnType::Date, other) => Err(fail(&other.render())),

        (ColumnType::Integer, Value::Int(v)) => Ok(Value::Int(v)),
        (ColumnType::Integer, Value::Float(v)) if v.is_finite() && v.fract() == 0.0 => {
            Ok(Value::Int(v as i64))
        }
        (ColumnType::Integer, Value::Float(v)) => Ok(Value::Float(v)),
        (ColumnType::Integer, Value::Text(s)) => parse_number(&s).ok_or_else(|| fail(&s)),
        (ColumnType::Integer, other) => Err(fail(&other.render())),

        (ColumnType::Float, Value::Float(v)) => Ok(Value::Float(v)),
        (ColumnType::Float, Value::Int(v)) => Ok(Value::Float(v as f64)),
        (ColumnType::Float, Value::Text(s)) => parse_number(&s)
            .and_then(|v| v.as_f64())
            .map(Value::Float)
            .ok_or_else(|| fail(&s)),
        (ColumnType::Float, other) => Err(fail(&other.render())),

        (ColumnType::Text, Value::Text(s)) => Ok(Value::Text(s)),
        (ColumnType::Text, other) => Ok(Value::Text(other.render())),
    }
}

/// Integers stay integers; anything else numeric (including `NaN`) is a float.
/// A trailing `%` is accepted and scaled, LinkedIn writes some rates that way.
pub fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();

    if let Some(pct) = trimmed.strip_suffix('%') {
        return pct.trim().parse::<f64>().ok().map(|v| Value::Float(v / 100.0));
    }

    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(Value::Int(v));
    }

    trimmed.parse::<f64>().ok().map(Value::Float)
}

/// Parse export and series date formats; any time of day is discarded
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%m/%d/%Y %H:%M:%S",
    ];

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date);
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================
