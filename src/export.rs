// 💾 Series Store - per-category CSV files under the output directory
// Each file holds the full accumulated series and is overwritten on export.

use crate::error::{EtlError, Result};
use crate::normalize::conform_rows;
use crate::schema::Category;
use crate::table::{CategoryTable, Value};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub fn series_path(output_dir: &Path, category: Category) -> PathBuf {
    output_dir.join(format!("{}.csv", category.name()))
}

// ============================================================================
// LOAD
// ============================================================================

/// Read a persisted series back, typed per the category's series schema.
/// A missing file means there is no history yet.
pub fn load_series(output_dir: &Path, category: Category) -> Result<Option<CategoryTable>> {
    let path = series_path(output_dir, category);
    if !path.exists() {
        debug!(category = %category, "No series on disk yet");
        return Ok(None);
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .map_err(|e| EtlError::csv(&path, e))?;

    let specs = category.series_columns();
    let headers = reader.headers().map_err(|e| EtlError::csv(&path, e))?;
    if !headers.iter().eq(specs.iter().map(|s| s.name)) {
        return Err(EtlError::HeaderMismatch {
            category: category.name().to_string(),
            path,
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| EtlError::csv(&path, e))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    let rows = conform_rows(category, &specs, rows)?;
    debug!(category = %category, rows = rows.len(), "Loaded series");

    Ok(Some(CategoryTable::new(
        category,
        specs.iter().map(|s| s.name.to_string()).collect(),
        rows,
    )))
}

// ============================================================================
// WRITE
// ============================================================================

/// A series fully written next to its target, not yet visible to readers
#[derive(Debug)]
pub struct StagedSeries {
    staged: PathBuf,
    target: PathBuf,
}

impl StagedSeries {
    /// Replace the category file with the staged one
    pub fn commit(self) -> Result<PathBuf> {
        fs::rename(&self.staged, &self.target).map_err(|e| EtlError::io(&self.target, e))?;
        debug!(path = %self.target.display(), "Exported series");
        Ok(self.target)
    }

    pub fn discard(self) {
        if let Err(e) = fs::remove_file(&self.staged) {
            warn!(path = %self.staged.display(), error = %e, "Failed to remove staged series");
        }
    }
}

/// Write the whole series, every field quoted, to `<category>.csv.partial`
pub fn stage_series(output_dir: &Path, table: &CategoryTable) -> Result<StagedSeries> {
    fs::create_dir_all(output_dir).map_err(|e| EtlError::io(output_dir, e))?;
    let target = series_path(output_dir, table.category);
    let staged = output_dir.join(format!("{}.csv.partial", table.category.name()));

    let written = write_csv(&staged, table);
    if written.is_err() {
        let _ = fs::remove_file(&staged);
    }
    written?;

    Ok(StagedSeries { staged, target })
}

/// Overwrite the category file with the whole series
pub fn write_series(output_dir: &Path, table: &CategoryTable) -> Result<PathBuf> {
    stage_series(output_dir, table)?.commit()
}

fn write_csv(path: &Path, table: &CategoryTable) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .from_path(path)
        .map_err(|e| EtlError::csv(path, e))?;

    writer
        .write_record(&table.columns)
        .map_err(|e| EtlError::csv(path, e))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(Value::render))
            .map_err(|e| EtlError::csv(path, e))?;
    }
    writer.flush().map_err(|e| EtlError::io(path, e))?;

    debug!(path = %path.display(), rows = table.len(), "Staged series");
    Ok(())
}

/// Remove every exported series file; creates the directory if absent
pub fn clear_output(output_dir: &Path) -> Result<usize> {
    fs::create_dir_all(output_dir).map_err(|e| EtlError::io(output_dir, e))?;

    let mut removed = 0;
    for entry in fs::read_dir(output_dir).map_err(|e| EtlError::io(output_dir, e))? {
        let path = entry.map_err(|e| EtlError::io(output_dir, e))?.path();
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if path.is_file() && is_csv {
            fs::remove_file(&path).map_err(|e| EtlError::io(&path, e))?;
            removed += 1;
        }
    }

    info!(dir = %output_dir.display(), removed, "Cleared output directory");
    Ok(removed)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn content_series() -> CategoryTable {
        let d = |day| Value::Date(NaiveDate::from_ymd_opt(2024, 5, day).unwrap());
        CategoryTable::new(
            Category::ContentMetrics,
            Category::ContentMetrics
                .series_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            vec![
                vec![
                    d(2),
                    Value::Int(0),
                    Value::Int(1),
                    Value::Float(5.0),
                    Value::Int(0),
                    Value::Null,
                    Value::Float(f64::NAN),
                ],
                vec![
                    d(1),
                    Value::Int(100),
                    Value::Int(3),
                    Value::Int(10),
                    Value::Int(5),
                    Value::Int(2),
                    Value::Float(0.2),
                ],
            ],
        )
    }

    #[test]
    fn test_write_quotes_every_field() {
        let dir = TempDir::new().unwrap();
        let path = write_series(dir.path(), &content_series()).unwrap();
        let text = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines[0],
            r#""Date","Impressions","Clicks","Reactions","Comments","Shares","Engagement Rate""#
        );
        assert_eq!(lines[1], r#""2024-05-02","0","1","5.0","0","","NaN""#);
        assert_eq!(lines[2], r#""2024-05-01","100","3","10","5","2","0.2""#);
    }

    #[test]
    fn test_load_reads_back_typed_cells() {
        let dir = TempDir::new().unwrap();
        let table = content_series();
        write_series(dir.path(), &table).unwrap();

        let loaded = load_series(dir.path(), Category::ContentMetrics)
            .unwrap()
            .unwrap();

        assert_eq!(loaded.columns, table.columns);
        assert_eq!(loaded.rows[1], table.rows[1]);
        assert_eq!(loaded.rows[0][3], Value::Float(5.0));
        assert_eq!(loaded.rows[0][5], Value::Null);
        assert!(loaded.rows[0][6].as_f64().unwrap().is_nan());
    }

    #[test]
    fn test_missing_series_is_no_history() {
        let dir = TempDir::new().unwrap();
        assert!(load_series(dir.path(), Category::Competitors)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_foreign_header_is_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(
            series_path(dir.path(), Category::FollowersLocation),
            "\"Location\",\"Total Followers\"\n\"Porto\",\"3\"\n",
        )
        .unwrap();

        let err = load_series(dir.path(), Category::FollowersLocation).unwrap_err();
        assert!(matches!(err, EtlError::HeaderMismatch { .. }));
    }

    #[test]
    fn test_clear_output_removes_only_csv() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("processed");
        write_series(&out, &content_series()).unwrap();
        fs::write(out.join("notes.txt"), "keep").unwrap();

        assert_eq!(clear_output(&out).unwrap(), 1);
        assert!(out.join("notes.txt").exists());
        assert!(!series_path(&out, Category::ContentMetrics).exists());
    }

    #[test]
    fn test_clear_output_creates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("fresh");

        assert_eq!(clear_output(&out).unwrap(), 0);
        assert!(out.is_dir());
    }

    #[test]
    fn test_malformed_history_date_names_category_and_value() {
        let dir = TempDir::new().unwrap();
        fs::write(
            series_path(dir.path(), Category::FollowersNew),
            concat!(
                "\"Date\",\"Followers Sponsored\",\"Followers Organic\",\"Total Followers\"\n",
                "\"2024-05-01\",\"0\",\"1\",\"1\"\n",
                "\"someday\",\"0\",\"2\",\"2\"\n",
            ),
        )
        .unwrap();

        let err = load_series(dir.path(), Category::FollowersNew).unwrap_err();
        match err {
            EtlError::Parse {
                category,
                column,
                value,
            } => {
                assert_eq!(category, "followers_new");
                assert_eq!(column, "Date");
                assert_eq!(value, "someday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_staged_series_invisible_until_commit() {
        let dir = TempDir::new().unwrap();
        let target = series_path(dir.path(), Category::ContentMetrics);
        fs::write(&target, "old").unwrap();

        let staged = stage_series(dir.path(), &content_series()).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "old");

        let path = staged.commit().unwrap();
        assert_eq!(path, target);
        assert!(fs::read_to_string(&target).unwrap().starts_with("\"Date\""));
        assert!(!dir.path().join("content_metrics.csv.partial").exists());
    }

    #[test]
    fn test_discarded_series_leaves_target_alone() {
        let dir = TempDir::new().unwrap();
        let target = series_path(dir.path(), Category::ContentMetrics);
        fs::write(&target, "old").unwrap();

        stage_series(dir.path(), &content_series()).unwrap().discard();

        assert_eq!(fs::read_to_string(&target).unwrap(), "old");
        assert!(!dir.path().join("content_metrics.csv.partial").exists());
    }
}
