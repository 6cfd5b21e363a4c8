// 🔀 Incremental Merge Engine - fold a batch into its historical series
// Keyed categories are de-duplicated by key; breakdown snapshots accumulate.

use crate::error::{EtlError, Result};
use crate::schema::DATE_COLUMN;
use crate::table::{CategoryTable, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// CONFLICT POLICY
// ============================================================================

/// Which side keeps its row when both carry the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// The new batch wins
    #[default]
    PreferIncoming,
    /// The persisted row wins
    PreferExisting,
}

// ============================================================================
// MERGE OUTCOME
// ============================================================================

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: CategoryTable,
    pub existing_rows: usize,
    pub incoming_rows: usize,
    pub duplicates_dropped: usize,
}

impl MergeOutcome {
    pub fn summary(&self) -> String {
        format!(
            "{}: {} existing + {} incoming - {} duplicates = {} rows",
            self.table.category,
            self.existing_rows,
            self.incoming_rows,
            self.duplicates_dropped,
            self.table.len()
        )
    }
}

// ============================================================================
// MERGE ENGINE
// ============================================================================

pub struct MergeEngine {
    policy: ConflictPolicy,
}

impl MergeEngine {
    pub fn new(policy: ConflictPolicy) -> Self {
        MergeEngine { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Merge `incoming` into the persisted series, if there is one
    pub fn merge(
        &self,
        existing: Option<CategoryTable>,
        incoming: CategoryTable,
    ) -> Result<MergeOutcome> {
        validate_dates(&incoming)?;
        let incoming_rows = incoming.len();

        let Some(existing) = existing else {
            // First run: the batch becomes the series as-is
            return Ok(MergeOutcome {
                table: incoming,
                existing_rows: 0,
                incoming_rows,
                duplicates_dropped: 0,
            });
        };

        validate_dates(&existing)?;
        check_same_columns(&existing, &incoming)?;
        let existing_rows = existing.len();

        let category = incoming.category;
        let columns = incoming.columns.clone();
        let rows = match self.policy {
            ConflictPolicy::PreferIncoming => concat(incoming, existing),
            ConflictPolicy::PreferExisting => concat(existing, incoming),
        };
        let mut table = CategoryTable::new(category, columns, rows);

        let duplicates_dropped = match category.unique_key() {
            Some(key) => drop_duplicates(&mut table, key)?,
            None => 0,
        };

        sort_by_date_desc(&mut table);

        let outcome = MergeOutcome {
            table,
            existing_rows,
            incoming_rows,
            duplicates_dropped,
        };
        debug!(summary = %outcome.summary(), "Merged batch into series");
        Ok(outcome)
    }
}

impl Default for MergeEngine {
    fn default() -> Self {
        Self::new(ConflictPolicy::default())
    }
}

fn concat(first: CategoryTable, second: CategoryTable) -> Vec<Vec<Value>> {
    let mut rows = first.rows;
    rows.extend(second.rows);
    rows
}

fn check_same_columns(existing: &CategoryTable, incoming: &CategoryTable) -> Result<()> {
    if let Some(missing) = incoming
        .columns
        .iter()
        .find(|c| !existing.columns.contains(c))
    {
        return Err(EtlError::MissingColumn {
            category: incoming.category.name().to_string(),
            column: missing.clone(),
        });
    }

    if existing.columns != incoming.columns {
        return Err(EtlError::ColumnCount {
            category: incoming.category.name().to_string(),
            expected: incoming.columns.len(),
            found: existing.columns.len(),
        });
    }

    Ok(())
}

/// Every non-null `Date` cell must already be a calendar date
fn validate_dates(table: &CategoryTable) -> Result<()> {
    let Some(index) = table.column_index(DATE_COLUMN) else {
        return Ok(());
    };

    match table
        .column_values(index)
        .find(|v| !v.is_null() && v.as_date().is_none())
    {
        Some(bad) => Err(EtlError::parse(
            table.category.name(),
            DATE_COLUMN,
            bad.render(),
        )),
        None => Ok(()),
    }
}

/// Keep the first row seen for each key
pub fn drop_duplicates(table: &mut CategoryTable, key: &str) -> Result<usize> {
    let index = table.require_column(key)?;
    let before = table.len();

    let mut seen = HashSet::new();
    table.rows.retain(|row| seen.insert(row[index].render()));

    Ok(before - table.len())
}

/// Stable sort, most recent first; rows without a date go last
pub fn sort_by_date_desc(table: &mut CategoryTable) {
    let Some(index) = table.column_index(DATE_COLUMN) else {
        return;
    };

    table
        .rows
        .sort_by(|a, b| match (a[index].as_date(), b[index].as_date()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;
    use chrono::NaiveDate;

    fn date(day: u32) -> Value {
        Value::Date(NaiveDate::from_ymd_opt(2024, 3, day).unwrap())
    }

    fn followers_new(days: &[(u32, i64)]) -> CategoryTable {
        CategoryTable::new(
            Category::FollowersNew,
            Category::FollowersNew
                .series_column_names()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            days.iter()
                .map(|&(d, total)| vec![date(d), Value::Int(0), Value::Int(total), Value::Int(total)])
                .collect(),
        )
    }

    fn followers_location(rows: usize, day: u32) -> CategoryTable {
        CategoryTable::new(
            Category::FollowersLocation,
            vec!["Date".into(), "Location".into(), "Total Followers".into()],
            (0..rows)
                .map(|i| vec![date(day), Value::Text(format!("City {}", i)), Value::Int(i as i64)])
                .collect(),
        )
    }

    fn totals(table: &CategoryTable) -> Vec<i64> {
        table
            .rows
            .iter()
            .map(|r| match r[3] {
                Value::Int(v) => v,
                _ => panic!("expected int"),
            })
            .collect()
    }

    #[test]
    fn test_first_run_is_verbatim() {
        let batch = followers_new(&[(1, 3), (2, 4)]);
        let outcome = MergeEngine::default().merge(None, batch.clone()).unwrap();

        assert_eq!(outcome.table, batch);
        assert_eq!(outcome.existing_rows, 0);
        assert_eq!(outcome.duplicates_dropped, 0);
    }

    #[test]
    fn test_keyed_merge_sorted_and_distinct() {
        let existing = followers_new(&[(3, 30), (2, 20), (1, 10)]);
        let incoming = followers_new(&[(3, 31), (4, 41), (5, 51)]);
        let outcome = MergeEngine::default()
            .merge(Some(existing), incoming)
            .unwrap();

        let dates: Vec<NaiveDate> = outcome
            .table
            .rows
            .iter()
            .map(|r| r[0].as_date().unwrap())
            .collect();
        assert!(dates.windows(2).all(|w| w[0] >= w[1]));

        let distinct: HashSet<_> = dates.iter().collect();
        assert_eq!(distinct.len(), outcome.table.len());
        assert_eq!(outcome.table.len(), 5);
        assert_eq!(outcome.duplicates_dropped, 1);
    }

    #[test]
    fn test_prefer_incoming_keeps_new_row() {
        let existing = followers_new(&[(2, 20)]);
        let incoming = followers_new(&[(2, 99)]);
        let outcome = MergeEngine::new(ConflictPolicy::PreferIncoming)
            .merge(Some(existing), incoming)
            .unwrap();

        assert_eq!(totals(&outcome.table), vec![99]);
    }

    #[test]
    fn test_prefer_existing_keeps_old_row() {
        let existing = followers_new(&[(2, 20)]);
        let incoming = followers_new(&[(2, 99)]);
        let outcome = MergeEngine::new(ConflictPolicy::PreferExisting)
            .merge(Some(existing), incoming)
            .unwrap();

        assert_eq!(totals(&outcome.table), vec![20]);
    }

    #[test]
    fn test_merge_is_idempotent_for_keyed_categories() {
        let engine = MergeEngine::default();
        let batch = followers_new(&[(1, 10), (2, 20), (3, 30)]);

        let once = engine.merge(None, batch.clone()).unwrap().table;
        let twice = engine.merge(Some(once.clone()), batch).unwrap();

        assert!(twice.table.len() <= once.len());
        assert_eq!(twice.duplicates_dropped, 3);
    }

    #[test]
    fn test_breakdowns_accumulate() {
        let engine = MergeEngine::default();
        let first = engine.merge(None, followers_location(5, 1)).unwrap().table;
        let second = engine
            .merge(Some(first), followers_location(5, 2))
            .unwrap();

        assert_eq!(second.table.len(), 10);
        assert_eq!(second.duplicates_dropped, 0);
        // Newer snapshot first
        assert_eq!(second.table.rows[0][0], date(2));
    }

    #[test]
    fn test_null_dates_sort_last() {
        let mut table = followers_new(&[(1, 1), (5, 5)]);
        table.rows.insert(0, vec![Value::Null, Value::Int(0), Value::Int(7), Value::Int(7)]);
        sort_by_date_desc(&mut table);

        assert_eq!(totals(&table), vec![5, 1, 7]);
    }

    #[test]
    fn test_posts_keyed_by_link() {
        let mut table = CategoryTable::new(
            Category::ContentPosts,
            vec!["Post Link".into(), "Date".into()],
            vec![
                vec![Value::Text("https://lnkd.in/a".into()), date(2)],
                vec![Value::Text("https://lnkd.in/b".into()), date(2)],
                vec![Value::Text("https://lnkd.in/a".into()), date(1)],
            ],
        );
        let dropped = drop_duplicates(&mut table, "Post Link").unwrap();

        assert_eq!(dropped, 1);
        assert_eq!(table.rows[1][0], Value::Text("https://lnkd.in/b".into()));
    }

    #[test]
    fn test_malformed_date_names_category_and_value() {
        let existing = followers_new(&[(1, 1)]);
        let mut incoming = followers_new(&[(2, 2)]);
        incoming.rows[0][0] = Value::Text("someday".into());

        let err = MergeEngine::default()
            .merge(Some(existing), incoming)
            .unwrap_err();
        match err {
            EtlError::Parse {
                category, value, ..
            } => {
                assert_eq!(category, "followers_new");
                assert_eq!(value, "someday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_column_drift_is_schema_error() {
        let mut existing = followers_new(&[(1, 1)]);
        existing.columns[1] = "Sponsored".into();

        let err = MergeEngine::default()
            .merge(Some(existing), followers_new(&[(2, 2)]))
            .unwrap_err();
        assert!(matches!(err, EtlError::MissingColumn { .. }));
    }
}
