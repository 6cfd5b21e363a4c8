// 🩹 Content-Metrics Repair Engine
//
// LinkedIn occasionally exports negative sentinel values in the content
// count columns. Each negative count is replaced by the moving average of
// the valid values around it, then the engagement rate is recomputed from
// the repaired counts.

use crate::error::Result;
use crate::schema::{
    Category, DATE_COLUMN, REPAIRED_ENGAGEMENT_COLUMN, SOURCE_ENGAGEMENT_COLUMN,
};
use crate::table::{CategoryTable, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Count columns that may carry negative sentinels
pub const REPAIRED_METRICS: [&str; 4] = ["Reactions", "Comments", "Shares", "Clicks"];

pub const IMPRESSIONS_COLUMN: &str = "Impressions";

/// Output order of the repaired table
const OUTPUT_COLUMNS: [&str; 7] = [
    DATE_COLUMN,
    IMPRESSIONS_COLUMN,
    "Clicks",
    "Reactions",
    "Comments",
    "Shares",
    SOURCE_ENGAGEMENT_COLUMN,
];

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAlignment {
    /// Window ends at the current row
    Trailing,
    /// Window is centred on the current row
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub window: usize,
    pub alignment: WindowAlignment,
}

impl Default for RepairConfig {
    fn default() -> Self {
        RepairConfig {
            window: 3,
            alignment: WindowAlignment::Trailing,
        }
    }
}

// ============================================================================
// REPAIR REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricRepair {
    pub metric: String,
    /// Negative cells found
    pub invalid: usize,
    pub repaired: usize,
    /// Negative cells with no average available (left as-is)
    pub unrepaired: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RepairReport {
    pub metrics: Vec<MetricRepair>,
    /// Rows whose engagement rate came out undefined
    pub undefined_engagement: usize,
}

impl RepairReport {
    pub fn total_repaired(&self) -> usize {
        self.metrics.iter().map(|m| m.repaired).sum()
    }

    pub fn total_unrepaired(&self) -> usize {
        self.metrics.iter().map(|m| m.unrepaired).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "Repaired: {}, Unrepaired: {}, Undefined engagement: {}",
            self.total_repaired(),
            self.total_unrepaired(),
            self.undefined_engagement
        )
    }
}

// ============================================================================
// MOVING AVERAGE
// ============================================================================

/// Mean of the available values inside each row's window.
///
/// A window that runs past either end of the series is incomplete and
/// yields `None`, as does a window with no available value.
pub fn moving_average(
    values: &[Option<f64>],
    window: usize,
    alignment: WindowAlignment,
) -> Vec<Option<f64>> {
    let len = values.len();

    (0..len)
        .map(|i| {
            if window == 0 {
                return None;
            }
            let (before, after) = match alignment {
                WindowAlignment::Trailing => (window - 1, 0),
                WindowAlignment::Centered => (window / 2, window - 1 - window / 2),
            };
            if i < before || i + after >= len {
                return None;
            }

            let available: Vec<f64> = values[i - before..=i + after]
                .iter()
                .filter_map(|v| *v)
                .collect();
            if available.is_empty() {
                None
            } else {
                Some(available.iter().sum::<f64>() / available.len() as f64)
            }
        })
        .collect()
}

// ============================================================================
// REPAIR ENGINE
// ============================================================================

pub struct RepairEngine {
    config: RepairConfig,
}

impl RepairEngine {
    pub fn new(config: RepairConfig) -> Self {
        RepairEngine { config }
    }

    /// Repair a normalized `content_metrics` table
    ///
    /// Returns `Date, Impressions, Clicks, Reactions, Comments, Shares,
    /// Engagement Rate`. Valid counts are kept as-is; negative counts take
    /// the moving average, or stay negative when none is available.
    pub fn repair(&self, table: &CategoryTable) -> Result<(CategoryTable, RepairReport)> {
        debug_assert_eq!(table.category, Category::ContentMetrics);

        let mut out = table.select(&OUTPUT_COLUMNS)?;
        let mut report = RepairReport::default();

        for metric in REPAIRED_METRICS {
            let index = out.require_column(metric)?;
            let stats = self.repair_column(&mut out, index, metric);
            report.metrics.push(stats);
        }

        report.undefined_engagement = recompute_engagement(&mut out)?;

        if report.total_unrepaired() > 0 {
            warn!(
                unrepaired = report.total_unrepaired(),
                "Negative counts left without a moving average"
            );
        }
        debug!(summary = %report.summary(), "Content metrics repaired");

        Ok((out, report))
    }

    fn repair_column(&self, table: &mut CategoryTable, index: usize, metric: &str) -> MetricRepair {
        let positive: Vec<Option<f64>> = table
            .column_values(index)
            .map(|v| v.as_f64().filter(|x| *x >= 0.0))
            .collect();
        let averages = moving_average(&positive, self.config.window, self.config.alignment);

        let mut stats = MetricRepair {
            metric: metric.to_string(),
            ..Default::default()
        };

        for (row, average) in table.rows.iter_mut().zip(averages) {
            let is_negative = row[index].as_f64().is_some_and(|v| v < 0.0);
            if !is_negative {
                continue;
            }

            stats.invalid += 1;
            match average {
                Some(avg) => {
                    row[index] = Value::Float(avg);
                    stats.repaired += 1;
                }
                None => stats.unrepaired += 1,
            }
        }

        stats
    }
}

impl Default for RepairEngine {
    fn default() -> Self {
        Self::new(RepairConfig::default())
    }
}

/// Engagement Rate = (Reactions + Comments + Clicks + Shares) / Impressions.
/// Zero impressions or a missing operand gives NaN. Returns the NaN count.
fn recompute_engagement(table: &mut CategoryTable) -> Result<usize> {
    let impressions = table.require_column(IMPRESSIONS_COLUMN)?;
    let metrics = REPAIRED_METRICS
        .iter()
        .map(|m| table.require_column(m))
        .collect::<Result<Vec<_>>>()?;
    let rate = table.require_column(SOURCE_ENGAGEMENT_COLUMN)?;

    let mut undefined = 0;
    for row in &mut table.rows {
        let total: Option<f64> = metrics.iter().map(|&i| row[i].as_f64()).sum();
        let value = match (total, row[impressions].as_f64()) {
            (Some(total), Some(imp)) if imp != 0.0 => total / imp,
            _ => f64::NAN,
        };
        if value.is_nan() {
            undefined += 1;
        }
        row[rate] = Value::Float(value);
    }

    table.columns[rate] = REPAIRED_ENGAGEMENT_COLUMN.to_string();
    Ok(undefined)
}

// ============================================================================
// TESTS
// ============================================================================
