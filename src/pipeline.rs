// 🚚 Pipeline Orchestrator - read → normalize → repair → merge → export
//
// One job processes its extraction folders strictly in order: each merge
// reads back the series exported by the folder before it.

use crate::config::{EtlConfig, JobMode};
use crate::error::{EtlError, Result};
use crate::export::{clear_output, load_series, stage_series, StagedSeries};
use crate::merge::MergeEngine;
use crate::normalize::normalize;
use crate::reader::{discover_batch, list_batches, read_category, ExtractionBatch, RawSheet};
use crate::repair::{RepairEngine, RepairReport};
use crate::schema::{Category, DATE_COLUMN};
use crate::table::{CategoryTable, Value};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, info_span};
use uuid::Uuid;

// ============================================================================
// EXECUTION CONTEXT
// ============================================================================

/// State scoped to one job run, dropped when the job ends
#[derive(Debug, Clone)]
pub struct EtlContext {
    pub config: EtlConfig,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl EtlContext {
    pub fn new(config: EtlConfig) -> Self {
        EtlContext {
            config,
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.config.output_dir
    }
}

// ============================================================================
// BATCH SOURCE
// ============================================================================

/// Where extraction folders come from
pub trait BatchSource {
    /// All folder labels, in processing order
    fn list(&self) -> Result<Vec<String>>;

    fn discover(&self, label: &str) -> Result<ExtractionBatch>;

    fn read(&self, batch: &ExtractionBatch, category: Category) -> Result<RawSheet>;
}

/// Extraction folders under a raw data directory
pub struct FsBatchSource {
    raw_dir: PathBuf,
}

impl FsBatchSource {
    pub fn new(raw_dir: impl Into<PathBuf>) -> Self {
        FsBatchSource {
            raw_dir: raw_dir.into(),
        }
    }
}

impl BatchSource for FsBatchSource {
    fn list(&self) -> Result<Vec<String>> {
        list_batches(&self.raw_dir)
    }

    fn discover(&self, label: &str) -> Result<ExtractionBatch> {
        discover_batch(&self.raw_dir, label)
    }

    fn read(&self, batch: &ExtractionBatch, category: Category) -> Result<RawSheet> {
        read_category(batch, category)
    }
}

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub category: Category,
    pub rows_read: usize,
    pub duplicates_dropped: usize,
    pub series_rows: usize,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub folder: String,
    pub reference_date: Option<NaiveDate>,
    pub repair: RepairReport,
    pub categories: Vec<CategorySummary>,
}

impl BatchSummary {
    pub fn summary(&self) -> String {
        let rows: usize = self.categories.iter().map(|c| c.rows_read).sum();
        let dropped: usize = self.categories.iter().map(|c| c.duplicates_dropped).sum();
        format!(
            "{}: {} categories, {} rows read, {} duplicates dropped, {} cells repaired",
            self.folder,
            self.categories.len(),
            rows,
            dropped,
            self.repair.total_repaired()
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: JobMode,
    pub cleared_files: usize,
    pub batches: Vec<BatchSummary>,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline<S: BatchSource = FsBatchSource> {
    ctx: EtlContext,
    source: S,
    repair: RepairEngine,
    merge: MergeEngine,
}

impl Pipeline<FsBatchSource> {
    /// Pipeline reading extraction folders from `config.raw_dir`
    pub fn new(config: EtlConfig) -> Self {
        let source = FsBatchSource::new(&config.raw_dir);
        Pipeline::with_source(config, source)
    }
}

impl<S: BatchSource> Pipeline<S> {
    pub fn with_source(config: EtlConfig, source: S) -> Self {
        let repair = RepairEngine::new(config.repair);
        let merge = MergeEngine::new(config.merge.conflict_policy);
        Pipeline {
            ctx: EtlContext::new(config),
            source,
            repair,
            merge,
        }
    }

    pub fn context(&self) -> &EtlContext {
        &self.ctx
    }

    /// Labels of every folder the source offers
    pub fn available_batches(&self) -> Result<Vec<String>> {
        self.source.list()
    }

    /// Run one job over `folders`, in order. The first failure aborts it.
    pub fn run_job(self, folders: &[String]) -> Result<JobReport> {
        let span = info_span!("job", run_id = %self.ctx.run_id);
        let _enter = span.enter();

        info!(
            folders = folders.len(),
            mode = ?self.ctx.config.mode,
            conflict_policy = ?self.merge.policy(),
            output = %self.ctx.output_dir().display(),
            "Starting job"
        );

        let cleared_files = match self.ctx.config.mode {
            JobMode::Rebuild => clear_output(self.ctx.output_dir())?,
            JobMode::Append => 0,
        };

        let mut batches = Vec::with_capacity(folders.len());
        for label in folders {
            let summary = self.process_folder(label)?;
            info!(summary = %summary.summary(), "Batch complete");
            batches.push(summary);
        }

        info!(batches = batches.len(), "Job complete");
        Ok(JobReport {
            run_id: self.ctx.run_id,
            started_at: self.ctx.started_at,
            finished_at: Utc::now(),
            mode: self.ctx.config.mode,
            cleared_files,
            batches,
        })
    }

    /// Process one extraction folder fully: nothing is exported unless
    /// every category read, normalized and merged cleanly.
    pub fn process_folder(&self, label: &str) -> Result<BatchSummary> {
        let span = info_span!("batch", folder = %label);
        let _enter = span.enter();

        let batch = self.source.discover(label)?;
        info!(files = batch.files.len(), "Discovered grouping files");

        let mut repair_report = RepairReport::default();
        let mut tables = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let raw = self.source.read(&batch, category)?;
            let mut table = normalize(category, raw)?;

            if category == Category::ContentMetrics {
                let (repaired, report) = self.repair.repair(&table)?;
                info!(summary = %report.summary(), "Repaired content metrics");
                table = repaired;
                repair_report = report;
            }
            tables.push(table);
        }

        let reference_date = tables
            .iter()
            .find(|t| t.category == Category::ContentMetrics)
            .and_then(CategoryTable::max_date);
        stamp_reference_date(&mut tables, reference_date, label)?;

        let mut merged = Vec::with_capacity(tables.len());
        for table in tables {
            let rows_read = table.len();
            let existing = load_series(self.ctx.output_dir(), table.category)?;
            let outcome = self.merge.merge(existing, table)?;
            merged.push((rows_read, outcome));
        }

        // Stage every file before replacing any, so a write failure leaves
        // all series as the previous folder exported them
        let mut staged = Vec::with_capacity(merged.len());
        for (_, outcome) in &merged {
            match stage_series(self.ctx.output_dir(), &outcome.table) {
                Ok(file) => staged.push(file),
                Err(e) => {
                    staged.into_iter().for_each(StagedSeries::discard);
                    return Err(e);
                }
            }
        }

        let mut categories = Vec::with_capacity(merged.len());
        for ((rows_read, outcome), file) in merged.into_iter().zip(staged) {
            let path = file.commit()?;
            categories.push(CategorySummary {
                category: outcome.table.category,
                rows_read,
                duplicates_dropped: outcome.duplicates_dropped,
                series_rows: outcome.table.len(),
                path,
            });
        }

        Ok(BatchSummary {
            folder: label.to_string(),
            reference_date,
            repair: repair_report,
            categories,
        })
    }
}

/// Give every undated category the batch's reference date as its first column
fn stamp_reference_date(
    tables: &mut [CategoryTable],
    reference_date: Option<NaiveDate>,
    folder: &str,
) -> Result<()> {
    for table in tables.iter_mut().filter(|t| !t.category.has_own_date()) {
        let value = match reference_date {
            Some(date) => Value::Date(date),
            None if table.is_empty() => Value::Null,
            None => {
                return Err(EtlError::MissingReferenceDate {
                    folder: folder.to_string(),
                })
            }
        };
        table.insert_constant_column(0, DATE_COLUMN, value);
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
