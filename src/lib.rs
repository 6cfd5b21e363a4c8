// LinkedIn Analytics ETL - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod error;
pub mod export;     // Series store: per-category CSV files
pub mod merge;      // Incremental merge + de-duplication
pub mod normalize;  // Positional rename + type coercion
pub mod pipeline;
pub mod reader;     // Extraction folder discovery + sheet readers
pub mod repair;     // Content metrics moving-average repair
pub mod schema;
pub mod table;

// Re-export commonly used types
pub use config::{EtlConfig, JobMode, MergeSettings};
pub use error::{EtlError, Result};
pub use export::{clear_output, load_series, series_path, write_series};
pub use merge::{ConflictPolicy, MergeEngine, MergeOutcome};
pub use normalize::normalize;
pub use pipeline::{
    BatchSource, BatchSummary, CategorySummary, EtlContext, FsBatchSource, JobReport, Pipeline,
};
pub use reader::{
    discover_batch, get_reader, list_batches, read_category,
    CsvSheetReader, ExtractionBatch, InputFormat, RawSheet, SheetReader, SpreadsheetReader,
};
pub use repair::{moving_average, RepairConfig, RepairEngine, RepairReport, WindowAlignment};
pub use schema::{Category, ColumnSpec, ColumnType, Grouping};
pub use table::{CategoryTable, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
