// 🚨 Error Taxonomy - every way a job can stop
// Discovery, schema and parse failures are fatal; there are no retries.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Error)]
pub enum EtlError {
    /// A grouping file (competitor/content/followers/visitors) is missing
    #[error("no {grouping} file found in extraction folder '{folder}'")]
    Discovery { folder: String, grouping: String },

    /// Positional rename needs exactly as many columns as the catalog declares
    #[error("{category}: expected {expected} columns, found {found}")]
    ColumnCount {
        category: String,
        expected: usize,
        found: usize,
    },

    #[error("{category}: required column '{column}' is missing")]
    MissingColumn { category: String, column: String },

    /// Persisted series does not carry the category's series columns
    #[error("{category}: header of {} does not match the series schema", .path.display())]
    HeaderMismatch { category: String, path: PathBuf },

    #[error("{category}: cannot parse '{value}' in column '{column}'")]
    Parse {
        category: String,
        column: String,
        value: String,
    },

    /// Content metrics had no dates to stamp undated categories with
    #[error("extraction folder '{folder}' has no content metrics date to use as reference")]
    MissingReferenceDate { folder: String },

    #[error("sheet {position} not found in {}", .path.display())]
    SheetNotFound { path: PathBuf, position: usize },

    #[error("unsupported input format: {}", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("spreadsheet error in {}: {message}", .path.display())]
    Spreadsheet { path: PathBuf, message: String },

    #[error("csv error in {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Sources could not be read or merged into `EtlConfig`
    #[error("configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("invalid configuration: {key} {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EtlError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        EtlError::Csv {
            path: path.into(),
            source,
        }
    }

    pub fn parse(category: &str, column: &str, value: impl Into<String>) -> Self {
        EtlError::Parse {
            category: category.to_string(),
            column: column.to_string(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_error_names_folder() {
        let err = EtlError::Discovery {
            folder: "01_23-01_24".to_string(),
            grouping: "visitors".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("01_23-01_24"));
        assert!(msg.contains("visitors"));
    }

    #[test]
    fn test_parse_error_names_category_and_value() {
        let err = EtlError::parse("content_metrics", "Date", "31/31/2024");
        let msg = err.to_string();
        assert!(msg.contains("content_metrics"));
        assert!(msg.contains("Date"));
        assert!(msg.contains("31/31/2024"));
    }
}
