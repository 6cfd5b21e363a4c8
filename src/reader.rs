// 📂 Raw Extraction Reader - find grouping files and load category sheets
//
// An extraction folder holds one file per grouping (competitor, content,
// followers, visitors). Spreadsheets are read sheet-by-sheet by position;
// CSV files hold a single sheet.

use crate::error::{EtlError, Result};
use crate::schema::{Category, Grouping};
use crate::table::Value;
use calamine::{open_workbook_auto, Data, DataType, Reader};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// ============================================================================
// CORE TYPES
// ============================================================================

/// RawSheet - a sheet as read, before any renaming or coercion
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// ExtractionBatch - one dated export folder and its grouping files
#[derive(Debug, Clone)]
pub struct ExtractionBatch {
    /// Folder name, a date-range label such as `01_23-01_24`
    pub label: String,
    pub folder: PathBuf,
    pub files: BTreeMap<Grouping, PathBuf>,
}

impl ExtractionBatch {
    pub fn file_for(&self, grouping: Grouping) -> Result<&Path> {
        self.files
            .get(&grouping)
            .map(PathBuf::as_path)
            .ok_or_else(|| EtlError::Discovery {
                folder: self.label.clone(),
                grouping: grouping.name().to_string(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Spreadsheet,
    Csv,
}

// ============================================================================
// DISCOVERY
// ============================================================================

/// List extraction folders under the raw directory, in lexical order
pub fn list_batches(raw_dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(raw_dir).map_err(|e| EtlError::io(raw_dir, e))?;

    let mut labels = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EtlError::io(raw_dir, e))?;
        let is_dir = entry
            .file_type()
            .map_err(|e| EtlError::io(entry.path(), e))?
            .is_dir();
        if is_dir {
            if let Some(name) = entry.file_name().to_str() {
                labels.push(name.to_string());
            }
        }
    }

    labels.sort();
    Ok(labels)
}

/// Locate the four grouping files inside `<raw_dir>/<label>`
///
/// Filenames are matched case-insensitively against each grouping's
/// Portuguese and English substrings. A missing grouping is fatal.
pub fn discover_batch(raw_dir: &Path, label: &str) -> Result<ExtractionBatch> {
    let folder = raw_dir.join(label);
    let entries = fs::read_dir(&folder).map_err(|e| EtlError::io(&folder, e))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EtlError::io(&folder, e))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            // Office lock files and dotfiles are never exports
            if name.starts_with("~$") || name.starts_with('.') {
                continue;
            }
            names.push(name.to_string());
        }
    }
    names.sort();

    let mut files: BTreeMap<Grouping, PathBuf> = BTreeMap::new();
    for name in &names {
        let Some(grouping) = Grouping::ALL.iter().copied().find(|g| g.matches(name)) else {
            debug!(file = %name, "Ignoring file with no grouping");
            continue;
        };

        if let Some(existing) = files.get(&grouping) {
            warn!(
                folder = label,
                grouping = %grouping,
                kept = %existing.display(),
                ignored = %name,
                "More than one file for grouping"
            );
            continue;
        }
        files.insert(grouping, folder.join(name));
    }

    for grouping in Grouping::ALL {
        if !files.contains_key(&grouping) {
            return Err(EtlError::Discovery {
                folder: label.to_string(),
                grouping: grouping.name().to_string(),
            });
        }
    }

    Ok(ExtractionBatch {
        label: label.to_string(),
        folder,
        files,
    })
}

/// Detect input format from the file extension
pub fn detect_format(path: &Path) -> Result<InputFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(InputFormat::Spreadsheet),
        "csv" => Ok(InputFormat::Csv),
        _ => Err(EtlError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

// ============================================================================
// SHEET READERS
// ============================================================================

/// SheetReader - loads one sheet of a grouping file
pub trait SheetReader {
    /// Read sheet `position`, skipping `skip_rows` rows above the header
    fn read_sheet(&self, path: &Path, position: usize, skip_rows: usize) -> Result<RawSheet>;
}

/// Factory: reader for a detected format
pub fn get_reader(format: InputFormat) -> Box<dyn SheetReader> {
    match format {
        InputFormat::Spreadsheet => Box::new(SpreadsheetReader),
        InputFormat::Csv => Box::new(CsvSheetReader),
    }
}

/// Read the sheet holding `category` from its grouping file in `batch`
pub fn read_category(batch: &ExtractionBatch, category: Category) -> Result<RawSheet> {
    let path = batch.file_for(category.grouping())?;
    let reader = get_reader(detect_format(path)?);

    let sheet = reader.read_sheet(path, category.sheet_position(), category.skip_rows())?;
    debug!(
        category = %category,
        rows = sheet.rows.len(),
        columns = sheet.headers.len(),
        "Read sheet"
    );
    Ok(sheet)
}

/// Split rows into header + data after skipping the title rows
fn split_header(rows: Vec<Vec<Value>>, skip_rows: usize) -> RawSheet {
    let mut rows: Vec<Vec<Value>> = rows.into_iter().skip(skip_rows).collect();
    if rows.is_empty() {
        return RawSheet {
            headers: Vec::new(),
            rows,
        };
    }

    let header_row = rows.remove(0);
    let mut headers: Vec<String> = header_row.iter().map(Value::render).collect();

    // Trailing unnamed columns are padding, not data
    while headers.last().is_some_and(|h| h.trim().is_empty()) {
        headers.pop();
    }
    for row in &mut rows {
        row.truncate(headers.len());
    }

    RawSheet { headers, rows }
}

// ============================================================================
// SPREADSHEET READER (xlsx / xls / ods)
// ============================================================================

pub struct SpreadsheetReader;

impl SheetReader for SpreadsheetReader {
    fn read_sheet(&self, path: &Path, position: usize, skip_rows: usize) -> Result<RawSheet> {
        let spreadsheet_err = |message: String| EtlError::Spreadsheet {
            path: path.to_path_buf(),
            message,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| spreadsheet_err(e.to_string()))?;

        let range = workbook
            .worksheet_range_at(position)
            .ok_or_else(|| EtlError::SheetNotFound {
                path: path.to_path_buf(),
                position,
            })?
            .map_err(|e| spreadsheet_err(e.to_string()))?;

        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let skip = rows_to_skip(skip_rows, first_row);

        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_to_value).collect())
            .collect();

        Ok(split_header(rows, skip))
    }
}

/// The used range starts at the first non-empty cell, not at row 0, so
/// leading blank rows already count against the title rows to skip
fn rows_to_skip(skip_rows: usize, first_used_row: usize) -> usize {
    skip_rows.saturating_sub(first_used_row)
}

fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(v) => Value::Int(*v),
        Data::Float(v) => Value::Float(*v),
        Data::Bool(b) => Value::Text(b.to_string()),
        Data::String(s) => Value::Text(s.clone()),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| Value::Date(dt.date()))
            .unwrap_or_else(|| Value::Text(cell.to_string())),
        Data::DurationIso(s) => Value::Text(s.clone()),
    }
}

// ============================================================================
// CSV READER
// ============================================================================

pub struct CsvSheetReader;

impl SheetReader for CsvSheetReader {
    fn read_sheet(&self, path: &Path, position: usize, skip_rows: usize) -> Result<RawSheet> {
        if position != 0 {
            return Err(EtlError::SheetNotFound {
                path: path.to_path_buf(),
                position,
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)
            .map_err(|e| EtlError::csv(path, e))?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| EtlError::csv(path, e))?;
            rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.trim().is_empty() {
                            Value::Null
                        } else {
                            Value::Text(field.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(split_header(rows, skip_rows))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    fn batch_dir(names: &[&str]) -> (TempDir, String) {
        let root = TempDir::new().unwrap();
        let label = "01_23-01_24".to_string();
        let folder = root.path().join(&label);
        fs::create_dir_all(&folder).unwrap();
        for name in names {
            touch(&folder, name);
        }
        (root, label)
    }

    #[test]
    fn test_discover_portuguese_names() {
        let (root, label) = batch_dir(&[
            "acme_concorrentes_1706745600.xlsx",
            "acme_conteúdo_1706745600.xls",
            "acme_seguidores_1706745600.xls",
            "acme_visitantes_1706745600.xls",
        ]);

        let batch = discover_batch(root.path(), &label).unwrap();
        assert_eq!(batch.files.len(), 4);
        assert!(batch
            .file_for(Grouping::Content)
            .unwrap()
            .ends_with("acme_conteúdo_1706745600.xls"));
    }

    #[test]
    fn test_discover_english_names_ignores_lock_files() {
        let (root, label) = batch_dir(&[
            "~$acme_content.xls",
            "acme_competitor_analytics.csv",
            "acme_content.xls",
            "acme_followers.xls",
            "acme_visitors.xls",
            "notes.txt",
        ]);

        let batch = discover_batch(root.path(), &label).unwrap();
        assert!(batch
            .file_for(Grouping::Content)
            .unwrap()
            .ends_with("acme_content.xls"));
        assert!(batch
            .file_for(Grouping::Competitor)
            .unwrap()
            .ends_with("acme_competitor_analytics.csv"));
    }

    #[test]
    fn test_discover_missing_grouping_names_folder() {
        let (root, label) = batch_dir(&["acme_content.xls", "acme_followers.xls", "acme_visitors.xls"]);

        let err = discover_batch(root.path(), &label).unwrap_err();
        match err {
            EtlError::Discovery { folder, grouping } => {
                assert_eq!(folder, "01_23-01_24");
                assert_eq!(grouping, "competitor");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_list_batches_sorted_dirs_only() {
        let root = TempDir::new().unwrap();
        fs::create_dir(root.path().join("04_23-04_24")).unwrap();
        fs::create_dir(root.path().join("01_23-01_24")).unwrap();
        touch(root.path(), "readme.md");

        let labels = list_batches(root.path()).unwrap();
        assert_eq!(labels, vec!["01_23-01_24", "04_23-04_24"]);
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format(Path::new("a.XLSX")).unwrap(), InputFormat::Spreadsheet);
        assert_eq!(detect_format(Path::new("a.xls")).unwrap(), InputFormat::Spreadsheet);
        assert_eq!(detect_format(Path::new("a.csv")).unwrap(), InputFormat::Csv);
        assert!(detect_format(Path::new("a.pdf")).is_err());
    }

    #[test]
    fn test_csv_reader_skips_title_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("competitors.csv");
        fs::write(
            &path,
            "Concorrentes da Acme\nPage,Total de seguidores,Extra,\nAcme,100,x,\nGlobex,,y,\n",
        )
        .unwrap();

        let sheet = get_reader(InputFormat::Csv).read_sheet(&path, 0, 1).unwrap();
        assert_eq!(sheet.headers, vec!["Page", "Total de seguidores", "Extra"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][1], Value::Text("100".to_string()));
        assert_eq!(sheet.rows[1][1], Value::Null);
    }

    #[test]
    fn test_cell_to_value_scalars() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::Int(7)), Value::Int(7));
        assert_eq!(cell_to_value(&Data::Float(0.25)), Value::Float(0.25));
        assert_eq!(cell_to_value(&Data::Bool(true)), Value::Text("true".to_string()));
        assert_eq!(
            cell_to_value(&Data::String("Lisboa".to_string())),
            Value::Text("Lisboa".to_string())
        );
        assert_eq!(
            cell_to_value(&Data::Error(calamine::CellErrorType::Div0)),
            Value::Null
        );
    }

    #[test]
    fn test_cell_to_value_dates_drop_time() {
        let expected = Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());

        // Excel serial 45292.5 is 2024-01-01 12:00
        let serial = Data::DateTime(calamine::ExcelDateTime::new(
            45292.5,
            calamine::ExcelDateTimeType::DateTime,
            false,
        ));
        assert_eq!(cell_to_value(&serial), expected);

        let iso = Data::DateTimeIso("2024-01-01T08:30:00".to_string());
        assert_eq!(cell_to_value(&iso), expected);
    }

    #[test]
    fn test_rows_to_skip_accounts_for_used_range_offset() {
        // Title row present in the used range
        assert_eq!(rows_to_skip(1, 0), 1);
        // Used range already begins below a blank title row
        assert_eq!(rows_to_skip(1, 1), 0);
        assert_eq!(rows_to_skip(0, 3), 0);
    }

    #[test]
    fn test_split_header_drops_padding_columns() {
        let rows = vec![
            vec![Value::Text("Content metrics".to_string())],
            vec![
                Value::Text("Date".to_string()),
                Value::Text("Impressions".to_string()),
                Value::Null,
            ],
            vec![Value::Text("01/01/2024".to_string()), Value::Int(5), Value::Null],
        ];
        let sheet = split_header(rows, 1);

        assert_eq!(sheet.headers, vec!["Date", "Impressions"]);
        assert_eq!(sheet.rows, vec![vec![Value::Text("01/01/2024".to_string()), Value::Int(5)]]);
    }

    #[test]
    fn test_csv_reader_has_only_one_sheet() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("followers.csv");
        fs::write(&path, "Date,Total\n").unwrap();

        let err = CsvSheetReader.read_sheet(&path, 2, 0).unwrap_err();
        assert!(matches!(err, EtlError::SheetNotFound { position: 2, .. }));
    }
}
