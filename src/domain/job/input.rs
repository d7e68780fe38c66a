use super::model::{JobItem, JobOptions};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;

pub const SCRIPT_COLUMN: &str = "SCRIPT";
pub const FILENAME_COLUMN: &str = "FILENAME";

/// A problem with one input row; `row` is 1-based
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {}: {} {}", self.row, self.field, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BatchInputError {
    #[error("batch input has no rows")]
    Empty,

    #[error("batch input rejected, {} invalid row(s): {}", .0.len(), format_rows(.0))]
    InvalidRows(Vec<RowError>),

    #[error("batch input is not a JSON array of objects: {0}")]
    Malformed(String),

    #[error("could not read batch input {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn format_rows(rows: &[RowError]) -> String {
    rows.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

fn cell_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn find_column<'a>(row: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(key, _)| key.trim().eq_ignore_ascii_case(column))
        .map(|(_, value)| value)
}

/// Turn ordered input rows into job items.
///
/// Every row must carry a non-blank `SCRIPT` and `FILENAME`. If any row
/// fails, the whole batch is rejected with every offending row listed.
/// Other string columns become per-job options.
pub fn parse_rows(rows: &[Map<String, Value>]) -> Result<Vec<JobItem>, BatchInputError> {
    if rows.is_empty() {
        return Err(BatchInputError::Empty);
    }

    let mut errors = Vec::new();
    let mut items = Vec::with_capacity(rows.len());

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let script = find_column(row, SCRIPT_COLUMN).and_then(cell_text);
        let filename = find_column(row, FILENAME_COLUMN).and_then(cell_text);

        let script = match script {
            Some(s) if !s.trim().is_empty() => Some(s),
            _ => {
                errors.push(RowError {
                    row: row_number,
                    field: SCRIPT_COLUMN.to_string(),
                    message: "is empty".to_string(),
                });
                None
            }
        };
        let filename = match filename {
            Some(f) if !f.trim().is_empty() => Some(f),
            _ => {
                errors.push(RowError {
                    row: row_number,
                    field: FILENAME_COLUMN.to_string(),
                    message: "is empty".to_string(),
                });
                None
            }
        };

        if let (Some(script), Some(filename)) = (script, filename) {
            let options: JobOptions = row
                .iter()
                .filter(|(key, _)| {
                    !key.trim().eq_ignore_ascii_case(SCRIPT_COLUMN)
                        && !key.trim().eq_ignore_ascii_case(FILENAME_COLUMN)
                })
                .filter_map(|(key, value)| cell_text(value).map(|v| (key.trim().to_string(), v)))
                .collect();
            items.push(JobItem::new(index, script.trim(), &filename, options));
        }
    }

    if !errors.is_empty() {
        return Err(BatchInputError::InvalidRows(errors));
    }

    Ok(items)
}

/// Parse a JSON array of row objects
pub fn parse_json(input: &str) -> Result<Vec<JobItem>, BatchInputError> {
    let rows: Vec<Map<String, Value>> =
        serde_json::from_str(input).map_err(|e| BatchInputError::Malformed(e.to_string()))?;
    parse_rows(&rows)
}

pub async fn load_json_file(path: &Path) -> Result<Vec<JobItem>, BatchInputError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| BatchInputError::Io {
            path: path.display().to_string(),
            source,
        })?;
    parse_json(&contents)
}
