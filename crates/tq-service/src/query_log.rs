use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::ServiceError;

/// One line of the query log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryLogEntry {
    pub timestamp: String,
    pub session_id: Option<String>,
    pub query: String,
    pub result_count: usize,
    pub csv_export_path: Option<PathBuf>,
}

impl QueryLogEntry {
    #[must_use]
    pub fn now(
        session_id: Option<&str>,
        query: &str,
        result_count: usize,
        csv_export_path: Option<&Path>,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            session_id: session_id.map(str::to_owned),
            query: query.to_owned(),
            result_count,
            csv_export_path: csv_export_path.map(Path::to_path_buf),
        }
    }
}

/// Append `entry` as one JSON line, creating the file and its directory.
pub fn append_query_log(path: &Path, entry: &QueryLogEntry) -> Result<(), ServiceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{}", serde_json::to_string(entry)?)?;
    Ok(())
}

/// Every entry in the log; lines that do not parse are skipped.
pub fn read_query_log(path: &Path) -> Result<Vec<QueryLogEntry>, ServiceError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect())
}
