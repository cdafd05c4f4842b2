use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tq_frame::Table;
use tq_io::write_csv_path;

/// Writes non-empty results as CSV files under one directory.
#[derive(Debug, Clone)]
pub struct ResultExporter {
    output_dir: PathBuf,
}

impl ResultExporter {
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Path of the written file, or `None` when the table is empty or the
    /// write failed.
    pub fn export(&self, table: &Table, session_id: Option<&str>) -> Option<PathBuf> {
        self.export_at(table, session_id, Utc::now())
    }

    pub fn export_at(
        &self,
        table: &Table,
        session_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<PathBuf> {
        if table.is_empty() {
            tracing::warn!("no rows to export; skipping csv generation");
            return None;
        }

        let path = self.output_dir.join(export_file_name(session_id, now));
        let written = fs::create_dir_all(&self.output_dir)
            .map_err(tq_io::IoError::from)
            .and_then(|()| write_csv_path(table, &path));
        match written {
            Ok(()) => Some(path),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "csv export failed");
                None
            }
        }
    }
}

/// `result_<session>_<timestamp>.csv`, with `:` and `.` in the timestamp
/// replaced so the name is portable.
#[must_use]
pub fn export_file_name(session_id: Option<&str>, now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y-%m-%dT%H-%M-%S-%3fZ");
    match session_id {
        Some(id) => format!("result_{id}_{timestamp}.csv"),
        None => format!("result_{timestamp}.csv"),
    }
}
