use std::path::{Path, PathBuf};
use std::time::Duration;

/// Session lifetime when none is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Rows per table shown to an operation source.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub output_dir: PathBuf,
    pub query_log_path: PathBuf,
    pub cache_path: PathBuf,
    pub session_ttl: Duration,
    pub preview_rows: usize,
}

impl ServiceConfig {
    /// Layout rooted at the current directory.
    #[must_use]
    pub fn default_paths() -> Self {
        Self::with_root(".")
    }

    #[must_use]
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            output_dir: root.join("output"),
            query_log_path: root.join("logs/query_logs.jsonl"),
            cache_path: root.join("cache/operation_cache.json"),
            session_ttl: DEFAULT_SESSION_TTL,
            preview_rows: DEFAULT_PREVIEW_ROWS,
        }
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_query_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.query_log_path = path.into();
        self
    }

    #[must_use]
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_preview_rows(mut self, rows: usize) -> Self {
        self.preview_rows = rows;
        self
    }

    /// URL path a client uses to fetch an exported file.
    #[must_use]
    pub fn download_url(&self, export_path: &Path) -> Option<String> {
        export_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| format!("/download/{name}"))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}
