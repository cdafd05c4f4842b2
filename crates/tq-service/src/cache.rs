use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tq_ops::Operation;

use crate::ServiceError;

/// Interpreted operations keyed by the exact query text.
pub trait OperationCache {
    fn get(&self, query: &str) -> Option<Operation>;
    fn insert(&mut self, query: &str, operation: Operation);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryOperationCache {
    entries: BTreeMap<String, Operation>,
}

impl MemoryOperationCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl OperationCache for MemoryOperationCache {
    fn get(&self, query: &str) -> Option<Operation> {
        self.entries.get(query).cloned()
    }

    fn insert(&mut self, query: &str, operation: Operation) {
        self.entries.insert(query.to_owned(), operation);
    }
}

/// A JSON object on disk, read once at open and rewritten on every insert.
///
/// A missing, unreadable or corrupt file starts an empty cache. Write
/// failures keep the in-memory entry and are logged.
#[derive(Debug)]
pub struct JsonFileOperationCache {
    path: PathBuf,
    entries: MemoryOperationCache,
}

impl JsonFileOperationCache {
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match load_entries(&path) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "operation cache load failed; starting fresh");
                BTreeMap::new()
            }
        };
        Self {
            path,
            entries: MemoryOperationCache { entries },
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn persist(&self) -> Result<(), ServiceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.entries.entries)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }
}

impl OperationCache for JsonFileOperationCache {
    fn get(&self, query: &str) -> Option<Operation> {
        self.entries.get(query)
    }

    fn insert(&mut self, query: &str, operation: Operation) {
        self.entries.insert(query, operation);
        if let Err(err) = self.persist() {
            tracing::warn!(path = %self.path.display(), error = %err, "failed to save operation cache");
        }
    }
}

fn load_entries(path: &Path) -> Result<BTreeMap<String, Operation>, ServiceError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let raw = fs::read_to_string(path)?;
    if raw.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    Ok(serde_json::from_str(&raw)?)
}
