use std::path::PathBuf;

use serde::Serialize;
use tq_frame::Table;
use tq_io::{read_csv_bytes, table_name_from_filename};
use tq_ops::{Operation, apply_with_ledger};
use tq_runtime::{Diagnostic, ExecutionLedger, QueryOutcome};

use crate::cache::{JsonFileOperationCache, OperationCache};
use crate::config::ServiceConfig;
use crate::export::ResultExporter;
use crate::query_log::{QueryLogEntry, append_query_log};
use crate::session::{MemorySessionStore, Session, SessionStore, new_session_id};
use crate::source::{OperationSource, TablePreview};
use crate::ServiceError;

/// One uploaded delimited-text file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    #[must_use]
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub session_id: String,
    pub operation: Operation,
    pub match_count: usize,
    pub result: Table,
    pub csv_export: Option<PathBuf>,
    pub download_url: Option<String>,
    pub tables: Vec<String>,
    pub outcome: QueryOutcome,
    pub diagnostics: Vec<Diagnostic>,
}

/// Uploads, sessions, operation lookup, execution, export and logging
/// around the interpreter.
pub struct QueryService {
    config: ServiceConfig,
    source: Box<dyn OperationSource>,
    cache: Box<dyn OperationCache>,
    sessions: Box<dyn SessionStore>,
    exporter: ResultExporter,
}

impl QueryService {
    /// File-backed operation cache and in-memory sessions, both as
    /// configured.
    #[must_use]
    pub fn new(config: ServiceConfig, source: impl OperationSource + 'static) -> Self {
        let cache = JsonFileOperationCache::open(&config.cache_path);
        let sessions = MemorySessionStore::new(config.session_ttl);
        let exporter = ResultExporter::new(&config.output_dir);
        Self {
            config,
            source: Box::new(source),
            cache: Box::new(cache),
            sessions: Box::new(sessions),
            exporter,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: impl OperationCache + 'static) -> Self {
        self.cache = Box::new(cache);
        self
    }

    #[must_use]
    pub fn with_sessions(mut self, sessions: impl SessionStore + 'static) -> Self {
        self.sessions = Box::new(sessions);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// First query: parse the uploads, open a session and run the query
    /// against the first uploaded table.
    pub fn handle_query(
        &mut self,
        query: &str,
        uploads: &[Upload],
    ) -> Result<QueryResponse, ServiceError> {
        if query.trim().is_empty() || uploads.is_empty() {
            return Err(ServiceError::MissingInput);
        }

        let mut tables = Vec::<(String, Table)>::with_capacity(uploads.len());
        for upload in uploads {
            let table =
                read_csv_bytes(&upload.bytes).map_err(|source| ServiceError::InvalidUpload {
                    filename: upload.filename.clone(),
                    source,
                })?;
            let name = table_name_from_filename(&upload.filename).to_owned();
            match tables.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = table,
                None => tables.push((name, table)),
            }
        }

        let session = Session {
            id: new_session_id(query),
            tables,
        };
        let response = self.run(query, &session)?;
        self.sessions.insert(session);
        Ok(response)
    }

    /// Later query against the tables stored for `session_id`.
    pub fn handle_follow_up(
        &mut self,
        session_id: &str,
        query: &str,
    ) -> Result<QueryResponse, ServiceError> {
        if query.trim().is_empty() {
            return Err(ServiceError::MissingQuery);
        }
        let session = self
            .sessions
            .load(session_id)
            .ok_or_else(|| ServiceError::SessionNotFound {
                session_id: session_id.to_owned(),
            })?;
        self.run(query, &session)
    }

    fn run(&mut self, query: &str, session: &Session) -> Result<QueryResponse, ServiceError> {
        let previews = session
            .tables
            .iter()
            .map(|(name, table)| TablePreview::new(name, table, self.config.preview_rows))
            .collect::<Vec<_>>();
        let operation = self.resolve_operation(query, &previews)?;

        let empty = Table::empty();
        let input = session.primary_table().unwrap_or(&empty);
        let mut ledger = ExecutionLedger::new();
        let result = apply_with_ledger(input, &operation, &mut ledger);
        let outcome = ledger.classify(result.len());
        for diagnostic in ledger.records() {
            tracing::debug!(session_id = %session.id, %diagnostic, "degenerate step");
        }

        let csv_export = self.exporter.export(&result, Some(&session.id));
        let download_url = csv_export
            .as_deref()
            .and_then(|path| self.config.download_url(path));

        append_query_log(
            &self.config.query_log_path,
            &QueryLogEntry::now(
                Some(&session.id),
                query,
                result.len(),
                csv_export.as_deref(),
            ),
        )?;

        tracing::info!(
            session_id = %session.id,
            operation = operation.kind(),
            rows_in = input.len(),
            matches = result.len(),
            outcome = ?outcome,
            "handled query"
        );

        Ok(QueryResponse {
            session_id: session.id.clone(),
            operation,
            match_count: result.len(),
            result,
            csv_export,
            download_url,
            tables: session.table_names(),
            outcome,
            diagnostics: ledger.records().to_vec(),
        })
    }

    fn resolve_operation(
        &mut self,
        query: &str,
        previews: &[TablePreview],
    ) -> Result<Operation, ServiceError> {
        if let Some(operation) = self.cache.get(query) {
            tracing::debug!(query, "operation cache hit");
            return Ok(operation);
        }
        let operation = self.source.interpret(query, previews)?;
        self.cache.insert(query, operation.clone());
        Ok(operation)
    }
}
