#![forbid(unsafe_code)]

//! The calling layer around the `tq-ops` interpreter.
//!
//! [`QueryService`] takes a natural-language query and a set of CSV uploads,
//! asks an [`OperationSource`] (behind an [`OperationCache`]) for the
//! operation, runs it, exports the result and appends a line to the query
//! log. Uploaded tables are kept in a [`SessionStore`] for follow-up queries.

mod cache;
mod config;
mod export;
mod query_log;
mod service;
mod session;
mod source;

use thiserror::Error;
use tq_io::IoError;

pub use cache::{JsonFileOperationCache, MemoryOperationCache, OperationCache};
pub use config::{DEFAULT_PREVIEW_ROWS, DEFAULT_SESSION_TTL, ServiceConfig};
pub use export::{ResultExporter, export_file_name};
pub use query_log::{QueryLogEntry, append_query_log, read_query_log};
pub use service::{QueryResponse, QueryService, Upload};
pub use session::{MemorySessionStore, Session, SessionStore, new_session_id};
pub use source::{FixedOperationSource, LiteralOperationSource, OperationSource, TablePreview};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("query and at least one csv upload are required")]
    MissingInput,
    #[error("query is required")]
    MissingQuery,
    #[error("session {session_id} not found or expired; upload the csv files again")]
    SessionNotFound { session_id: String },
    #[error("invalid csv content in {filename}: {source}")]
    InvalidUpload {
        filename: String,
        #[source]
        source: IoError,
    },
    #[error("no operation available for query {query:?}")]
    NoInterpretation { query: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
