#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Degenerate outcomes the interpreter absorbs instead of raising.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Operation `type` unknown, or the description was malformed. The
    /// operation produced the empty table.
    UnrecognizedOperation,
    /// Every value of an aggregate field failed numeric coercion.
    EmptyAggregateInput,
    /// An ordered comparison target failed numeric coercion, so the
    /// comparison is false for every row.
    NonNumericComparisonOperand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Where it happened, e.g. `pipeline[1].aggregate`.
    pub subject: String,
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}: {}", self.kind, self.subject, self.detail)
    }
}

/// How a caller should describe a finished query to an end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    Matched,
    NoMatches,
    Uninterpretable,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLedger {
    records: Vec<Diagnostic>,
}

impl ExecutionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn record(
        &mut self,
        kind: DiagnosticKind,
        subject: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.records.push(Diagnostic {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        });
    }

    #[must_use]
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, kind: DiagnosticKind) -> bool {
        self.records.iter().any(|record| record.kind == kind)
    }

    /// Any unrecognized step makes the whole query uninterpretable, even if
    /// other steps produced rows.
    #[must_use]
    pub fn classify(&self, result_rows: usize) -> QueryOutcome {
        if self.contains(DiagnosticKind::UnrecognizedOperation) {
            QueryOutcome::Uninterpretable
        } else if result_rows == 0 {
            QueryOutcome::NoMatches
        } else {
            QueryOutcome::Matched
        }
    }
}
