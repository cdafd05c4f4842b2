use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tq_frame::Table;
use tq_ops::Operation;

use crate::ServiceError;

/// What an operation source gets to see of one uploaded table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TablePreview {
    pub name: String,
    pub fields: Vec<String>,
    pub sample: Table,
}

impl TablePreview {
    /// Field names come from the first record, the sample from the first
    /// `rows` records.
    #[must_use]
    pub fn new(name: &str, table: &Table, rows: usize) -> Self {
        let fields = table
            .records()
            .first()
            .map(|record| record.field_names().map(str::to_owned).collect())
            .unwrap_or_default();
        Self {
            name: name.to_owned(),
            fields,
            sample: table.iter().take(rows).cloned().collect(),
        }
    }
}

impl fmt::Display for TablePreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sample = serde_json::to_string_pretty(&self.sample).map_err(|_| fmt::Error)?;
        write!(
            f,
            "Table: {}\nFields: {}\nSample:\n{}",
            self.name,
            self.fields.join(", "),
            sample
        )
    }
}

/// Turns a natural-language query into an operation.
///
/// Implementations that call out to a text-generation service live outside
/// this crate; the service only needs this seam.
pub trait OperationSource {
    fn interpret(&self, query: &str, previews: &[TablePreview]) -> Result<Operation, ServiceError>;
}

/// Treats the query text itself as a JSON operation description.
///
/// Text that is not JSON becomes an unrecognized operation, so the query
/// runs and reports as uninterpretable.
#[derive(Debug, Default, Clone, Copy)]
pub struct LiteralOperationSource;

impl OperationSource for LiteralOperationSource {
    fn interpret(&self, query: &str, _previews: &[TablePreview]) -> Result<Operation, ServiceError> {
        Ok(Operation::parse(query).unwrap_or_else(|err| Operation::Unrecognized {
            raw: serde_json::Value::String(query.to_owned()),
            reason: err.to_string(),
        }))
    }
}

/// A fixed table of query text to operation.
#[derive(Debug, Default, Clone)]
pub struct FixedOperationSource {
    operations: HashMap<String, Operation>,
}

impl FixedOperationSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, query: impl Into<String>, operation: Operation) -> Self {
        self.operations.insert(query.into(), operation);
        self
    }
}

impl OperationSource for FixedOperationSource {
    fn interpret(&self, query: &str, _previews: &[TablePreview]) -> Result<Operation, ServiceError> {
        self.operations
            .get(query)
            .cloned()
            .ok_or_else(|| ServiceError::NoInterpretation {
                query: query.to_owned(),
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tq_frame::{Record, Table};
    use tq_ops::Operation;

    use super::{FixedOperationSource, LiteralOperationSource, OperationSource, TablePreview};
    use crate::ServiceError;

    #[test]
    fn preview_takes_first_rows_and_first_record_fields() {
        let table = Table::new(vec![
            Record::new().with("id", "1").with("amt", "10"),
            Record::new().with("id", "2").with("amt", "20").with("extra", "x"),
            Record::new().with("id", "3"),
        ]);
        let preview = TablePreview::new("transactions", &table, 2);
        assert_eq!(preview.fields, vec!["id", "amt"]);
        assert_eq!(preview.sample.len(), 2);

        let text = preview.to_string();
        assert!(text.starts_with("Table: transactions\nFields: id, amt\nSample:\n["));
    }

    #[test]
    fn literal_source_parses_json_or_degrades() {
        let source = LiteralOperationSource;
        let op = source
            .interpret(r#"{"type":"distinct","field":"city"}"#, &[])
            .expect("interpret");
        assert_eq!(op.kind(), "distinct");

        let op = source.interpret("show me the top payers", &[]).expect("interpret");
        assert!(matches!(op, Operation::Unrecognized { .. }));
    }

    #[test]
    fn fixed_source_knows_only_its_queries() {
        let source = FixedOperationSource::new().with(
            "distinct cities",
            Operation::from_json(json!({"type": "distinct", "field": "city"})),
        );
        assert!(source.interpret("distinct cities", &[]).is_ok());
        assert!(matches!(
            source.interpret("something else", &[]),
            Err(ServiceError::NoInterpretation { .. })
        ));
    }
}
