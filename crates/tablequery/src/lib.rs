#![forbid(unsafe_code)]

//! Declarative queries over in-memory tables.
//!
//! ```
//! use tablequery::{Operation, Table, apply};
//!
//! let table: Table = serde_json::from_str(r#"[{"amt":"10"},{"amt":"20"},{"amt":"x"}]"#).unwrap();
//! let sum = Operation::parse(r#"{"type":"aggregate","aggregateField":"amt","operator":"sum"}"#).unwrap();
//! assert_eq!(serde_json::to_string(&apply(&table, &sum)).unwrap(), r#"[{"amt":30}]"#);
//! ```

pub use tq_frame::{Record, Table};
pub use tq_groupby::{distinct_values, groupby_sum};
pub use tq_io::{
    IoError, read_csv_bytes, read_csv_path, read_csv_str, table_name_from_filename,
    write_csv_path, write_csv_string,
};
pub use tq_ops::{
    AggregateOp, AggregateOperator, COUNT_FIELD, DEFAULT_TOP_K, DistinctOp, FilterOp,
    FilterOperator, GroupByOp, Operand, Operation, PipelineOp, SortOp, SortOrder, SpecialValue,
    Statistic, TopKOp, apply, apply_with_ledger, resolve_value, stats,
};
pub use tq_runtime::{Diagnostic, DiagnosticKind, ExecutionLedger, QueryOutcome};
pub use tq_types::{Scalar, TypeError, format_number, parse_float_prefix, strict_number};

#[cfg(test)]
mod tests {
    use super::{Operation, QueryOutcome, Table, apply_with_ledger, read_csv_str, write_csv_string};
    use crate::ExecutionLedger;

    #[test]
    fn csv_in_csv_out() {
        let table: Table = read_csv_str("city,amt\nLagos,5\nAbuja,15\nLagos,10\n").expect("read");
        let operation = Operation::parse(
            r#"{"type":"pipeline","steps":[
                {"type":"groupBy","groupByField":"city","aggregateField":"amt"},
                {"type":"sort","sortField":"amt","sortOrder":"asc"}
            ]}"#,
        )
        .expect("json");

        let mut ledger = ExecutionLedger::new();
        let out = apply_with_ledger(&table, &operation, &mut ledger);
        assert_eq!(ledger.classify(out.len()), QueryOutcome::Matched);
        assert_eq!(
            write_csv_string(&out).expect("write"),
            "city,amt\nLagos,15\nAbuja,15\n"
        );
    }
}
