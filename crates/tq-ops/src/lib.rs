#![forbid(unsafe_code)]

//! Interpreter for declarative table operations.
//!
//! [`apply`] takes a table and an [`Operation`] and returns a new table. It
//! is a total function: unknown or malformed operations produce the empty
//! table, numeric operators coerce through [`tq_types::Scalar`], and the
//! input table is never modified. Callers that need to tell "no matches"
//! apart from "could not interpret" use [`apply_with_ledger`] and inspect the
//! [`ExecutionLedger`].

mod operation;
mod resolve;
pub mod stats;

use std::cmp::Ordering;

use tq_frame::{Record, Table};
use tq_groupby::{distinct_values, groupby_sum};
use tq_runtime::{DiagnosticKind, ExecutionLedger};
use tq_types::Scalar;

pub use operation::{
    AggregateOp, AggregateOperator, DistinctOp, FilterOp, FilterOperator, GroupByOp, Operand,
    Operation, PipelineOp, SortOp, SortOrder, TopKOp,
};
pub use resolve::{SpecialValue, Statistic, resolve_value};

/// K used by `topK` when its value is not a number.
pub const DEFAULT_TOP_K: usize = 5;

/// Output field of `aggregate` with the `count` reducer.
pub const COUNT_FIELD: &str = "count";

/// Apply `operation` to `table`, discarding diagnostics.
#[must_use]
pub fn apply(table: &Table, operation: &Operation) -> Table {
    let mut ledger = ExecutionLedger::new();
    apply_with_ledger(table, operation, &mut ledger)
}

/// Apply `operation` to `table`, recording degenerate outcomes in `ledger`.
#[must_use]
pub fn apply_with_ledger(
    table: &Table,
    operation: &Operation,
    ledger: &mut ExecutionLedger,
) -> Table {
    apply_step(table, operation, operation.kind(), ledger)
}

fn apply_step(
    table: &Table,
    operation: &Operation,
    subject: &str,
    ledger: &mut ExecutionLedger,
) -> Table {
    #[cfg(feature = "tracing")]
    tracing::debug!(subject, rows = table.len(), "applying operation");

    match operation {
        Operation::Pipeline(pipeline) => {
            pipeline
                .steps
                .iter()
                .enumerate()
                .fold(table.clone(), |current, (pos, step)| {
                    let step_subject = format!("{subject}[{pos}].{}", step.kind());
                    apply_step(&current, step, &step_subject, ledger)
                })
        }
        Operation::Filter(op) => filter(table, op, subject, ledger),
        Operation::GroupBy(op) => groupby_sum(table, &op.group_by_field, &op.aggregate_field),
        Operation::Aggregate(op) => aggregate(table, op, subject, ledger),
        Operation::TopK(op) => top_k(table, op),
        Operation::Sort(op) => sort(table, op),
        Operation::Distinct(op) => distinct_values(table, &op.field),
        Operation::Unrecognized { reason, .. } => {
            ledger.record(DiagnosticKind::UnrecognizedOperation, subject, reason.clone());
            Table::empty()
        }
    }
}

fn filter(table: &Table, op: &FilterOp, subject: &str, ledger: &mut ExecutionLedger) -> Table {
    let operand = resolve_value(table, &op.value);
    if op.operator.is_ordered() && operand.to_number().is_nan() {
        ledger.record(
            DiagnosticKind::NonNumericComparisonOperand,
            subject,
            format!("value={operand} is not numeric; `{}` matches nothing", op.field),
        );
    }

    table
        .iter()
        .filter(|record| matches_filter(op.operator, record.value(&op.field), &operand))
        .cloned()
        .collect()
}

fn matches_filter(operator: FilterOperator, cell: &Scalar, operand: &Operand) -> bool {
    match operator {
        FilterOperator::Eq => operand.loose_eq(cell),
        FilterOperator::Ne => !operand.loose_eq(cell),
        FilterOperator::Gt => cell.to_number() > operand.to_number(),
        FilterOperator::Lt => cell.to_number() < operand.to_number(),
        FilterOperator::Ge => cell.to_number() >= operand.to_number(),
        FilterOperator::Le => cell.to_number() <= operand.to_number(),
        FilterOperator::Contains => operand.contained_in(cell),
        FilterOperator::In => operand.includes(cell),
    }
}

/// One-row summary of the numeric values of `aggregateField`.
///
/// `count` counts values that survived coercion, not rows. Over an empty
/// numeric set `sum`/`count` are 0, `avg`/`median` are NaN, and `min`/`max`
/// are `Null`.
fn aggregate(
    table: &Table,
    op: &AggregateOp,
    subject: &str,
    ledger: &mut ExecutionLedger,
) -> Table {
    let values = table.numeric_values(&op.aggregate_field);
    if values.is_empty() {
        ledger.record(
            DiagnosticKind::EmptyAggregateInput,
            subject,
            format!("no numeric values in `{}`", op.aggregate_field),
        );
    }

    let field = op.aggregate_field.as_str();
    let (name, value) = match op.operator {
        AggregateOperator::Sum => (field, Scalar::Number(stats::sum(&values))),
        AggregateOperator::Count => (COUNT_FIELD, Scalar::Number(values.len() as f64)),
        AggregateOperator::Avg => (field, Scalar::Number(stats::mean(&values))),
        AggregateOperator::Min => (field, stats::min(&values).map_or(Scalar::Null, Scalar::Number)),
        AggregateOperator::Max => (field, stats::max(&values).map_or(Scalar::Null, Scalar::Number)),
        AggregateOperator::Median => (field, Scalar::Number(stats::median(&values))),
    };

    Table::new(vec![Record::new().with(name, value)])
}

fn top_k(table: &Table, op: &TopKOp) -> Table {
    let k = match resolve_value(table, &op.value) {
        // Saturating cast: NaN and negatives give 0, fractions truncate.
        Operand::Scalar(Scalar::Number(v)) => v as usize,
        _ => DEFAULT_TOP_K,
    };

    let mut keyed = table
        .iter()
        .map(|record| (record.value(&op.field).to_number(), record))
        .collect::<Vec<_>>();
    keyed.sort_by(|left, right| descending_nan_last(left.0, right.0));

    keyed
        .into_iter()
        .take(k)
        .map(|(_, record)| record.clone())
        .collect()
}

fn descending_nan_last(left: f64, right: f64) -> Ordering {
    match (left.is_nan(), right.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
    }
}

/// Raw relational sort: numeric-looking strings still order lexicographically.
fn sort(table: &Table, op: &SortOp) -> Table {
    let field = op.sort_field.as_str();
    table.sorted_by(|left, right| {
        let ordering = left.value(field).raw_cmp(right.value(field));
        match op.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tq_frame::{Record, Table};
    use tq_runtime::{DiagnosticKind, ExecutionLedger, QueryOutcome};
    use tq_types::Scalar;

    use super::{Operation, apply, apply_with_ledger};

    fn op(value: serde_json::Value) -> Operation {
        Operation::from_json(value)
    }

    fn people() -> Table {
        Table::new(vec![
            Record::new().with("name", "Ann").with("city", "Lagos").with("amt", "120"),
            Record::new().with("name", "bob").with("city", "Abuja").with("amt", 45_i64),
            Record::new().with("name", "Cid").with("city", "lagos").with("amt", "x"),
            Record::new().with("name", "Dee").with("amt", "9"),
        ])
    }

    fn names(table: &Table) -> Vec<String> {
        table
            .iter()
            .map(|record| record.value("name").to_string())
            .collect()
    }

    #[test]
    fn filter_equality_is_loose() {
        let table = Table::new(vec![
            Record::new().with("n", "5"),
            Record::new().with("n", 5_i64),
            Record::new().with("n", "5.0"),
        ]);
        let out = apply(&table, &op(json!({"type": "filter", "field": "n", "operator": "==", "value": 5})));
        assert_eq!(out.len(), 3);

        let out = apply(&table, &op(json!({"type": "filter", "field": "n", "operator": "==", "value": "5"})));
        assert_eq!(out.len(), 2);

        let out = apply(&table, &op(json!({"type": "filter", "field": "n", "operator": "!=", "value": "5"})));
        assert_eq!(out.records(), &[Record::new().with("n", "5.0")]);
    }

    #[test]
    fn filter_ordered_comparisons_coerce_both_sides() {
        let out = apply(&people(), &op(json!({"type": "filter", "field": "amt", "operator": ">", "value": "40"})));
        assert_eq!(names(&out), vec!["Ann", "bob"]);

        let out = apply(&people(), &op(json!({"type": "filter", "field": "amt", "operator": "<=", "value": 45})));
        assert_eq!(names(&out), vec!["bob", "Dee"]);
    }

    #[test]
    fn non_numeric_comparison_target_matches_nothing() {
        let mut ledger = ExecutionLedger::new();
        let out = apply_with_ledger(
            &people(),
            &op(json!({"type": "filter", "field": "amt", "operator": ">=", "value": "lots"})),
            &mut ledger,
        );
        assert!(out.is_empty());
        assert!(ledger.contains(DiagnosticKind::NonNumericComparisonOperand));
        assert_eq!(ledger.classify(out.len()), QueryOutcome::NoMatches);
    }

    #[test]
    fn filter_contains_is_case_insensitive_and_skips_missing() {
        let out = apply(&people(), &op(json!({"type": "filter", "field": "city", "operator": "contains", "value": "LAG"})));
        assert_eq!(names(&out), vec!["Ann", "Cid"]);

        let out = apply(&people(), &op(json!({"type": "filter", "field": "amt", "operator": "contains", "value": 4})));
        assert_eq!(names(&out), vec!["bob"]);
    }

    #[test]
    fn filter_in_uses_strict_membership() {
        let out = apply(&people(), &op(json!({"type": "filter", "field": "amt", "operator": "in", "value": ["9", 45, 120]})));
        assert_eq!(names(&out), vec!["bob", "Dee"]);

        let out = apply(&people(), &op(json!({"type": "filter", "field": "amt", "operator": "in", "value": "9"})));
        assert!(out.is_empty());
    }

    #[test]
    fn filter_threshold_can_be_a_statistic() {
        let out = apply(&people(), &op(json!({"type": "filter", "field": "amt", "operator": "<", "value": "avg amt"})));
        assert_eq!(names(&out), vec!["bob", "Dee"]);
    }

    #[test]
    fn aggregate_reducers() {
        let run = |operator: &str| {
            apply(&people(), &op(json!({"type": "aggregate", "aggregateField": "amt", "operator": operator})))
        };

        assert_eq!(run("sum").records(), &[Record::new().with("amt", 174_i64)]);
        assert_eq!(run("count").records(), &[Record::new().with("count", 3_i64)]);
        assert_eq!(run("avg").records(), &[Record::new().with("amt", 58_i64)]);
        assert_eq!(run("min").records(), &[Record::new().with("amt", 9_i64)]);
        assert_eq!(run("max").records(), &[Record::new().with("amt", 120_i64)]);
        assert_eq!(run("median").records(), &[Record::new().with("amt", 45_i64)]);
        assert!(run("mode").is_empty());
    }

    #[test]
    fn aggregate_over_non_numeric_field_is_documented_degenerate() {
        let run = |operator: &str| {
            let mut ledger = ExecutionLedger::new();
            let out = apply_with_ledger(
                &people(),
                &op(json!({"type": "aggregate", "aggregateField": "city", "operator": operator})),
                &mut ledger,
            );
            assert!(ledger.contains(DiagnosticKind::EmptyAggregateInput));
            assert_eq!(out.len(), 1);
            out.records()[0].fields().next().map(|(_, v)| v.clone()).expect("one field")
        };

        assert_eq!(run("sum"), Scalar::Number(0.0));
        assert_eq!(run("count"), Scalar::Number(0.0));
        assert!(run("avg").to_number().is_nan());
        assert!(run("median").to_number().is_nan());
        assert_eq!(run("min"), Scalar::Null);
        assert_eq!(run("max"), Scalar::Null);
    }

    #[test]
    fn top_k_sorts_numerically_and_defaults_k() {
        let out = apply(&people(), &op(json!({"type": "topK", "field": "amt", "value": 2})));
        assert_eq!(names(&out), vec!["Ann", "bob"]);

        let out = apply(&people(), &op(json!({"type": "topK", "field": "amt", "value": "two"})));
        assert_eq!(names(&out), vec!["Ann", "bob", "Dee", "Cid"]);

        let out = apply(&people(), &op(json!({"type": "topK", "field": "amt", "value": 2.9})));
        assert_eq!(out.len(), 2);

        let out = apply(&people(), &op(json!({"type": "topK", "field": "amt", "value": -1})));
        assert!(out.is_empty());
    }

    #[test]
    fn top_k_value_may_be_a_statistic() {
        let table = Table::new((1..=10_i64).map(|i| Record::new().with("v", i)).collect());
        let out = apply(&table, &op(json!({"type": "topK", "field": "v", "value": "min v"})));
        assert_eq!(out.records(), &[Record::new().with("v", 10_i64)]);
    }

    #[test]
    fn sort_compares_raw_values() {
        let table = Table::new(vec![
            Record::new().with("v", "9"),
            Record::new().with("v", "10"),
            Record::new().with("v", "100"),
        ]);
        let out = apply(&table, &op(json!({"type": "sort", "sortField": "v", "sortOrder": "ASC"})));
        let values = out.iter().map(|r| r.value("v").to_string()).collect::<Vec<_>>();
        assert_eq!(values, vec!["10", "100", "9"]);

        let numbers = Table::new(vec![
            Record::new().with("v", 9_i64),
            Record::new().with("v", 10_i64),
            Record::new().with("v", 100_i64),
        ]);
        let out = apply(&numbers, &op(json!({"type": "sort", "sortField": "v"})));
        let values = out.iter().map(|r| r.value("v").to_string()).collect::<Vec<_>>();
        assert_eq!(values, vec!["100", "10", "9"]);
    }

    #[test]
    fn distinct_projects_to_the_field() {
        let out = apply(&people(), &op(json!({"type": "distinct", "field": "city"})));
        assert_eq!(
            out.records(),
            &[
                Record::new().with("city", "Lagos"),
                Record::new().with("city", "Abuja"),
                Record::new().with("city", "lagos"),
                Record::new().with("city", Scalar::Null),
            ]
        );
    }

    #[test]
    fn unknown_and_malformed_operations_fail_empty() {
        for description in [
            json!({"type": "bogus"}),
            json!({"type": "filter", "operator": "=="}),
            json!({"type": "filter", "field": "amt", "operator": "~="}),
            json!({"type": "aggregate", "aggregateField": "amt", "operator": "mode"}),
            json!({"type": "pipeline", "steps": "not a list"}),
            json!({"field": "amt"}),
            json!("filter"),
        ] {
            let mut ledger = ExecutionLedger::new();
            let out = apply_with_ledger(&people(), &op(description), &mut ledger);
            assert!(out.is_empty());
            assert_eq!(ledger.classify(out.len()), QueryOutcome::Uninterpretable);
        }
    }

    #[test]
    fn malformed_pipeline_step_only_empties_from_that_step() {
        let mut ledger = ExecutionLedger::new();
        let out = apply_with_ledger(
            &people(),
            &op(json!({"type": "pipeline", "steps": [
                {"type": "distinct", "field": "city"},
                {"type": "nope"}
            ]})),
            &mut ledger,
        );
        assert!(out.is_empty());
        assert_eq!(ledger.records()[0].subject, "pipeline[1].nope");
    }

    #[test]
    fn empty_pipeline_returns_input() {
        let table = people();
        assert_eq!(apply(&table, &Operation::pipeline(Vec::new())), table);
    }

    #[test]
    fn pipeline_resolves_statistics_against_current_table() {
        // After the first step only Ann and bob remain: avg amt = 82.5.
        let out = apply(
            &people(),
            &op(json!({"type": "pipeline", "steps": [
                {"type": "filter", "field": "amt", "operator": ">", "value": 20},
                {"type": "filter", "field": "amt", "operator": ">", "value": "average amt"}
            ]})),
        );
        assert_eq!(names(&out), vec!["Ann"]);
    }

    #[test]
    fn operations_serialize_back_to_their_description() {
        let description = json!({"type": "pipeline", "steps": [
            {"type": "groupBy", "groupByField": "region", "aggregateField": "sales"},
            {"type": "sort", "sortField": "sales", "sortOrder": "desc"},
            {"type": "topK", "field": "sales", "value": 3},
            {"type": "weird", "x": 1}
        ]});
        let parsed = op(description.clone());
        assert_eq!(serde_json::to_value(&parsed).expect("serialize"), description);
    }
}
