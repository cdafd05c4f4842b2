use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use tq_types::{Scalar, parse_float_prefix};

/// One transformation step.
///
/// Deserialization never fails on a well-formed JSON value: any description
/// that does not match one of the seven shapes becomes
/// [`Operation::Unrecognized`], which applies as the empty table. Inside a
/// pipeline only the offending step degrades.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    Filter(FilterOp),
    GroupBy(GroupByOp),
    Aggregate(AggregateOp),
    TopK(TopKOp),
    Sort(SortOp),
    Distinct(DistinctOp),
    Pipeline(PipelineOp),
    Unrecognized {
        raw: serde_json::Value,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOp {
    pub field: String,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: Operand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "in")]
    In,
}

impl FilterOperator {
    /// Operators that compare coerced numbers.
    #[must_use]
    pub fn is_ordered(self) -> bool {
        matches!(self, Self::Gt | Self::Lt | Self::Ge | Self::Le)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupByOp {
    pub group_by_field: String,
    pub aggregate_field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOp {
    pub aggregate_field: String,
    pub operator: AggregateOperator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateOperator {
    Sum,
    Count,
    Avg,
    Min,
    Max,
    Median,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopKOp {
    pub field: String,
    #[serde(default)]
    pub value: Operand,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortOp {
    pub sort_field: String,
    #[serde(default)]
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl Serialize for SortOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        })
    }
}

impl<'de> Deserialize<'de> for SortOrder {
    /// `asc` in any case is ascending; anything else, including `null`, is
    /// descending.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw {
            Some(order) if order.eq_ignore_ascii_case("asc") => Self::Asc,
            _ => Self::Desc,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinctOp {
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOp {
    pub steps: Vec<Operation>,
}

/// Comparison or threshold value of a `filter`/`topK`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum Operand {
    List(Vec<Scalar>),
    Scalar(Scalar),
}

impl Default for Operand {
    fn default() -> Self {
        Self::Scalar(Scalar::Null)
    }
}

impl Operand {
    /// Lists take their comma-joined text form; a missing scalar has none.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Scalar(value) => value.display_text(),
            Self::List(items) => Some(join_list(items)),
        }
    }

    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Scalar(value) => value.to_number(),
            Self::List(items) => parse_float_prefix(&join_list(items)),
        }
    }

    #[must_use]
    pub fn loose_eq(&self, cell: &Scalar) -> bool {
        match self {
            Self::Scalar(value) => cell.loose_eq(value),
            Self::List(_) if cell.is_missing() => false,
            Self::List(items) => cell.loose_eq(&Scalar::Utf8(join_list(items))),
        }
    }

    /// Case-insensitive substring test on text forms. Missing on either side
    /// never matches.
    #[must_use]
    pub fn contained_in(&self, cell: &Scalar) -> bool {
        match (cell.display_text(), self.text()) {
            (Some(haystack), Some(needle)) => haystack
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            _ => false,
        }
    }

    /// List membership by strict equality; a scalar operand has no members.
    #[must_use]
    pub fn includes(&self, cell: &Scalar) -> bool {
        match self {
            Self::List(items) => items.iter().any(|item| item.strict_eq(cell)),
            Self::Scalar(_) => false,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(Scalar::Null) => f.write_str("null"),
            Self::Scalar(Scalar::Utf8(text)) => write!(f, "{text:?}"),
            Self::Scalar(value) => write!(f, "{value}"),
            Self::List(items) => write!(f, "[{}]", join_list(items)),
        }
    }
}

fn join_list(items: &[Scalar]) -> String {
    items
        .iter()
        .map(|item| item.display_text().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum TaggedOperation {
    Filter(FilterOp),
    GroupBy(GroupByOp),
    Aggregate(AggregateOp),
    TopK(TopKOp),
    Sort(SortOp),
    Distinct(DistinctOp),
    Pipeline(PipelineOp),
}

#[derive(serde::Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum TaggedOperationRef<'a> {
    Filter(&'a FilterOp),
    GroupBy(&'a GroupByOp),
    Aggregate(&'a AggregateOp),
    TopK(&'a TopKOp),
    Sort(&'a SortOp),
    Distinct(&'a DistinctOp),
    Pipeline(&'a PipelineOp),
}

impl From<TaggedOperation> for Operation {
    fn from(tagged: TaggedOperation) -> Self {
        match tagged {
            TaggedOperation::Filter(op) => Self::Filter(op),
            TaggedOperation::GroupBy(op) => Self::GroupBy(op),
            TaggedOperation::Aggregate(op) => Self::Aggregate(op),
            TaggedOperation::TopK(op) => Self::TopK(op),
            TaggedOperation::Sort(op) => Self::Sort(op),
            TaggedOperation::Distinct(op) => Self::Distinct(op),
            TaggedOperation::Pipeline(op) => Self::Pipeline(op),
        }
    }
}

impl Operation {
    /// Interpret a JSON description. Total: shapes that do not parse become
    /// [`Operation::Unrecognized`] carrying the raw value and the reason.
    #[must_use]
    pub fn from_json(raw: serde_json::Value) -> Self {
        match TaggedOperation::deserialize(&raw) {
            Ok(tagged) => tagged.into(),
            Err(err) => Self::Unrecognized {
                raw,
                reason: err.to_string(),
            },
        }
    }

    /// Parse JSON text. Only syntactically invalid JSON is an error.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Value>(text).map(Self::from_json)
    }

    /// The `type` tag, or whatever the unrecognized description carried.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Filter(_) => "filter",
            Self::GroupBy(_) => "groupBy",
            Self::Aggregate(_) => "aggregate",
            Self::TopK(_) => "topK",
            Self::Sort(_) => "sort",
            Self::Distinct(_) => "distinct",
            Self::Pipeline(_) => "pipeline",
            Self::Unrecognized { raw, .. } => raw
                .get("type")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    #[must_use]
    pub fn pipeline(steps: Vec<Operation>) -> Self {
        Self::Pipeline(PipelineOp { steps })
    }
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let tagged = match self {
            Self::Filter(op) => TaggedOperationRef::Filter(op),
            Self::GroupBy(op) => TaggedOperationRef::GroupBy(op),
            Self::Aggregate(op) => TaggedOperationRef::Aggregate(op),
            Self::TopK(op) => TaggedOperationRef::TopK(op),
            Self::Sort(op) => TaggedOperationRef::Sort(op),
            Self::Distinct(op) => TaggedOperationRef::Distinct(op),
            Self::Pipeline(op) => TaggedOperationRef::Pipeline(op),
            Self::Unrecognized { raw, .. } => return raw.serialize(serializer),
        };
        tagged.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(raw))
    }
}
