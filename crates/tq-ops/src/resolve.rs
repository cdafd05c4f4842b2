use std::sync::LazyLock;

use regex::Regex;
use tq_frame::Table;
use tq_types::Scalar;

use crate::operation::Operand;
use crate::stats;

static SPECIAL_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(average|avg|median|min|max)\s+(.+)").expect("special value pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Average,
    Median,
    Min,
    Max,
}

/// A value expression naming a statistic of a column, e.g. `"average amt"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialValue {
    pub statistic: Statistic,
    pub field: String,
}

impl SpecialValue {
    /// Matches anywhere in `text`, case-insensitively; the field is the rest
    /// of the line after the statistic and its whitespace.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let caps = SPECIAL_VALUE.captures(text)?;
        let statistic = match caps.get(1)?.as_str().to_ascii_lowercase().as_str() {
            "average" | "avg" => Statistic::Average,
            "median" => Statistic::Median,
            "min" => Statistic::Min,
            "max" => Statistic::Max,
            _ => return None,
        };
        Some(Self {
            statistic,
            field: caps.get(2)?.as_str().to_owned(),
        })
    }

    /// Statistic over the numeric values of the field; 0 when there are none.
    #[must_use]
    pub fn evaluate(&self, table: &Table) -> f64 {
        let values = table.numeric_values(&self.field);
        if values.is_empty() {
            return 0.0;
        }
        match self.statistic {
            Statistic::Average => stats::mean(&values),
            Statistic::Median => stats::median(&values),
            Statistic::Min => stats::min(&values).unwrap_or_default(),
            Statistic::Max => stats::max(&values).unwrap_or_default(),
        }
    }
}

/// Replace a special-value string with the statistic it names, computed over
/// `table`. Numbers, lists, missing values and other strings pass through.
#[must_use]
pub fn resolve_value(table: &Table, value: &Operand) -> Operand {
    let Operand::Scalar(Scalar::Utf8(text)) = value else {
        return value.clone();
    };
    match SpecialValue::parse(text) {
        Some(special) => {
            let resolved = special.evaluate(table);
            #[cfg(feature = "tracing")]
            tracing::trace!(value = %text, field = %special.field, resolved, "resolved special value");
            Operand::Scalar(Scalar::Number(resolved))
        }
        None => value.clone(),
    }
}
