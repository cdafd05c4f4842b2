#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use tq_frame::{Record, Table};
use tq_types::{Scalar, format_number};

/// Sum `value_field` per distinct `key_field`.
///
/// Keys group by their text form, so `10` and `"10"` land in the same
/// group. Values that fail numeric coercion (or are missing) add 0. Output
/// has one record per group in first-seen order, carrying the key under
/// `key_field` and the total under `value_field`.
///
/// Rows without a key form one group whose output key is `Null`, not text.
#[must_use]
pub fn groupby_sum(table: &Table, key_field: &str, value_field: &str) -> Table {
    let mut ordering = Vec::<GroupKeyRef<'_>>::new();
    let mut slot = HashMap::<GroupKeyRef<'_>, f64>::new();

    for record in table {
        let key_id = GroupKeyRef::from_scalar(record.value(key_field));
        let total = slot.entry(key_id.clone()).or_insert_with(|| {
            ordering.push(key_id);
            0.0
        });
        *total += record.value(value_field).to_f64().unwrap_or(0.0);
    }

    ordering
        .into_iter()
        .map(|key| {
            let total = slot.get(&key).copied().unwrap_or(0.0);
            let mut out = Record::with_capacity(2);
            out.insert(key_field, key.into_scalar());
            out.insert(value_field, total);
            out
        })
        .collect()
}

/// One single-field record per distinct value of `field`, first occurrence
/// wins. Distinctness is on raw values: `5` and `"5"` are different.
#[must_use]
pub fn distinct_values(table: &Table, field: &str) -> Table {
    let mut seen = HashSet::<DistinctKey<'_>>::new();
    let mut out = Vec::new();

    for record in table {
        let value = record.value(field);
        if seen.insert(DistinctKey::from_scalar(value)) {
            let mut row = Record::with_capacity(1);
            row.insert(field, value.clone());
            out.push(row);
        }
    }

    Table::new(out)
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum GroupKeyRef<'a> {
    Missing,
    Text(Cow<'a, str>),
}

impl<'a> GroupKeyRef<'a> {
    fn from_scalar(key: &'a Scalar) -> Self {
        match key {
            Scalar::Null => Self::Missing,
            Scalar::Number(v) => Self::Text(Cow::Owned(format_number(*v))),
            Scalar::Utf8(v) => Self::Text(Cow::Borrowed(v.as_str())),
        }
    }

    fn into_scalar(self) -> Scalar {
        match self {
            Self::Missing => Scalar::Null,
            Self::Text(text) => Scalar::Utf8(text.into_owned()),
        }
    }
}

#[derive(Debug, Hash, PartialEq, Eq)]
enum DistinctKey<'a> {
    Missing,
    FloatBits(u64),
    Utf8(&'a str),
}

impl<'a> DistinctKey<'a> {
    fn from_scalar(value: &'a Scalar) -> Self {
        match value {
            Scalar::Null => Self::Missing,
            // +0 and -0 are one value, every NaN is one value.
            Scalar::Number(v) if *v == 0.0 => Self::FloatBits(0.0f64.to_bits()),
            Scalar::Number(v) if v.is_nan() => Self::FloatBits(f64::NAN.to_bits()),
            Scalar::Number(v) => Self::FloatBits(v.to_bits()),
            Scalar::Utf8(v) => Self::Utf8(v.as_str()),
        }
    }
}
