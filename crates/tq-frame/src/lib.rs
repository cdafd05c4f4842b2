#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tq_types::Scalar;

static MISSING: Scalar = Scalar::Null;

/// One row: an ordered mapping from field name to cell.
///
/// Field sets are not uniform across a table; reading a field the record
/// does not carry yields `Scalar::Null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Scalar)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Cell for `name`, `Null` when absent.
    #[must_use]
    pub fn value(&self, name: &str) -> &Scalar {
        self.get(name).unwrap_or(&MISSING)
    }

    /// Set `name`. An existing field keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Record
where
    K: Into<String>,
    V: Into<Scalar>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Self::new();
        for (name, value) in iter {
            record.insert(name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a record object mapping field names to cells")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
        let mut record = Record::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, value)) = access.next_entry::<String, Scalar>()? {
            record.insert(name, value);
        }
        Ok(record)
    }
}

/// An ordered sequence of records.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Table {
    records: Vec<Record>,
}

impl Table {
    #[must_use]
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Values of `field` that survive numeric coercion, in row order.
    #[must_use]
    pub fn numeric_values(&self, field: &str) -> Vec<f64> {
        self.records
            .iter()
            .filter_map(|record| record.value(field).to_f64().ok())
            .collect()
    }

    /// Union of field names in first-seen order.
    #[must_use]
    pub fn field_names(&self) -> Vec<String> {
        let mut names = Vec::<String>::new();
        for record in &self.records {
            for name in record.field_names() {
                if !names.iter().any(|seen| seen == name) {
                    names.push(name.to_owned());
                }
            }
        }
        names
    }

    /// Stable merge sort into a new table.
    ///
    /// `compare` may be inconsistent (non-transitive, or `Equal` for
    /// incomparable pairs); the sort still terminates with a permutation of
    /// the input and never panics. A row moves ahead of an earlier row only
    /// when `compare` reports it strictly `Less`.
    #[must_use]
    pub fn sorted_by<F>(&self, mut compare: F) -> Self
    where
        F: FnMut(&Record, &Record) -> Ordering,
    {
        let mut order = (0..self.records.len()).collect::<Vec<_>>();
        merge_sort_positions(&mut order, |left, right| {
            compare(&self.records[left], &self.records[right])
        });
        Self::new(
            order
                .into_iter()
                .map(|pos| self.records[pos].clone())
                .collect(),
        )
    }
}

impl FromIterator<Record> for Table {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Table {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn merge_sort_positions<F>(order: &mut Vec<usize>, mut compare: F)
where
    F: FnMut(usize, usize) -> Ordering,
{
    let len = order.len();
    let mut scratch = order.clone();
    let mut width = 1;

    while width < len {
        let mut start = 0;
        while start < len {
            let mid = (start + width).min(len);
            let end = (start + 2 * width).min(len);
            let (mut left, mut right, mut out) = (start, mid, start);

            while left < mid && right < end {
                if compare(order[right], order[left]) == Ordering::Less {
                    scratch[out] = order[right];
                    right += 1;
                } else {
                    scratch[out] = order[left];
                    left += 1;
                }
                out += 1;
            }
            scratch[out..out + (mid - left)].copy_from_slice(&order[left..mid]);
            out += mid - left;
            scratch[out..out + (end - right)].copy_from_slice(&order[right..end]);

            start = end;
        }
        std::mem::swap(order, &mut scratch);
        width *= 2;
    }
}
