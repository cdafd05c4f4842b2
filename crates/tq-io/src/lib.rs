#![forbid(unsafe_code)]

use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use thiserror::Error;
use tq_frame::{Record, Table};
use tq_types::Scalar;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("csv input has no headers")]
    MissingHeaders,
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Parse delimited text with a header row into a table.
///
/// Every cell stays text; numeric interpretation belongs to the operators.
/// A row shorter than the header leaves its trailing fields absent and
/// extra cells past the header are dropped.
pub fn read_csv_bytes(input: &[u8]) -> Result<Table, IoError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers().cloned().map_err(IoError::from)?;

    if headers.is_empty() || headers.iter().all(str::is_empty) {
        return Err(IoError::MissingHeaders);
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let record = headers
            .iter()
            .zip(row.iter())
            .map(|(name, cell)| (name, Scalar::from(cell)))
            .collect::<Record>();
        records.push(record);
    }

    Ok(Table::new(records))
}

pub fn read_csv_str(input: &str) -> Result<Table, IoError> {
    read_csv_bytes(input.as_bytes())
}

pub fn read_csv_path(path: &Path) -> Result<Table, IoError> {
    let bytes = std::fs::read(path)?;
    read_csv_bytes(&bytes)
}

/// Table name for an uploaded file: everything before the first `.`.
#[must_use]
pub fn table_name_from_filename(filename: &str) -> &str {
    filename.split('.').next().unwrap_or(filename)
}

/// Render a table as CSV. The header is the union of field names in
/// first-seen order; cells a record does not carry are written empty.
pub fn write_csv_string(table: &Table) -> Result<String, IoError> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());

    let headers = table.field_names();
    writer.write_record(&headers)?;

    for record in table {
        let row = headers
            .iter()
            .map(|name| record.get(name).map_or_else(String::new, scalar_to_csv))
            .collect::<Vec<_>>();
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn write_csv_path(table: &Table, path: &Path) -> Result<(), IoError> {
    let text = write_csv_string(table)?;
    std::fs::write(path, text)?;
    Ok(())
}

fn scalar_to_csv(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Number(v) if v.is_nan() => String::new(),
        other => other.display_text().unwrap_or_default(),
    }
}
