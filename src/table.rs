//! CSV input and output for batch runs.

use std::path::Path;

use tracing::info;

use crate::error::{TableError, TableResult};
use crate::resolver::{ResolvedRow, RESULT_COLUMNS};

/// Read the `column` of every record in the CSV at `path`, in file order.
pub fn read_queries(path: &Path, column: &str) -> TableResult<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)?;
    let index = reader
        .headers()?
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| TableError::MissingColumn {
            column: column.to_string(),
            path: path.display().to_string(),
        })?;

    let mut queries = Vec::new();
    for record in reader.records() {
        let record = record?;
        queries.push(record.get(index).unwrap_or_default().to_string());
    }

    info!(path = %path.display(), rows = queries.len(), "Loaded input rows");
    Ok(queries)
}

/// Write resolved rows as an indexed table: a leading unnamed index column,
/// then `column` and the result columns.
pub fn write_rows(path: &Path, column: &str, rows: &[ResolvedRow]) -> TableResult<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["", column];
    header.extend(RESULT_COLUMNS);
    writer.write_record(&header)?;

    for (index, row) in rows.iter().enumerate() {
        let index = index.to_string();
        let fields = row.to_fields();
        writer.write_record(std::iter::once(index.as_str()).chain(fields.iter().map(String::as_str)))?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Wrote output rows");
    Ok(())
}
