// Flat delimited table export.
//
// Header row, then one row per record. Absent values are written as empty
// fields. Fields containing the delimiter, a quote, or a line break are
// wrapped in quotes with inner quotes doubled.
//
// The whole table is rendered in memory, written to a temp file next to the
// destination, and renamed into place. A failed write leaves nothing behind.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::info;

use crate::error::ReviewError;
use crate::reviews::record::ReviewTable;

const DELIMITER: char = ',';

/// Quote a field if it contains the delimiter, a quote, or a line break.
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([DELIMITER, '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Render `table` with exactly `columns`, in that order.
pub fn render_table(columns: &[String], table: &ReviewTable) -> String {
    let mut out = String::new();
    push_row(&mut out, columns.iter().map(|c| Cow::Borrowed(c.as_str())));
    for record in table {
        push_row(
            &mut out,
            columns
                .iter()
                .map(|c| Cow::Owned(record.cell(c).unwrap_or_default())),
        );
    }
    out
}

fn push_row<'a>(out: &mut String, fields: impl Iterator<Item = Cow<'a, str>>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(&escape_field(&field));
    }
    out.push('\n');
}

/// Write the table to `path`, replacing any existing file only on success.
pub fn write_table(path: &Path, columns: &[String], table: &ReviewTable) -> Result<(), ReviewError> {
    let rendered = render_table(columns, table);
    let write_err = |source: std::io::Error| ReviewError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
    tmp.write_all(rendered.as_bytes()).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!(
        path = %path.display(),
        rows = table.len(),
        columns = columns.len(),
        "Wrote results table"
    );
    Ok(())
}
