use crate::Result;
use crate::normalize::FlatRecord;
use ohno::IntoAppError;
use serde_json::Value;
use std::io;

/// Write rows as CSV with an explicit header.
///
/// Column order follows `fieldnames` exactly; rows missing a field get an
/// empty cell.
///
/// # Errors
///
/// Returns an error if writing to the underlying writer fails.
pub fn write_csv<W: io::Write>(fieldnames: &[String], rows: &[FlatRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(fieldnames).into_app_err("writing CSV header")?;

    for row in rows {
        csv_writer
            .write_record(fieldnames.iter().map(|field| cell(row.get(field))))
            .into_app_err("writing CSV row")?;
    }

    csv_writer.flush().into_app_err("flushing CSV output")?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
