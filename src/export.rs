use crate::response::{ResponseTable, TIMESTAMP_LABEL};
use anyhow::{Context, Result};
use std::path::Path;

/// Write the table to a CSV file, header row first. Multi-select answers are
/// re-joined with `", "`, matching how the source sheet stores them.
pub fn write_csv(table: &ResponseTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("could not create `{}`", path.display()))?;

    if table.headers().is_empty() {
        writer.flush()?;
        return Ok(());
    }
    writer.write_record(table.headers())?;
    for row in table.rows() {
        let record: Vec<String> = table
            .headers()
            .iter()
            .map(|label| {
                if label == TIMESTAMP_LABEL {
                    row.submitted_at
                        .map(|ts| ts.format("%m/%d/%Y %H:%M:%S").to_string())
                        .unwrap_or_default()
                } else {
                    row.answer(label).map(|a| a.display()).unwrap_or_default()
                }
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
