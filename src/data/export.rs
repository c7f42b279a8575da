use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::model::PeptideTable;

/// Column holding the derived value in exported tables.
pub const DERIVED_COLUMN: &str = "currentCalc";

/// `<dir>/<stem>_filt.csv` for a source table at `<dir>/<stem>.<ext>`.
pub fn filtered_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table");
    source.with_file_name(format!("{stem}_filt.csv"))
}

/// Write the selected rows with their original cells plus the derived value.
///
/// A `currentCalc` column already present in the source is overwritten
/// rather than duplicated.
pub fn write_rows<W: Write>(
    mut writer: csv::Writer<W>,
    table: &PeptideTable,
    indices: &[usize],
    values: &[f64],
) -> Result<()> {
    let existing = table.headers.iter().position(|h| h == DERIVED_COLUMN);

    let mut header = table.headers.clone();
    if existing.is_none() {
        header.push(DERIVED_COLUMN.to_string());
    }
    writer.write_record(&header).context("writing header")?;

    let rows = table.rows();
    for &i in indices {
        let row = &rows[i];
        let derived = values.get(i).copied().unwrap_or(f64::NAN).to_string();
        let mut cells = row.record.clone();
        match existing {
            Some(col) if col < cells.len() => cells[col] = derived,
            _ => cells.push(derived),
        }
        writer
            .write_record(&cells)
            .with_context(|| format!("writing peptide {}", row.id))?;
    }
    writer.flush().context("flushing export")?;
    Ok(())
}

/// Export the selected rows to a CSV file.
pub fn export_file(path: &Path, table: &PeptideTable, indices: &[usize], values: &[f64]) -> Result<()> {
    let writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating export file {}", path.display()))?;
    write_rows(writer, table, indices, values)
        .with_context(|| format!("exporting to {}", path.display()))?;
    log::info!("Exported {} peptides to {}", indices.len(), path.display());
    Ok(())
}
