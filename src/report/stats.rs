use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crate::data::model::PeptideTable;
use crate::data::ratio::RatioSpec;

/// Derived-value summary of one protein.
#[derive(Debug, Clone, PartialEq)]
pub struct ProteinSummary {
    pub protein: String,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// 1-based rank of the protein among all proteins of the table.
    pub location: usize,
    pub values: Vec<f64>,
}

/// Summarize the finite derived values of the rows at `indices`, per protein.
///
/// Locations are ranks over every protein of the table, so they stay stable
/// when a filter removes a whole protein. Proteins left without a finite
/// value are omitted.
pub fn summarize(table: &PeptideTable, values: &[f64], indices: &[usize]) -> Vec<ProteinSummary> {
    let rows = table.rows();
    table
        .proteins()
        .into_iter()
        .enumerate()
        .filter_map(|(rank, protein)| {
            let vals: Vec<f64> = indices
                .iter()
                .filter(|&&i| rows[i].protein == protein)
                .filter_map(|&i| values.get(i).copied())
                .filter(|v| v.is_finite())
                .collect();
            if vals.is_empty() {
                return None;
            }
            let n = vals.len() as f64;
            let mean = vals.iter().sum::<f64>() / n;
            let variance = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            Some(ProteinSummary {
                protein: protein.to_string(),
                mean,
                std_dev: variance.sqrt(),
                location: rank + 1,
                values: vals,
            })
        })
        .collect()
}

/// `<prefix>-AMP_U_o_AMP_U_p_AMP_S.stats`
pub fn stats_path(prefix: &Path, ratio: &RatioSpec) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(ratio.file_suffix());
    name.push(".stats");
    PathBuf::from(name)
}

/// Space separated, one protein per line.
pub fn write_stats<W: Write>(out: W, summaries: &[ProteinSummary]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .flexible(true)
        .from_writer(out);
    writer
        .write_record(["Protein", "flab", "+\\-", "loc", "nval", "vals"])
        .context("writing stats header")?;
    for summary in summaries {
        let mut record = vec![
            summary.protein.clone(),
            format!("{:.4}", summary.mean),
            format!("{:.4}", summary.std_dev),
            summary.location.to_string(),
            summary.values.len().to_string(),
        ];
        record.extend(summary.values.iter().map(|v| format!("{v:.4}")));
        writer
            .write_record(&record)
            .with_context(|| format!("writing stats for {}", summary.protein))?;
    }
    writer.flush().context("flushing stats")?;
    Ok(())
}

pub fn write_stats_file(path: &Path, summaries: &[ProteinSummary]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating stats file {}", path.display()))?;
    write_stats(file, summaries)?;
    log::info!("Wrote statistics for {} proteins to {}", summaries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Amplitudes, Labeling, Peptide, Schema};
    use crate::data::ratio::Selection;

    fn table() -> PeptideTable {
        let rows = vec![
            Peptide::new("a", "L3", Amplitudes::steady_state(1.0, 1.0)),
            Peptide::new("b", "L1", Amplitudes::steady_state(1.0, 1.0)),
            Peptide::new("c", "L3", Amplitudes::steady_state(1.0, 1.0)),
            Peptide::new("d", "L2", Amplitudes::steady_state(1.0, 1.0)),
        ];
        PeptideTable::new(Schema::new(Labeling::SteadyState, false), Vec::new(), rows).unwrap()
    }

    #[test]
    fn per_protein_mean_and_spread() {
        let summaries = summarize(&table(), &[1.0, 0.5, 3.0, f64::NAN], &[0, 1, 2, 3]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].protein, "L1");
        assert_eq!(summaries[0].location, 1);
        assert_eq!(summaries[1].protein, "L3");
        assert_eq!(summaries[1].location, 3);
        assert_eq!(summaries[1].mean, 2.0);
        assert_eq!(summaries[1].std_dev, 1.0);
        assert_eq!(summaries[1].values, vec![1.0, 3.0]);
    }

    #[test]
    fn only_selected_rows_count() {
        let summaries = summarize(&table(), &[1.0, 0.5, 3.0, 2.0], &[2]);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].values, vec![3.0]);
        assert_eq!(summaries[0].std_dev, 0.0);
    }

    #[test]
    fn file_name_and_layout() {
        let schema = Schema::new(Labeling::SteadyState, false);
        let ratio = RatioSpec::new(
            &schema,
            Selection::from_toggles(true, false, false),
            Selection::from_toggles(true, false, true),
        )
        .unwrap();
        assert_eq!(
            stats_path(Path::new("/out/S21"), &ratio),
            PathBuf::from("/out/S21-AMP_U_o_AMP_U_p_AMP_S.stats")
        );

        let mut buf = Vec::new();
        let summaries = summarize(&table(), &[1.0, 0.5, 3.0, 2.0], &[0, 2]);
        write_stats(&mut buf, &summaries).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "Protein flab +\\- loc nval vals\nL3 2.0000 1.0000 3 2 1.0000 3.0000\n"
        );
    }

    #[test]
    fn stats_file_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S21.stats");
        let summaries = summarize(&table(), &[1.0, 0.5, 3.0, 2.0], &[0, 1, 2, 3]);
        write_stats_file(&path, &summaries).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 4);
    }
}
