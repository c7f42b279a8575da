use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::data::export;
use crate::data::filter::{evaluate, Dimension, FilterConfiguration, Partition};
use crate::data::loader::load_table;
use crate::data::model::{PeptideTable, Species, Subunit};
use crate::data::params;
use crate::data::ratio::{derive_all, DerivedValues, Selection};
use crate::error::ConfigError;
use crate::report::plot::PlotData;
use crate::report::stats::{self, ProteinSummary};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// One open table and everything computed from it, independent of any front end.
///
/// Every edit goes through a method that validates first and recomputes
/// afterwards; a rejected edit leaves the session exactly as it was.
#[derive(Debug, Clone)]
pub struct Session {
    table: PeptideTable,
    /// Where the table was read from, if it came from disk.
    source: Option<PathBuf>,
    config: FilterConfiguration,
    /// Added to every derived value; not part of the parameter file.
    offset: f64,
    derived: DerivedValues,
    partition: Partition,
    /// Dimension shown in the histograms.
    pub histogram: Dimension,
}

impl Session {
    /// Start a session on `table` with the default configuration.
    pub fn new(table: PeptideTable) -> Self {
        let config = FilterConfiguration::defaults(table.schema);
        let mut session = Self {
            table,
            source: None,
            config,
            offset: 0.0,
            derived: DerivedValues::default(),
            partition: Partition::default(),
            histogram: Dimension::PpmDiff,
        };
        session.recalculate();
        session
    }

    /// Load a table from disk and start a session on it.
    pub fn open(path: &Path) -> Result<Self> {
        let table = load_table(path)?;
        let mut session = Self::new(table);
        session.source = Some(path.to_path_buf());
        Ok(session)
    }

    pub fn table(&self) -> &PeptideTable {
        &self.table
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn config(&self) -> &FilterConfiguration {
        &self.config
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Derived value of every row, in table order.
    pub fn values(&self) -> &[f64] {
        &self.derived.values
    }

    /// Rows whose derived value is not finite.
    pub fn degenerate(&self) -> &[usize] {
        &self.derived.degenerate
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    // -- recomputation --

    /// Recompute derived values and the partition.
    pub fn recalculate(&mut self) {
        self.derived = derive_all(&self.table, self.config.ratio(), self.offset);
        self.refilter();
    }

    /// Recompute the partition after a filter change.
    pub fn refilter(&mut self) {
        self.partition = evaluate(self.table.rows(), &self.config);
        log::debug!(
            "{} of {} peptides pass",
            self.partition.passing.len(),
            self.table.len()
        );
    }

    // -- edits --

    pub fn set_bounds(&mut self, dim: Dimension, low: f64, high: f64) -> Result<(), ConfigError> {
        self.config.set_bounds(dim, low, high)?;
        self.refilter();
        Ok(())
    }

    pub fn set_enabled(&mut self, dim: Dimension, enabled: bool) -> Result<(), ConfigError> {
        self.config.set_enabled(dim, enabled)?;
        self.refilter();
        Ok(())
    }

    pub fn set_ratio(&mut self, numerator: Selection, denominator: Selection) -> Result<(), ConfigError> {
        self.config.set_ratio(numerator, denominator)?;
        self.recalculate();
        Ok(())
    }

    /// Flip one species in the numerator (`numerator == true`) or denominator.
    pub fn toggle_species(&mut self, species: Species, numerator: bool) -> Result<(), ConfigError> {
        self.config.toggle_species(species, numerator)?;
        self.recalculate();
        Ok(())
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.offset = offset;
        self.recalculate();
    }

    /// Place peptides by their position within `subunit`. Only the plot
    /// positions change; the partition does not depend on them.
    pub fn set_subunit(&mut self, subunit: Subunit) -> Result<(), ConfigError> {
        if !self.table.has_subunit(subunit) {
            return Err(ConfigError::MissingSubunit(subunit));
        }
        self.table.place_on(subunit);
        Ok(())
    }

    /// Subunit the positions currently come from, if any.
    pub fn subunit(&self) -> Option<Subunit> {
        self.table.subunit()
    }

    pub fn set_show_grid(&mut self, show: bool) {
        self.config.show_grid = show;
    }

    // -- parameter sets --

    /// The current configuration as parameter file text.
    pub fn params_text(&self) -> String {
        params::save(&self.config)
    }

    /// Replace the configuration with one read from parameter file text.
    pub fn apply_params(&mut self, text: &str) -> Result<(), ConfigError> {
        self.config = params::load(text, self.table.schema)?;
        self.recalculate();
        Ok(())
    }

    /// `_last.filterParam` next to the source table.
    pub fn default_params_path(&self) -> Option<PathBuf> {
        self.source.as_deref().map(params::default_path)
    }

    pub fn save_params_file(&self, path: &Path) -> Result<()> {
        params::save_file(path, &self.config)
    }

    pub fn load_params_file(&mut self, path: &Path) -> Result<()> {
        self.config = params::load_file(path, self.table.schema)?;
        self.recalculate();
        Ok(())
    }

    // -- views --

    fn sorted_ids(&self, indices: &[usize]) -> Vec<&str> {
        let rows = self.table.rows();
        let mut ids: Vec<&str> = indices.iter().map(|&i| rows[i].id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Ids of passing peptides, alphabetically.
    pub fn passing_ids(&self) -> Vec<&str> {
        self.sorted_ids(&self.partition.passing)
    }

    /// Ids of failing peptides, alphabetically.
    pub fn failing_ids(&self) -> Vec<&str> {
        self.sorted_ids(&self.partition.failing)
    }

    /// Short measurement summary of one peptide.
    pub fn describe(&self, id: &str) -> Option<String> {
        let row = self.table.find(id)?;
        Some(format!(
            "ppmDiff: {}\nN14: {}\nN15: {}\nrtDiff: {}\nresid: {}\nmissed: {}",
            row.ppm_diff,
            row.ppm_n14,
            row.ppm_n15,
            row.rt_diff,
            row.resid.trunc(),
            row.missed
        ))
    }

    pub fn plot_data(&self) -> PlotData {
        PlotData::new(
            &self.table,
            &self.config,
            &self.derived.values,
            &self.partition,
            self.histogram,
        )
    }

    /// Per-protein statistics of the passing peptides.
    pub fn protein_stats(&self) -> Vec<ProteinSummary> {
        stats::summarize(&self.table, &self.derived.values, &self.partition.passing)
    }

    // -- output files --

    /// `<stem>_filt.csv` next to the source table.
    pub fn default_export_path(&self) -> Option<PathBuf> {
        self.source.as_deref().map(export::filtered_path)
    }

    /// Write the passing peptides with their derived values.
    pub fn export(&self, path: &Path) -> Result<()> {
        export::export_file(path, &self.table, &self.partition.passing, &self.derived.values)
    }

    /// Write the statistics file for `prefix`; returns the path written.
    pub fn write_stats(&self, prefix: &Path) -> Result<PathBuf> {
        let path = stats::stats_path(prefix, self.config.ratio());
        stats::write_stats_file(&path, &self.protein_stats())
            .with_context(|| format!("writing statistics for {}", self.config.ratio().label()))?;
        Ok(path)
    }
}
