use std::collections::BTreeMap;
use std::fmt;

use crate::error::ConfigError;

use super::model::{Peptide, Schema, Species};
use super::ratio::{RatioSpec, Selection};

// ---------------------------------------------------------------------------
// Dimension – one filterable measurement
// ---------------------------------------------------------------------------

/// A measurement a range filter can be placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dimension {
    PpmDiff,
    PpmN14,
    PpmN15,
    Missed,
    RtDiff,
    FracNx,
    Resid,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::PpmDiff,
        Dimension::PpmN14,
        Dimension::PpmN15,
        Dimension::Missed,
        Dimension::RtDiff,
        Dimension::FracNx,
        Dimension::Resid,
    ];

    /// Dimensions that exist for tables of the given schema.
    pub fn for_schema(schema: &Schema) -> impl Iterator<Item = Dimension> + '_ {
        Self::ALL
            .into_iter()
            .filter(|dim| schema.variable_labeling || *dim != Dimension::FracNx)
    }

    /// Column name, also the prefix of the `_low` / `_high` parameter keys.
    pub fn key(self) -> &'static str {
        match self {
            Dimension::PpmDiff => "ppmDiff",
            Dimension::PpmN14 => "ppm_n14",
            Dimension::PpmN15 => "ppm_n15",
            Dimension::Missed => "missed",
            Dimension::RtDiff => "rtDiff",
            Dimension::FracNx => "FRC_NX",
            Dimension::Resid => "resid",
        }
    }

    /// Parameter key of the on/off flag.
    pub fn flag_key(self) -> &'static str {
        match self {
            Dimension::PpmN14 => "n14",
            Dimension::PpmN15 => "n15",
            other => other.key(),
        }
    }

    /// Look a dimension up by its column name or its flag key.
    pub fn from_key(key: &str) -> Option<Dimension> {
        Self::ALL
            .into_iter()
            .find(|dim| dim.key() == key || dim.flag_key() == key)
    }

    /// The value compared against the bounds. The two raw ppm errors are
    /// compared by magnitude; a missing `FRC_NX` reads as NaN.
    pub fn value(self, row: &Peptide) -> f64 {
        match self {
            Dimension::PpmDiff => row.ppm_diff,
            Dimension::PpmN14 => row.ppm_n14.abs(),
            Dimension::PpmN15 => row.ppm_n15.abs(),
            Dimension::Missed => f64::from(row.missed),
            Dimension::RtDiff => row.rt_diff,
            Dimension::FracNx => row.frac_nx.unwrap_or(f64::NAN),
            Dimension::Resid => row.resid,
        }
    }

    /// The column value as stored, sign included.
    pub fn raw_value(self, row: &Peptide) -> f64 {
        match self {
            Dimension::PpmN14 => row.ppm_n14,
            Dimension::PpmN15 => row.ppm_n15,
            other => other.value(row),
        }
    }

    /// Bounds used when a session starts.
    pub fn default_spec(self) -> FilterSpec {
        match self {
            Dimension::PpmDiff | Dimension::PpmN14 | Dimension::PpmN15 => {
                FilterSpec::new(-100.0, 100.0)
            }
            Dimension::Missed => FilterSpec::new(0.0, 5.0),
            Dimension::RtDiff => FilterSpec::new(-0.5, 0.5),
            Dimension::FracNx => FilterSpec::new(0.0, 1.0),
            Dimension::Resid => FilterSpec::new(0.0, 5000.0),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// ---------------------------------------------------------------------------
// FilterSpec – inclusive bounds plus an on/off switch
// ---------------------------------------------------------------------------

/// Inclusive `[low, high]` range on one dimension.
///
/// `low > high` is allowed and simply admits nothing while enabled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub low: f64,
    pub high: f64,
    pub enabled: bool,
}

impl FilterSpec {
    /// An enabled range.
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            high,
            enabled: true,
        }
    }

    /// Whether `value` lies inside the bounds, ignoring `enabled`. NaN never does.
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }
}

// ---------------------------------------------------------------------------
// FilterConfiguration – everything a parameter file stores
// ---------------------------------------------------------------------------

/// The complete filter state of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfiguration {
    schema: Schema,
    specs: BTreeMap<Dimension, FilterSpec>,
    ratio: RatioSpec,
    /// Grid display on the scatter plot.
    pub show_grid: bool,
}

impl FilterConfiguration {
    /// Start-of-session state: every dimension enabled with wide bounds,
    /// ratio `U / U+S`.
    pub fn defaults(schema: Schema) -> Self {
        let specs = Dimension::for_schema(&schema)
            .map(|dim| (dim, dim.default_spec()))
            .collect();
        let ratio = RatioSpec::new(
            &schema,
            Selection::from_toggles(true, false, false),
            Selection::from_toggles(true, false, true),
        )
        .unwrap_or_else(|e| unreachable!("default ratio is valid for every schema: {e}"));
        Self {
            schema,
            specs,
            ratio,
            show_grid: false,
        }
    }

    /// Assemble a configuration from already validated parts.
    pub(crate) fn from_parts(
        schema: Schema,
        specs: BTreeMap<Dimension, FilterSpec>,
        ratio: RatioSpec,
        show_grid: bool,
    ) -> Self {
        debug_assert!(specs.keys().copied().eq(Dimension::for_schema(&schema)));
        Self {
            schema,
            specs,
            ratio,
            show_grid,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn ratio(&self) -> &RatioSpec {
        &self.ratio
    }

    /// Configured dimensions in persistence order.
    pub fn specs(&self) -> impl Iterator<Item = (Dimension, &FilterSpec)> {
        self.specs.iter().map(|(dim, spec)| (*dim, spec))
    }

    pub fn spec(&self, dim: Dimension) -> Option<&FilterSpec> {
        self.specs.get(&dim)
    }

    fn spec_mut(&mut self, dim: Dimension) -> Result<&mut FilterSpec, ConfigError> {
        self.specs
            .get_mut(&dim)
            .ok_or(ConfigError::UnknownDimension(dim.key()))
    }

    pub fn set_bounds(&mut self, dim: Dimension, low: f64, high: f64) -> Result<(), ConfigError> {
        let spec = self.spec_mut(dim)?;
        spec.low = low;
        spec.high = high;
        Ok(())
    }

    pub fn set_enabled(&mut self, dim: Dimension, enabled: bool) -> Result<(), ConfigError> {
        self.spec_mut(dim)?.enabled = enabled;
        Ok(())
    }

    /// Enable or disable every dimension at once.
    pub fn set_all_enabled(&mut self, enabled: bool) {
        for spec in self.specs.values_mut() {
            spec.enabled = enabled;
        }
    }

    /// Replace the ratio selection. Nothing changes if it is rejected.
    pub fn set_ratio(&mut self, numerator: Selection, denominator: Selection) -> Result<(), ConfigError> {
        self.ratio = RatioSpec::new(&self.schema, numerator, denominator)?;
        Ok(())
    }

    /// Toggle a single species on one side of the ratio.
    pub fn toggle_species(&mut self, species: Species, numerator: bool) -> Result<(), ConfigError> {
        let flip = |selection: &Selection| -> Selection {
            if selection.contains(species) {
                selection.iter().filter(|s| *s != species).collect()
            } else {
                selection.iter().chain(Some(species)).collect()
            }
        };
        let (num, den) = if numerator {
            (flip(self.ratio.numerator()), self.ratio.denominator().clone())
        } else {
            (self.ratio.numerator().clone(), flip(self.ratio.denominator()))
        };
        self.set_ratio(num, den)
    }

    /// Whether `row` passes every enabled dimension.
    pub fn admits(&self, row: &Peptide) -> bool {
        self.specs
            .iter()
            .filter(|(_, spec)| spec.enabled)
            .all(|(dim, spec)| spec.contains(dim.value(row)))
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Row indices split by filter membership, each side in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    pub passing: Vec<usize>,
    pub failing: Vec<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.passing.len() + self.failing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Membership of every row. With no dimension enabled every row passes.
pub fn membership(rows: &[Peptide], config: &FilterConfiguration) -> Vec<bool> {
    rows.iter().map(|row| config.admits(row)).collect()
}

/// Split `rows` into the ones passing all enabled filters and the rest.
pub fn evaluate(rows: &[Peptide], config: &FilterConfiguration) -> Partition {
    let mut partition = Partition::default();
    for (i, row) in rows.iter().enumerate() {
        if config.admits(row) {
            partition.passing.push(i);
        } else {
            partition.failing.push(i);
        }
    }
    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Amplitudes, Labeling};

    fn steady() -> Schema {
        Schema::new(Labeling::SteadyState, false)
    }

    fn row(id: &str) -> Peptide {
        Peptide::new(id, "L2", Amplitudes::steady_state(1.0, 1.0))
    }

    fn row_with_ppm_diff(id: &str, ppm_diff: f64) -> Peptide {
        Peptide {
            ppm_diff,
            ..row(id)
        }
    }

    fn only(dim: Dimension, low: f64, high: f64) -> FilterConfiguration {
        let mut config = FilterConfiguration::defaults(steady());
        config.set_all_enabled(false);
        config.set_bounds(dim, low, high).unwrap();
        config.set_enabled(dim, true).unwrap();
        config
    }

    #[test]
    fn ppm_diff_scenario() {
        let rows: Vec<Peptide> = [0.0, 10.0, 50.0, 99.0, 150.0]
            .into_iter()
            .enumerate()
            .map(|(i, v)| row_with_ppm_diff(&format!("r{i}"), v))
            .collect();
        let partition = evaluate(&rows, &only(Dimension::PpmDiff, 0.0, 100.0));
        assert_eq!(partition.passing, vec![0, 1, 2, 3]);
        assert_eq!(partition.failing, vec![4]);
    }

    #[test]
    fn bounds_are_inclusive() {
        let rows = vec![
            row_with_ppm_diff("low", 5.0),
            row_with_ppm_diff("high", 10.0),
            row_with_ppm_diff("below", 4.999),
            row_with_ppm_diff("above", 10.001),
        ];
        let partition = evaluate(&rows, &only(Dimension::PpmDiff, 5.0, 10.0));
        assert_eq!(partition.passing, vec![0, 1]);
        assert_eq!(partition.failing, vec![2, 3]);
    }

    #[test]
    fn raw_ppm_errors_compare_by_magnitude() {
        let rows = vec![
            Peptide {
                ppm_n14: -50.0,
                ..row("neg")
            },
            Peptide {
                ppm_n14: -150.0,
                ..row("far")
            },
        ];
        let partition = evaluate(&rows, &only(Dimension::PpmN14, 0.0, 100.0));
        assert_eq!(partition.passing, vec![0]);

        let rows = vec![Peptide {
            ppm_n15: -20.0,
            ..row("neg")
        }];
        assert!(evaluate(&rows, &only(Dimension::PpmN15, 10.0, 30.0)).failing.is_empty());
    }

    #[test]
    fn nothing_enabled_passes_everything() {
        let rows = vec![
            Peptide {
                resid: 1e9,
                missed: 40,
                ..row("a")
            },
            Peptide {
                rt_diff: -3.0,
                ..row("b")
            },
        ];
        let mut config = FilterConfiguration::defaults(steady());
        assert_eq!(evaluate(&rows, &config).passing, Vec::<usize>::new());
        config.set_all_enabled(false);
        assert_eq!(evaluate(&rows, &config).passing, vec![0, 1]);
        assert_eq!(membership(&rows, &config), vec![true, true]);
    }

    #[test]
    fn disabling_a_dimension_leaves_the_others_alone() {
        let rows = vec![
            Peptide {
                resid: 6000.0,
                ..row("bad resid")
            },
            Peptide {
                missed: 9,
                ..row("bad missed")
            },
            row("fine"),
        ];
        let mut config = FilterConfiguration::defaults(steady());
        assert_eq!(membership(&rows, &config), vec![false, false, true]);

        config.set_enabled(Dimension::Resid, false).unwrap();
        assert_eq!(membership(&rows, &config), vec![true, false, true]);
    }

    #[test]
    fn partition_covers_every_row_once() {
        let rows: Vec<Peptide> = (0..50)
            .map(|i| Peptide {
                ppm_diff: f64::from(i) * 3.0,
                rt_diff: f64::from(i % 7) * 0.2 - 0.6,
                missed: i as u32 % 4,
                ..row(&format!("r{i}"))
            })
            .collect();
        let mut config = FilterConfiguration::defaults(steady());
        config.set_bounds(Dimension::Missed, 0.0, 2.0).unwrap();

        let partition = evaluate(&rows, &config);
        assert_eq!(partition.len(), rows.len());
        let mut all: Vec<usize> = partition
            .passing
            .iter()
            .chain(&partition.failing)
            .copied()
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..rows.len()).collect::<Vec<_>>());
    }

    #[test]
    fn inverted_bounds_admit_nothing() {
        let rows = vec![row_with_ppm_diff("a", 5.0)];
        let partition = evaluate(&rows, &only(Dimension::PpmDiff, 10.0, 0.0));
        assert_eq!(partition.failing, vec![0]);
    }

    #[test]
    fn frac_nx_only_exists_with_variable_labeling() {
        let mut config = FilterConfiguration::defaults(steady());
        assert!(config.spec(Dimension::FracNx).is_none());
        assert_eq!(
            config.set_bounds(Dimension::FracNx, 0.0, 0.5),
            Err(ConfigError::UnknownDimension("FRC_NX"))
        );

        let schema = Schema::new(Labeling::SteadyState, true);
        let mut config = FilterConfiguration::defaults(schema);
        config.set_bounds(Dimension::FracNx, 0.2, 0.8).unwrap();
        let rows = vec![
            Peptide {
                frac_nx: Some(0.5),
                ..row("in")
            },
            Peptide {
                frac_nx: Some(0.9),
                ..row("out")
            },
        ];
        assert_eq!(evaluate(&rows, &config).passing, vec![0]);
    }

    #[test]
    fn toggling_the_last_species_is_rejected() {
        let mut config = FilterConfiguration::defaults(steady());
        let before = config.clone();
        assert_eq!(
            config.toggle_species(Species::Low, true),
            Err(ConfigError::EmptySelection(crate::error::Side::Numerator))
        );
        assert_eq!(config, before);

        config.toggle_species(Species::High, true).unwrap();
        assert_eq!(config.ratio().label(), "U+S / U+S");
    }

    #[test]
    fn dimension_keys_resolve() {
        assert_eq!(Dimension::from_key("n14"), Some(Dimension::PpmN14));
        assert_eq!(Dimension::from_key("ppm_n15"), Some(Dimension::PpmN15));
        assert_eq!(Dimension::from_key("FRC_NX"), Some(Dimension::FracNx));
        assert_eq!(Dimension::from_key("mass"), None);
    }
}
