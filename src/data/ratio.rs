use std::collections::BTreeSet;

use crate::error::{ConfigError, Side};

use super::model::{Peptide, PeptideTable, Schema, Species};

// ---------------------------------------------------------------------------
// Selection – which amplitude species are summed on one side of the ratio
// ---------------------------------------------------------------------------

/// A set of amplitude species. Emptiness is checked by [`RatioSpec::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(BTreeSet<Species>);

impl Selection {
    /// Build a selection from the low / mid / high toggles.
    pub fn from_toggles(low: bool, mid: bool, high: bool) -> Self {
        Species::ALL
            .into_iter()
            .zip([low, mid, high])
            .filter(|(_, checked)| *checked)
            .map(|(species, _)| species)
            .collect()
    }

    pub fn contains(&self, species: Species) -> bool {
        self.0.contains(&species)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Species> + '_ {
        self.0.iter().copied()
    }

    /// Short form such as `U+S`.
    pub fn label(&self) -> String {
        self.iter().map(Species::short_label).collect::<Vec<_>>().join("+")
    }

    /// First species not available in `schema`, if any.
    fn first_foreign(&self, schema: &Schema) -> Option<Species> {
        self.iter().find(|species| !schema.has_species(*species))
    }

    fn sum(&self, row: &Peptide) -> f64 {
        self.iter()
            .map(|species| row.amplitudes.get(species).unwrap_or(0.0))
            .sum()
    }
}

impl FromIterator<Species> for Selection {
    fn from_iter<I: IntoIterator<Item = Species>>(iter: I) -> Self {
        Selection(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// RatioSpec – a validated numerator / denominator pair
// ---------------------------------------------------------------------------

/// A numerator / denominator selection that has been checked against a schema.
///
/// The derived value of a row is `sum(numerator) / sum(denominator)`, plus an
/// optional additive offset. A zero denominator follows IEEE arithmetic and
/// yields `±inf` or `NaN`; it is never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioSpec {
    numerator: Selection,
    denominator: Selection,
}

impl RatioSpec {
    pub fn new(
        schema: &Schema,
        numerator: Selection,
        denominator: Selection,
    ) -> Result<Self, ConfigError> {
        for (side, selection) in [
            (Side::Numerator, &numerator),
            (Side::Denominator, &denominator),
        ] {
            if selection.is_empty() {
                return Err(ConfigError::EmptySelection(side));
            }
            if let Some(species) = selection.first_foreign(schema) {
                return Err(ConfigError::InvalidColumn {
                    column: species.column(),
                    labeling: schema.labeling,
                });
            }
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    pub fn numerator(&self) -> &Selection {
        &self.numerator
    }

    pub fn denominator(&self) -> &Selection {
        &self.denominator
    }

    /// Derived value for one row.
    pub fn value(&self, row: &Peptide) -> f64 {
        self.numerator.sum(row) / self.denominator.sum(row)
    }

    pub fn value_with_offset(&self, row: &Peptide, offset: f64) -> f64 {
        self.value(row) + offset
    }

    /// Plot title form, e.g. `U / U+S`.
    pub fn label(&self) -> String {
        format!("{} / {}", self.numerator.label(), self.denominator.label())
    }

    /// File name suffix form, e.g. `-AMP_U_o_AMP_U_p_AMP_S`.
    pub fn file_suffix(&self) -> String {
        let join = |selection: &Selection| {
            selection
                .iter()
                .map(Species::column)
                .collect::<Vec<_>>()
                .join("_p_")
        };
        format!("-{}_o_{}", join(&self.numerator), join(&self.denominator))
    }
}

// ---------------------------------------------------------------------------
// Batch computation
// ---------------------------------------------------------------------------

/// Derived values for every row of a table, plus the rows that came out
/// non-finite (zero-intensity denominators).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedValues {
    pub values: Vec<f64>,
    pub degenerate: Vec<usize>,
}

/// Compute the derived value of every row. Degenerate rows are recorded and
/// the scan carries on.
pub fn derive_all(table: &PeptideTable, ratio: &RatioSpec, offset: f64) -> DerivedValues {
    let mut degenerate = Vec::new();
    let values = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let value = ratio.value_with_offset(row, offset);
            if !value.is_finite() {
                degenerate.push(i);
            }
            value
        })
        .collect();

    if !degenerate.is_empty() {
        log::warn!(
            "{} of {} peptides have a zero {} sum and no finite {} value",
            degenerate.len(),
            table.len(),
            ratio.denominator().label(),
            ratio.label()
        );
    }

    DerivedValues { values, degenerate }
}
