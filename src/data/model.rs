use std::collections::{BTreeSet, HashSet};
use std::fmt;

use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Species – one amplitude channel of the isotope fit
// ---------------------------------------------------------------------------

/// An amplitude species. The GUI-era names are "low", "mid" and "high";
/// the table columns are `AMP_U`, `AMP_L` and `AMP_S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Species {
    Low,
    Mid,
    High,
}

impl Species {
    pub const ALL: [Species; 3] = [Species::Low, Species::Mid, Species::High];

    /// Column name in the quantitation table.
    pub fn column(self) -> &'static str {
        match self {
            Species::Low => "AMP_U",
            Species::Mid => "AMP_L",
            Species::High => "AMP_S",
        }
    }

    /// Last letter of the column name, used in ratio labels ("U / U+S").
    pub fn short_label(self) -> &'static str {
        match self {
            Species::Low => "U",
            Species::Mid => "L",
            Species::High => "S",
        }
    }

    /// Prefix of the selection keys in a parameter file (`lowNum`, `midDen`, …).
    pub fn toggle_name(self) -> &'static str {
        match self {
            Species::Low => "low",
            Species::Mid => "mid",
            Species::High => "high",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

// ---------------------------------------------------------------------------
// Schema – fixed for a whole table once it is loaded
// ---------------------------------------------------------------------------

/// Labeling scheme of the experiment: two amplitude species or three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Labeling {
    SteadyState,
    Pulse,
}

impl fmt::Display for Labeling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Labeling::SteadyState => write!(f, "steady-state"),
            Labeling::Pulse => write!(f, "pulse"),
        }
    }
}

/// Table schema, decided once by the loader and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
    pub labeling: Labeling,
    /// Whether every row carries a fractional labeling value (`FRC_NX`).
    pub variable_labeling: bool,
}

impl Schema {
    pub fn new(labeling: Labeling, variable_labeling: bool) -> Self {
        Self {
            labeling,
            variable_labeling,
        }
    }

    pub fn is_pulse(&self) -> bool {
        self.labeling == Labeling::Pulse
    }

    /// Amplitude species present in this schema, in column order.
    pub fn species(&self) -> &'static [Species] {
        match self.labeling {
            Labeling::SteadyState => &[Species::Low, Species::High],
            Labeling::Pulse => &Species::ALL,
        }
    }

    pub fn has_species(&self, species: Species) -> bool {
        self.species().contains(&species)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.labeling)?;
        if self.variable_labeling {
            write!(f, " + variable labeling")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Subunit – which ribosomal particle the plot positions refer to
// ---------------------------------------------------------------------------

/// Ribosomal subunit whose protein order places peptides along the x axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Subunit {
    S70,
    S50,
    S30,
}

impl Subunit {
    /// In default order: 70S first.
    pub const ALL: [Subunit; 3] = [Subunit::S70, Subunit::S50, Subunit::S30];

    /// Position column in the quantitation table.
    pub fn column(self) -> &'static str {
        match self {
            Subunit::S70 => "70Spos",
            Subunit::S50 => "50Spos",
            Subunit::S30 => "30Spos",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Subunit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subunit::S70 => write!(f, "70S"),
            Subunit::S50 => write!(f, "50S"),
            Subunit::S30 => write!(f, "30S"),
        }
    }
}

// ---------------------------------------------------------------------------
// Peptide – one row of the quantitation table
// ---------------------------------------------------------------------------

/// Fitted amplitudes of one peptide. `mid` is only present in pulse tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Amplitudes {
    pub low: f64,
    pub mid: Option<f64>,
    pub high: f64,
}

impl Amplitudes {
    pub fn steady_state(low: f64, high: f64) -> Self {
        Self {
            low,
            mid: None,
            high,
        }
    }

    pub fn pulse(low: f64, mid: f64, high: f64) -> Self {
        Self {
            low,
            mid: Some(mid),
            high,
        }
    }

    pub fn get(&self, species: Species) -> Option<f64> {
        match species {
            Species::Low => Some(self.low),
            Species::Mid => self.mid,
            Species::High => Some(self.high),
        }
    }
}

/// A single peptide measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct Peptide {
    /// Isotope fit file identifier (`isofile`), unique within a table.
    pub id: String,
    /// Peptide sequence (`isopep`).
    pub peptide: String,
    /// Charge state (`isoz_charge`).
    pub charge: i64,
    pub protein: String,
    pub amplitudes: Amplitudes,
    /// `|ppm_n14 - ppm_n15|`, checked against the raw errors at load.
    pub ppm_diff: f64,
    pub ppm_n14: f64,
    pub ppm_n15: f64,
    /// Missed cleavages.
    pub missed: u32,
    pub rt_diff: f64,
    /// Residual of the isotope envelope fit.
    pub resid: f64,
    /// Plot position; ordering only, never filtered on.
    pub position: f64,
    /// Positions within the 70S, 50S and 30S subunits, for tables that carry
    /// `70Spos`/`50Spos`/`30Spos`. Empty cells are proteins outside the subunit.
    pub subunit_positions: [Option<f64>; 3],
    /// Fractional labeling (`FRC_NX`), variable-labeling tables only.
    pub frac_nx: Option<f64>,
    /// The raw text cells of the source record, in header order.
    pub record: Vec<String>,
}

impl Peptide {
    /// A peptide with the given identity and amplitudes and neutral
    /// measurements everywhere else.
    pub fn new(id: impl Into<String>, protein: impl Into<String>, amplitudes: Amplitudes) -> Self {
        Self {
            id: id.into(),
            peptide: String::new(),
            charge: 1,
            protein: protein.into(),
            amplitudes,
            ppm_diff: 0.0,
            ppm_n14: 0.0,
            ppm_n15: 0.0,
            missed: 0,
            rt_diff: 0.0,
            resid: 0.0,
            position: 0.0,
            subunit_positions: [None; 3],
            frac_nx: None,
            record: Vec::new(),
        }
    }

    pub fn subunit_position(&self, subunit: Subunit) -> Option<f64> {
        self.subunit_positions[subunit.index()]
    }
}

// ---------------------------------------------------------------------------
// PeptideTable – the complete loaded table
// ---------------------------------------------------------------------------

/// All rows of one quantitation table together with its schema.
#[derive(Debug, Clone)]
pub struct PeptideTable {
    pub schema: Schema,
    /// Column names of the source file, kept for export.
    pub headers: Vec<String>,
    rows: Vec<Peptide>,
    /// Subunit the current positions come from; `None` for `currentPos` or
    /// protein-rank placement.
    subunit: Option<Subunit>,
}

impl PeptideTable {
    /// Check the collection-wide invariants and wrap the rows.
    pub fn new(schema: Schema, headers: Vec<String>, rows: Vec<Peptide>) -> Result<Self, SchemaError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(&row.id) {
                return Err(SchemaError::DuplicateId(row.id.clone()));
            }
            if row.amplitudes.mid.is_some() != schema.is_pulse() {
                return Err(SchemaError::RowSchemaMismatch {
                    id: row.id.clone(),
                    column: Species::Mid.column(),
                });
            }
            if row.frac_nx.is_some() != schema.variable_labeling {
                return Err(SchemaError::RowSchemaMismatch {
                    id: row.id.clone(),
                    column: "FRC_NX",
                });
            }
        }
        Ok(Self {
            schema,
            headers,
            rows,
            subunit: None,
        })
    }

    pub fn rows(&self) -> &[Peptide] {
        &self.rows
    }

    /// Number of peptides.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the row with the given id.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|row| row.id == id)
    }

    pub fn find(&self, id: &str) -> Option<&Peptide> {
        self.rows.iter().find(|row| row.id == id)
    }

    /// Whether the source table has a position column for `subunit`.
    pub fn has_subunit(&self, subunit: Subunit) -> bool {
        self.headers.iter().any(|h| h == subunit.column())
    }

    /// Move every peptide to its position within `subunit`. Peptides of
    /// proteins outside the subunit get a NaN position.
    pub(crate) fn place_on(&mut self, subunit: Subunit) {
        for row in &mut self.rows {
            row.position = row.subunit_position(subunit).unwrap_or(f64::NAN);
        }
        self.subunit = Some(subunit);
    }

    pub fn subunit(&self) -> Option<Subunit> {
        self.subunit
    }

    /// Distinct protein names, sorted.
    pub fn proteins(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|row| row.protein.as_str()).collect()
    }
}
