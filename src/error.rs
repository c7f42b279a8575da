use thiserror::Error;

use crate::data::model::{Labeling, Subunit};

// ---------------------------------------------------------------------------
// Configuration errors – rejected edits and unreadable parameter sets
// ---------------------------------------------------------------------------

/// Which side of the ratio a selection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Numerator,
    Denominator,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Numerator => write!(f, "numerator"),
            Side::Denominator => write!(f, "denominator"),
        }
    }
}

/// An edit or a parameter set that cannot be applied to the active schema.
///
/// Whoever returns one of these leaves the existing configuration untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("amplitude column {column} is not available in a {labeling} table")]
    InvalidColumn {
        column: &'static str,
        labeling: Labeling,
    },

    #[error("the {0} selection is empty, select at least one amplitude column")]
    EmptySelection(Side),

    #[error("filter dimension {0} is not available for this table")]
    UnknownDimension(&'static str),

    #[error("the table has no {0} positions (column {col})", col = .0.column())]
    MissingSubunit(Subunit),

    #[error("parameter file is missing required key '{0}'")]
    MissingKey(String),

    #[error("parameter '{key}' has unparsable value '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("parameter file must start with a 'param,value' header line")]
    MissingHeader,

    #[error("parameter file is not readable: {0}")]
    Unreadable(String),
}

// ---------------------------------------------------------------------------
// Schema errors – a table that does not look like a quantitation result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("table is missing required column '{0}'")]
    MissingColumn(String),

    #[error("table has neither an AMP_S nor an AMP_L column")]
    MissingSpikeColumn,

    #[error("row '{id}' does not match the table schema for column {column}")]
    RowSchemaMismatch { id: String, column: &'static str },

    #[error("peptide id '{0}' appears more than once")]
    DuplicateId(String),

    #[error("row {row}: column '{column}' has unparsable value '{value}'")]
    InvalidField {
        row: usize,
        column: String,
        value: String,
    },

    #[error(
        "row '{id}': ppmDiff is {supplied} but |ppm_n14 - ppm_n15| is {computed}"
    )]
    InconsistentPpmDiff {
        id: String,
        supplied: f64,
        computed: f64,
    },
}
