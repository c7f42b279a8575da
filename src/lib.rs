//! Range filtering and ratio calculation for peptide quantitation tables.
//!
//! A [`state::Session`] owns one loaded [`data::model::PeptideTable`] and its
//! [`data::filter::FilterConfiguration`]; every edit recomputes the derived
//! values and the passing / failing partition.

pub mod data;
pub mod error;
pub mod report;
pub mod state;

pub use data::filter::{Dimension, FilterConfiguration, FilterSpec, Partition};
pub use data::model::{Labeling, Peptide, PeptideTable, Schema, Species, Subunit};
pub use data::ratio::{RatioSpec, Selection};
pub use error::{ConfigError, SchemaError};
pub use state::Session;
