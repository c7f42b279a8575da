//! Data layer: core types, loading, ratio calculation, filtering and persistence.
//!
//! Architecture:
//! ```text
//!  *_iso_res.csv                      _last.filterParam
//!        │                                   │
//!        ▼                                   ▼
//!   ┌──────────┐                       ┌──────────┐
//!   │  loader   │  parse → PeptideTable │  params   │  text ⇄ FilterConfiguration
//!   └──────────┘                       └──────────┘
//!        │                                   │
//!        ├──────────────┐                    │
//!        ▼              ▼                    ▼
//!   ┌──────────┐   ┌──────────┐  enabled ranges
//!   │  ratio    │   │  filter   │ ◀──────────┘
//!   └──────────┘   └──────────┘
//!   per-row value       │ Partition
//!        │              ▼
//!        │        ┌──────────┐
//!        └──────▶ │  export   │  passing rows + currentCalc → *_filt.csv
//!                 └──────────┘
//! ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod params;
pub mod ratio;
