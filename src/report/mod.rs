//! Outputs derived from a filtered session: per-protein statistics and the
//! data a plotting front end draws (nothing here renders).

pub mod plot;
pub mod stats;
