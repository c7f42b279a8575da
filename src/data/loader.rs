use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::SchemaError;

use super::model::{Amplitudes, Labeling, Peptide, PeptideTable, Schema, Subunit};

/// Largest disagreement tolerated between a supplied `ppmDiff` and
/// `|ppm_n14 - ppm_n15|`, absolute or relative, on top of the rounding of the
/// supplied text.
const PPM_DIFF_TOLERANCE: f64 = 1e-6;

const REQUIRED: [&str; 10] = [
    "isofile",
    "isopep",
    "protein",
    "isoz_charge",
    "AMP_U",
    "ppm_n14",
    "ppm_n15",
    "missed",
    "rtDiff",
    "resid",
];

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load a quantitation table (`*_iso_res.csv`).
///
/// Schema detection:
/// * `AMP_L` and `AMP_S` → pulse
/// * `AMP_S` only → steady state
/// * `AMP_L` only → steady state, with `AMP_L` read as the spike channel
/// * `FRC_NX` present → variable labeling
///
/// Positions come from `currentPos`, else from the first subunit position
/// column present (`70Spos`, `50Spos`, `30Spos`), else from protein rank.
///
/// A [`SchemaError`] is kept as the root cause of the returned error.
pub fn load_table(path: &Path) -> Result<PeptideTable> {
    let reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening table {}", path.display()))?;
    let table = read_table(reader).with_context(|| format!("loading table {}", path.display()))?;
    log::info!(
        "Loaded {} peptides from {} ({} schema, {} proteins)",
        table.len(),
        path.display(),
        table.schema,
        table.proteins().len()
    );
    Ok(table)
}

/// Same as [`load_table`] for an already opened CSV source.
pub fn read_table<R: std::io::Read>(mut reader: csv::Reader<R>) -> Result<PeptideTable> {
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.to_string())
        .collect();
    let columns = Columns::locate(&headers)?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        rows.push(columns.parse(row_no, &record)?);
    }

    let subunit = match columns.position {
        Some(_) => None,
        None => columns.first_subunit(),
    };
    if columns.position.is_none() && subunit.is_none() {
        assign_protein_positions(&mut rows);
    }

    let mut table = PeptideTable::new(columns.schema, headers, rows)?;
    if let Some(subunit) = subunit {
        log::debug!("Placing peptides by {subunit} position");
        table.place_on(subunit);
    }
    Ok(table)
}

// ---------------------------------------------------------------------------
// Column lookup
// ---------------------------------------------------------------------------

/// Column indices resolved once from the header row.
struct Columns {
    schema: Schema,
    names: Vec<String>,
    id: usize,
    peptide: usize,
    protein: usize,
    charge: usize,
    low: usize,
    mid: Option<usize>,
    high: usize,
    ppm_n14: usize,
    ppm_n15: usize,
    ppm_diff: Option<usize>,
    missed: usize,
    rt_diff: usize,
    resid: usize,
    position: Option<usize>,
    subunits: [Option<usize>; 3],
    frac_nx: Option<usize>,
}

impl Columns {
    fn locate(headers: &[String]) -> Result<Self, SchemaError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &str| find(name).ok_or_else(|| SchemaError::MissingColumn(name.to_string()));

        for name in REQUIRED {
            require(name)?;
        }

        let (labeling, mid, high) = match (find("AMP_L"), find("AMP_S")) {
            (Some(l), Some(s)) => (Labeling::Pulse, Some(l), s),
            (None, Some(s)) => (Labeling::SteadyState, None, s),
            (Some(l), None) => {
                log::info!("No AMP_S column, reading AMP_L as the spike amplitude");
                (Labeling::SteadyState, None, l)
            }
            (None, None) => return Err(SchemaError::MissingSpikeColumn),
        };
        let frac_nx = find("FRC_NX");

        Ok(Self {
            schema: Schema::new(labeling, frac_nx.is_some()),
            names: headers.to_vec(),
            id: require("isofile")?,
            peptide: require("isopep")?,
            protein: require("protein")?,
            charge: require("isoz_charge")?,
            low: require("AMP_U")?,
            mid,
            high,
            ppm_n14: require("ppm_n14")?,
            ppm_n15: require("ppm_n15")?,
            ppm_diff: find("ppmDiff"),
            missed: require("missed")?,
            rt_diff: require("rtDiff")?,
            resid: require("resid")?,
            position: find("currentPos"),
            subunits: Subunit::ALL.map(|subunit| find(subunit.column())),
            frac_nx,
        })
    }

    fn parse(&self, row: usize, record: &csv::StringRecord) -> Result<Peptide, SchemaError> {
        let text = |idx: usize| record.get(idx).unwrap_or("").trim();
        let invalid = |idx: usize| SchemaError::InvalidField {
            row,
            column: self.name(idx),
            value: text(idx).to_string(),
        };
        let float = |idx: usize| text(idx).parse::<f64>().map_err(|_| invalid(idx));

        let ppm_n14 = float(self.ppm_n14)?;
        let ppm_n15 = float(self.ppm_n15)?;
        let computed = (ppm_n14 - ppm_n15).abs();
        let id = text(self.id).to_string();

        let ppm_diff = match self.ppm_diff {
            Some(idx) => {
                let supplied = float(idx)?;
                if !ppm_diff_agrees(text(idx), supplied, computed) {
                    return Err(SchemaError::InconsistentPpmDiff {
                        id,
                        supplied,
                        computed,
                    });
                }
                supplied
            }
            None => computed,
        };

        // `missed` is written as a float by some upstream tools ("2.0").
        let missed = float(self.missed)?;
        if missed < 0.0 || missed.fract() != 0.0 {
            return Err(invalid(self.missed));
        }
        let missed = u32::try_from(missed as u64).map_err(|_| invalid(self.missed))?;

        let mut subunit_positions = [None; 3];
        for (slot, idx) in subunit_positions.iter_mut().zip(self.subunits) {
            if let Some(idx) = idx {
                if !text(idx).is_empty() {
                    *slot = Some(float(idx)?);
                }
            }
        }

        Ok(Peptide {
            id,
            peptide: text(self.peptide).to_string(),
            charge: text(self.charge).parse().map_err(|_| invalid(self.charge))?,
            protein: text(self.protein).to_string(),
            amplitudes: Amplitudes {
                low: float(self.low)?,
                mid: self.mid.map(float).transpose()?,
                high: float(self.high)?,
            },
            ppm_diff,
            ppm_n14,
            ppm_n15,
            missed,
            rt_diff: float(self.rt_diff)?,
            resid: float(self.resid)?,
            position: self.position.map(float).transpose()?.unwrap_or(0.0),
            subunit_positions,
            frac_nx: self.frac_nx.map(float).transpose()?,
            record: record.iter().map(str::to_string).collect(),
        })
    }

    /// Default subunit for placement: the first one with a position column.
    fn first_subunit(&self) -> Option<Subunit> {
        Subunit::ALL
            .into_iter()
            .zip(self.subunits)
            .find_map(|(subunit, idx)| idx.map(|_| subunit))
    }

    /// Header name of a column, for error messages.
    fn name(&self, idx: usize) -> String {
        self.names
            .get(idx)
            .cloned()
            .unwrap_or_else(|| format!("column {idx}"))
    }
}

fn ppm_diff_agrees(text: &str, supplied: f64, computed: f64) -> bool {
    let delta = (supplied - computed).abs();
    delta <= PPM_DIFF_TOLERANCE
        || delta <= PPM_DIFF_TOLERANCE * computed.abs()
        || delta <= rounding_slack(text) + PPM_DIFF_TOLERANCE
}

/// Half a unit in the last printed digit of a number, e.g. `0.00005` for
/// `5.1235` and `0.0005` for `1.5e-3`.
fn rounding_slack(text: &str) -> f64 {
    let (mantissa, exponent) = match text.split_once(|c| c == 'e' || c == 'E') {
        Some((mantissa, exponent)) => (mantissa, exponent.parse::<i32>().unwrap_or(0)),
        None => (text, 0),
    };
    let decimals = mantissa
        .split_once('.')
        .map_or(0, |(_, fraction)| fraction.len() as i32);
    0.5 * 10f64.powi(exponent - decimals)
}

/// Without a `currentPos` column each peptide is placed at the 1-based rank
/// of its protein in alphabetical order.
fn assign_protein_positions(rows: &mut [Peptide]) {
    let mut ranks: BTreeMap<String, f64> = rows.iter().map(|r| (r.protein.clone(), 0.0)).collect();
    for (rank, slot) in ranks.values_mut().enumerate() {
        *slot = (rank + 1) as f64;
    }
    for row in rows {
        row.position = ranks[&row.protein];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Species;

    fn read(text: &str) -> Result<PeptideTable> {
        read_table(csv::Reader::from_reader(text.as_bytes()))
    }

    fn schema_error(err: &anyhow::Error) -> &SchemaError {
        err.downcast_ref::<SchemaError>().expect("schema error")
    }

    const STEADY: &str = "\
isofile,isopep,protein,isoz_charge,AMP_U,AMP_S,ppm_n14,ppm_n15,missed,rtDiff,resid
f1,AAK,BSubL02,2,10,5,-3,2,0,0.01,120
f2,GGR,BSubL01,3,4,4,1.5,1.5,1,-0.2,80.5
f3,VVK,BSubL02,2,0,0,0,10,2.0,0.1,10
";

    #[test]
    fn steady_state_table() {
        let table = read(STEADY).unwrap();
        assert_eq!(table.schema, Schema::new(Labeling::SteadyState, false));
        assert_eq!(table.len(), 3);
        assert_eq!(table.headers.len(), 11);

        let f1 = table.find("f1").unwrap();
        assert_eq!(f1.amplitudes.get(Species::Low), Some(10.0));
        assert_eq!(f1.amplitudes.get(Species::High), Some(5.0));
        assert_eq!(f1.amplitudes.get(Species::Mid), None);
        assert_eq!(f1.ppm_diff, 5.0);
        assert_eq!(f1.charge, 2);
        assert_eq!(f1.record[0], "f1");
        assert_eq!(table.find("f3").unwrap().missed, 2);
    }

    #[test]
    fn positions_follow_protein_order_without_current_pos() {
        let table = read(STEADY).unwrap();
        assert_eq!(table.find("f1").unwrap().position, 2.0);
        assert_eq!(table.find("f2").unwrap().position, 1.0);
        assert_eq!(table.find("f3").unwrap().position, 2.0);
    }

    #[test]
    fn pulse_and_variable_labeling_are_detected() {
        let text = "\
isofile,isopep,protein,isoz_charge,AMP_U,AMP_L,AMP_S,ppm_n14,ppm_n15,ppmDiff,missed,rtDiff,resid,FRC_NX,currentPos
f1,AAK,L2,2,3,2,5,-3,2,5,0,0.01,120,0.4,7
";
        let table = read(text).unwrap();
        assert_eq!(table.schema, Schema::new(Labeling::Pulse, true));
        let f1 = table.find("f1").unwrap();
        assert_eq!(f1.amplitudes.mid, Some(2.0));
        assert_eq!(f1.frac_nx, Some(0.4));
        assert_eq!(f1.position, 7.0);
    }

    #[test]
    fn legacy_amp_l_is_the_spike() {
        let text = "\
isofile,isopep,protein,isoz_charge,AMP_U,AMP_L,ppm_n14,ppm_n15,missed,rtDiff,resid
f1,AAK,L2,2,3,6,0,0,0,0,0
";
        let table = read(text).unwrap();
        assert_eq!(table.schema.labeling, Labeling::SteadyState);
        assert_eq!(table.find("f1").unwrap().amplitudes.high, 6.0);
    }

    #[test]
    fn missing_columns_are_schema_errors() {
        let err = read("isofile,isopep,protein\nf1,AAK,L2\n").unwrap_err();
        assert_eq!(
            schema_error(&err),
            &SchemaError::MissingColumn("isoz_charge".into())
        );

        let text = "isofile,isopep,protein,isoz_charge,AMP_U,ppm_n14,ppm_n15,missed,rtDiff,resid\n";
        let err = read(text).unwrap_err();
        assert_eq!(schema_error(&err), &SchemaError::MissingSpikeColumn);
    }

    #[test]
    fn supplied_ppm_diff_must_agree() {
        let text = "\
isofile,isopep,protein,isoz_charge,AMP_U,AMP_S,ppm_n14,ppm_n15,ppmDiff,missed,rtDiff,resid
f1,AAK,L2,2,3,6,-3,2,1,0,0,0
";
        let err = read(text).unwrap_err();
        assert!(matches!(
            schema_error(&err),
            SchemaError::InconsistentPpmDiff { id, .. } if id == "f1"
        ));
    }

    #[test]
    fn rounded_ppm_diff_is_accepted() {
        let text = "\
isofile,isopep,protein,isoz_charge,AMP_U,AMP_S,ppm_n14,ppm_n15,ppmDiff,missed,rtDiff,resid
f1,AAK,L2,2,3,6,-3.123456,2,5.1235,0,0,0
";
        assert_eq!(read(text).unwrap().find("f1").unwrap().ppm_diff, 5.1235);

        let err = read(&text.replace("5.1235", "5.13")).unwrap_err();
        assert!(matches!(schema_error(&err), SchemaError::InconsistentPpmDiff { .. }));
    }

    #[test]
    fn rounding_slack_follows_the_printed_digits() {
        assert_eq!(rounding_slack("5"), 0.5);
        assert!((rounding_slack("5.1235") - 5e-5).abs() < 1e-12);
        assert!((rounding_slack("1.5e-3") - 5e-5).abs() < 1e-12);
    }

    #[test]
    fn subunit_columns_place_peptides() {
        let text = "\
isofile,isopep,protein,isoz_charge,AMP_U,AMP_S,ppm_n14,ppm_n15,missed,rtDiff,resid,70Spos,50Spos,30Spos
f1,AAK,BSubL02,2,10,5,-3,2,0,0.01,120,12,4,
f2,GGR,BSubS04,3,4,4,1.5,1.5,1,-0.2,80.5,40,,7
";
        let table = read(text).unwrap();
        assert_eq!(table.subunit(), Some(Subunit::S70));
        let f1 = table.find("f1").unwrap();
        assert_eq!(f1.position, 12.0);
        assert_eq!(f1.subunit_position(Subunit::S50), Some(4.0));
        assert_eq!(f1.subunit_position(Subunit::S30), None);
        assert_eq!(table.find("f2").unwrap().position, 40.0);

        // An explicit currentPos wins over the subunit columns.
        let text = text
            .replace(",30Spos\n", ",30Spos,currentPos\n")
            .replace(",\nf2", ",,1\nf2")
            .replace(",7\n", ",7,2\n");
        let table = read(&text).unwrap();
        assert_eq!(table.subunit(), None);
        assert_eq!(table.find("f1").unwrap().position, 1.0);
    }

    #[test]
    fn bad_cells_and_duplicates_are_rejected() {
        let text = STEADY.replace("f2,GGR,BSubL01,3,4,4", "f2,GGR,BSubL01,3,four,4");
        let err = read(&text).unwrap_err();
        assert_eq!(
            schema_error(&err),
            &SchemaError::InvalidField {
                row: 1,
                column: "AMP_U".into(),
                value: "four".into()
            }
        );

        let text = STEADY.replace("f3,", "f1,");
        let err = read(&text).unwrap_err();
        assert_eq!(schema_error(&err), &SchemaError::DuplicateId("f1".into()));

        let text = STEADY.replace(",2.0,", ",-1,");
        let err = read(&text).unwrap_err();
        assert!(matches!(schema_error(&err), SchemaError::InvalidField { column, .. } if column == "missed"));

        let text = STEADY.replace(",2.0,", ",5000000000,");
        let err = read(&text).unwrap_err();
        assert!(matches!(
            schema_error(&err),
            SchemaError::InvalidField { column, value, .. } if column == "missed" && value == "5000000000"
        ));
    }

    #[test]
    fn load_table_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S21_iso_res.csv");
        std::fs::write(&path, STEADY).unwrap();
        assert_eq!(load_table(&path).unwrap().len(), 3);

        let err = load_table(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.to_string().contains("opening table"));
    }
}
