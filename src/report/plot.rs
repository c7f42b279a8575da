use serde::Serialize;

use crate::data::filter::{Dimension, FilterConfiguration, Partition};
use crate::data::model::PeptideTable;

/// Failing points are drawn a little to the right of their position so they
/// do not hide passing points of the same protein.
pub const FAILING_X_OFFSET: f64 = 0.25;

/// Bin cap for the histogram over every peptide.
pub const ALL_BINS: usize = 30;

/// Bin cap for the histogram over passing peptides.
pub const PASSING_BINS: usize = 80;

// ---------------------------------------------------------------------------
// Scatter (position vs derived value)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPoint {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub passing: bool,
}

/// One point per peptide: passing ones first, then failing ones.
pub fn scatter_points(table: &PeptideTable, values: &[f64], partition: &Partition) -> Vec<ScatterPoint> {
    let rows = table.rows();
    let point = |i: usize, passing: bool| {
        let row = &rows[i];
        ScatterPoint {
            id: row.id.clone(),
            x: if passing {
                row.position
            } else {
                row.position + FAILING_X_OFFSET
            },
            y: values.get(i).copied().unwrap_or(f64::NAN),
            passing,
        }
    };
    partition
        .passing
        .iter()
        .map(|&i| point(i, true))
        .chain(partition.failing.iter().map(|&i| point(i, false)))
        .collect()
}

// ---------------------------------------------------------------------------
// Histograms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    /// e.g. `ppmDiff_All`, `ppmDiff_Selected`.
    pub label: String,
    pub bins: Vec<Bin>,
}

/// Equal-width histogram with `min(max_bins, distinct values)` bins over the
/// finite values. The last bin is closed on the right; a single distinct
/// value gets the range `[v - 0.5, v + 0.5]`.
pub fn bin_values(values: impl IntoIterator<Item = f64>, max_bins: usize) -> Vec<Bin> {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || max_bins == 0 {
        return Vec::new();
    }
    finite.sort_by(f64::total_cmp);

    let mut distinct = finite.clone();
    distinct.dedup();
    let n = distinct.len().min(max_bins);

    let (mut lo, mut hi) = (finite[0], finite[finite.len() - 1]);
    if lo == hi {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / n as f64;

    let mut bins: Vec<Bin> = (0..n)
        .map(|k| Bin {
            lower: lo + width * k as f64,
            upper: if k + 1 == n { hi } else { lo + width * (k + 1) as f64 },
            count: 0,
        })
        .collect();
    for v in finite {
        let k = (((v - lo) / width) as usize).min(n - 1);
        bins[k].count += 1;
    }
    bins
}

/// Histograms of `dim` over every peptide and over the passing ones. Values
/// are binned signed, as stored in the table.
pub fn dimension_histograms(table: &PeptideTable, partition: &Partition, dim: Dimension) -> (Histogram, Histogram) {
    let rows = table.rows();
    let all = Histogram {
        label: format!("{dim}_All"),
        bins: bin_values(rows.iter().map(|row| dim.raw_value(row)), ALL_BINS),
    };
    let passing = Histogram {
        label: format!("{dim}_Selected"),
        bins: bin_values(
            partition.passing.iter().map(|&i| dim.raw_value(&rows[i])),
            PASSING_BINS,
        ),
    };
    (all, passing)
}

// ---------------------------------------------------------------------------
// Everything the plotting side needs for one redraw
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotData {
    /// Ratio label, e.g. `U / U+S`.
    pub title: String,
    pub show_grid: bool,
    pub scatter: Vec<ScatterPoint>,
    pub histogram_all: Histogram,
    pub histogram_selected: Histogram,
}

impl PlotData {
    pub fn new(
        table: &PeptideTable,
        config: &FilterConfiguration,
        values: &[f64],
        partition: &Partition,
        histogram: Dimension,
    ) -> Self {
        let (histogram_all, histogram_selected) = dimension_histograms(table, partition, histogram);
        Self {
            title: config.ratio().label(),
            show_grid: config.show_grid,
            scatter: scatter_points(table, values, partition),
            histogram_all,
            histogram_selected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Amplitudes, Labeling, Peptide, Schema};

    fn table() -> PeptideTable {
        let rows = ["a", "b", "c"]
            .into_iter()
            .enumerate()
            .map(|(i, id)| Peptide {
                position: (i + 1) as f64,
                ppm_diff: (i * 10) as f64,
                ..Peptide::new(id, "L2", Amplitudes::steady_state(1.0, 1.0))
            })
            .collect();
        PeptideTable::new(Schema::new(Labeling::SteadyState, false), Vec::new(), rows).unwrap()
    }

    #[test]
    fn failing_points_are_offset() {
        let partition = Partition {
            passing: vec![0, 2],
            failing: vec![1],
        };
        let points = scatter_points(&table(), &[0.5, 1.5, 2.5], &partition);
        let ids: Vec<&str> = points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
        assert_eq!(points[2].x, 2.25);
        assert_eq!(points[2].y, 1.5);
        assert!(!points[2].passing);
        assert_eq!(points[1].x, 3.0);
    }

    #[test]
    fn bin_count_is_capped_by_distinct_values() {
        let bins = bin_values([1.0, 1.0, 2.0, 3.0], 30);
        assert_eq!(bins.len(), 3);
        assert_eq!(bins.iter().map(|b| b.count).collect::<Vec<_>>(), vec![2, 1, 1]);
        assert_eq!(bins[2].upper, 3.0);

        let many: Vec<f64> = (0..100).map(f64::from).collect();
        let bins = bin_values(many, 30);
        assert_eq!(bins.len(), 30);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 100);
    }

    #[test]
    fn single_value_gets_a_unit_bin() {
        let bins = bin_values([4.0, 4.0, f64::NAN], 80);
        assert_eq!(
            bins,
            vec![Bin {
                lower: 3.5,
                upper: 4.5,
                count: 2
            }]
        );
        assert!(bin_values([f64::INFINITY], 80).is_empty());
    }

    #[test]
    fn histograms_cover_all_and_passing_rows() {
        let partition = Partition {
            passing: vec![0, 1],
            failing: vec![2],
        };
        let (all, passing) = dimension_histograms(&table(), &partition, Dimension::PpmDiff);
        assert_eq!(all.label, "ppmDiff_All");
        assert_eq!(all.bins.len(), 3);
        assert_eq!(passing.label, "ppmDiff_Selected");
        assert_eq!(passing.bins.iter().map(|b| b.count).sum::<usize>(), 2);
    }

    #[test]
    fn ppm_errors_keep_their_sign() {
        let rows = [-50.0, 50.0]
            .into_iter()
            .enumerate()
            .map(|(i, ppm)| Peptide {
                ppm_n14: ppm,
                ..Peptide::new(format!("p{i}"), "L2", Amplitudes::steady_state(1.0, 1.0))
            })
            .collect();
        let table =
            PeptideTable::new(Schema::new(Labeling::SteadyState, false), Vec::new(), rows).unwrap();
        let partition = Partition {
            passing: vec![0, 1],
            failing: vec![],
        };
        let (all, _) = dimension_histograms(&table, &partition, Dimension::PpmN14);
        assert_eq!(all.bins.len(), 2);
        assert_eq!(all.bins[0].lower, -50.0);
        assert_eq!(all.bins[0].count, 1);
        assert_eq!(all.bins[1].upper, 50.0);
        assert_eq!(all.bins[1].count, 1);
    }
}
