use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

/// Write a synthetic `_iso_res.csv` quantitation table.
#[derive(Parser)]
#[command(name = "generate_sample")]
struct Cli {
    /// Output file
    #[arg(short, long, default_value = "sample_iso_res.csv")]
    output: PathBuf,

    /// Three amplitude species (AMP_U, AMP_L, AMP_S) instead of two
    #[arg(long)]
    pulse: bool,

    /// Add a fractional labeling column (FRC_NX)
    #[arg(long)]
    varlab: bool,

    /// Peptides per protein
    #[arg(long, default_value_t = 6)]
    peptides: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_f64() * n as f64) as usize % n
    }
}

const PROTEINS: [&str; 8] = [
    "BSubL01", "BSubL02", "BSubL03", "BSubL04", "BSubL05", "BSubL06", "BSubL09", "BSubL10",
];

const RESIDUES: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";

fn peptide_sequence(rng: &mut SimpleRng) -> String {
    let len = 6 + rng.below(10);
    let mut seq: String = (0..len)
        .map(|_| RESIDUES[rng.below(RESIDUES.len())] as char)
        .collect();
    seq.push(if rng.below(2) == 0 { 'K' } else { 'R' });
    seq
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let mut rng = SimpleRng::new(cli.seed);
    log::info!(
        "Generating a {}{} table, {} peptides per protein, seed {}",
        if cli.pulse { "pulse" } else { "steady-state" },
        if cli.varlab { " variable-labeling" } else { "" },
        cli.peptides,
        cli.seed
    );

    let mut header = vec!["isofile", "isopep", "protein", "isoz_charge", "AMP_U"];
    if cli.pulse {
        header.push("AMP_L");
    }
    header.extend([
        "AMP_S", "ppm_n14", "ppm_n15", "ppmDiff", "missed", "rtDiff", "resid", "70Spos", "50Spos",
        "30Spos",
    ]);
    if cli.varlab {
        header.push("FRC_NX");
    }

    let mut writer = csv::Writer::from_path(&cli.output)
        .with_context(|| format!("creating {}", cli.output.display()))?;
    writer.write_record(&header)?;

    let mut count = 0usize;
    for (p, protein) in PROTEINS.iter().enumerate() {
        // Each protein gets its own labeled fraction so the ratio plot has structure.
        let fraction = 0.2 + 0.6 * (p as f64 / PROTEINS.len() as f64);

        for _ in 0..cli.peptides {
            let total = rng.gauss(5000.0, 1500.0).abs();
            let low = total * fraction;
            let mid = total * 0.1 * rng.next_f64();
            let high = total * (1.0 - fraction) + rng.gauss(0.0, 100.0).abs();

            // A few outliers per table exercise every filter.
            let outlier = rng.below(10) == 0;
            let ppm_n14 = rng.gauss(0.0, if outlier { 80.0 } else { 8.0 });
            let ppm_n15 = rng.gauss(0.0, 8.0);
            let missed = if outlier { 3 + rng.below(5) } else { rng.below(2) };
            let rt_diff = rng.gauss(0.0, if outlier { 0.6 } else { 0.1 });
            let resid = rng.gauss(0.0, if outlier { 4000.0 } else { 300.0 }).abs();

            let mut record = vec![
                format!("iso_{count:05}"),
                peptide_sequence(&mut rng),
                protein.to_string(),
                (1 + rng.below(4)).to_string(),
                format!("{low:.2}"),
            ];
            if cli.pulse {
                record.push(format!("{mid:.2}"));
            }
            record.extend([
                format!("{high:.2}"),
                ppm_n14.to_string(),
                ppm_n15.to_string(),
                (ppm_n14 - ppm_n15).abs().to_string(),
                missed.to_string(),
                format!("{rt_diff:.4}"),
                format!("{resid:.1}"),
                // Large-subunit proteins only: same rank in 70S and 50S, absent from 30S.
                (p + 1).to_string(),
                (p + 1).to_string(),
                String::new(),
            ]);
            if cli.varlab {
                record.push(format!("{:.4}", (fraction + rng.gauss(0.0, 0.05)).clamp(0.0, 1.0)));
            }
            writer.write_record(&record)?;
            count += 1;
        }
    }
    writer.flush()?;

    println!(
        "Wrote {count} peptides ({} proteins) to {}",
        PROTEINS.len(),
        cli.output.display()
    );
    Ok(())
}
