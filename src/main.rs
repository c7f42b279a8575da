use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use masse::data::params;
use masse::{Dimension, FilterConfiguration, Selection, Session, Species, Subunit};

#[derive(Parser)]
#[command(name = "masse", version)]
#[command(about = "Range filtering of peptide quantitation tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a filter configuration to a table and report what passes
    Filter(FilterArgs),
    /// Write the default parameter file for a table
    Params {
        /// Quantitation table (*_iso_res.csv)
        table: PathBuf,
        /// Output path (defaults to _last.filterParam next to the table)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct FilterArgs {
    /// Quantitation table (*_iso_res.csv)
    table: PathBuf,

    /// Parameter file to start from instead of the defaults
    #[arg(short, long)]
    params: Option<PathBuf>,

    /// Numerator amplitude species (comma-separated)
    #[arg(long, value_delimiter = ',')]
    numerator: Vec<SpeciesArg>,

    /// Denominator amplitude species (comma-separated)
    #[arg(long, value_delimiter = ',')]
    denominator: Vec<SpeciesArg>,

    /// Constant added to every derived value
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    offset: f64,

    /// Ribosomal subunit whose positions order the scatter plot
    #[arg(long, value_enum)]
    subunit: Option<SubunitArg>,

    /// Bounds override, e.g. `ppmDiff=0:100` (repeatable)
    #[arg(long = "range", value_name = "DIM=LOW:HIGH", value_parser = parse_range)]
    ranges: Vec<(Dimension, f64, f64)>,

    /// Switch a dimension off (repeatable)
    #[arg(long = "disable", value_name = "DIM", value_parser = parse_dimension)]
    disabled: Vec<Dimension>,

    /// Switch every dimension off before applying --range
    #[arg(long)]
    disable_all: bool,

    /// Export passing peptides (to <stem>_filt.csv unless --output is given)
    #[arg(long)]
    export: bool,

    /// Export path
    #[arg(short, long, requires = "export")]
    output: Option<PathBuf>,

    /// Write per-protein statistics to <PREFIX>-<ratio>.stats
    #[arg(long, value_name = "PREFIX")]
    stats: Option<PathBuf>,

    /// Write scatter and histogram data as JSON
    #[arg(long, value_name = "PATH")]
    plot_json: Option<PathBuf>,

    /// Dimension shown in the histograms of --plot-json
    #[arg(long, default_value = "ppmDiff", value_parser = parse_dimension)]
    histogram: Dimension,

    /// Save the final configuration as a parameter file
    #[arg(long, value_name = "PATH")]
    save_params: Option<PathBuf>,

    /// Print passing and failing peptide ids
    #[arg(long)]
    list: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SpeciesArg {
    #[value(alias = "u", alias = "AMP_U")]
    Low,
    #[value(alias = "l", alias = "AMP_L")]
    Mid,
    #[value(alias = "s", alias = "AMP_S")]
    High,
}

impl From<SpeciesArg> for Species {
    fn from(arg: SpeciesArg) -> Self {
        match arg {
            SpeciesArg::Low => Species::Low,
            SpeciesArg::Mid => Species::Mid,
            SpeciesArg::High => Species::High,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SubunitArg {
    #[value(name = "70S", alias = "70s", alias = "70")]
    S70,
    #[value(name = "50S", alias = "50s", alias = "50")]
    S50,
    #[value(name = "30S", alias = "30s", alias = "30")]
    S30,
}

impl From<SubunitArg> for Subunit {
    fn from(arg: SubunitArg) -> Self {
        match arg {
            SubunitArg::S70 => Subunit::S70,
            SubunitArg::S50 => Subunit::S50,
            SubunitArg::S30 => Subunit::S30,
        }
    }
}

fn parse_dimension(s: &str) -> Result<Dimension, String> {
    Dimension::from_key(s).ok_or_else(|| {
        let known: Vec<&str> = Dimension::ALL.iter().map(|d| d.key()).collect();
        format!("unknown dimension '{s}', expected one of {}", known.join(", "))
    })
}

fn parse_range(s: &str) -> Result<(Dimension, f64, f64), String> {
    let (dim, bounds) = s
        .split_once('=')
        .ok_or_else(|| format!("'{s}' is not DIM=LOW:HIGH"))?;
    let (low, high) = bounds
        .split_once(':')
        .ok_or_else(|| format!("'{bounds}' is not LOW:HIGH"))?;
    let parse = |v: &str| v.trim().parse::<f64>().map_err(|e| format!("'{v}': {e}"));
    Ok((parse_dimension(dim.trim())?, parse(low)?, parse(high)?))
}

fn selection(args: &[SpeciesArg]) -> Selection {
    args.iter().map(|a| Species::from(*a)).collect()
}

fn run_filter(args: FilterArgs) -> Result<()> {
    let mut session = Session::open(&args.table)?;

    if let Some(path) = &args.params {
        session.load_params_file(path)?;
    }

    if !args.numerator.is_empty() || !args.denominator.is_empty() {
        let ratio = session.config().ratio();
        let numerator = if args.numerator.is_empty() {
            ratio.numerator().clone()
        } else {
            selection(&args.numerator)
        };
        let denominator = if args.denominator.is_empty() {
            ratio.denominator().clone()
        } else {
            selection(&args.denominator)
        };
        session
            .set_ratio(numerator, denominator)
            .context("invalid ratio selection")?;
    }
    if args.offset != 0.0 {
        session.set_offset(args.offset);
    }
    if let Some(subunit) = args.subunit {
        session.set_subunit(subunit.into())?;
    }

    if args.disable_all {
        let dims: Vec<Dimension> = session.config().specs().map(|(dim, _)| dim).collect();
        for dim in dims {
            session.set_enabled(dim, false)?;
        }
    }
    for (dim, low, high) in &args.ranges {
        session.set_bounds(*dim, *low, *high)?;
        session.set_enabled(*dim, true)?;
    }
    for dim in &args.disabled {
        session.set_enabled(*dim, false)?;
    }
    session.histogram = args.histogram;

    let partition = session.partition();
    println!(
        "{}: {} of {} peptides pass, {} fail",
        session.config().ratio().label(),
        partition.passing.len(),
        session.table().len(),
        partition.failing.len()
    );
    if !session.degenerate().is_empty() {
        println!(
            "{} peptides have no finite derived value",
            session.degenerate().len()
        );
    }

    if args.list {
        for id in session.passing_ids() {
            println!("pass\t{id}");
        }
        for id in session.failing_ids() {
            println!("fail\t{id}");
        }
    }

    if args.export {
        let path = match args.output.or_else(|| session.default_export_path()) {
            Some(path) => path,
            None => bail!("no export path"),
        };
        session.export(&path)?;
        println!("Exported to {}", path.display());
    }

    if let Some(prefix) = &args.stats {
        let path = session.write_stats(prefix)?;
        println!("Statistics written to {}", path.display());
    }

    if let Some(path) = &args.plot_json {
        let json = serde_json::to_string_pretty(&session.plot_data()).context("serializing plot data")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Plot data written to {}", path.display());
    }

    if let Some(path) = &args.save_params {
        session.save_params_file(path)?;
        println!("Parameters saved to {}", path.display());
    }

    Ok(())
}

fn run_params(table: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let session = Session::open(&table)?;
    let path = output.unwrap_or_else(|| params::default_path(&table));
    params::save_file(&path, &FilterConfiguration::defaults(session.table().schema))?;
    println!("Default parameters written to {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Filter(args) => run_filter(args),
        Command::Params { table, output } => run_params(table, output),
    }
}
