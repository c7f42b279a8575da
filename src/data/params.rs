use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::error::{ConfigError, Side};

use super::filter::{Dimension, FilterConfiguration, FilterSpec};
use super::model::{Schema, Species};
use super::ratio::{RatioSpec, Selection};

/// File name used when parameters are stored next to a table.
pub const DEFAULT_FILE_NAME: &str = "_last.filterParam";

const HEADER: [&str; 2] = ["param", "value"];

// ---------------------------------------------------------------------------
// Layout – the fixed, ordered key list of a parameter file
// ---------------------------------------------------------------------------

/// One line of a parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    Low(Dimension),
    High(Dimension),
    Enabled(Dimension),
    Grid,
    Toggle(Species, Side),
}

impl Entry {
    fn key(self) -> String {
        match self {
            Entry::Low(dim) => format!("{}_low", dim.key()),
            Entry::High(dim) => format!("{}_high", dim.key()),
            Entry::Enabled(dim) => dim.flag_key().to_string(),
            Entry::Grid => "gridChecked".to_string(),
            Entry::Toggle(species, Side::Numerator) => format!("{}Num", species.toggle_name()),
            Entry::Toggle(species, Side::Denominator) => format!("{}Den", species.toggle_name()),
        }
    }
}

/// Every key a parameter file for `schema` carries, in file order.
///
/// Bounds come first (`FRC_NX` carries its flag alongside its bounds),
/// then the grid flag, the ratio toggles and finally the remaining flags.
fn layout(schema: &Schema) -> Vec<Entry> {
    let mut entries = Vec::new();
    for dim in Dimension::for_schema(schema) {
        entries.push(Entry::Low(dim));
        entries.push(Entry::High(dim));
        if dim == Dimension::FracNx {
            entries.push(Entry::Enabled(dim));
        }
    }
    entries.push(Entry::Grid);
    for side in [Side::Numerator, Side::Denominator] {
        entries.extend(schema.species().iter().map(|s| Entry::Toggle(*s, side)));
    }
    entries.extend(
        Dimension::for_schema(schema)
            .filter(|dim| *dim != Dimension::FracNx)
            .map(Entry::Enabled),
    );
    entries
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

fn format_bool(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

fn value_of(config: &FilterConfiguration, entry: Entry) -> String {
    let spec = |dim| {
        config
            .spec(dim)
            .copied()
            .unwrap_or_else(|| dim.default_spec())
    };
    match entry {
        Entry::Low(dim) => spec(dim).low.to_string(),
        Entry::High(dim) => spec(dim).high.to_string(),
        Entry::Enabled(dim) => format_bool(spec(dim).enabled),
        Entry::Grid => format_bool(config.show_grid),
        Entry::Toggle(species, Side::Numerator) => {
            format_bool(config.ratio().numerator().contains(species))
        }
        Entry::Toggle(species, Side::Denominator) => {
            format_bool(config.ratio().denominator().contains(species))
        }
    }
}

/// The `(key, value)` pairs of `config`, in file order.
pub fn entries(config: &FilterConfiguration) -> Vec<(String, String)> {
    layout(config.schema())
        .into_iter()
        .map(|entry| (entry.key(), value_of(config, entry)))
        .collect()
}

/// Render `config` as parameter file text.
pub fn save(config: &FilterConfiguration) -> String {
    let mut out = HEADER.join(",");
    for (key, value) in entries(config) {
        out.push('\n');
        out.push_str(&key);
        out.push(',');
        out.push_str(&value);
    }
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.parse::<f64>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Read the raw key → value pairs, checking the header line.
fn read_pairs(text: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| ConfigError::Unreadable(e.to_string()))?;
    if !headers.iter().eq(HEADER) {
        return Err(ConfigError::MissingHeader);
    }

    let mut pairs = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| ConfigError::Unreadable(e.to_string()))?;
        let Some(key) = record.get(0) else { continue };
        let value = record.get(1).unwrap_or("");
        if let Some(previous) = pairs.insert(key.to_string(), value.to_string()) {
            log::warn!("parameter '{key}' given twice, '{previous}' replaced by '{value}'");
        }
    }
    Ok(pairs)
}

/// Rebuild a configuration for `schema` from parameter file text.
///
/// Every key the schema requires must be present; the first absent one is
/// reported. Keys the schema does not use are ignored.
pub fn load(text: &str, schema: Schema) -> Result<FilterConfiguration, ConfigError> {
    let pairs = read_pairs(text)?;
    let entries = layout(&schema);

    let mut values = Vec::with_capacity(entries.len());
    for entry in &entries {
        let key = entry.key();
        match pairs.get(&key) {
            Some(value) => values.push((*entry, key, value.as_str())),
            None => return Err(ConfigError::MissingKey(key)),
        }
    }
    for key in pairs.keys() {
        if !values.iter().any(|(_, k, _)| k == key) {
            log::debug!("ignoring parameter '{key}', not used by a {schema} table");
        }
    }

    let mut specs: BTreeMap<Dimension, FilterSpec> = Dimension::for_schema(&schema)
        .map(|dim| (dim, dim.default_spec()))
        .collect();
    let mut numerator = Vec::new();
    let mut denominator = Vec::new();
    let mut show_grid = false;

    for (entry, key, value) in values {
        match entry {
            Entry::Low(dim) => spec_entry(&mut specs, dim).low = parse_f64(&key, value)?,
            Entry::High(dim) => spec_entry(&mut specs, dim).high = parse_f64(&key, value)?,
            Entry::Enabled(dim) => spec_entry(&mut specs, dim).enabled = parse_bool(&key, value)?,
            Entry::Grid => show_grid = parse_bool(&key, value)?,
            Entry::Toggle(species, side) => {
                if parse_bool(&key, value)? {
                    match side {
                        Side::Numerator => numerator.push(species),
                        Side::Denominator => denominator.push(species),
                    }
                }
            }
        }
    }

    let ratio = RatioSpec::new(
        &schema,
        numerator.into_iter().collect::<Selection>(),
        denominator.into_iter().collect::<Selection>(),
    )?;
    Ok(FilterConfiguration::from_parts(schema, specs, ratio, show_grid))
}

fn spec_entry(specs: &mut BTreeMap<Dimension, FilterSpec>, dim: Dimension) -> &mut FilterSpec {
    specs.entry(dim).or_insert_with(|| dim.default_spec())
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Where the parameters of the table at `table_path` are kept by default.
pub fn default_path(table_path: &Path) -> PathBuf {
    table_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(DEFAULT_FILE_NAME)
}

pub fn save_file(path: &Path, config: &FilterConfiguration) -> Result<()> {
    std::fs::write(path, save(config))
        .with_context(|| format!("writing parameter file {}", path.display()))?;
    log::info!("Saved filter parameters to {}", path.display());
    Ok(())
}

pub fn load_file(path: &Path, schema: Schema) -> Result<FilterConfiguration> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading parameter file {}", path.display()))?;
    let config = load(&text, schema)
        .with_context(|| format!("parsing parameter file {}", path.display()))?;
    log::info!("Loaded filter parameters from {}", path.display());
    Ok(config)
}
