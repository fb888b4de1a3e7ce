//! Zonestat CLI - zonal statistics of vector features over rasters

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use zonestat_algorithms::statistics::{
    CategoryKey, StatRecord, StatValue, ZonalOutput, ZonalParams, collect_zonal_stats,
    parse_stat_list, zonal_stats_par,
};
use zonestat_core::io::{GeoTiffSource, open_geotiff, read_geojson, write_geojson_string};
use zonestat_core::{Feature, RasterSource};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "zonestat")]
#[command(author, version, about = "Zonal statistics of vector features over rasters", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
        /// Band number, counting from 1
        #[arg(short, long, default_value = "1")]
        band: usize,
    },
    /// Summarize raster values inside each vector feature
    Zonal(ZonalArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(clap::Args)]
struct ZonalArgs {
    /// Input vector file (GeoJSON)
    vector: PathBuf,
    /// Input raster file (GeoTIFF)
    raster: PathBuf,
    /// Band number, counting from 1
    #[arg(short, long, default_value = "1")]
    band: usize,
    /// Nodata value, overriding the raster's own
    #[arg(long)]
    nodata: Option<f64>,
    /// Space-delimited statistics, e.g. "min max mean percentile_90"; "*" for all
    #[arg(short, long)]
    stats: Option<String>,
    /// Include every cell touched by a geometry
    #[arg(short, long)]
    all_touched: bool,
    /// Weight the mean by row latitude on geographic rasters
    #[arg(long)]
    latitude_correction: bool,
    /// Weight statistics by the fraction of each cell covered
    #[arg(long)]
    percent_cover_weighting: bool,
    /// Oversampling per axis for cell coverage (default 10)
    #[arg(long)]
    percent_cover_scale: Option<usize>,
    /// Only use cells covered by more than this fraction
    #[arg(long)]
    percent_cover_selection: Option<f64>,
    /// Split geometries spanning more than this many cells (0 disables)
    #[arg(short, long)]
    limit: Option<usize>,
    /// Report a histogram of cell values
    #[arg(short, long)]
    categorical: bool,
    /// JSON file mapping raster values to category names
    #[arg(long)]
    category_map: Option<PathBuf>,
    /// Prefix for output keys
    #[arg(short, long)]
    prefix: Option<String>,
    /// Write features with statistics merged into their properties
    #[arg(long)]
    geojson_out: bool,
    /// Output file (stdout if omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: OutputFormat,
    /// Process features on all cores
    #[arg(long)]
    parallel: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging already initialised");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path, band: usize, nodata: Option<f64>) -> Result<GeoTiffSource> {
    let pb = spinner("Reading raster...");
    let source = open_geotiff(path, band, nodata)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    let (rows, cols) = source.shape();
    info!("Input: {} x {}, band {}", cols, rows, source.band());
    Ok(source)
}

fn read_category_map(path: &Path) -> Result<BTreeMap<CategoryKey, String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read category map {}", path.display()))?;
    let raw: BTreeMap<String, String> =
        serde_json::from_str(&text).context("Category map must be a JSON object of strings")?;

    raw.into_iter()
        .map(|(k, v)| {
            let value: f64 = k
                .trim()
                .parse()
                .with_context(|| format!("Category key '{k}' is not a number"))?;
            Ok((CategoryKey::from(value), v))
        })
        .collect()
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// CSV with a header of every key seen, sorted
fn records_to_csv(records: &[&StatRecord]) -> String {
    let header: BTreeSet<&str> = records.iter().flat_map(|r| r.keys()).collect();
    let mut out = header.iter().map(|k| csv_field(k)).collect::<Vec<_>>().join(",");
    out.push('\n');
    for record in records {
        let row: Vec<String> = header
            .iter()
            .map(|k| record.get(k).map(|v| csv_field(&v.to_string())).unwrap_or_default())
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn render(outputs: &[ZonalOutput], args: &ZonalArgs) -> Result<String> {
    if args.geojson_out {
        if args.format == OutputFormat::Csv {
            let records: Vec<StatRecord> = outputs
                .iter()
                .filter_map(|o| o.feature.as_ref())
                .map(properties_record)
                .collect();
            return Ok(records_to_csv(&records.iter().collect::<Vec<_>>()));
        }
        return Ok(write_geojson_string(outputs.iter().filter_map(|o| o.feature.as_ref())));
    }

    let records: Vec<&StatRecord> = outputs.iter().map(|o| &o.stats).collect();
    match args.format {
        OutputFormat::Csv => Ok(records_to_csv(&records)),
        OutputFormat::Json => serde_json::to_string_pretty(&records).context("Failed to encode JSON"),
    }
}

/// Feature properties as a flat record, for CSV output
fn properties_record(feature: &Feature) -> StatRecord {
    feature
        .properties
        .iter()
        .map(|(k, v)| {
            let text = match serde_json::Value::from(v.clone()) {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            let value = if text.is_empty() { StatValue::Null } else { StatValue::Text(text) };
            (k.clone(), value)
        })
        .collect()
}

fn write_output(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, text).with_context(|| format!("Failed to write {}", p.display()))?;
            println!("Output saved to: {}", p.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes()).context("Failed to write output")?;
        }
    }
    Ok(())
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run_info(input: &Path, band: usize) -> Result<()> {
    let source = read_raster(input, band, None)?;
    let (rows, cols) = source.shape();
    let transform = *source.transform();
    let bounds = transform.bounds(cols, rows);

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
    println!("Cell size: {}", transform.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y
    );
    println!("NoData: {}", source.nodata());

    // whole-raster summary through the zonal engine
    let extent = Feature::new(geo::Geometry::Polygon(bounds.to_polygon()));
    let params = ZonalParams::new().with_stats("count min max mean nodata");
    let out = collect_zonal_stats(vec![extent], &source, &params).context("Failed to summarize raster")?;
    if let Some(stats) = out.first().map(|o| &o.stats) {
        println!("\nStatistics:");
        for key in ["min", "max", "mean"] {
            if let Some(v) = stats.get_f64(key) {
                println!("  {}: {:.4}", key, v);
            }
        }
        let valid = stats.get_f64("count").unwrap_or(0.0);
        println!("  Valid cells: {} ({:.1}%)", valid, 100.0 * valid / (rows * cols).max(1) as f64);
    }
    Ok(())
}

fn run_zonal(args: &ZonalArgs) -> Result<()> {
    let params = ZonalParams {
        stats: args.stats.as_deref().map(parse_stat_list),
        all_touched: args.all_touched,
        latitude_correction: args.latitude_correction,
        percent_cover_weighting: args.percent_cover_weighting,
        percent_cover_scale: args.percent_cover_scale,
        percent_cover_selection: args.percent_cover_selection,
        limit: args.limit,
        categorical: args.categorical,
        category_map: args.category_map.as_deref().map(read_category_map).transpose()?,
        prefix: args.prefix.clone(),
        geojson_out: args.geojson_out,
        ..ZonalParams::default()
    };
    // fail on bad options before touching any file
    params.validate().context("Invalid options")?;

    let source = read_raster(&args.raster, args.band, args.nodata)?;
    let features = read_geojson(&args.vector)
        .with_context(|| format!("Failed to read features from {}", args.vector.display()))?;
    info!("Features: {}", features.len());

    let pb = spinner("Computing zonal statistics...");
    let start = Instant::now();
    let outputs = if args.parallel {
        let features: Vec<Feature> = features.into_iter().collect::<zonestat_core::Result<_>>()?;
        zonal_stats_par(features, &source, &params)
    } else {
        collect_zonal_stats(features, &source, &params)
    }
    .context("Zonal statistics failed")?;
    pb.finish_and_clear();
    info!("Processed {} features in {:.2?}", outputs.len(), start.elapsed());

    if outputs.is_empty() {
        bail!("No features in {}", args.vector.display());
    }

    let text = render(&outputs, args)?;
    write_output(&text, args.output.as_deref())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { input, band } => run_info(&input, band),
        Commands::Zonal(args) => run_zonal(&args),
    }
}
