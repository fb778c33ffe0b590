//! shapcast CLI
//!
//! Forecast order quantity for one request, explain a batch of CSV rows, or
//! fit the scaler artifact from training data.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ndarray::Array2;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shapcast::preprocess::{demand_feature_names, DemandRequest, RawRecord, Scaler};
use shapcast::utils::run_with_threads;
use shapcast::{Contribution, DemandForecaster, ServiceConfig, TrainedModel};

#[derive(Parser, Debug)]
#[command(name = "shapcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Demand forecasts with exact TreeSHAP attributions", long_about = None)]
struct Args {
    /// Verbose logging (overrides the configured log level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast and explain one JSON request
    Predict {
        /// Service configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Request JSON; read from stdin when omitted
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Explain the first rows of a CSV with training column names
    ExplainCsv {
        /// Service configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Input CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Number of rows to explain
        #[arg(long, default_value = "100")]
        limit: usize,
    },

    /// Fit a standard scaler over the feature columns of a CSV
    FitScaler {
        /// Training CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Scaler JSON to write
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{level}'"))?
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn load_forecaster(config: &ServiceConfig) -> Result<DemandForecaster> {
    let model = TrainedModel::load(&config.model_path, &config.scaler_path)
        .context("Failed to load model artifact")?;
    DemandForecaster::new(Arc::new(model), config.explain).context("Failed to build explainer")
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Predict { config, input } => {
            let config = ServiceConfig::load(&config).context("Failed to load configuration")?;
            init_logging(args.verbose, &config.log_level)?;
            predict(&config, input.as_deref())
        }
        Command::ExplainCsv {
            config,
            input,
            limit,
        } => {
            let config = ServiceConfig::load(&config).context("Failed to load configuration")?;
            init_logging(args.verbose, &config.log_level)?;
            explain_csv(&config, &input, limit)
        }
        Command::FitScaler { input, output } => {
            init_logging(args.verbose, "info")?;
            fit_scaler(&input, &output)
        }
    }
}

fn predict(config: &ServiceConfig, input: Option<&Path>) -> Result<()> {
    let forecaster = load_forecaster(config)?;

    let mut text = String::new();
    match input {
        Some(path) => {
            File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?
                .read_to_string(&mut text)?;
        }
        None => {
            io::stdin().read_to_string(&mut text).context("Failed to read stdin")?;
        }
    }

    let record: RawRecord = serde_json::from_str(&text).context("Request is not a JSON object")?;
    let request = DemandRequest::from_wire(&record).context("Invalid request")?;
    let response = forecaster.predict(&request).context("Prediction failed")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, &response)?;
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
struct RowExplanation<'a> {
    row: usize,
    forecast: f64,
    base_value: f64,
    contributions: Vec<Contribution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_factor: Option<&'a str>,
}

/// Column index of every name in `headers`.
fn column_indices(headers: &csv::StringRecord, names: &[String]) -> Result<Vec<usize>> {
    names
        .iter()
        .map(|name| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .with_context(|| format!("CSV has no column '{name}'"))
        })
        .collect()
}

fn parse_cell(cell: &str, row: usize, column: &str) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>()
        .with_context(|| format!("Row {row}: column '{column}' value '{cell}' is not a number"))
}

/// Read up to `limit` rows of the named columns.
fn read_columns(path: &Path, names: &[String], limit: Option<usize>) -> Result<Vec<Vec<f64>>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV {}", path.display()))?;
    let indices = column_indices(reader.headers()?, names)?;

    let mut rows = Vec::new();
    for (row, record) in reader.records().enumerate() {
        if limit.is_some_and(|n| rows.len() >= n) {
            break;
        }
        let record = record.with_context(|| format!("Failed to read CSV row {row}"))?;
        let values = indices
            .iter()
            .zip(names)
            .map(|(&i, name)| parse_cell(record.get(i).unwrap_or(""), row, name))
            .collect::<Result<Vec<_>>>()?;
        rows.push(values);
    }
    Ok(rows)
}

fn explain_csv(config: &ServiceConfig, input: &Path, limit: usize) -> Result<()> {
    let forecaster = load_forecaster(config)?;
    let names = forecaster.model().feature_names().to_vec();

    let rows = read_columns(input, &names, Some(limit))?;
    info!("Explaining {} rows from {}", rows.len(), input.display());

    let matrix = Array2::from_shape_fn((rows.len(), names.len()), |(i, j)| rows[i][j] as f32);
    let shap = run_with_threads(config.n_threads, |parallelism| {
        forecaster.explain_rows(matrix.view(), parallelism)
    })?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for row in 0..shap.n_samples() {
        let phi = shap.feature_shap(row);
        let contributions: Vec<Contribution> = names
            .iter()
            .zip(phi)
            .map(|(feature, &value)| Contribution {
                feature: feature.clone(),
                value,
            })
            .collect();
        let top_factor = phi
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(j, _)| names[j].as_str());
        let explanation = RowExplanation {
            row,
            forecast: shap.sample(row).iter().sum(),
            base_value: shap.base_value(row),
            contributions,
            top_factor,
        };
        serde_json::to_writer(&mut out, &explanation)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

fn fit_scaler(input: &Path, output: &Path) -> Result<()> {
    let names = demand_feature_names();
    let rows = read_columns(input, &names, None)?;
    if let Some(row) = rows.iter().position(|r| r.iter().any(|v| !v.is_finite())) {
        bail!("Row {row} has a missing or non-finite feature value");
    }

    let matrix = Array2::from_shape_fn((rows.len(), names.len()), |(i, j)| rows[i][j]);
    let scaler = Scaler::fit(names, matrix.view()).context("Failed to fit scaler")?;

    let file = File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;
    scaler.to_writer(BufWriter::new(file))?;
    info!(
        "Fitted scaler over {} rows, written to {}",
        rows.len(),
        output.display()
    );
    Ok(())
}
