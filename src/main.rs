use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use lapprice::{
    ArtifactStore, BatchStats, EstimatorConfig, ExplainedEstimate, PredictionResult, PriceEstimator,
    PricingPolicy, RawAttributeSet,
};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Resale price estimation for used laptops
#[derive(Parser, Debug)]
#[command(name = "lapprice")]
#[command(about = "Estimate used-laptop resale prices from trained artifacts", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Year ages are computed against (defaults to the current year)
    #[arg(long, global = true)]
    reference_year: Option<i32>,

    #[command(flatten)]
    pricing: PricingArgs,
}

#[derive(ClapArgs, Debug)]
struct PricingArgs {
    /// Multiplier for the low end of the range
    #[arg(long, global = true)]
    low_factor: Option<f64>,

    /// Multiplier for the high end of the range
    #[arg(long, global = true)]
    high_factor: Option<f64>,

    /// Floor for the low end of the range
    #[arg(long, global = true)]
    minimum_price: Option<u64>,

    /// Smallest gap between the low and high ends
    #[arg(long, global = true)]
    min_span: Option<u64>,

    /// Appended to the range label
    #[arg(long, global = true)]
    currency_suffix: Option<String>,
}

impl PricingArgs {
    fn policy(&self) -> PricingPolicy {
        let defaults = PricingPolicy::default();
        PricingPolicy {
            low_factor: self.low_factor.unwrap_or(defaults.low_factor),
            high_factor: self.high_factor.unwrap_or(defaults.high_factor),
            minimum_price: self.minimum_price.unwrap_or(defaults.minimum_price),
            min_span: self.min_span.unwrap_or(defaults.min_span),
            currency_suffix: self.currency_suffix.clone().unwrap_or(defaults.currency_suffix),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate the price of a single listing
    Estimate {
        /// Path to the model directory
        #[arg(short, long)]
        models: PathBuf,

        /// Listing attributes as a JSON object
        #[arg(long)]
        json: Option<String>,

        /// Free-text listing description
        #[arg(long)]
        description: Option<String>,

        /// Include per-model contributions
        #[arg(long)]
        explain: bool,
    },

    /// Estimate every listing of a JSON-lines file
    Batch {
        /// Path to the model directory
        #[arg(short, long)]
        models: PathBuf,

        /// One JSON object per line
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Show what was loaded from a model directory
    Inspect {
        /// Path to the model directory
        #[arg(short, long)]
        models: PathBuf,
    },
}

/// Field holding the observed price in labelled batch records
const ACTUAL_PRICE: &str = "actual_price";

#[derive(Serialize)]
struct EstimateOutput {
    #[serde(flatten)]
    result: PredictionResult,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

impl From<ExplainedEstimate> for EstimateOutput {
    fn from(e: ExplainedEstimate) -> Self {
        Self {
            result: e.result,
            warnings: e.warnings,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("lapprice v{}", env!("CARGO_PKG_VERSION"));

    let config = EstimatorConfig {
        pricing: args.pricing.policy(),
        reference_year: args.reference_year,
        ..EstimatorConfig::default()
    };

    match args.command {
        Command::Estimate {
            models,
            json,
            description,
            explain,
        } => run_estimate(&models, config, json, description, explain),
        Command::Batch { models, input } => run_batch(&models, config, &input),
        Command::Inspect { models } => run_inspect(&models, config),
    }
}

fn open(models: &Path, config: EstimatorConfig) -> anyhow::Result<PriceEstimator> {
    PriceEstimator::open(models, config)
        .with_context(|| format!("loading model directory {:?}", models))
}

fn run_estimate(
    models: &Path,
    config: EstimatorConfig,
    json: Option<String>,
    description: Option<String>,
    explain: bool,
) -> anyhow::Result<()> {
    let mut attrs = match json {
        Some(text) => {
            let value: Value = serde_json::from_str(&text).context("parsing --json")?;
            match RawAttributeSet::from_value(value) {
                Some(attrs) => attrs,
                None => bail!("--json must be a JSON object"),
            }
        }
        None => RawAttributeSet::new(),
    };
    if let Some(text) = description {
        attrs.insert("description", text);
    }
    if attrs.is_empty() {
        bail!("provide listing attributes with --json and/or --description");
    }

    let estimator = open(models, config)?;
    let estimate = estimator.estimate(&attrs)?;

    let out = if explain {
        serde_json::to_string_pretty(&estimate)?
    } else {
        serde_json::to_string_pretty(&EstimateOutput::from(estimate))?
    };
    println!("{}", out);
    Ok(())
}

fn run_batch(models: &Path, config: EstimatorConfig, input: &Path) -> anyhow::Result<()> {
    let estimator = open(models, config)?;
    let text = fs::read_to_string(input).with_context(|| format!("reading {:?}", input))?;

    // (listing, observed price), or the reason the line was rejected
    let mut records: Vec<Result<(RawAttributeSet, Option<f64>), String>> = Vec::new();
    for (number, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(mut map)) => {
                let actual = map.remove(ACTUAL_PRICE).and_then(|v| v.as_f64());
                Ok((RawAttributeSet::from_map(map), actual))
            }
            Ok(_) => Err(format!("line {}: not a JSON object", number + 1)),
            Err(e) => Err(format!("line {}: {}", number + 1, e)),
        };
        records.push(record);
    }

    let listings: Vec<RawAttributeSet> = records
        .iter()
        .filter_map(|r| r.as_ref().ok().map(|(attrs, _)| attrs.clone()))
        .collect();
    info!(records = records.len(), valid = listings.len(), "estimating batch");
    let mut estimates = estimator.estimate_batch(&listings).into_iter();

    let mut actual = Vec::new();
    let mut labelled = Vec::new();
    let mut failures = 0usize;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for record in records {
        let line = match record {
            Err(reason) => {
                failures += 1;
                serde_json::json!({ "error": reason })
            }
            Ok((_, observed)) => match estimates.next() {
                Some(Ok(estimate)) => {
                    if let Some(price) = observed {
                        actual.push(price);
                        labelled.push(estimate.result.clone());
                    }
                    serde_json::to_value(EstimateOutput::from(estimate))?
                }
                Some(Err(e)) => {
                    failures += 1;
                    serde_json::json!({ "error": e.to_string() })
                }
                None => bail!("batch returned fewer results than listings"),
            },
        };
        writeln!(out, "{}", line)?;
    }
    out.flush()?;

    info!(failures, "batch complete");
    if let Some(stats) = BatchStats::compute(&actual, &labelled) {
        info!(
            count = stats.count,
            smape = stats.smape,
            range_hit_rate = stats.range_hit_rate,
            "accuracy against actual prices"
        );
        eprintln!("{}", serde_json::to_string(&stats)?);
    }
    Ok(())
}

fn run_inspect(models: &Path, config: EstimatorConfig) -> anyhow::Result<()> {
    let store = ArtifactStore::open(models)?;
    let artifacts = store.describe()?;
    let estimator = open(models, config)?;

    let sub_models: Vec<Value> = estimator
        .specs()
        .iter()
        .map(|spec| {
            serde_json::json!({
                "model": spec.kind,
                "present": spec.present,
                "features": spec.required_features.len(),
                "weight": estimator.weights().get(spec.kind),
            })
        })
        .collect();

    let report = serde_json::json!({
        "directory": models.display().to_string(),
        "manifest_version": store.manifest().map(|m| m.version),
        "artifacts": artifacts,
        "schema_width": estimator.schema().len(),
        "scaled": estimator.has_scaling(),
        "reference_year": estimator.reference_year(),
        "pricing": estimator.policy(),
        "sub_models": sub_models,
        "warnings": estimator.warnings(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
