use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use stockout_forecast::{
    utils::date_parser, FitMethod, ForecastConfig, ForecastEngine, ForecastRequest, ReportMatch,
    SnapAdjustment, StockHistory,
};
use tracing::info;

#[derive(Parser)]
#[command(name = "stockout", about = "Forecast resource depletion from stock history", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Emit logs as JSON lines"
    )]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast depletion for one resource and print the result as JSON
    Forecast(ForecastArgs),
    /// List the series in a stock history file
    List(ListArgs),
    /// Find the sector and resource a report mentions
    Match(MatchArgs),
}

#[derive(Args)]
struct ForecastArgs {
    #[arg(long, help = "Stock history CSV file")]
    csv: PathBuf,
    #[arg(long)]
    sector: String,
    #[arg(long)]
    resource: String,
    #[arg(long, help = "Ignore observations after this timestamp")]
    end_date: Option<String>,
    #[arg(long, help = "Two-sided confidence level, e.g. 0.9")]
    confidence: Option<f64>,
    #[arg(long, help = "least_squares or theil_sen")]
    method: Option<String>,
    #[arg(long, help = "ignore, level_shift or restore")]
    snap: Option<String>,
    #[arg(long, help = "JSON engine configuration")]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long, help = "Stock history CSV file")]
    csv: PathBuf,
    #[arg(long, action = ArgAction::SetTrue, help = "Print the listing as JSON")]
    json: bool,
}

#[derive(Args)]
struct MatchArgs {
    #[arg(long, help = "Stock history CSV file")]
    csv: PathBuf,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        help = "Fall back to the first listed name when the report names none"
    )]
    first_if_unmatched: bool,
    /// Report text to match
    text: String,
}

#[derive(Serialize)]
struct SeriesListing<'a> {
    sector: &'a str,
    resource: &'a str,
    observations: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Forecast(args) => handle_forecast(args),
        Commands::List(args) => handle_list(args),
        Commands::Match(args) => handle_match(args),
    }
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("stockout_forecast=info"));

    // stdout carries command output
    if json {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    }
}

fn load_history(path: &Path) -> Result<StockHistory> {
    StockHistory::from_csv(path)
        .with_context(|| format!("failed to load stock history from {}", path.display()))
}

fn handle_forecast(args: ForecastArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ForecastConfig::from_json_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => ForecastConfig::default(),
    };
    if let Some(method) = &args.method {
        config = config.with_method(method.parse::<FitMethod>()?);
    }
    if let Some(snap) = &args.snap {
        config = config.with_snap_adjustment(snap.parse::<SnapAdjustment>()?);
    }
    let engine = ForecastEngine::new(config).context("invalid engine configuration")?;

    let end_date: Option<DateTime<Utc>> = args
        .end_date
        .as_deref()
        .map(date_parser::parse_timestamp)
        .transpose()
        .context("invalid --end-date")?;

    let history = load_history(&args.csv)?;
    let observations = history
        .series(&args.sector, &args.resource)
        .ok_or_else(|| anyhow!("no series for {} / {}", args.sector, args.resource))?;

    let mut request = ForecastRequest::new(observations.to_vec())
        .with_resource_id(format!("{} / {}", args.sector, args.resource));
    request.end_date = end_date;
    request.confidence_level = args.confidence;

    let result = engine.run(request).context("forecast failed")?;
    info!(status = ?result.status, t_star_ts = ?result.t_star_ts, "forecast ready");

    println!("{}", result.to_json_pretty()?);
    Ok(())
}

fn handle_list(args: ListArgs) -> Result<()> {
    let history = load_history(&args.csv)?;
    let listing: Vec<SeriesListing<'_>> = history
        .keys()
        .iter()
        .map(|key| SeriesListing {
            sector: &key.sector,
            resource: &key.resource,
            observations: history.get(key).map_or(0, |series| series.len()),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
    } else {
        for entry in &listing {
            println!("{} / {}: {} observations", entry.sector, entry.resource, entry.observations);
        }
    }
    Ok(())
}

fn handle_match(args: MatchArgs) -> Result<()> {
    let history = load_history(&args.csv)?;
    let sectors = history.sectors();
    let resources = history.resources();

    let mut found = ReportMatch::find(&args.text, &sectors, &resources);
    if args.first_if_unmatched {
        found = found.or_first(&sectors, &resources);
    }

    println!("{}", serde_json::to_string_pretty(&found)?);
    Ok(())
}
