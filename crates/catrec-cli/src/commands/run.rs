use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::Args;
use comfy_table::{Cell, Color, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use catrec_auth::{resolve_hub_credentials, KeyringStore};
use catrec_core::config::{CatrecConfig, DatasetConfig};
use catrec_core::error::CatrecError;
use catrec_core::models::range::DateRange;
use catrec_core::models::report::{Mode, RecordKind, Report};
use catrec_core::render::write_report;
use catrec_source::fetcher::{RetryPolicy, RetryingFetcher};

#[derive(Args)]
pub struct RunArgs {
    /// daily compares per-day totals, monthly reconciles identifier lists
    #[arg(long, default_value = "monthly")]
    mode: Mode,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long, conflicts_with = "days_back")]
    start: Option<NaiveDate>,

    /// Last day of the range (YYYY-MM-DD), defaults to today
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,

    /// Cover the last N days ending today
    #[arg(long)]
    days_back: Option<u32>,

    /// Only reconcile this configured dataset
    #[arg(long)]
    dataset: Option<String>,

    /// Directory for report files (default: config output_dir)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = CatrecConfig::load()?;
    let today = Local::now().date_naive();
    let range = resolve_range(&args, today, config.daily.days_back)?;
    let datasets = select_datasets(&config, args.dataset.as_deref())?;
    let credentials = resolve_hub_credentials(&KeyringStore::new(), &config.hub)?;
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => config.resolved_output_dir()?,
    };

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, stopping after the current request");
                cancel.cancel();
            }
        }
    });

    let fetcher = RetryingFetcher::new(
        RetryPolicy::for_counts(&config.retry),
        config.retry.request_timeout(),
        cancel.clone(),
    )?;

    for dataset in datasets {
        if cancel.is_cancelled() {
            break;
        }
        let engine = catrec_reconcile::build_engine(&config, dataset, &fetcher, credentials.clone())?
            .with_progress(progress_bar(args.json));
        let report =
            catrec_reconcile::reconcile_dataset(&engine, dataset, args.mode, range, &cancel)
                .await?;

        let written = write_report(&report, &output_dir)?;
        info!(
            dataset = %dataset.name,
            files = written.len(),
            dir = %output_dir.display(),
            "report written"
        );

        if args.json {
            println!("{}", report.to_json()?);
        } else {
            print_summary(&report);
            println!("Report files written to {}", output_dir.display());
        }
    }

    if !config.recipients.is_empty() {
        info!(
            recipients = %config.recipients.join(", "),
            "reports ready for delivery"
        );
    }
    Ok(())
}

/// Explicit `--start` wins, then `--days-back`. Daily mode falls back to the
/// configured window; monthly mode needs one of the two.
fn resolve_range(
    args: &RunArgs,
    today: NaiveDate,
    default_days_back: u32,
) -> Result<DateRange, CatrecError> {
    if let Some(start) = args.start {
        return DateRange::new(start, args.end.unwrap_or(today));
    }
    match (args.days_back, args.mode) {
        (Some(days), _) => DateRange::days_back(today, days),
        (None, Mode::Daily) => DateRange::days_back(today, default_days_back),
        (None, Mode::Monthly) => Err(CatrecError::Config {
            message: "monthly mode needs --start or --days-back".into(),
        }),
    }
}

fn select_datasets<'a>(
    config: &'a CatrecConfig,
    name: Option<&str>,
) -> anyhow::Result<Vec<&'a DatasetConfig>> {
    match name {
        Some(name) => {
            let dataset = config
                .dataset(name)
                .ok_or_else(|| anyhow::anyhow!("Dataset '{}' is not configured", name))?;
            Ok(vec![dataset])
        }
        None => Ok(config.datasets.iter().collect()),
    }
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet || !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

fn print_summary(report: &Report) {
    let mut table = Table::new();
    table.set_header(vec![
        "CHUNK",
        "G-POD",
        "COPHUB",
        "MISSING IN A",
        "MISSING IN B",
        "STATUS",
    ]);

    for record in &report.records {
        let (missing_a, missing_b) = match record.kind {
            RecordKind::Listed => (
                record.missing_in_a.len().to_string(),
                record.missing_in_b.len().to_string(),
            ),
            RecordKind::CountOnly => ("-".to_string(), "-".to_string()),
        };
        let count_b = match record.reported_b {
            Some(reported) => format!("{} (of {reported})", record.count_b),
            None => record.count_b.to_string(),
        };
        let (status, color) = if record.is_degraded() {
            ("degraded", Color::Yellow)
        } else if record.mismatch {
            ("mismatch", Color::Red)
        } else if record.has_differences() {
            ("differs", Color::Red)
        } else {
            ("ok", Color::Green)
        };

        table.add_row(vec![
            Cell::new(record.range.to_string()),
            Cell::new(record.count_a),
            Cell::new(count_b),
            Cell::new(missing_a),
            Cell::new(missing_b),
            Cell::new(status).fg(color),
        ]);
    }

    println!(
        "{} {} ({}, {})",
        style("Catalog results for").bold(),
        style(&report.meta.dataset).cyan(),
        report.meta.mode,
        report.meta.range
    );
    println!("{table}");

    let differing = report.differing_count();
    let degraded = report.degraded_count();
    let summary = format!(
        "{} chunks, {} differing, {} degraded",
        report.records.len(),
        differing,
        degraded
    );
    if differing > 0 || degraded > 0 {
        println!("{}", style(summary).yellow());
    } else {
        println!("{}", style(summary).green());
    }
    if report.cancelled {
        println!("{}", style("Run cancelled before all chunks were processed").red());
    }
}
