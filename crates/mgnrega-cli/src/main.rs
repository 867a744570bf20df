use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mgnrega_core::previous_fin_year;
use mgnrega_report::{DashboardRequest, ReportService};
use mgnrega_storage::FetchFilter;
use mgnrega_sync::{IngestPipeline, RunSummary, SyncConfig};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "mgnrega-cli", version)]
#[command(about = "MGNREGA district data pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Fetch from data.gov.in and write a snapshot, without loading it
    Fetch {
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        year: Option<String>,
    },
    /// Load the newest snapshot into the store
    Sync,
    /// Fetch, snapshot and load in one run
    Ingest {
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        year: Option<String>,
    },
    /// Create the mgnrega table and indexes
    Migrate,
    /// Recreate the read views
    CreateViews,
    /// Show which read views exist
    Views,
    /// Truncate every stored record
    Clear {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Table-wide counters
    Stats,
    /// Store connectivity and row count
    Health,
    /// Snapshot files on disk, newest first
    Snapshots,
    /// Aggregates for a district and financial year, as JSON
    Report {
        #[arg(long)]
        district: Option<String>,
        #[arg(long)]
        year: Option<String>,
        #[arg(long, value_enum, default_value_t = ReportView::Dashboard)]
        view: ReportView,
        /// Compare against the previous financial year
        #[arg(long, default_value_t = false)]
        compare: bool,
        /// Compare against this financial year instead of the previous one
        #[arg(long)]
        compare_year: Option<String>,
    },
    /// Run ingestion on MGNREGA_SYNC_CRON until interrupted
    Schedule,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportView {
    Dashboard,
    Overview,
    Monthly,
    Scst,
    Projects,
    Budget,
    Wages,
    YearOverYear,
    State,
    Months,
    Districts,
    Years,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("serializing output")?);
    Ok(())
}

fn print_run(label: &str, summary: &RunSummary) {
    println!(
        "{label} complete: run_id={} snapshot={} inserted={} failed={} failed_batches={} duplicates_dropped={}",
        summary.run_id,
        summary.snapshot.file_name,
        summary.outcome.inserted,
        summary.outcome.failed,
        summary.outcome.failed_batches,
        summary.outcome.duplicates_dropped
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();
    let pipeline = IngestPipeline::new(config)?;

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Fetch { district, year } => {
            let filter = FetchFilter::new(district.as_deref(), year.as_deref());
            let (info, _) = pipeline.fetch(&filter).await?;
            println!(
                "fetch complete: snapshot={} records={} sha256={}",
                info.path.display(),
                info.record_count,
                info.content_hash
            );
        }
        Commands::Sync => {
            let summary = pipeline.sync_latest().await?;
            print_run("sync", &summary);
        }
        Commands::Ingest { district, year } => {
            let filter = FetchFilter::new(district.as_deref(), year.as_deref());
            let summary = pipeline.run_once(&filter).await?;
            print_run("ingest", &summary);
        }
        Commands::Migrate => {
            pipeline.gateway().migrate().await.context("running migrations")?;
            println!("migrations applied");
        }
        Commands::CreateViews => {
            let created = pipeline
                .gateway()
                .create_views()
                .await
                .context("creating read views")?;
            println!("created {created} views");
        }
        Commands::Views => {
            let statuses = pipeline.gateway().view_status().await.context("checking views")?;
            print_json(&statuses)?;
        }
        Commands::Clear { yes } => {
            if !yes {
                bail!("refusing to clear all records without --yes");
            }
            pipeline.gateway().clear_all().await.context("clearing records")?;
            println!("all records cleared");
        }
        Commands::Stats => print_json(&pipeline.gateway().stats().await)?,
        Commands::Health => print_json(&pipeline.gateway().health().await)?,
        Commands::Snapshots => {
            let files = pipeline.snapshots().list().await.context("listing snapshots")?;
            print_json(&files)?;
        }
        Commands::Report {
            district,
            year,
            view,
            compare,
            compare_year,
        } => {
            let service = ReportService::open(pipeline.gateway(), pipeline.snapshots()).await?;
            info!(path = ?service.data_path(), "report session ready");
            run_report(&service, district, year, view, compare, compare_year).await?;
        }
        Commands::Schedule => {
            let pipeline = Arc::new(pipeline);
            let Some(mut sched) = pipeline.maybe_build_scheduler().await? else {
                bail!("scheduler disabled; set MGNREGA_SCHEDULER_ENABLED=true");
            };
            sched.start().await.context("starting scheduler")?;
            info!("scheduler running; press ctrl-c to stop");
            tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
    }

    Ok(())
}

async fn run_report(
    service: &ReportService,
    district: Option<String>,
    year: Option<String>,
    view: ReportView,
    compare: bool,
    compare_year: Option<String>,
) -> Result<()> {
    match view {
        ReportView::Districts => return print_json(&service.districts().await?),
        ReportView::Years => return print_json(&service.fin_years().await?),
        _ => {}
    }

    let district = district.context("--district is required for this view")?;
    let year = year.context("--year is required for this view")?;
    let compare_year = match compare_year {
        Some(explicit) => Some(explicit),
        None if compare || matches!(view, ReportView::YearOverYear) => previous_fin_year(&year),
        None => None,
    };

    match view {
        ReportView::Dashboard => {
            let request = DashboardRequest {
                district_name: district,
                fin_year: year,
                compare_year,
            };
            print_json(&service.dashboard(&request).await?)
        }
        ReportView::Overview => print_json(&service.overview(&district, &year).await?),
        ReportView::Monthly => print_json(&service.monthly(&district, &year).await?),
        ReportView::Scst => print_json(&service.scst(&district, &year).await?),
        ReportView::Projects => print_json(&service.projects(&district, &year).await?),
        ReportView::Budget => print_json(&service.budget(&district, &year).await?),
        ReportView::Wages => print_json(&service.wages(&district, &year).await?),
        ReportView::YearOverYear => {
            let previous = compare_year
                .with_context(|| format!("cannot derive the year before {year:?}; pass --compare-year"))?;
            print_json(&service.year_over_year(&district, &year, &previous).await?)
        }
        ReportView::State => print_json(&service.state_comparison(&district, &year).await?),
        ReportView::Months => print_json(&service.available_months(&district, &year).await?),
        ReportView::Districts | ReportView::Years => Ok(()),
    }
}
