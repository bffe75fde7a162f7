use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod alerts;
mod clock;
mod config;
mod db;
mod error;
mod kpi;
mod models;
mod report;
mod shift;
mod source;

use crate::alerts::AlertEngine;
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::config::AppConfig;
use crate::models::{Alert, ReferenceKind};
use crate::source::{InspectionFilter, InspectionSource, MemorySource};

#[derive(Parser)]
#[command(name = "qc-kpi-alerts")]
#[command(about = "Quality inspection KPI reporting and alerting", long_about = None)]
struct Cli {
    /// Optional JSON file with shift boundaries and rule thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReferenceArg {
    Inspectors,
    Models,
    DefectTypes,
}

impl From<ReferenceArg> for ReferenceKind {
    fn from(value: ReferenceArg) -> Self {
        match value {
            ReferenceArg::Inspectors => ReferenceKind::Inspectors,
            ReferenceArg::Models => ReferenceKind::Models,
            ReferenceArg::DefectTypes => ReferenceKind::DefectTypes,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import inspection records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print KPIs for a trailing window
    Kpis {
        #[arg(long)]
        days: Option<i64>,
        /// Only count inspections by this inspector code
        #[arg(long)]
        inspector: Option<String>,
        /// Only count inspections of this model code
        #[arg(long)]
        model: Option<String>,
    },
    /// Compare day and night shift KPIs for a work-date
    Shifts {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Evaluate alert rules
    Alerts {
        /// Evaluate as if it were this local time (YYYY-MM-DDTHH:MM:SS)
        #[arg(long)]
        at: Option<NaiveDateTime>,
        /// Read inspections from a CSV snapshot instead of Postgres
        #[arg(long)]
        csv: Option<PathBuf>,
        #[arg(long)]
        json: bool,
        /// Only show the top alerts as a short summary
        #[arg(long)]
        summary: Option<usize>,
    },
    /// List reference data
    Reference {
        #[arg(long, value_enum)]
        kind: ReferenceArg,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        days: Option<i64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("info,qc_kpi_alerts=debug")
        } else {
            EnvFilter::new("warn,qc_kpi_alerts=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_alerts(alerts: &[Alert], json: bool, summary: Option<usize>) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(alerts)?);
        return Ok(());
    }

    if alerts.is_empty() {
        println!("No alerts.");
        return Ok(());
    }

    if let Some(limit) = summary {
        for line in report::sidebar_summary(alerts, limit) {
            println!("{line}");
        }
        return Ok(());
    }

    let stats = report::alert_stats(alerts);
    println!(
        "{} alerts ({} critical, {} high, {} medium, {} low):",
        stats.total, stats.critical, stats.high, stats.medium, stats.low
    );
    for alert in alerts {
        println!(
            "- {} [{}] {}: {}",
            alert.icon,
            alert.priority.as_str(),
            alert.title,
            alert.message
        );
        if let Some(info) = &alert.shift_info {
            println!("    shift: {info}");
        }
        println!("    action: {}", alert.action);
    }

    Ok(())
}

async fn run_alerts<S: InspectionSource + ?Sized>(
    source: &S,
    config: &AppConfig,
    clock: &impl Clock,
    json: bool,
    summary: Option<usize>,
) -> anyhow::Result<()> {
    let alerts = AlertEngine::new(
        source,
        clock,
        config.shift_schedule,
        config.thresholds.clone(),
    )
    .evaluate()
    .await;
    print_alerts(&alerts, json, summary)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;
    let system_clock = SystemClock::new(config.utc_offset);

    // Offline evaluation needs no database.
    if let Commands::Alerts {
        at,
        csv: Some(csv),
        json,
        summary,
    } = &cli.command
    {
        let source = MemorySource::from_csv(csv)
            .with_context(|| format!("failed to load snapshot {}", csv.display()))?;
        return match at {
            Some(at) => run_alerts(&source, &config, &FixedClock(*at), *json, *summary).await,
            None => run_alerts(&source, &config, &system_clock, *json, *summary).await,
        };
    }

    let source = db::PgSource::connect(config.require_database_url()?).await?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(source.pool()).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(source.pool(), system_clock.today()).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(source.pool(), &csv).await?;
            println!("Inserted {inserted} inspections from {}.", csv.display());
        }
        Commands::Kpis {
            days,
            inspector,
            model,
        } => {
            let days = days.unwrap_or(config.thresholds.kpi_window_days);
            let filter = InspectionFilter {
                inspector_ref: inspector,
                model_ref: model,
                ..InspectionFilter::default()
            };
            let kpis = kpi::window_kpis(&source, &system_clock, days, &filter).await?;

            if !kpis.has_data() {
                println!("No inspections found for the last {days} days.");
                return Ok(());
            }

            println!("KPIs for the last {days} days:");
            println!("- defect rate {:.2}%", kpis.defect_rate);
            println!("- inspection efficiency {:.1}%", kpis.inspection_efficiency);
            println!("- {} inspections", kpis.total_inspections);
        }
        Commands::Shifts { date } => {
            let work_date = date.unwrap_or_else(|| {
                config
                    .shift_schedule
                    .resolve(system_clock.now())
                    .map_or(system_clock.today(), |(_, work_date)| work_date)
            });
            let comparison =
                shift::compare_shifts(&source, &config.shift_schedule, work_date).await?;
            println!("{}", serde_json::to_string_pretty(&comparison)?);
        }
        Commands::Alerts {
            at, json, summary, ..
        } => match at {
            Some(at) => run_alerts(&source, &config, &FixedClock(at), json, summary).await?,
            None => run_alerts(&source, &config, &system_clock, json, summary).await?,
        },
        Commands::Reference { kind } => {
            let rows = source.fetch_reference(kind.into()).await?;
            if rows.is_empty() {
                println!("No reference rows found.");
            }
            for row in rows {
                println!("- {} {}", row.code, row.name);
            }
        }
        Commands::Report { days, out } => {
            let days = days.unwrap_or(config.thresholds.kpi_window_days);
            let window = kpi::trailing_window(&system_clock, days)?;
            let kpis =
                kpi::window_kpis(&source, &system_clock, days, &InspectionFilter::default()).await?;
            let defects = source.fetch_defects(window).await?;
            let shifts = match config.shift_schedule.resolve(system_clock.now()) {
                Some((_, work_date)) => Some(
                    shift::compare_shifts(&source, &config.shift_schedule, work_date).await?,
                ),
                None => None,
            };
            let alerts = AlertEngine::new(
                &source,
                &system_clock,
                config.shift_schedule,
                config.thresholds.clone(),
            )
            .evaluate()
            .await;

            let report = report::build_report(window, &kpis, shifts.as_ref(), &defects, &alerts);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
