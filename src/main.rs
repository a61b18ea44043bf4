use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod db;
mod error;
mod metrics;
mod models;
mod narrative;
mod records;
mod service;
mod trends;

use error::AnalysisError;
use models::Period;
use narrative::BriefingNarrator;
use records::RecordSet;
use service::AnalysisService;

#[derive(Parser)]
#[command(name = "sales-insights")]
#[command(about = "Sales team performance metrics and briefings", long_about = None)]
struct Cli {
    /// CSV export to analyse when no database is configured
    #[arg(long, env = "SALES_DATA_CSV", default_value = "sales_performance_data.csv")]
    csv: PathBuf,
    /// Read records from Postgres instead of the CSV file
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
    /// Write the JSON response here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import performance snapshots from a CSV file into Postgres
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Analyse one sales representative
    Employee {
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        id: i64,
    },
    /// Summarise the whole team
    Team,
    /// Bucket performance by month or quarter
    Trends {
        #[arg(long, value_enum, default_value_t = Period::Monthly)]
        period: Period,
    },
    /// List employees with their latest snapshot date
    Roster,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match cli.command {
        Commands::InitDb => {
            let pool = connect(cli.database_url.as_deref()).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv } => {
            let pool = connect(cli.database_url.as_deref()).await?;
            let written = db::import_csv(&pool, &csv).await?;
            println!("Imported {written} snapshots from {}.", csv.display());
        }
        Commands::Employee { id } => {
            let service = load_service(&cli.csv, cli.database_url.as_deref()).await;
            let analysis = answer(service.employee_analysis(id))?;
            emit(&analysis, cli.out.as_deref())?;
        }
        Commands::Team => {
            let service = load_service(&cli.csv, cli.database_url.as_deref()).await;
            let analysis = answer(service.team_analysis())?;
            emit(&analysis, cli.out.as_deref())?;
        }
        Commands::Trends { period } => {
            let service = load_service(&cli.csv, cli.database_url.as_deref()).await;
            let analysis = answer(service.trends(period))?;
            emit(&analysis, cli.out.as_deref())?;
        }
        Commands::Roster => {
            let service = load_service(&cli.csv, cli.database_url.as_deref()).await;
            emit(&service.roster(), cli.out.as_deref())?;
        }
    }

    Ok(())
}

async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_records(csv: &Path, database_url: Option<&str>) -> anyhow::Result<RecordSet> {
    match database_url {
        Some(_) => {
            let pool = connect(database_url).await?;
            db::fetch_records(&pool).await
        }
        None => records::load_csv(csv),
    }
}

async fn load_service(
    csv: &Path,
    database_url: Option<&str>,
) -> AnalysisService<BriefingNarrator> {
    let service = AnalysisService::new(BriefingNarrator);
    service.reload_or_empty(load_records(csv, database_url).await);
    service
}

fn answer<T>(result: Result<T, AnalysisError>) -> anyhow::Result<T> {
    result.map_err(|err| {
        warn!(status = err.status_code(), error = %err, "analysis failed");
        err.into()
    })
}

fn emit<T: Serialize>(value: &T, out: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "response written");
        }
        None => println!("{json}"),
    }
    Ok(())
}
