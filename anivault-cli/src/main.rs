//! AniVault command-line front-end: wires `clap` subcommands to the engine
//! core, loads configuration and credentials, and maps `EngineError` to
//! the exit codes the core documents. No business logic lives here.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "anivaultctl", about = "AniVault anime library organizer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a root directory and parse discovered media files
    Scan {
        path: PathBuf,
        #[arg(long, value_delimiter = ',')]
        ext: Option<Vec<String>>,
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
    /// Look up TMDB metadata for a free-text title
    Match {
        query: String,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        series: bool,
    },
    /// Scan, group, enrich, and build an organize plan for a root directory
    Organize {
        path: PathBuf,
        #[arg(long)]
        target: PathBuf,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        by_resolution: bool,
        #[arg(long, value_enum, default_value = "skip")]
        conflict: ConflictArg,
    },
    /// Reverse a previously applied plan by its ID
    Rollback {
        plan_id: String,
    },
    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry counts, byte totals, and hit/miss counters
    Status,
    /// Purge cache entries, optionally scoped to one category
    Clear {
        #[arg(long)]
        category: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ConflictArg {
    Skip,
    Overwrite,
    Suffix,
}

impl From<ConflictArg> for anivault_model::plan::ConflictPolicy {
    fn from(value: ConflictArg) -> Self {
        match value {
            ConflictArg::Skip => anivault_model::plan::ConflictPolicy::Skip,
            ConflictArg::Overwrite => anivault_model::plan::ConflictPolicy::Overwrite,
            ConflictArg::Suffix => anivault_model::plan::ConflictPolicy::Suffix,
        }
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = anivault_core::config::EngineConfig::from_env();

    let result = match cli.command {
        Command::Scan { path, ext, workers } => commands::scan::run(path, ext, workers).await,
        Command::Match { query, year, series } => {
            commands::r#match::run(&config, query, year, series).await
        }
        Command::Organize {
            path,
            target,
            dry_run,
            by_resolution,
            conflict,
        } => {
            commands::organize::run(
                &config,
                path,
                target,
                dry_run,
                by_resolution,
                conflict.into(),
            )
            .await
        }
        Command::Rollback { plan_id } => commands::rollback::run(&config, plan_id).await,
        Command::Cache { action } => match action {
            CacheAction::Status => commands::cache::status(&config).await,
            CacheAction::Clear { category } => commands::cache::clear(&config, category).await,
        },
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.exit_code());
        }
    }
}
