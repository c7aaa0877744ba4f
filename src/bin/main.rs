//! Quarry CLI - plan queries against a JSON-described catalog
//!
//! Usage:
//!   quarry plan --catalog <catalog.json> --query <query.json> [--mode <mode>]
//!   quarry stats --catalog <catalog.json> [--table <name>]
//!
//! Examples:
//!   quarry plan --catalog fixtures/shop.json --query fixtures/q1.json
//!   quarry plan --catalog fixtures/shop.json --query fixtures/q1.json --mode baseline
//!   quarry stats --catalog fixtures/shop.json --table orders

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;

use quarry::catalog::{Catalog, MemoryTable, StatsCatalog, TableSchema};
use quarry::config::{PlannerMode, Settings};
use quarry::planner::logical::LogicalQuery;
use quarry::planner::{explain, Planner};
use quarry::types::Value;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - a cost-based query optimizer")]
#[command(version)]
struct Cli {
    /// Path to a quarry.toml settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging (RUST_LOG still applies)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan a query and print the chosen tree with its estimated I/O
    Plan {
        /// Path to the JSON catalog (schemas plus rows)
        #[arg(long)]
        catalog: PathBuf,

        /// Path to the JSON logical query
        #[arg(long)]
        query: PathBuf,

        /// Planner mode override
        #[arg(short, long)]
        mode: Option<ModeArg>,

        /// Remove merge joins from consideration
        #[arg(long)]
        no_sort_merge_join: bool,

        /// Remove index nested-loop joins from consideration
        #[arg(long)]
        no_index_join: bool,

        /// Remove hash joins from consideration
        #[arg(long)]
        no_hash_join: bool,

        /// Plan against conservative defaults instead of running ANALYZE
        #[arg(long)]
        skip_analyze: bool,
    },

    /// ANALYZE the catalog and print the computed statistics
    Stats {
        /// Path to the JSON catalog (schemas plus rows)
        #[arg(long)]
        catalog: PathBuf,

        /// Only this table
        #[arg(short, long)]
        table: Option<String>,
    },
}

#[derive(Clone, ValueEnum)]
enum ModeArg {
    Naive,
    Baseline,
    CostBased,
}

impl From<ModeArg> for PlannerMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Naive => PlannerMode::Naive,
            ModeArg::Baseline => PlannerMode::Baseline,
            ModeArg::CostBased => PlannerMode::CostBased,
        }
    }
}

/// On-disk catalog format: schemas plus the rows ANALYZE will scan.
#[derive(Deserialize)]
struct CatalogFile {
    tables: Vec<TableEntry>,
}

#[derive(Deserialize)]
struct TableEntry {
    schema: TableSchema,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
            )
            .init();
    }

    let settings = match &cli.config {
        Some(path) => match Settings::from_path(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Settings::default(),
    };

    match run(cli, settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Plan {
            catalog,
            query,
            mode,
            no_sort_merge_join,
            no_index_join,
            no_hash_join,
            skip_analyze,
        } => {
            let (catalog, stats) = load_catalog(&catalog, !skip_analyze)?;
            let query: LogicalQuery = serde_json::from_str(&fs::read_to_string(query)?)?;

            let mut planner_settings = settings.planner;
            if let Some(m) = mode {
                planner_settings.mode = m.into();
            }
            if no_sort_merge_join {
                planner_settings.sort_merge_join = false;
            }
            if no_index_join {
                planner_settings.index_join = false;
            }
            if no_hash_join {
                planner_settings.hash_join = false;
            }

            let plan = Planner::new(&catalog, &stats, &planner_settings).select(&query)?;
            print!("{}", explain::render(&plan));
            println!("{}", explain::summary(&plan));
            println!("Estimated rows: {}", plan.estimated_rows());
        }
        Commands::Stats { catalog, table } => {
            let (catalog, stats) = load_catalog(&catalog, true)?;
            let names = match table {
                Some(t) => vec![t],
                None => catalog.table_names(),
            };
            for name in names {
                let table_stats = stats.get(&name)?;
                println!("{}", serde_json::to_string_pretty(&*table_stats)?);
            }
        }
    }
    Ok(())
}

fn load_catalog(
    path: &PathBuf,
    analyze: bool,
) -> Result<(Catalog, StatsCatalog), Box<dyn std::error::Error>> {
    let file: CatalogFile = serde_json::from_str(&fs::read_to_string(path)?)?;
    let catalog = Catalog::new();
    for entry in file.tables {
        catalog.register(Arc::new(MemoryTable::with_rows(entry.schema, entry.rows)));
    }
    let stats = StatsCatalog::new();
    if analyze {
        stats.analyze_all(&catalog);
    }
    Ok((catalog, stats))
}
