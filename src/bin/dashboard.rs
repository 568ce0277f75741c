use pipeline_dashboard::dashboards::{checkboxes, record_label, DashboardView};
use pipeline_dashboard::observability::init_tracing;
use pipeline_dashboard::{Dashboard, DashboardConfig, Dataset, FilterSpec, RecordKey};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use itertools::Itertools;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "dashboard")]
#[command(about = "Deals, tickets and companies dashboard")]
#[command(version)]
struct Args {
    /// JSON configuration file (DASHBOARD_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding deals.csv, tickets.csv and companies.csv
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the size and first rows of a dataset
    Overview {
        /// deals, tickets or companies
        dataset: Dataset,

        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
    /// Print the default filter panel of a dataset as JSON
    Filters {
        dataset: Dataset,
    },
    /// Evaluate the dashboard of a dataset
    View {
        dataset: Dataset,

        /// Filter specification JSON (defaults to the full panel)
        #[arg(short, long)]
        filters: Option<PathBuf>,

        /// Tick a checkbox gate by its flag column, e.g. "Close YN"
        #[arg(long = "check")]
        checks: Vec<String>,

        /// Record to recommend on: its ID, or its row index for companies
        #[arg(short, long)]
        select: Option<String>,

        /// Print the view as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing("info");

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DashboardConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DashboardConfig::default(),
    }
    .with_env_overrides();
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    let dashboard = Dashboard::new(config);

    match args.command {
        Commands::Overview { dataset, rows } => run_overview(&dashboard, dataset, rows),
        Commands::Filters { dataset } => {
            let spec = dashboard.default_filters(dataset)?;
            println!("{}", spec.to_json()?);
            Ok(())
        }
        Commands::View {
            dataset,
            filters,
            checks,
            select,
            json,
        } => run_view(&dashboard, dataset, filters, checks, select, json),
    }
}

fn run_overview(dashboard: &Dashboard, dataset: Dataset, rows: usize) -> Result<()> {
    let overview = dashboard.overview(dataset, rows)?;
    println!("{}", dataset);
    println!("Rows: {} | Columns: {}", overview.rows, overview.columns);
    println!("{}", overview.head.frame());
    Ok(())
}

fn run_view(
    dashboard: &Dashboard,
    dataset: Dataset,
    filters: Option<PathBuf>,
    checks: Vec<String>,
    select: Option<String>,
    json: bool,
) -> Result<()> {
    let mut spec = match filters {
        Some(path) => {
            info!("Loading filters from {:?}", path);
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            dashboard.clamp_filters(dataset, &FilterSpec::from_json(&content)?)?
        }
        None => dashboard.default_filters(dataset)?,
    };
    for column in checks {
        if !checkboxes(dataset).iter().any(|(_, c)| *c == column) {
            anyhow::bail!("'{}' is not a checkbox of the {} panel", column, dataset);
        }
        spec = spec.flag_set(column);
    }

    let view = dashboard.evaluate(dataset, &spec)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view);
    }

    if view.is_empty() {
        println!("\nNo {} match the selected filter criteria.", dataset.name().to_lowercase());
        return Ok(());
    }

    let key = match select {
        Some(raw) => RecordKey::for_dataset(dataset, &raw)?,
        None => match view.selectable_records()?.into_iter().next() {
            Some(first) => first,
            None => return Ok(()),
        },
    };

    match dashboard.recommend(&view, &key)? {
        Some(rec) => {
            println!("\nSelected: {}", record_label(&key));
            println!("Recommendation: {}", rec.advice.recommendation);
            println!("Action Plan: {}", rec.advice.action_plan);
            if let Some(message) = rec.message {
                println!("Message: {}", message);
            }
        }
        None => println!("\nNo selection: {} is not in the filtered data.", record_label(&key)),
    }

    Ok(())
}

fn print_view(view: &DashboardView) {
    println!("{} ({} of {} rows)", view.dataset, view.filtered_rows, view.total_rows);
    println!("{}", "=".repeat(60));
    for kpi in &view.kpis {
        println!("{:<40} {}", kpi.name, kpi.display);
    }
    for named in &view.aggregates {
        println!("\n{}", named.title);
        for row in &named.table.rows {
            println!("  {:<40} {}", row.keys.iter().join(" / "), row.value);
        }
    }
    for hist in &view.histograms {
        println!("\nDistribution of {}", hist.column);
        for bin in &hist.bins {
            println!("  [{:>10.2}, {:>10.2}] {}", bin.start, bin.end, bin.count);
        }
    }
}
