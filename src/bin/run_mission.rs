//! Headless mission runner
//!
//! Generates a grid from the configuration, plans the waypoint order and steps the
//! mission until it completes, then prints a summary (or the final snapshot as JSON).

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;
use waypoint_nav::config::{ConfigSource, DEFAULT_CONFIG_PATH};
use waypoint_nav::pathfinding::format_path;
use waypoint_nav::{Config, Coord, MissionController, OrderingMode};

#[derive(Parser, Debug)]
#[command(name = "run_mission", version, about = "Run a waypoint mission without a window")]
struct Cli {
    /// Configuration file (defaults to ./config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the layout seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the ordering mode
    #[arg(long, value_enum)]
    mode: Option<OrderingMode>,

    /// Stop after this many state transitions
    #[arg(long, default_value_t = 100_000)]
    max_transitions: usize,

    /// Print the final snapshot as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Print the grid layout before and after the run
    #[arg(long)]
    show_grid: bool,
}

/// Planned goal order, "none" when there is nothing to visit
fn describe_order(order: &[Coord]) -> String {
    if order.is_empty() {
        "none".to_string()
    } else {
        format_path(order)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let (mut config, source) = match &cli.config {
        Some(path) => match Config::load_from(path) {
            Ok(config) => (config, ConfigSource::File),
            Err(e) => {
                eprintln!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::locate(DEFAULT_CONFIG_PATH),
    };
    if let Some(seed) = cli.seed {
        config.grid.seed = seed;
    }
    if let Some(mode) = cli.mode {
        config.planner.mode = mode;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)))
        .with_writer(std::io::stderr)
        .init();
    let shown_path = cli
        .config
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    source.log(&shown_path);

    let mut mission = match MissionController::new(config.mission_settings(), config.build_provider()) {
        Ok(mission) => mission,
        Err(e) => {
            error!("Failed to start mission: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if cli.show_grid && !cli.json {
        println!("{}", mission.grid().to_layout());
    }
    let order: Vec<_> = mission.waypoints().iter().map(|w| w.coord).collect();

    let report = mission.run_to_completion(cli.max_transitions);

    if cli.json {
        match serde_json::to_string_pretty(&mission.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize snapshot: {}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        if cli.show_grid {
            println!("{}", mission.grid().to_layout());
        }
        println!("=== Mission (seed {}) ===", config.grid.seed);
        println!("Order: {}", describe_order(&order));
        println!("Status: {}", mission.status_message());
        println!("Steps taken: {}", report.steps_taken);
        println!("Transitions: {}", report.transitions);
        println!("Visited: {:?}", report.visited);
        println!("Skipped: {:?}", report.skipped);
    }

    if report.complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
