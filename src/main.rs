use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use fleet_auction::agent::{CostOracle, EuclideanOracle, FieldOracle, Zone};
use fleet_auction::config::{AuctionConfig, FieldConfig, FleetConfig};
use fleet_auction::field::{Field, FieldReport};
use fleet_auction::shutdown::install_shutdown_handler;

#[derive(Parser, Debug)]
#[command(name = "fleet-auction")]
#[command(version)]
#[command(about = "Contract-net job allocation for a fleet of field agents")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run a field simulation until the job limit is reached or Ctrl-C
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Number of agents in the fleet
    #[arg(long, default_value = "3")]
    agents: usize,

    /// Stop after this many completed jobs (runs until interrupted if omitted)
    #[arg(long)]
    jobs: Option<usize>,

    /// Seed for job placement
    #[arg(long)]
    seed: Option<u64>,

    /// Milliseconds between spawned jobs
    #[arg(long, default_value = "500")]
    spawn_interval_ms: u64,

    /// Bidding window between announcement and evaluation
    #[arg(long, default_value = "100")]
    bidding_window_ms: u64,

    /// Requeue delay when nobody bid
    #[arg(long, default_value = "1000")]
    no_bid_requeue_ms: u64,

    /// Requeue delay when the winner was already busy (must be shorter than the no-bid delay)
    #[arg(long, default_value = "250")]
    stale_winner_requeue_ms: u64,

    /// Agent travel speed in units per second
    #[arg(long, default_value = "3.5")]
    speed: f64,

    /// How agents price a job
    #[arg(long, default_value = "euclidean")]
    oracle: OracleKind,

    /// Stream auction events to stdout as JSON lines
    #[arg(long)]
    events: bool,

    /// Output format for the final report
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OracleKind {
    /// Straight-line distance, everything reachable
    Euclidean,
    /// Distance inside the field bounds, outside is unreachable
    Field,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn build_config(args: &RunArgs) -> FleetConfig {
    let auction = AuctionConfig {
        bidding_window_ms: args.bidding_window_ms,
        no_bid_requeue_ms: args.no_bid_requeue_ms,
        stale_winner_requeue_ms: args.stale_winner_requeue_ms,
        ..AuctionConfig::default()
    };
    let field = FieldConfig {
        spawn_interval_ms: args.spawn_interval_ms,
        agent_speed: args.speed,
        max_jobs: args.jobs,
        seed: args.seed,
        ..FieldConfig::default()
    };
    FleetConfig::new(auction, field).with_agents(args.agents)
}

fn build_oracle(kind: &OracleKind, config: &FieldConfig) -> Arc<dyn CostOracle> {
    match kind {
        OracleKind::Euclidean => Arc::new(EuclideanOracle),
        OracleKind::Field => Arc::new(FieldOracle::new(Zone::centered(
            config.half_extent_x,
            config.half_extent_z,
        ))),
    }
}

fn print_table(report: &FieldReport) {
    let snap = &report.snapshot;
    println!("Completed jobs:   {}", report.completed);
    println!("Elapsed:          {} ms", report.elapsed_ms);
    println!("Published:        {}", snap.stats.published);
    println!("Announced:        {}", snap.stats.announced);
    println!("Bids:             {}", snap.stats.bids);
    println!("Assigned:         {}", snap.stats.assigned);
    println!("No-bid requeues:  {}", snap.stats.no_bid_requeues);
    println!("Stale winners:    {}", snap.stats.stale_winner_requeues);
    println!();

    println!("{:<6} {:<14} {:<9} {:<24} {:<6}", "AGENT", "NAME", "STATE", "POSITION", "JOB");
    for agent in &snap.agents {
        println!(
            "{:<6} {:<14} {:<9} {:<24} {:<6}",
            agent.id,
            agent.name,
            agent.state.to_string(),
            agent.position.to_string(),
            agent.job.map(|j| j.to_string()).unwrap_or_else(|| "-".to_string()),
        );
    }

    if !snap.jobs.is_empty() {
        println!();
        println!("{:<6} {:<10} {:<10} {:<24}", "JOB", "NAME", "STATUS", "TARGET");
        for job in &snap.jobs {
            println!(
                "{:<6} {:<10} {:<10} {:<24}",
                job.id,
                job.name,
                job.status.to_string(),
                job.target.to_string(),
            );
        }
    }
}

async fn run_field(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&args);
    let oracle = build_oracle(&args.oracle, &config.field);
    let field = Field::new(config, oracle)?;

    if args.events {
        let mut rx = field.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{}", line),
                        Err(e) => tracing::warn!(error = %e, "Failed to encode event"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event stream lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let cancel = install_shutdown_handler();
    let report = field.run(cancel).await;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Table => print_table(&report),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Run(run_args) => run_field(run_args).await?,
    }
    Ok(())
}
