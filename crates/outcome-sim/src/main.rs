//! outcome-sim: batch spin simulator
//!
//! Usage:
//!   outcome-sim --spins 100000 --bet 10          - Simulate with the bundled game
//!   outcome-sim --config game.json --json        - Simulate a custom game, JSON report
//!   outcome-sim summary                          - Print bucket populations

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use outcome_engine::{BuildPolicy, ConfigParser, GameConfig, OutcomeEngine};
use outcome_sim::{Simulation, SimulationParams, SimulationReport};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

#[derive(Parser)]
#[command(name = "outcome-sim", about = "Batch spin simulator for the outcome engine")]
struct Cli {
    /// Game configuration (JSON or YAML); defaults to the bundled classic game
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Seed for store sampling and spins
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Number of spins
    #[arg(short = 'n', long, default_value_t = 1000)]
    spins: u64,

    /// Bet per spin
    #[arg(short, long, default_value_t = 10.0)]
    bet: f64,

    /// Starting balance (default: spins × bet)
    #[arg(long)]
    initial_balance: Option<f64>,

    /// Record a history point every n spins (0 disables)
    #[arg(long, default_value_t = 100)]
    history_every: u64,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print bucket populations after store construction
    Summary,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = load_config(cli.config.as_ref())?;
    let mut rng = match cli.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_os_rng(),
    };
    let engine = OutcomeEngine::with_rng(config, &mut rng);

    match cli.command {
        Some(Commands::Summary) => {
            print_summary(&engine);
            Ok(())
        }
        None => {
            let params = SimulationParams {
                spins: cli.spins,
                bet: cli.bet,
                initial_balance: cli.initial_balance,
                history_every: cli.history_every,
            };
            let report = Simulation::new(&engine)
                .run(&params, &mut rng)
                .context("Simulation failed")?;
            if cli.json {
                let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
                println!("{json}");
            } else {
                print_report(&report);
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<GameConfig> {
    match path {
        Some(path) => ConfigParser::new()
            .parse_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => GameConfig::classic().context("Bundled config is invalid"),
    }
}

fn print_summary(engine: &OutcomeEngine) {
    let store = engine.store();
    match store.policy() {
        BuildPolicy::Exhaustive { space } => println!("Exhaustive: {space} combinations"),
        BuildPolicy::Sampled { space, samples } => {
            println!("Sampled: {samples} of {space} combinations")
        }
    }
    for (name, count) in store.summary() {
        println!("  {name:<16} {count:>8}");
    }
    println!("  {:<16} {:>8}", "total", store.total_entries());
}

fn print_report(report: &SimulationReport) {
    let stats = &report.stats;
    println!("Spins:          {}", report.spins);
    println!("Bet:            {:.2}", report.bet);
    println!("Initial:        {:.2}", report.initial_balance);
    println!("Final balance:  {:.2}", report.final_balance);
    println!("Net profit:     {:.2}", report.net_profit);
    println!("RTP:            {:.2}%", report.total_rtp * 100.0);
    println!("Hit rate:       {:.2}%", stats.hit_rate * 100.0);
    println!("Volatility:     {:.3}", stats.volatility);
    println!("Max drawdown:   {:.2}", stats.max_drawdown);
    println!("Average win:    {:.2} ({:.2}x)", stats.average_win, stats.average_multiplier);
    println!("Max win:        {:.2} ({:.2}x)", stats.max_win, stats.max_multiplier);
    println!("Big wins:       {}", stats.big_wins);
    println!("Mega wins:      {}", stats.mega_wins);
    println!("Buckets:");
    for (name, hits) in &stats.bucket_hits {
        println!("  {name:<16} {hits:>8}");
    }
}
