//! Offline accelerated simulation.
//!
//! Runs `generations` evolution cycles back to back, each preceded by
//! `ticks` scheduler ticks, against the in-memory store. No timers are
//! involved, so a full run takes seconds.

use anyhow::{Context, Result};
use clap::Parser;
use evotrade::application::system::Application;
use evotrade::config::Config;
use evotrade::domain::agent::{Agent, AgentFilter};
use evotrade::domain::dna::StrategyKind;
use evotrade::infrastructure::InMemoryAgentStore;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(author, version, about = "Offline evolutionary trading simulation", long_about = None)]
struct Cli {
    /// Initial population size
    #[arg(short, long, default_value = "20")]
    agents: usize,

    /// Number of evolution cycles to run
    #[arg(short, long, default_value = "10")]
    generations: u32,

    /// Scheduler ticks per generation
    #[arg(short, long, default_value = "50")]
    ticks: usize,

    /// RNG seed; falls back to RNG_SEED, then to entropy
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print the best agent's DNA after every generation
    #[arg(long)]
    show_dna: bool,
}

fn best(agents: &[Agent]) -> Option<&Agent> {
    agents
        .iter()
        .max_by(|a, b| a.metrics.fitness_score.total_cmp(&b.metrics.fitness_score))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    if cli.agents == 0 {
        anyhow::bail!("--agents must be greater than zero");
    }

    let mut config = Config::from_env().context("Failed to load configuration")?;
    config.evolution.initial_population = cli.agents;
    config.observability.enabled = false;
    if cli.seed.is_some() {
        config.rng_seed = cli.seed;
    }

    let app = Application::with_store(config, Arc::new(InMemoryAgentStore::new())).await?;
    app.population_manager
        .seed_population(cli.agents)
        .await
        .context("Failed to seed population")?;

    info!(
        "Simulating {} generations x {} ticks with {} agents",
        cli.generations, cli.ticks, cli.agents
    );
    println!(
        "{:>4} {:>5} {:>9} {:>9} {:>12} {:>9} {:>9} {:>7}",
        "gen", "pop", "avg_fit", "best_fit", "profit_usd", "momentum", "mean_rev", "errors"
    );

    for _ in 0..cli.generations {
        let mut errors = 0;
        for _ in 0..cli.ticks {
            let report = app.scheduler.run_tick().await?;
            errors += report.errored.len();
        }

        let live = app.store.list_agents(&AgentFilter::evolvable()).await?;
        let generation = app
            .store
            .get_active_generation()
            .await?
            .map(|g| g.index)
            .unwrap_or_default();
        let average = if live.is_empty() {
            0.0
        } else {
            live.iter().map(|a| a.metrics.fitness_score).sum::<f64>() / live.len() as f64
        };
        let kind_count =
            |kind: StrategyKind| live.iter().filter(|a| a.dna.strategy_kind == kind).count();

        println!(
            "{:>4} {:>5} {:>9.2} {:>9.2} {:>12.2} {:>9} {:>9} {:>7}",
            generation,
            live.len(),
            average,
            best(&live).map(|a| a.metrics.fitness_score).unwrap_or_default(),
            live.iter().map(|a| a.metrics.profit_period).sum::<f64>(),
            kind_count(StrategyKind::Momentum),
            kind_count(StrategyKind::MeanReversion),
            errors
        );
        if cli.show_dna
            && let Some(agent) = best(&live)
        {
            println!("     best {}: {:?}", agent.name, agent.dna);
        }

        let outcome = app.population_manager.run_cycle().await?;
        if outcome.is_noop() {
            println!("Population exhausted at generation {}", generation);
            break;
        }
    }

    let generations = app.store.list_generations().await?;
    println!("\nCompleted generations: {}", generations.len().saturating_sub(1));
    let final_population = app.store.list_agents(&AgentFilter::evolvable()).await?;
    if let Some(champion) = best(&final_population) {
        println!(
            "Current leader: {} (generation {}, fitness {:.2}, lifetime profit ${:.2})",
            champion.name,
            champion.generation_index,
            champion.metrics.fitness_score,
            champion.metrics.total_profit
        );
    }
    Ok(())
}
