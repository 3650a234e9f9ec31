use std::path::PathBuf;

use clap::Parser;

use twentyq_bench::config::{ResolvedOutputs, SimulationConfig};
use twentyq_bench::logging::init_logging;
use twentyq_bench::simulation::SimulationRunner;
use twentyq_bench::telemetry::{append_highlights_to_markdown, write_summary_outputs};

/// Simulated-player harness for the twenty-questions engine.
#[derive(Debug, Parser)]
#[command(
    name = "twentyq-bench",
    author,
    version,
    about = "Deterministic twenty-questions simulation harness"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the number of games to simulate.
    #[arg(long, value_name = "GAMES")]
    games: Option<usize>,

    /// Override the RNG seed for target selection.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Feed outcomes back into the catalog and save learned state.
    #[arg(long)]
    learn: bool,

    /// Exit after validating the configuration (no games are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = SimulationConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(games) = cli.games {
        config.games.count = games;
    }

    if let Some(seed) = cli.seed {
        config.games.seed = Some(seed);
    }

    if cli.learn {
        config.games.learn = true;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let games = config.games.count;
    let mode = if config.games.learn { "training" } else { "evaluation" };

    println!(
        "Loaded configuration '{run_id}' ({games} game{}, {mode}, catalog {})",
        if games == 1 { "" } else { "s" },
        config.catalog.data_dir.display()
    );

    let logging_guard = init_logging(&config.logging, &outputs)?;
    let runner = SimulationRunner::new(config, outputs.clone())?;
    println!(
        "Catalog: {} entities, {} attributes",
        runner.catalog().entity_count(),
        runner.catalog().attribute_count()
    );

    if cli.validate_only {
        println!("Validation-only mode: simulation skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Simulation complete for '{run_id}': {}/{} correct ({:.1}%, {:.0}% CI [{:.1}%, {:.1}%]), avg {:.2} questions → {} rows at {}",
        summary.correct,
        summary.games_played,
        summary.analytics.accuracy * 100.0,
        summary.analytics.confidence_level * 100.0,
        summary.analytics.accuracy_ci.0 * 100.0,
        summary.analytics.accuracy_ci.1 * 100.0,
        summary.analytics.avg_questions,
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());

    // Dropping the guard flushes the background writer before the log is read.
    if let Some(guard) = logging_guard {
        let telemetry_path = guard.telemetry_path.clone();
        drop(guard);
        println!("Telemetry log: {}", telemetry_path.display());
        if let Some(telemetry) = write_summary_outputs(&telemetry_path, &outputs.report_dir())? {
            append_highlights_to_markdown(&summary.summary_path, &telemetry)?;
            println!(
                "Telemetry summary (JSON): {}",
                telemetry.json_path.display()
            );
            println!(
                "  Game events: {} ({} correct), warnings: {}",
                telemetry.summary.games.count,
                telemetry.summary.games.correct,
                telemetry.summary.warnings
            );
        }
    }

    Ok(())
}
