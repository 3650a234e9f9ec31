use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use twentyq_core::AppInfo;
use twentyq_core::catalog::KnowledgeBase;
use twentyq_core::game::{GameConfig, GameEngine};
use twentyq_core::implication::ImplicationEngine;

use crate::console::Console;
use crate::controller::{SessionController, write_stats};

const MAX_QUESTIONS_CAP: usize = 200;

/// Terminal twenty-questions game over a learning catalog.
#[derive(Debug, Parser)]
#[command(name = "twentyq", author, version, about = "Animal, vegetable, or mineral?")]
pub struct Cli {
    /// Directory holding entities.json, attributes.json and learned.json.
    #[arg(long, value_name = "DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Override the question budget (1-200).
    #[arg(long, value_name = "N", global = true)]
    pub max_questions: Option<usize>,

    /// Show entropy, confidence and the leading candidates after every answer.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log engine internals to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Play games until you quit (default).
    Play,
    /// Print catalog and learning statistics.
    Stats {
        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

/// Compact stderr logging; `RUST_LOG` wins over `--verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .compact()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = GameConfig::from_env();
    if let Some(max) = cli.max_questions {
        config.max_questions = max.clamp(1, MAX_QUESTIONS_CAP);
    }

    let catalog = KnowledgeBase::open(&cli.data_dir);
    info!(
        data_dir = %cli.data_dir.display(),
        entities = catalog.entity_count(),
        attributes = catalog.attribute_count(),
        "catalog opened"
    );

    match cli.command.unwrap_or(Command::Play) {
        Command::Play => {
            if catalog.entity_count() == 0 {
                warn!(data_dir = %cli.data_dir.display(), "catalog is empty");
            }
            let engine = GameEngine::new(catalog, ImplicationEngine::default(), config);
            let stdin = io::stdin();
            let mut console = Console::new(stdin.lock(), io::stdout());
            console
                .say(format!("{} {} ({})", AppInfo::name(), AppInfo::version(), AppInfo::codename()))
                .context("writing to stdout")?;
            SessionController::new(engine, cli.debug)
                .run(&mut console)
                .context("running interactive session")?;
        }
        Command::Stats { json } => {
            let stats = catalog.stats();
            let stdout = io::stdout();
            let mut out = stdout.lock();
            if json {
                serde_json::to_writer_pretty(&mut out, &stats).context("serializing stats")?;
                writeln!(out)?;
            } else {
                write_stats(&mut out, &stats)?;
            }
        }
    }
    Ok(())
}
