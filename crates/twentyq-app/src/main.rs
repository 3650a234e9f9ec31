use clap::Parser;

use twentyq_app::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli::init_tracing(cli.verbose);
    cli::run(cli)
}
