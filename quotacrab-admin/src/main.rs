use anyhow::{Context, Result};
use clap::Parser;
use quotacrab::SqliteStore;

use quotacrab_admin::cli::Cli;
use quotacrab_admin::commands;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("quotacrab={}", cli.log_level).parse()?)
                .add_directive(format!("quotacrab_admin={}", cli.log_level).parse()?),
        )
        .init();

    let store = SqliteStore::open(&cli.db_path)
        .with_context(|| format!("Failed to open {}", cli.db_path.display()))?;

    let mut stdout = std::io::stdout().lock();
    commands::run(&store, cli.command, cli.default_limit, &mut stdout)
}
