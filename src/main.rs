use clap::Parser;
use journal_lib::cli::{self, Cli, Command};
use journal_lib::config::Config;
use journal_lib::logging::setup_logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from(cli.config);
    setup_logging(config.log_level)?;
    cli::run(config, cli.command.unwrap_or(Command::Serve)).await
}
