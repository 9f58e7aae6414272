use clap::Parser;

use tracker_operator::cli::{self, Cli};
use tracker_operator::logger::init_logger;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = cli::load_and_merge_config(&cli)?;
    init_logger(&settings.logger)?;

    cli::execute_command(&cli, settings).await?;
    Ok(())
}
