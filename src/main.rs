use anyhow::Result;
use clap::Parser;
use venmo_ledger::cli::Cli;
use venmo_ledger::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());
    cli.run().await
}
