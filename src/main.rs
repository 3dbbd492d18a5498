use anyhow::Result;
use clap::Parser;
use minibank::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    minibank::observability::init(cli.config.verbose, cli.config.log_json);
    cli.run().await
}
