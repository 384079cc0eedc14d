use clap::Parser;
use dg_utxo_cli::cli::Cli;
use dg_utxo_cli::run_cli;
use simple_logger::SimpleLogger;
use std::io::Error;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    SimpleLogger::new().env().init().unwrap_or_default();
    run_cli(cli).await
}
