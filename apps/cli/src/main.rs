//! PageDigest CLI: summarize a web page with an LLM.
//!
//! Fetches a page, splits its text into token-bounded chunks, extracts facts
//! from each chunk and asks the model for one ordered summary.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
