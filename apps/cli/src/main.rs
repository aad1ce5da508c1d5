//! Researcher CLI: ask a local model, optionally grounded in web search.
//!
//! Forwards questions to an Ollama model and, when web search is enabled,
//! feeds it fresh DuckDuckGo results first.

mod chat;
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
