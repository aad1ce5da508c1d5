//! Researcher TUI: single-page chat with a local model.
//!
//! A text input, a web search toggle, and the conversation so far, built
//! with `ratatui` + `crossterm`.

mod app;
mod screens;
mod widgets;

use color_eyre::eyre::Result;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    app::init_tracing();
    app::run().await
}
