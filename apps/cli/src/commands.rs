//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use researcher_core::{PipelineProgress, ResponsePipeline};
use researcher_shared::{
    AppConfig, Exchange, init_config, load_config, load_config_from, validate_config,
};
use tracing::info;

use crate::chat::{self, ChatInput};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Researcher: chat with a local model, optionally grounded in web search.
#[derive(Parser)]
#[command(
    name = "researcher",
    version,
    about = "Ask a local Ollama model questions, optionally enriched with live web search results.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.researcher/researcher.toml.
    #[arg(long, global = true, env = "RESEARCHER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask a single question and print the answer.
    Ask {
        /// The question (multiple words are joined with spaces).
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Enrich the prompt with web search results.
        #[arg(short, long)]
        web: bool,

        /// Model to use instead of the configured one.
        #[arg(short, long)]
        model: Option<String>,

        /// Print the answer and its sources as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive chat session.
    Chat {
        /// Start with web search enabled (toggle with /web).
        #[arg(short, long)]
        web: bool,

        /// Model to use instead of the configured one.
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so answers on
/// stdout stay pipeable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "researcher=warn",
        1 => "researcher=info",
        2 => "researcher=debug",
        _ => "researcher=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Ask {
            query,
            web,
            model,
            json,
        } => {
            let config = resolve_config(config_path.as_deref(), model)?;
            cmd_ask(&config, &query.join(" "), web, json).await
        }
        Command::Chat { web, model } => {
            let config = resolve_config(config_path.as_deref(), model)?;
            cmd_chat(&config, web).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path.as_deref()).await,
        },
    }
}

/// Load config (explicit path or default location), apply the env and
/// `--model` overrides, and validate.
fn resolve_config(path: Option<&std::path::Path>, model: Option<String>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => {
            let mut config = load_config_from(p)?;
            config.apply_env_overrides();
            config
        }
        None => load_config()?,
    };

    if let Some(model) = model {
        config.inference.model = model;
    }

    validate_config(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(config: &AppConfig, query: &str, web: bool, json: bool) -> Result<()> {
    let pipeline = ResponsePipeline::from_app_config(config)?;

    info!(
        model = %config.inference.model,
        web,
        "asking"
    );

    let reporter = CliProgress::new();
    let result = pipeline.respond(query, web, &[], &reporter).await;
    reporter.finish();
    let output = result?;

    if json {
        let value = serde_json::json!({
            "query": query,
            "response": output.response,
            "web": web,
            "sources": output.sources,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", output.response);
    if !output.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &output.sources {
            match &source.href {
                Some(href) => println!("  - {} <{href}>", source.title),
                None => println!("  - {}", source.title),
            }
        }
    }

    Ok(())
}

async fn cmd_chat(config: &AppConfig, web: bool) -> Result<()> {
    use std::io::Write;
    use tokio::io::{AsyncBufReadExt, BufReader};

    let pipeline = ResponsePipeline::from_app_config(config)?;
    let mut history: Vec<Exchange> = Vec::new();
    let mut web = web;

    println!(
        "Researcher chat · model {} · web search {}",
        config.inference.model,
        chat::on_off(web)
    );
    println!("Type /help for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match chat::parse_input(&line) {
            ChatInput::Empty => continue,
            ChatInput::Quit => break,
            ChatInput::Help => println!("{}", chat::HELP),
            ChatInput::ToggleWeb => {
                web = !web;
                println!("Web search {}", chat::on_off(web));
            }
            ChatInput::Clear => {
                history.clear();
                println!("Chat cleared.");
            }
            ChatInput::History => {
                if history.is_empty() {
                    println!("(no messages yet)");
                }
                for exchange in &history {
                    println!("You: {}", exchange.query);
                    println!("AI:  {}", exchange.response);
                }
            }
            ChatInput::Unknown(cmd) => println!("Unknown command '{cmd}'. Type /help."),
            ChatInput::Query(query) => {
                let reporter = CliProgress::new();
                let result = pipeline.respond(&query, web, &history, &reporter).await;
                reporter.finish();

                match result {
                    Ok(output) => {
                        println!("AI:  {}", output.response);
                        history.push(Exchange::new(query, output.response));
                    }
                    Err(e) => println!("Sorry, there was an error generating a response: {e}"),
                }
            }
        }
    }

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&std::path::Path>) -> Result<()> {
    let config = resolve_config(path, None)
        .map_err(|e| eyre!("failed to resolve configuration: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .expect("spinner template")
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl PipelineProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }
}
