//! `surveyform` - CLI for the survey form
//!
//! Runs the web form, submits entries from the terminal and inspects the
//! stored answers and the active configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use surveyform::cli::{
    render_answers, Cli, Command, ConfigCommand, ListCommand, ServeCommand, SubmitCommand,
};
use surveyform::server::{self, AppState};
use surveyform::{init_logging, store, Config, FormCollector, FormInput, Recorder, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config_path = cli.config;
    match cli.command {
        Command::Serve(cmd) => handle_serve(&load_config(config_path)?, &cmd).await,
        Command::Submit(cmd) => handle_submit(&load_config(config_path)?, cmd).await,
        Command::List(cmd) => handle_list(&load_config(config_path)?, &cmd).await,
        Command::Config(cmd) => handle_config(config_path, cmd),
    }
}

fn load_config(config_path: Option<PathBuf>) -> anyhow::Result<Config> {
    Config::load_from(config_path).context("could not load configuration")
}

fn collector(config: &Config) -> anyhow::Result<FormCollector> {
    let store = store::from_config(config).context("could not set up the answer store")?;
    tracing::debug!(backend = store.name(), location = %store.location(), "Store ready");
    Ok(FormCollector::new(Recorder::new(
        store,
        RetryPolicy::from_config(config),
    )))
}

async fn handle_serve(config: &Config, cmd: &ServeCommand) -> anyhow::Result<()> {
    let collector = collector(config)?;
    let bind = cmd.bind.unwrap_or(config.server.bind);
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("could not listen on {bind}"))?;

    let location = collector.recorder().store().location();
    println!("Serving {} -> {location}", config.server.title);
    if let Ok(addr) = listener.local_addr() {
        println!("Open http://{addr}/ in a browser.");
    }

    let state = AppState::new(collector, config.server.title.as_str());
    server::serve(listener, state).await?;
    Ok(())
}

async fn handle_submit(config: &Config, cmd: SubmitCommand) -> anyhow::Result<()> {
    let input = FormInput::from(cmd);
    // Reject empty answers before the store is built or contacted.
    input.validate()?;

    let collector = collector(config)?;
    let outcome = collector.submit(input).await?;
    println!(
        "Submission stored ({} rows, {} attempt{}).",
        outcome.rows,
        outcome.attempts,
        if outcome.attempts == 1 { "" } else { "s" }
    );
    Ok(())
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let collector = collector(config)?;
    let table = collector.list().await?;
    print!("{}", render_answers(&table, cmd.format)?);
    Ok(())
}

fn handle_config(config_path: Option<PathBuf>, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = &load_config(config_path)?;
            if json {
                // The token is never serialized.
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let token = if config.store.token.is_empty() {
                    "unset"
                } else {
                    "set"
                };
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Store]");
                println!("  Backend:            {}", config.store.backend);
                println!("  Repository:         {}", config.store.repository);
                println!("  Branch:             {}", config.store.branch);
                println!("  Path:               {}", config.store.path);
                println!("  API URL:            {}", config.store.api_url);
                println!("  Token:              {token}");
                println!("  Commit message:     {}", config.store.commit_message);
                println!("  Timeout (s):        {}", config.store.timeout_secs);
                println!();
                println!("[Retry]");
                println!("  Max attempts:       {}", config.retry.max_attempts);
                println!("  Backoff (ms):       {}", config.retry.backoff_ms);
                println!();
                println!("[Server]");
                println!("  Bind:               {}", config.server.bind);
                println!("  Title:              {}", config.server.title);
            }
        }
        ConfigCommand::Path => {
            let path = config_path.unwrap_or_else(Config::default_config_path);
            println!("{}", path.display());
        }
        ConfigCommand::Validate { file } => {
            let path = file
                .or(config_path)
                .unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::validate_file(&path)
                .with_context(|| format!("{} is not a valid configuration", path.display()))?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
