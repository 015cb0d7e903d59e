//! `squares` - CLI for the square collection
//!
//! This binary starts the interactive square manager and offers a few
//! non-interactive commands for scripting and configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use squares::cli::{Cli, Command, ConfigCommand, ListCommand};
use squares::{
    bootstrap, init_logging, Config, Renderer, SeedOutcome, Session, SquareStore, StdTerminal,
};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration, then let flags override it
    let mut config = Config::load_from(cli.config.clone()).context("loading configuration")?;
    cli.apply_overrides(&mut config);

    match cli.resolved_command() {
        Command::Run(_) => handle_run(&config).await,
        Command::List(cmd) => handle_list(&config, &cmd).await,
        Command::Seed => handle_seed(&config).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_run(config: &Config) -> anyhow::Result<ExitCode> {
    let renderer = Renderer::with_color(config.ui.color);
    println!("{}", renderer.banner());

    let store = match bootstrap::connect(config) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to connect to the database: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    let mut session = Session::new(store, StdTerminal::new(), renderer);
    if config.session.seed_on_empty {
        session.seed().await?;
    }
    session.run().await?;
    Ok(ExitCode::SUCCESS)
}

async fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<ExitCode> {
    let store = bootstrap::connect(config).context("Failed to connect to the database")?;
    let squares = store.list_all().await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&squares)?);
    } else {
        let renderer = Renderer::with_color(config.ui.color);
        for line in renderer.listing(&squares) {
            println!("{line}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_seed(config: &Config) -> anyhow::Result<ExitCode> {
    let store = bootstrap::connect(config).context("Failed to connect to the database")?;

    match bootstrap::seed_if_empty(&store).await? {
        SeedOutcome::Seeded(n) => println!("Inserted {n} sample squares."),
        SeedOutcome::AlreadyPopulated(n) => {
            println!("Collection already holds {n} squares; nothing inserted.");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<ExitCode> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:  {}", config.database_path().display());
                println!("  Collection:     {}", config.storage.collection);
                println!();
                println!("[Session]");
                println!("  Seed on empty:  {}", config.session.seed_on_empty);
                println!();
                println!("[UI]");
                println!("  Color:          {}", config.ui.color);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => {
                    println!("Configuration error: {e}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
