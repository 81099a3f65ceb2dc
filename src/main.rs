// ABOUTME: Entry point for the keel CLI application.
// ABOUTME: Parses arguments, loads configuration, and dispatches to command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Context;
use keel::config::{self, Config};
use keel::crypto::SecretCodec;
use keel::error::Result;
use keel::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    if let Err(e) = run(cli, mode).await {
        Output::new(mode).error(&e.to_string());
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool, configured: &str) {
    // --verbose wins over RUST_LOG, which wins over the config file.
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::discover(&env::current_dir()?),
    }
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    if let Commands::Init { force } = cli.command {
        init_tracing(cli.verbose, "warn");
        let path = config::init_config(&env::current_dir()?, force)?;
        Output::new(mode).success(&format!("Created {}", path.display()));
        return Ok(());
    }

    let config = load_config(&cli)?;
    init_tracing(cli.verbose, &config.log_level);
    let output = Output::new(mode);

    if let Commands::Secret { action } = cli.command {
        let codec = SecretCodec::new(&config.encryption.resolve_key()?)?;
        return commands::secret(&codec, action, &output);
    }

    let mut ctx = Context::load(config, cli.actor, output)?;
    match cli.command {
        Commands::Apply { file } => commands::apply(&ctx, &file).await,
        Commands::Deploy(target) => commands::deploy(&mut ctx, &target.service).await,
        Commands::Start(target) => commands::start(&mut ctx, &target.service).await,
        Commands::Stop(target) => commands::stop(&mut ctx, &target.service).await,
        Commands::Restart(target) => commands::restart(&mut ctx, &target.service).await,
        Commands::Destroy(target) => commands::destroy(&mut ctx, &target.service).await,
        Commands::Scale { target, replicas } => {
            commands::scale(&mut ctx, &target.service, replicas).await
        }
        Commands::Logs {
            target,
            tail,
            since,
        } => commands::logs(&ctx, &target.service, tail.as_deref(), since.as_deref()).await,
        Commands::Status(target) => commands::status(&ctx, &target.service).await,
        Commands::History { target, limit } => {
            commands::history(&ctx, &target.service, limit).await
        }
        Commands::Labels(target) => commands::labels(&ctx, &target.service).await,
        Commands::Reconcile => commands::reconcile(&ctx).await,
        Commands::Init { .. } | Commands::Secret { .. } => Ok(()),
    }
}
