// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use keel::types::UserId;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "keel")]
#[command(about = "Deploy containerized services behind a reverse proxy")]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only final results
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: keel.yml in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// User performing the operation (default: `actor` from the config)
    #[arg(long, global = true)]
    pub actor: Option<UserId>,

    #[command(subcommand)]
    pub command: Commands,
}

/// A service given by id or as `project/slug`.
#[derive(Args)]
pub struct ServiceArg {
    pub service: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new keel.yml configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Create or update a project and its services from a manifest
    Apply {
        /// Manifest file
        file: PathBuf,
    },

    /// Deploy the service's configured image and wait for the outcome
    Deploy(ServiceArg),

    /// Start a stopped service
    Start(ServiceArg),

    /// Stop a running service
    Stop(ServiceArg),

    /// Restart a service
    Restart(ServiceArg),

    /// Show recent log output
    Logs {
        #[command(flatten)]
        target: ServiceArg,

        /// Number of lines to show from the end of the logs
        #[arg(short = 'n', long)]
        tail: Option<String>,

        /// Show logs since timestamp (e.g. 2024-01-01T00:00:00Z) or relative (e.g. 10m)
        #[arg(long)]
        since: Option<String>,
    },

    /// Stop and remove the service's workload
    Destroy(ServiceArg),

    /// Show service status and the latest deployment
    Status(ServiceArg),

    /// Set the desired replica count
    Scale {
        #[command(flatten)]
        target: ServiceArg,

        replicas: u32,
    },

    /// List past deployments, newest first
    History {
        #[command(flatten)]
        target: ServiceArg,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Print the proxy labels the service's workload would carry
    Labels(ServiceArg),

    /// Fail interrupted deployments and repair services stuck deploying
    Reconcile,

    /// Encrypt or decrypt a value with the configured key
    Secret {
        #[command(subcommand)]
        action: SecretAction,
    },
}

#[derive(Subcommand)]
pub enum SecretAction {
    /// Encrypt a value and print it as base64
    Encrypt { value: String },

    /// Decrypt a base64 value produced by `encrypt`
    Decrypt { value: String },
}
