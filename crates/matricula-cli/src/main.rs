//! Matricula CLI - Command-line interface for enrollment records
//!
//! Provides commands for:
//! - Registering enrollments and editing their fields
//! - Changing status with a guaranteed history trail
//! - Inspecting records and verifying history trails
//! - Working the reconciliation queue
//! - Viewing and editing configuration

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use matricula_core::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

mod commands;
mod context;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, enroll::EnrollCommand,
    history::HistoryCommand, list::ListCommand, reconcile::ReconcileCommand,
    render_error, set_status::SetStatusCommand, show::ShowCommand, update::UpdateCommand,
};
use context::{load_config, AppContext, LoadedConfig};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(name = "matricula", version, about = "Enrollment records with an auditable status history")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use alternate database file (overrides database.path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Register a student in a course
    Enroll(EnrollCommand),
    /// Change an enrollment's status
    SetStatus(SetStatusCommand),
    /// Edit progress, notes or completion date
    Update(UpdateCommand),
    /// Show one enrollment
    Show(ShowCommand),
    /// List enrollments
    List(ListCommand),
    /// Show an enrollment's status history
    History(HistoryCommand),
    /// Work the reconciliation queue
    #[command(subcommand)]
    Reconcile(ReconcileCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Installs the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level; each `-v` raises it one step.
/// Logs go to stderr so `--json` output on stdout stays parseable.
fn init_tracing(logging: &LoggingConfig, verbose: u8) {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn run(cli: &Cli, loaded: &LoadedConfig, format: OutputFormat) -> Result<()> {
    match &cli.command {
        Commands::Config(cmd) => return cmd.execute(loaded, format).await,
        Commands::Completions(cmd) => return cmd.execute(),
        _ => {}
    }

    let ctx = AppContext::open(loaded, cli.database.as_deref()).await?;
    let result = match &cli.command {
        Commands::Enroll(cmd) => cmd.execute(&ctx, format).await,
        Commands::SetStatus(cmd) => cmd.execute(&ctx, format).await,
        Commands::Update(cmd) => cmd.execute(&ctx, format).await,
        Commands::Show(cmd) => cmd.execute(&ctx, format).await,
        Commands::List(cmd) => cmd.execute(&ctx, format).await,
        Commands::History(cmd) => cmd.execute(&ctx, format).await,
        Commands::Reconcile(cmd) => cmd.execute(&ctx, format).await,
        Commands::Config(_) | Commands::Completions(_) => Ok(()),
    };
    ctx.close().await;
    result
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let formatter = get_formatter(format);

    let loaded = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            formatter.error(&format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&loaded.config.logging, cli.verbose);

    match run(&cli, &loaded, format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            render_error(format, formatter.as_ref(), &e);
            ExitCode::FAILURE
        }
    }
}
