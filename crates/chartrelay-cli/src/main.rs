//! chartrelay CLI - release pipeline for multi-chart Helm repositories

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod display;
mod error;
mod exit_codes;
mod logging;

use commands::{ChangeArgs, Context};
use error::CliError;

#[derive(Parser)]
#[command(name = "chartrelay")]
#[command(author = "chartrelay contributors")]
#[command(version)]
#[command(about = "Release pipeline for multi-chart Helm repositories", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file, relative to the repository root
    #[arg(short, long, global = true, default_value = "chartrelay.yaml")]
    config: PathBuf,

    /// Repository root
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Exit with an error when any chart failed
    #[arg(long, global = true)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List charts affected by a diff
    Detect {
        #[command(flatten)]
        changes: ChangeArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Package changed charts and create their releases
    Publish {
        #[command(flatten)]
        changes: ChangeArgs,
    },

    /// Rebuild chart indexes from release history
    Index {
        /// Commit the generated files
        #[arg(long)]
        commit: bool,
    },

    /// Push packages of changed charts to the OCI registry
    Oci {
        #[command(flatten)]
        changes: ChangeArgs,
    },

    /// Persist files in one signed commit
    Commit {
        /// Files to commit, relative to the repository root
        files: Vec<PathBuf>,

        /// Target branch (default: repository.branch)
        #[arg(short, long)]
        branch: Option<String>,

        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Detect, delete, publish, index, mirror and commit
    Run {
        #[command(flatten)]
        changes: ChangeArgs,
    },

    /// Read configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a setting by dotted path, e.g. `oci.registry`
    Get { key: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    miette::set_panic_hook();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(exit_codes::USAGE_ERROR)
            } else {
                ExitCode::from(exit_codes::SUCCESS)
            };
        }
    };

    logging::init_logging(cli.debug);

    match execute(&cli).await {
        Ok(failed) if failed > 0 && cli.strict => report(CliError::ItemsFailed { failed }),
        Ok(_) => ExitCode::from(exit_codes::SUCCESS),
        Err(e) => report(e),
    }
}

/// Run the selected command; returns the number of failed items
async fn execute(cli: &Cli) -> error::Result<usize> {
    let ctx = Context::new(&cli.root, &cli.config);

    match &cli.command {
        Commands::Detect { changes, json } => commands::detect::run(&ctx, changes, *json).await,
        Commands::Publish { changes } => commands::publish::run(&ctx, changes).await,
        Commands::Index { commit } => commands::index::run(&ctx, *commit).await,
        Commands::Oci { changes } => commands::oci::run(&ctx, changes).await,
        Commands::Commit {
            files,
            branch,
            message,
        } => commands::commit::run(&ctx, files, branch.as_deref(), message.as_deref()).await,
        Commands::Run { changes } => commands::run::run(&ctx, changes).await,
        Commands::Config {
            command: ConfigCommands::Get { key },
        } => commands::config::get(&ctx, key),
    }
}

fn report(err: CliError) -> ExitCode {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    ExitCode::from(code)
}
