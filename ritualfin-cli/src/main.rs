//! RitualFin CLI - Statement import and review in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{budget, identity, import, logs, review, rules, summary, uploads};
use ritualfin_core::OperationResult;

/// RitualFin - statement import and categorization
#[derive(Parser)]
#[command(name = "rf", version, about, long_about = None)]
struct Cli {
    /// Access token of the calling user
    #[arg(long, global = true, env = "RITUALFIN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a Miles & More statement CSV
    Import {
        /// Path to CSV file
        file: PathBuf,
        /// Name recorded on the upload (defaults to the file name)
        #[arg(long)]
        filename: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage categorization rules
    Rules {
        #[command(subcommand)]
        command: rules::RulesCommands,
    },

    /// Review and confirm flagged transactions
    Review {
        #[command(subcommand)]
        command: review::ReviewCommands,
    },

    /// List uploads, newest first
    Uploads {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show spending figures for a month
    Summary {
        /// Month as YYYY-MM
        #[arg(long)]
        month: String,
        /// Only count transactions with this statement status
        #[arg(long)]
        status: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage monthly category budgets
    Budget {
        #[command(subcommand)]
        command: budget::BudgetCommands,
    },

    /// Manage access tokens
    Identity {
        #[command(subcommand)]
        command: identity::IdentityCommands,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Import { .. } => "import",
            Commands::Rules { .. } => "rules",
            Commands::Review { .. } => "review",
            Commands::Uploads { .. } => "uploads",
            Commands::Summary { .. } => "summary",
            Commands::Budget { .. } => "budget",
            Commands::Identity { .. } => "identity",
            Commands::Logs { .. } => "logs",
        }
    }

    fn json(&self) -> bool {
        match self {
            Commands::Import { json, .. }
            | Commands::Uploads { json }
            | Commands::Summary { json, .. } => *json,
            Commands::Rules { command } => command.json(),
            Commands::Review { command } => command.json(),
            Commands::Budget { command } => command.json(),
            Commands::Identity { .. } => false,
            Commands::Logs { command } => command.json(),
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RITUALFIN_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json = cli.command.json();

    let logger = commands::get_logger();
    commands::log_command(&logger, cli.command.name());

    match run(cli, &logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, json);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, logger: &Option<ritualfin_core::services::LoggingService>) -> Result<()> {
    let token = cli.token.as_deref();
    match cli.command {
        Commands::Import {
            file,
            filename,
            json,
        } => import::run(&file, filename, token, json, logger),
        Commands::Rules { command } => rules::run(command, token),
        Commands::Review { command } => review::run(command, token),
        Commands::Uploads { json } => uploads::run(token, json),
        Commands::Summary {
            month,
            status,
            json,
        } => summary::run(&month, status.as_deref(), token, json),
        Commands::Budget { command } => budget::run(command, token),
        Commands::Identity { command } => identity::run(command),
        Commands::Logs { command } => logs::run(command),
    }
}

fn report_error(error: &anyhow::Error, json: bool) {
    let core_error = error.downcast_ref::<ritualfin_core::Error>();

    if json {
        let envelope: OperationResult<()> = match core_error {
            Some(e) => OperationResult::from_error(e),
            None => OperationResult::fail(format!("{:#}", error)),
        };
        match serde_json::to_string_pretty(&envelope) {
            Ok(body) => println!("{}", body),
            Err(_) => output::error(&format!("{:#}", error)),
        }
        return;
    }

    output::error(&format!("{:#}", error));
    if let Some(e) = core_error {
        output::error_details(e);
    }
}
