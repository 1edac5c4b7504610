//! CLI command implementations

pub mod budget;
pub mod identity;
pub mod import;
pub mod logs;
pub mod review;
pub mod rules;
pub mod summary;
pub mod uploads;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use ritualfin_core::services::{LogEvent, LoggingService};
use ritualfin_core::{FixVar, Identity, RitualfinContext, RuleType};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    LoggingService::new(&data_dir, "cli", env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

pub fn log_command(logger: &Option<LoggingService>, command: &str) {
    if let Some(l) = logger {
        let _ = l.log_command(command);
    }
}

/// Get the data directory from environment or default
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("RITUALFIN_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".ritualfin"))
        .ok_or_else(|| anyhow!("Could not find home directory; set RITUALFIN_DIR"))
}

/// Open the data directory
pub fn get_context() -> Result<RitualfinContext> {
    let data_dir = get_data_dir()?;

    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    RitualfinContext::new(&data_dir).context("Failed to open RitualFin data directory")
}

/// Open the data directory and resolve the caller
pub fn authenticated(token: Option<&str>) -> Result<(RitualfinContext, Identity)> {
    let ctx = get_context()?;
    let identity = ctx.authenticate(token)?;
    Ok((ctx, identity))
}

/// `--type` values
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum TypeArg {
    Expense,
    Income,
}

impl From<TypeArg> for RuleType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Expense => RuleType::Expense,
            TypeArg::Income => RuleType::Income,
        }
    }
}

/// `--fix-var` values
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum FixVarArg {
    Fixed,
    Variable,
}

impl From<FixVarArg> for FixVar {
    fn from(value: FixVarArg) -> Self {
        match value {
            FixVarArg::Fixed => FixVar::Fixed,
            FixVarArg::Variable => FixVar::Variable,
        }
    }
}
