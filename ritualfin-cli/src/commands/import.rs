//! Import command - import a statement CSV

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use super::{authenticated, log_event};
use crate::output;
use ritualfin_core::services::{LogEvent, LoggingService};
use ritualfin_core::UploadStatus;

pub fn run(
    file: &Path,
    filename: Option<String>,
    token: Option<&str>,
    json: bool,
    logger: &Option<LoggingService>,
) -> Result<()> {
    let (ctx, identity) = authenticated(token)?;

    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {:?}", file))?;
    let filename = filename.unwrap_or_else(|| {
        file.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "statement.csv".to_string())
    });

    let summary = match ctx.import_service.import_bytes(&identity, &filename, &bytes) {
        Ok(summary) => {
            log_event(logger, LogEvent::new("import_completed").with_command("import"));
            summary
        }
        Err(e) => {
            log_event(
                logger,
                LogEvent::new("import_failed")
                    .with_command("import")
                    .with_error(e.kind(), e.to_string()),
            );
            return Err(e.into());
        }
    };

    if json {
        return output::json_ok(&summary);
    }

    match summary.status {
        UploadStatus::Duplicate => output::warning("Nothing new: every row was already imported"),
        _ => output::success("Import complete"),
    }
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Upload", &summary.upload_id.to_string()]);
    table.add_row(vec!["Status", summary.status.as_str()]);
    table.add_row(vec!["Rows", &summary.rows_total.to_string()]);
    table.add_row(vec!["Imported", &summary.rows_imported.to_string()]);
    table.add_row(vec!["Skipped", &summary.rows_skipped.to_string()]);
    println!("{}", table);

    if summary.needs_review > 0 {
        println!();
        println!(
            "{} transaction(s) need review. Run {}",
            summary.needs_review.to_string().yellow(),
            "rf review list".bold()
        );
    }

    Ok(())
}
