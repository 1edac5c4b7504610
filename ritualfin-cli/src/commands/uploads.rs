//! Uploads command - list statement uploads

use anyhow::Result;
use colored::Colorize;

use super::authenticated;
use crate::output;
use ritualfin_core::UploadStatus;

pub fn run(token: Option<&str>, json: bool) -> Result<()> {
    let (ctx, identity) = authenticated(token)?;
    let uploads = ctx.import_service.list_uploads(&identity)?;

    if json {
        return output::json_ok(&uploads);
    }
    if uploads.is_empty() {
        println!("No uploads yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Started", "File", "Status", "Rows", "Imported", "Error"]);
    for upload in &uploads {
        let status = match upload.status {
            UploadStatus::Ready => upload.status.as_str().green(),
            UploadStatus::Error => upload.status.as_str().red(),
            UploadStatus::Duplicate => upload.status.as_str().yellow(),
            UploadStatus::Processing => upload.status.as_str().normal(),
        };
        table.add_row(vec![
            upload.started_at.format("%Y-%m-%d %H:%M").to_string(),
            upload.filename.clone(),
            status.to_string(),
            upload.rows_total.to_string(),
            upload.rows_imported.to_string(),
            upload.error_message.clone().unwrap_or_default(),
        ]);
    }
    println!("{}", table);

    Ok(())
}
