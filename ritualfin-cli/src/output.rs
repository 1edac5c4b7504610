//! Output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use rust_decimal::Decimal;
use serde::Serialize;

use ritualfin_core::{Error, OperationResult};

/// Print a success message
pub fn success(msg: &str) {
    println!("{}", msg.green());
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

/// Print a warning message
pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Print an info message
pub fn info(msg: &str) {
    println!("{}", msg.cyan());
}

/// Structured parts of a core error (missing columns, row errors)
pub fn error_details(err: &Error) {
    match err {
        Error::InvalidHeader { missing, expected } => {
            eprintln!("  Missing: {}", missing.join(", "));
            eprintln!("  Expected: {}", expected.join(", "));
        }
        Error::RowValidation { upload_id, errors } => {
            eprintln!("  Upload: {}", upload_id);
            for line in errors {
                eprintln!("  {}", line);
            }
        }
        _ => {}
    }
}

/// Print a successful `OperationResult` envelope
pub fn json_ok<T: Serialize>(data: T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
    Ok(())
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Two decimal places, as shown on statements
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}
