//! Delimiter and header detection

use tracing::debug;

use super::row::{normalize_duplicate_columns, split_line};
use crate::domain::result::{Error, Result};

pub const AUTHORISED_ON: &str = "Authorised on";
pub const PROCESSED_ON: &str = "Processed on";
pub const AMOUNT: &str = "Amount";
pub const CURRENCY: &str = "Currency";
pub const DESCRIPTION: &str = "Description";
pub const PAYMENT_TYPE: &str = "Payment type";
pub const STATUS: &str = "Status";
pub const FOREIGN_AMOUNT: &str = "Amount in foreign currency";
pub const FOREIGN_CURRENCY: &str = "Currency (foreign)";
pub const EXCHANGE_RATE: &str = "Exchange rate";

pub const REQUIRED_COLUMNS: [&str; 7] = [
    AUTHORISED_ON,
    PROCESSED_ON,
    AMOUNT,
    CURRENCY,
    DESCRIPTION,
    PAYMENT_TYPE,
    STATUS,
];

pub const OPTIONAL_COLUMNS: [&str; 3] = [FOREIGN_AMOUNT, FOREIGN_CURRENCY, EXCHANGE_RATE];

/// Required followed by optional column names
pub fn expected_columns() -> Vec<String> {
    REQUIRED_COLUMNS
        .iter()
        .chain(OPTIONAL_COLUMNS.iter())
        .map(|c| c.to_string())
        .collect()
}

/// Pick `;` when it is strictly more frequent than `,`, else `,`
pub fn detect_delimiter(line: &str) -> u8 {
    let commas = line.matches(',').count();
    let semicolons = line.matches(';').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Where the header sits and what it contains
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderLayout {
    pub delimiter: u8,
    /// Index into the non-empty lines
    pub header_line: usize,
    /// Header names after duplicate disambiguation
    pub columns: Vec<String>,
}

impl HeaderLayout {
    /// Index of the first data line
    pub fn data_start(&self) -> usize {
        self.header_line + 1
    }
}

fn has_required_column(line: &str, delimiter: u8) -> bool {
    split_line(line, delimiter)
        .iter()
        .any(|field| REQUIRED_COLUMNS.contains(&field.trim()))
}

/// Locate the header among the first two non-empty lines.
///
/// The delimiter is chosen from the first line. If that line carries no
/// required column but the second does, the first is treated as a title.
pub fn detect_header(lines: &[&str]) -> Result<HeaderLayout> {
    let first = lines.first().ok_or(Error::EmptyInput)?;
    let delimiter = detect_delimiter(first);

    let mut header_line = 0;
    if !has_required_column(first, delimiter) {
        if let Some(second) = lines.get(1) {
            if has_required_column(second, delimiter) {
                debug!("Detected title line, using line 2 as header");
                header_line = 1;
            }
        }
    }

    let raw = split_line(lines[header_line], delimiter);
    let columns = normalize_duplicate_columns(&raw);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|required| !columns.iter().any(|c| c == *required))
        .map(|c| c.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(Error::InvalidHeader {
            missing,
            expected: expected_columns(),
        });
    }

    debug!(
        delimiter = %(delimiter as char),
        header_line,
        columns = columns.len(),
        "Parsed header"
    );

    Ok(HeaderLayout {
        delimiter,
        header_line,
        columns,
    })
}
