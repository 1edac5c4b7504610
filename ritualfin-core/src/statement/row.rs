//! Row parsing: quoted/delimited line splitting and mapping onto named fields

use std::collections::HashMap;

use tracing::debug;

use super::fields::parse_amount;
use super::header::{
    AMOUNT, AUTHORISED_ON, CURRENCY, DESCRIPTION, EXCHANGE_RATE, FOREIGN_AMOUNT,
    FOREIGN_CURRENCY, PAYMENT_TYPE, PROCESSED_ON, STATUS,
};
use crate::domain::RawRow;

/// Secondary column that some exports swap with `Status`
pub const SUBJECT: &str = "Assunto";

/// Status values the statement format uses
pub const KNOWN_STATUSES: [&str; 4] = ["Authorised", "Processed", "Declined", "Cancelled"];

/// Split one line into fields.
///
/// Every `"` toggles quoting wherever it appears in a field, `""` inside
/// quotes is a literal quote, and the delimiter only splits outside quotes.
/// A line always yields at least one field.
pub fn split_line(line: &str, delimiter: u8) -> Vec<String> {
    let delimiter = char::from(delimiter);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            c if c == delimiter && !in_quotes => fields.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Trim header names and disambiguate repeats.
///
/// A second `Currency` column is the foreign currency; any other repeat gets
/// a numeric suffix, e.g. `Status (1)`.
pub fn normalize_duplicate_columns(columns: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    columns
        .iter()
        .map(|column| {
            let trimmed = column.trim().to_string();
            let count = seen.entry(trimmed.clone()).or_insert(0);
            let occurrence = *count;
            *count += 1;

            match occurrence {
                0 => trimmed,
                1 if trimmed == CURRENCY => FOREIGN_CURRENCY.to_string(),
                n => format!("{} ({})", trimmed, n),
            }
        })
        .collect()
}

/// Header name to column position, built once per batch
#[derive(Debug, Clone)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new(columns: &[String]) -> Self {
        let mut positions = HashMap::new();
        for (index, column) in columns.iter().enumerate() {
            positions.entry(column.clone()).or_insert(index);
        }
        Self { positions }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    /// Value of `column` in `fields`; absent columns and short rows give ""
    pub fn value<'a>(&self, fields: &'a [String], column: &str) -> &'a str {
        self.positions
            .get(column)
            .and_then(|&index| fields.get(index))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn optional(&self, fields: &[String], column: &str) -> Option<String> {
        Some(self.value(fields, column))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Undo the Status/Subject column swap.
///
/// Returns the (status, subject) pair and whether a swap happened.
pub fn repair_status<'a>(status: &'a str, subject: &'a str) -> (&'a str, &'a str, bool) {
    let known = |value: &str| KNOWN_STATUSES.contains(&value);
    if !status.is_empty() && !known(status) && known(subject) {
        (subject, status, true)
    } else {
        (status, subject, false)
    }
}

/// Map one line's fields onto a `RawRow`
pub fn parse_row(line: usize, fields: &[String], index: &ColumnIndex) -> RawRow {
    let (status, _subject, swapped) =
        repair_status(index.value(fields, STATUS), index.value(fields, SUBJECT));
    if swapped {
        debug!(line, "Swapped Status/Assunto detected, repairing");
    }

    RawRow {
        authorised_on: index.value(fields, AUTHORISED_ON).to_string(),
        processed_on: index.optional(fields, PROCESSED_ON),
        amount: index.value(fields, AMOUNT).to_string(),
        currency: index.value(fields, CURRENCY).to_string(),
        description: index.value(fields, DESCRIPTION).to_string(),
        payment_type: index.value(fields, PAYMENT_TYPE).to_string(),
        status: status.to_string(),
        foreign_amount: index.optional(fields, FOREIGN_AMOUNT),
        foreign_currency: index.optional(fields, FOREIGN_CURRENCY),
        exchange_rate: index
            .optional(fields, EXCHANGE_RATE)
            .and_then(|rate| parse_amount(&rate)),
    }
}
