//! Statement file reading
//!
//! Turns uploaded CSV text into `RawRow`s and then into `PreparedRow`s:
//! - `header` picks the delimiter and finds the header line
//! - `row` splits lines and maps fields by header name
//! - `fields` parses dates and amounts and builds description keys

pub mod fields;
pub mod header;
pub mod row;

pub use fields::{
    build_key_desc, build_storage_key, normalize_description, parse_amount, parse_date,
    prepare_row,
};
pub use header::{detect_delimiter, detect_header, expected_columns, HeaderLayout};
pub use row::{parse_row, split_line, ColumnIndex};

use crate::domain::result::{Error, Result};
use crate::domain::RawRow;

const BOM: char = '\u{feff}';

/// Non-empty lines of `text`, with `\r\n` endings and a leading BOM removed
pub fn split_lines(text: &str) -> Vec<&str> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect()
}

/// A statement whose header has been validated
#[derive(Debug)]
pub struct Statement<'a> {
    lines: Vec<&'a str>,
    layout: HeaderLayout,
    index: ColumnIndex,
}

impl<'a> Statement<'a> {
    /// Split `text` into lines and validate the header.
    ///
    /// Fails with `EmptyInput` when there is nothing to read or only a
    /// header, and with `InvalidHeader` when required columns are missing.
    pub fn detect(text: &'a str) -> Result<Self> {
        let lines = split_lines(text);
        if lines.is_empty() {
            return Err(Error::EmptyInput);
        }

        let layout = detect_header(&lines)?;
        if lines.len() <= layout.data_start() {
            return Err(Error::EmptyInput);
        }

        let index = ColumnIndex::new(&layout.columns);
        Ok(Self {
            lines,
            layout,
            index,
        })
    }

    pub fn layout(&self) -> &HeaderLayout {
        &self.layout
    }

    /// Expected number of data rows
    pub fn data_line_count(&self) -> usize {
        self.lines.len() - self.layout.data_start()
    }

    /// Data rows with their 1-based line number among the non-empty lines
    pub fn rows(&self) -> impl Iterator<Item = (usize, RawRow)> + '_ {
        let start = self.layout.data_start();
        self.lines[start..]
            .iter()
            .enumerate()
            .map(move |(offset, line)| {
                let line_number = start + offset + 1;
                let fields = split_line(line, self.layout.delimiter);
                (line_number, parse_row(line_number, &fields, &self.index))
            })
    }
}
