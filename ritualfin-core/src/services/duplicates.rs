//! Duplicate detector - batch and same-month history checks
//!
//! Suspicion is keyed on the normalized description only. It never blocks
//! storage; re-import protection comes from the storage key.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{Datelike, Months, NaiveDate};
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::PreparedRow;
use crate::ports::Repository;

/// First and last day of the month containing `date`
pub fn month_range(date: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

/// Date range of a `YYYY-MM` month
pub fn parse_month(value: &str) -> Result<(NaiveDate, NaiveDate)> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d")
        .ok()
        .and_then(month_range)
        .ok_or_else(|| Error::validation(format!("invalid month '{}', expected YYYY-MM", value)))
}

/// Descriptions that occur more than once within the batch
pub fn batch_suspects(rows: &[PreparedRow]) -> HashSet<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in rows {
        *counts.entry(row.desc_norm.as_str()).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(desc, _)| desc.to_string())
        .collect()
}

pub struct DuplicateDetector {
    repository: Arc<dyn Repository>,
}

impl DuplicateDetector {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Normalized descriptions that are duplicate suspects for this batch.
    ///
    /// Batch tier: repeated within `rows`. History tier: for each calendar
    /// month in the batch, already stored for the profile in that month.
    pub fn detect(&self, profile_id: &str, rows: &[PreparedRow]) -> Result<HashSet<String>> {
        let mut suspects = batch_suspects(rows);

        let mut by_month: BTreeMap<(i32, u32), BTreeSet<&str>> = BTreeMap::new();
        for row in rows {
            let date = row.authorised_on;
            by_month
                .entry((date.year(), date.month()))
                .or_default()
                .insert(row.desc_norm.as_str());
        }

        for ((year, month), descs) in by_month {
            let (start, end) = NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(month_range)
                .ok_or_else(|| Error::validation(format!("invalid month {}-{:02}", year, month)))?;

            let descs: Vec<String> = descs.into_iter().map(str::to_string).collect();
            let hits = self
                .repository
                .find_desc_norms_in_range(profile_id, start, end, &descs)?;

            debug!(
                month = %format!("{}-{:02}", year, month),
                checked = descs.len(),
                hits = hits.len(),
                "Checked duplicate window"
            );
            suspects.extend(hits);
        }

        Ok(suspects)
    }
}
