//! Statement row models
//!
//! `RawRow` and `PreparedRow` only live for the duration of one import run.
//! `RawTransaction` is what the raw store keeps of every received row.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One statement line mapped onto named fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub authorised_on: String,
    pub processed_on: Option<String>,
    /// Amount in the statement's locale format, e.g. "-1.234,56"
    pub amount: String,
    pub currency: String,
    pub description: String,
    pub payment_type: String,
    pub status: String,
    pub foreign_amount: Option<String>,
    pub foreign_currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
}

/// A `RawRow` whose date and amount both parsed
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRow {
    /// 1-based line number in the uploaded file
    pub line: usize,
    pub authorised_on: NaiveDate,
    pub processed_on: Option<NaiveDate>,
    pub key_desc: String,
    pub key: String,
    pub desc_raw: String,
    pub desc_norm: String,
    pub amount: Decimal,
    pub foreign_amount: Option<Decimal>,
}

/// A received row as persisted in the raw store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    pub id: Uuid,
    pub upload_id: Uuid,
    pub profile_id: String,
    pub authorised_on: NaiveDate,
    pub processed_on: Option<NaiveDate>,
    pub amount: String,
    pub currency: String,
    pub description: String,
    pub payment_type: String,
    pub status: String,
    pub foreign_amount: Option<String>,
    pub foreign_currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
    pub source: String,
    pub key_desc: String,
    pub key: String,
    pub desc_raw: String,
    pub desc_norm: String,
    pub created_at: DateTime<Utc>,
}

impl RawTransaction {
    pub fn new(
        upload_id: Uuid,
        profile_id: &str,
        source: &str,
        row: &RawRow,
        prepared: &PreparedRow,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            upload_id,
            profile_id: profile_id.to_string(),
            authorised_on: prepared.authorised_on,
            processed_on: prepared.processed_on,
            amount: row.amount.clone(),
            currency: row.currency.clone(),
            description: row.description.clone(),
            payment_type: row.payment_type.clone(),
            status: row.status.clone(),
            foreign_amount: row.foreign_amount.clone(),
            foreign_currency: row.foreign_currency.clone(),
            exchange_rate: row.exchange_rate,
            source: source.to_string(),
            key_desc: prepared.key_desc.clone(),
            key: prepared.key.clone(),
            desc_raw: prepared.desc_raw.clone(),
            desc_norm: prepared.desc_norm.clone(),
            created_at: Utc::now(),
        }
    }
}
