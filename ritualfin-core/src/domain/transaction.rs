//! Ledger transaction domain model

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rule::{category_effects, FixVar, RuleType};

/// A persisted ledger entry owned by one profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub profile_id: String,
    /// Upload that produced this row
    pub upload_id: Option<Uuid>,
    pub payment_date: NaiveDate,
    pub account_source: String,
    pub desc_raw: String,
    pub desc_norm: String,
    pub amount: Decimal,
    /// Amount exactly as it appeared in the statement
    pub amount_display: Option<String>,
    pub currency: String,
    pub foreign_amount: Option<Decimal>,
    pub foreign_currency: Option<String>,
    pub exchange_rate: Option<Decimal>,
    /// Storage idempotency key, unique per profile
    pub key: String,

    // =========================================================================
    // Categorization
    // =========================================================================
    pub tx_type: Option<RuleType>,
    pub fix_var: Option<FixVar>,
    pub category_1: Option<String>,
    pub category_2: Option<String>,
    pub rule_id_applied: Option<String>,

    // =========================================================================
    // Flags
    // =========================================================================
    pub manual_override: bool,
    pub exclude_from_budget: bool,
    pub internal_transfer: bool,
    pub needs_review: bool,
    pub rule_miss: bool,
    pub rule_conflict: bool,
    pub duplicate_suspect: bool,

    /// Statement status text (Authorised, Processed, ...)
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's manual decision for one or more transactions.
///
/// `None` leaves a field untouched. For `category_2`, an empty string clears
/// the value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfirmationEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_type: Option<RuleType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_var: Option<FixVar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_from_budget: Option<bool>,
}

impl Transaction {
    /// Apply a manual confirmation.
    ///
    /// Confirmation always resolves the row: review flags are cleared and
    /// `manual_override` is set.
    pub fn apply_confirmation(&mut self, edit: &ConfirmationEdit) {
        if let Some(tx_type) = edit.tx_type {
            self.tx_type = Some(tx_type);
        }
        if let Some(fix_var) = edit.fix_var {
            self.fix_var = Some(fix_var);
        }
        if let Some(category_1) = edit.category_1.as_deref().filter(|c| !c.is_empty()) {
            self.category_1 = Some(category_1.to_string());
        }
        if let Some(category_2) = &edit.category_2 {
            let trimmed = category_2.trim();
            self.category_2 = if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            };
        }
        if let Some(exclude) = edit.exclude_from_budget {
            self.exclude_from_budget = exclude;
        }

        let effects = category_effects(edit.category_1.as_deref());
        if effects.internal_transfer {
            self.internal_transfer = true;
            self.exclude_from_budget = true;
        }

        self.manual_override = true;
        self.needs_review = false;
        self.rule_miss = false;
        self.rule_conflict = false;
        self.duplicate_suspect = false;
    }

    /// Month bucket (`YYYY-MM`) of the payment date
    pub fn month(&self) -> String {
        self.payment_date.format("%Y-%m").to_string()
    }
}
