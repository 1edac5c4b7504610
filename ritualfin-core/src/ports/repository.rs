//! Repository port - record store abstraction

use std::collections::HashSet;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{AuditLogEntry, Budget, RawTransaction, Rule, Transaction, Upload};

/// Filter for transaction listings. Unset fields don't restrict.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub needs_review: Option<bool>,
    /// Inclusive lower bound on payment date
    pub date_from: Option<NaiveDate>,
    /// Inclusive upper bound on payment date
    pub date_to: Option<NaiveDate>,
    /// Statement status text, e.g. "Processed"
    pub status: Option<String>,
}

/// Record store abstraction
///
/// Every read takes the owning profile id and never returns another
/// profile's rows. Implementations (adapters) provide the actual storage.
pub trait Repository: Send + Sync {
    // === Uploads ===

    fn insert_upload(&self, upload: &Upload) -> Result<()>;

    /// Persist status, counters, error message and finish time
    fn update_upload(&self, upload: &Upload) -> Result<()>;

    fn get_upload(&self, profile_id: &str, id: Uuid) -> Result<Option<Upload>>;

    /// Newest first
    fn list_uploads(&self, profile_id: &str) -> Result<Vec<Upload>>;

    // === Raw store ===

    /// Insert all rows in one commit. Returns the number written.
    fn insert_raw_transactions(&self, rows: &[RawTransaction]) -> Result<usize>;

    fn get_raw_transactions(&self, profile_id: &str, upload_id: Uuid)
        -> Result<Vec<RawTransaction>>;

    // === Rules ===

    fn get_rules(&self, profile_id: &str) -> Result<Vec<Rule>>;

    fn insert_rule(&self, rule: &Rule) -> Result<()>;

    // === Transactions ===

    /// Which of `desc_norms` already occur among the profile's transactions
    /// paid between `start` and `end` (inclusive)
    fn find_desc_norms_in_range(
        &self,
        profile_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        desc_norms: &[String],
    ) -> Result<HashSet<String>>;

    /// Which of `keys` are already stored for the profile
    fn find_existing_keys(&self, profile_id: &str, keys: &[String]) -> Result<HashSet<String>>;

    /// Insert in one commit, skipping rows whose key already exists.
    /// Returns the number actually inserted.
    fn insert_transactions(&self, transactions: &[Transaction]) -> Result<usize>;

    fn get_transactions(
        &self,
        profile_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>>;

    fn get_transaction(&self, profile_id: &str, id: Uuid) -> Result<Option<Transaction>>;

    /// Persist categorization fields and flags
    fn update_transaction(&self, transaction: &Transaction) -> Result<()>;

    // === Budgets ===

    /// Insert, or replace the amount of the profile's budget for the same
    /// month and category
    fn upsert_budget(&self, budget: &Budget) -> Result<()>;

    /// Budgets of the month starting at `month`, by category
    fn get_budgets(&self, profile_id: &str, month: NaiveDate) -> Result<Vec<Budget>>;

    /// Returns false when no such budget exists for the profile
    fn delete_budget(&self, profile_id: &str, id: Uuid) -> Result<bool>;

    // === Audit ===

    fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<()>;

    /// Oldest first
    fn get_audit_entries(&self, profile_id: &str) -> Result<Vec<AuditLogEntry>>;
}
