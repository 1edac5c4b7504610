//! DuckDB repository implementation

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use duckdb::types::Type;
use duckdb::{params, params_from_iter, Connection};
use rust_decimal::Decimal;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    AuditAction, AuditLogEntry, Budget, FixVar, RawTransaction, Rule, RuleType, Transaction, Upload,
    UploadStatus,
};
use crate::ports::{Repository, TransactionFilter};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

const UPLOAD_COLUMNS: &str = "upload_id, profile_id, filename, status, rows_total, rows_imported,
     error_message, checksum, started_at, finished_at";

const RAW_COLUMNS: &str = "raw_id, upload_id, profile_id, authorised_on::VARCHAR,
     processed_on::VARCHAR, amount, currency, description, payment_type, status,
     foreign_amount, foreign_currency, exchange_rate::VARCHAR, source, key_desc, storage_key,
     desc_raw, desc_norm, created_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, profile_id, upload_id, payment_date::VARCHAR,
     account_source, desc_raw, desc_norm, amount::VARCHAR, amount_display, currency,
     foreign_amount::VARCHAR, foreign_currency, exchange_rate::VARCHAR, storage_key,
     tx_type, fix_var, category_1, category_2, rule_id_applied,
     manual_override, exclude_from_budget, internal_transfer, needs_review,
     rule_miss, rule_conflict, duplicate_suspect, status, created_at";

const RULE_COLUMNS: &str =
    "rule_id, profile_id, rule_type, fix_var, category_1, category_2, keywords, created_at";

const BUDGET_COLUMNS: &str =
    "budget_id, profile_id, month::VARCHAR, category_1, amount::VARCHAR, created_at";

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Retries with exponential backoff when the file is locked by another
    /// process.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            "Database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::persistence(format!(
                "Failed to open database after {} retries",
                MAX_RETRIES
            ))
        }))
    }

    /// In-memory database, used by tests
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; JSON is statically linked via the "json" feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::persistence(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }
}

impl Repository for DuckDbRepository {
    // === Uploads ===

    fn insert_upload(&self, upload: &Upload) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_uploads (upload_id, profile_id, filename, status, rows_total,
                                      rows_imported, error_message, checksum, started_at, finished_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                upload.id.to_string(),
                upload.profile_id,
                upload.filename,
                upload.status.as_str(),
                upload.rows_total,
                upload.rows_imported,
                upload.error_message,
                upload.checksum,
                timestamp(&upload.started_at),
                upload.finished_at.map(|t| timestamp(&t)),
            ],
        )?;
        Ok(())
    }

    fn update_upload(&self, upload: &Upload) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE sys_uploads
             SET status = ?, rows_total = ?, rows_imported = ?, error_message = ?, finished_at = ?
             WHERE upload_id = ? AND profile_id = ?",
            params![
                upload.status.as_str(),
                upload.rows_total,
                upload.rows_imported,
                upload.error_message,
                upload.finished_at.map(|t| timestamp(&t)),
                upload.id.to_string(),
                upload.profile_id,
            ],
        )?;
        Ok(())
    }

    fn get_upload(&self, profile_id: &str, id: Uuid) -> Result<Option<Upload>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_uploads WHERE profile_id = ? AND upload_id = ?",
            UPLOAD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![profile_id, id.to_string()], row_to_upload)?;
        Ok(rows.next().transpose()?)
    }

    fn list_uploads(&self, profile_id: &str) -> Result<Vec<Upload>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_uploads WHERE profile_id = ? ORDER BY started_at DESC",
            UPLOAD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let uploads = stmt
            .query_map([profile_id], row_to_upload)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(uploads)
    }

    // === Raw store ===

    fn insert_raw_transactions(&self, rows: &[RawTransaction]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sys_raw_transactions (raw_id, upload_id, profile_id, authorised_on,
                     processed_on, amount, currency, description, payment_type, status,
                     foreign_amount, foreign_currency, exchange_rate, source, key_desc,
                     storage_key, desc_raw, desc_norm, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            for row in rows {
                stmt.execute(params![
                    row.id.to_string(),
                    row.upload_id.to_string(),
                    row.profile_id,
                    row.authorised_on.to_string(),
                    row.processed_on.map(|d| d.to_string()),
                    row.amount,
                    row.currency,
                    row.description,
                    row.payment_type,
                    row.status,
                    row.foreign_amount,
                    row.foreign_currency,
                    row.exchange_rate.map(|d| d.to_string()),
                    row.source,
                    row.key_desc,
                    row.key,
                    row.desc_raw,
                    row.desc_norm,
                    timestamp(&row.created_at),
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = rows.len(), "Stored raw rows");
        Ok(rows.len())
    }

    fn get_raw_transactions(
        &self,
        profile_id: &str,
        upload_id: Uuid,
    ) -> Result<Vec<RawTransaction>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_raw_transactions
             WHERE profile_id = ? AND upload_id = ?
             ORDER BY created_at",
            RAW_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![profile_id, upload_id.to_string()], row_to_raw)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // === Rules ===

    fn get_rules(&self, profile_id: &str) -> Result<Vec<Rule>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_rules WHERE profile_id = ? ORDER BY category_1, created_at",
            RULE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map([profile_id], row_to_rule)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rules)
    }

    fn insert_rule(&self, rule: &Rule) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_rules (rule_id, profile_id, rule_type, fix_var, category_1,
                                    category_2, keywords, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                rule.id,
                rule.profile_id,
                rule.rule_type.as_str(),
                rule.fix_var.as_str(),
                rule.category_1,
                rule.category_2,
                rule.keywords,
                timestamp(&rule.created_at),
            ],
        )?;
        Ok(())
    }

    // === Transactions ===

    fn find_desc_norms_in_range(
        &self,
        profile_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        desc_norms: &[String],
    ) -> Result<HashSet<String>> {
        if desc_norms.is_empty() {
            return Ok(HashSet::new());
        }

        let conn = self.lock()?;
        let sql = format!(
            "SELECT DISTINCT desc_norm FROM sys_transactions
             WHERE profile_id = ?
               AND payment_date BETWEEN CAST(? AS DATE) AND CAST(? AS DATE)
               AND desc_norm IN ({})",
            placeholders(desc_norms.len())
        );
        let mut values = vec![profile_id.to_string(), start.to_string(), end.to_string()];
        values.extend(desc_norms.iter().cloned());

        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<HashSet<_>>>()?;
        Ok(found)
    }

    fn find_existing_keys(&self, profile_id: &str, keys: &[String]) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let conn = self.lock()?;
        let sql = format!(
            "SELECT storage_key FROM sys_transactions WHERE profile_id = ? AND storage_key IN ({})",
            placeholders(keys.len())
        );
        let mut values = vec![profile_id.to_string()];
        values.extend(keys.iter().cloned());

        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<HashSet<_>>>()?;
        Ok(found)
    }

    fn insert_transactions(&self, transactions: &[Transaction]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sys_transactions (transaction_id, profile_id, upload_id, payment_date,
                     account_source, desc_raw, desc_norm, amount, amount_display, currency,
                     foreign_amount, foreign_currency, exchange_rate, storage_key,
                     tx_type, fix_var, category_1, category_2, rule_id_applied,
                     manual_override, exclude_from_budget, internal_transfer, needs_review,
                     rule_miss, rule_conflict, duplicate_suspect, status, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (profile_id, storage_key) DO NOTHING",
            )?;
            for t in transactions {
                inserted += stmt.execute(params![
                    t.id.to_string(),
                    t.profile_id,
                    t.upload_id.map(|id| id.to_string()),
                    t.payment_date.to_string(),
                    t.account_source,
                    t.desc_raw,
                    t.desc_norm,
                    t.amount.to_string(),
                    t.amount_display,
                    t.currency,
                    t.foreign_amount.map(|d| d.to_string()),
                    t.foreign_currency,
                    t.exchange_rate.map(|d| d.to_string()),
                    t.key,
                    t.tx_type.map(|v| v.as_str()),
                    t.fix_var.map(|v| v.as_str()),
                    t.category_1,
                    t.category_2,
                    t.rule_id_applied,
                    t.manual_override,
                    t.exclude_from_budget,
                    t.internal_transfer,
                    t.needs_review,
                    t.rule_miss,
                    t.rule_conflict,
                    t.duplicate_suspect,
                    t.status,
                    timestamp(&t.created_at),
                ])?;
            }
        }
        tx.commit()?;
        debug!(
            offered = transactions.len(),
            inserted, "Stored transactions"
        );
        Ok(inserted)
    }

    fn get_transactions(
        &self,
        profile_id: &str,
        filter: &TransactionFilter,
    ) -> Result<Vec<Transaction>> {
        let mut conditions = vec!["profile_id = ?".to_string()];
        let mut values = vec![profile_id.to_string()];

        if let Some(needs_review) = filter.needs_review {
            conditions.push(format!("needs_review = {}", needs_review));
        }
        if let Some(from) = filter.date_from {
            conditions.push("payment_date >= CAST(? AS DATE)".to_string());
            values.push(from.to_string());
        }
        if let Some(to) = filter.date_to {
            conditions.push("payment_date <= CAST(? AS DATE)".to_string());
            values.push(to.to_string());
        }
        if let Some(status) = &filter.status {
            conditions.push("status = ?".to_string());
            values.push(status.clone());
        }

        let sql = format!(
            "SELECT {} FROM sys_transactions WHERE {} ORDER BY payment_date DESC, created_at",
            TRANSACTION_COLUMNS,
            conditions.join(" AND ")
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let transactions = stmt
            .query_map(params_from_iter(values.iter()), row_to_transaction)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(transactions)
    }

    fn get_transaction(&self, profile_id: &str, id: Uuid) -> Result<Option<Transaction>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_transactions WHERE profile_id = ? AND transaction_id = ?",
            TRANSACTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query_map(params![profile_id, id.to_string()], row_to_transaction)?;
        Ok(rows.next().transpose()?)
    }

    fn update_transaction(&self, t: &Transaction) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE sys_transactions
             SET tx_type = ?, fix_var = ?, category_1 = ?, category_2 = ?, rule_id_applied = ?,
                 manual_override = ?, exclude_from_budget = ?, internal_transfer = ?,
                 needs_review = ?, rule_miss = ?, rule_conflict = ?, duplicate_suspect = ?
             WHERE profile_id = ? AND transaction_id = ?",
            params![
                t.tx_type.map(|v| v.as_str()),
                t.fix_var.map(|v| v.as_str()),
                t.category_1,
                t.category_2,
                t.rule_id_applied,
                t.manual_override,
                t.exclude_from_budget,
                t.internal_transfer,
                t.needs_review,
                t.rule_miss,
                t.rule_conflict,
                t.duplicate_suspect,
                t.profile_id,
                t.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(Error::not_found(format!("Transaction {}", t.id)));
        }
        Ok(())
    }

    // === Budgets ===

    fn upsert_budget(&self, budget: &Budget) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_budgets (budget_id, profile_id, month, category_1, amount, created_at)
             VALUES (?, ?, CAST(? AS DATE), ?, ?, ?)
             ON CONFLICT (profile_id, month, category_1) DO UPDATE SET amount = excluded.amount",
            params![
                budget.id.to_string(),
                budget.profile_id,
                budget.month.to_string(),
                budget.category_1,
                budget.amount.to_string(),
                timestamp(&budget.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_budgets(&self, profile_id: &str, month: NaiveDate) -> Result<Vec<Budget>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM sys_budgets WHERE profile_id = ? AND month = CAST(? AS DATE)
             ORDER BY category_1",
            BUDGET_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let budgets = stmt
            .query_map(params![profile_id, month.to_string()], row_to_budget)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(budgets)
    }

    fn delete_budget(&self, profile_id: &str, id: Uuid) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM sys_budgets WHERE profile_id = ? AND budget_id = ?",
            params![profile_id, id.to_string()],
        )?;
        Ok(deleted > 0)
    }

    // === Audit ===

    fn append_audit_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_audit_log (audit_id, profile_id, actor, action, payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                entry.id.to_string(),
                entry.profile_id,
                entry.actor,
                entry.action.as_str(),
                entry.payload.to_string(),
                timestamp(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_audit_entries(&self, profile_id: &str) -> Result<Vec<AuditLogEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT audit_id, profile_id, actor, action, payload::VARCHAR, created_at
             FROM sys_audit_log WHERE profile_id = ? ORDER BY created_at",
        )?;
        let entries = stmt
            .query_map([profile_id], |row| {
                let action: String = row.get(3)?;
                let payload: Option<String> = row.get(4)?;
                Ok(AuditLogEntry {
                    id: parse_uuid(row, 0)?,
                    profile_id: row.get(1)?,
                    actor: row.get(2)?,
                    action: AuditAction::parse(&action)
                        .ok_or_else(|| conversion_error(3, format!("unknown action {}", action)))?,
                    payload: payload
                        .and_then(|p| serde_json::from_str(&p).ok())
                        .unwrap_or(serde_json::Value::Null),
                    created_at: parse_timestamp(&row.get::<_, String>(5)?),
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

// Row mapping

fn row_to_upload(row: &duckdb::Row) -> duckdb::Result<Upload> {
    let status: String = row.get(3)?;
    let finished_at: Option<String> = row.get(9)?;
    Ok(Upload {
        id: parse_uuid(row, 0)?,
        profile_id: row.get(1)?,
        filename: row.get(2)?,
        status: UploadStatus::parse(&status)
            .ok_or_else(|| conversion_error(3, format!("unknown upload status {}", status)))?,
        rows_total: row.get(4)?,
        rows_imported: row.get(5)?,
        error_message: row.get(6)?,
        checksum: row.get(7)?,
        started_at: parse_timestamp(&row.get::<_, String>(8)?),
        finished_at: finished_at.as_deref().map(parse_timestamp),
    })
}

fn row_to_raw(row: &duckdb::Row) -> duckdb::Result<RawTransaction> {
    Ok(RawTransaction {
        id: parse_uuid(row, 0)?,
        upload_id: parse_uuid(row, 1)?,
        profile_id: row.get(2)?,
        authorised_on: parse_date(row, 3)?,
        processed_on: parse_optional_date(row, 4)?,
        amount: row.get(5)?,
        currency: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        payment_type: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        status: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        foreign_amount: row.get(10)?,
        foreign_currency: row.get(11)?,
        exchange_rate: parse_optional_decimal(row, 12)?,
        source: row.get(13)?,
        key_desc: row.get(14)?,
        key: row.get(15)?,
        desc_raw: row.get(16)?,
        desc_norm: row.get(17)?,
        created_at: parse_timestamp(&row.get::<_, String>(18)?),
    })
}

fn row_to_transaction(row: &duckdb::Row) -> duckdb::Result<Transaction> {
    let upload_id: Option<String> = row.get(2)?;
    let tx_type: Option<String> = row.get(14)?;
    let fix_var: Option<String> = row.get(15)?;
    Ok(Transaction {
        id: parse_uuid(row, 0)?,
        profile_id: row.get(1)?,
        upload_id: upload_id.and_then(|s| Uuid::parse_str(&s).ok()),
        payment_date: parse_date(row, 3)?,
        account_source: row.get(4)?,
        desc_raw: row.get(5)?,
        desc_norm: row.get(6)?,
        amount: parse_optional_decimal(row, 7)?.unwrap_or_default(),
        amount_display: row.get(8)?,
        currency: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        foreign_amount: parse_optional_decimal(row, 10)?,
        foreign_currency: row.get(11)?,
        exchange_rate: parse_optional_decimal(row, 12)?,
        key: row.get(13)?,
        tx_type: tx_type.as_deref().and_then(RuleType::parse),
        fix_var: fix_var.as_deref().and_then(FixVar::parse),
        category_1: row.get(16)?,
        category_2: row.get(17)?,
        rule_id_applied: row.get(18)?,
        manual_override: row.get(19)?,
        exclude_from_budget: row.get(20)?,
        internal_transfer: row.get(21)?,
        needs_review: row.get(22)?,
        rule_miss: row.get(23)?,
        rule_conflict: row.get(24)?,
        duplicate_suspect: row.get(25)?,
        status: row.get(26)?,
        created_at: parse_timestamp(&row.get::<_, String>(27)?),
    })
}

fn row_to_rule(row: &duckdb::Row) -> duckdb::Result<Rule> {
    let rule_type: String = row.get(2)?;
    let fix_var: String = row.get(3)?;
    Ok(Rule {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        rule_type: RuleType::parse(&rule_type)
            .ok_or_else(|| conversion_error(2, format!("unknown rule type {}", rule_type)))?,
        fix_var: FixVar::parse(&fix_var)
            .ok_or_else(|| conversion_error(3, format!("unknown fix/var {}", fix_var)))?,
        category_1: row.get(4)?,
        category_2: row.get(5)?,
        keywords: row.get(6)?,
        created_at: parse_timestamp(&row.get::<_, String>(7)?),
    })
}

fn row_to_budget(row: &duckdb::Row) -> duckdb::Result<Budget> {
    let amount: String = row.get(4)?;
    Ok(Budget {
        id: parse_uuid(row, 0)?,
        profile_id: row.get(1)?,
        month: parse_date(row, 2)?,
        category_1: row.get(3)?,
        amount: Decimal::from_str(&amount)
            .map_err(|e| duckdb::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?
            .normalize(),
        created_at: parse_timestamp(&row.get::<_, String>(5)?),
    })
}

// Helper functions

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn conversion_error(index: usize, message: String) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(index, Type::Text, message.into())
}

fn parse_uuid(row: &duckdb::Row, index: usize) -> duckdb::Result<Uuid> {
    let value: String = row.get(index)?;
    Uuid::parse_str(&value)
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn parse_date(row: &duckdb::Row, index: usize) -> duckdb::Result<NaiveDate> {
    let value: String = row.get(index)?;
    NaiveDate::parse_from_str(&value, "%Y-%m-%d")
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e)))
}

fn parse_optional_date(row: &duckdb::Row, index: usize) -> duckdb::Result<Option<NaiveDate>> {
    match row.get::<_, Option<String>>(index)? {
        Some(_) => parse_date(row, index).map(Some),
        None => Ok(None),
    }
}

fn parse_optional_decimal(row: &duckdb::Row, index: usize) -> duckdb::Result<Option<Decimal>> {
    row.get::<_, Option<String>>(index)?
        .map(|value| {
            Decimal::from_str(&value).map_err(|e| {
                duckdb::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
            })
        })
        .transpose()
        .map(|d| d.map(|d| d.normalize()))
}

/// Fixed-width RFC3339 so stored timestamps sort as text
fn timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
