//! Import service - statement upload orchestration
//!
//! processing -> ready | duplicate | error
//!
//! 1. validate header (no upload exists yet on failure)
//! 2. create the upload in `processing`
//! 3. parse and normalize every row; any bad row fails the whole batch
//! 4. store all rows in the raw store (first commit)
//! 5. match rules and detect duplicates per row
//! 6. insert transactions whose key is new (second commit)
//! 7. finish the upload with counters
//! 8. append one audit entry
//!
//! A failure at 4 or later marks the upload `error`. Raw rows committed at
//! step 4 stay in place.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ImportSettings;
use crate::domain::result::{Error, Result};
use crate::domain::{
    category_effects, match_rules, AuditAction, AuditLogEntry, Identity, PreparedRow,
    RawRow, RawTransaction, Rule, Transaction, Upload, UploadStatus,
};
use crate::ports::Repository;
use crate::services::duplicates::DuplicateDetector;
use crate::statement::{prepare_row, Statement};

/// Outcome of a successful import
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub upload_id: Uuid,
    pub status: UploadStatus,
    pub rows_total: i64,
    pub rows_imported: i64,
    /// Rows whose key was already stored (or repeated in the batch)
    pub rows_skipped: i64,
    /// Imported rows left for manual review
    pub needs_review: i64,
}

/// Import service for statement uploads
pub struct ImportService {
    repository: Arc<dyn Repository>,
    duplicates: DuplicateDetector,
    settings: ImportSettings,
}

impl ImportService {
    pub fn new(repository: Arc<dyn Repository>, settings: ImportSettings) -> Self {
        Self {
            duplicates: DuplicateDetector::new(Arc::clone(&repository)),
            repository,
            settings,
        }
    }

    /// Import raw file bytes. Input that is not UTF-8 is rejected before
    /// any upload exists.
    pub fn import_bytes(
        &self,
        identity: &Identity,
        filename: &str,
        bytes: &[u8],
    ) -> Result<ImportSummary> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::InvalidEncoding {
            offset: e.valid_up_to(),
        })?;
        self.import(identity, filename, text)
    }

    /// Import one statement file for `identity`
    pub fn import(&self, identity: &Identity, filename: &str, text: &str) -> Result<ImportSummary> {
        let statement = Statement::detect(text)?;
        let rows_total = statement.data_line_count() as i64;

        let mut upload = Upload::start(&identity.id, filename, rows_total, Some(checksum(text)));
        self.repository.insert_upload(&upload)?;
        info!(upload_id = %upload.id, rows_total, "Upload started");

        let parsed = match parse_rows(&statement) {
            Ok(parsed) => parsed,
            Err(errors) => {
                let stored: Vec<&str> = errors
                    .iter()
                    .take(self.settings.max_stored_errors)
                    .map(String::as_str)
                    .collect();
                self.fail_upload(&mut upload, &stored.join(" "));
                warn!(upload_id = %upload.id, errors = errors.len(), "Row validation failed");
                return Err(Error::RowValidation {
                    upload_id: upload.id,
                    errors: errors
                        .into_iter()
                        .take(self.settings.max_reported_errors)
                        .collect(),
                });
            }
        };

        let (rows_imported, needs_review) = match self.ingest(identity, &upload, &parsed) {
            Ok(counts) => counts,
            Err(e) => {
                self.fail_upload(&mut upload, &e.to_string());
                warn!(upload_id = %upload.id, kind = e.kind(), "Import failed");
                return Err(e);
            }
        };

        upload.finish(rows_total, rows_imported);
        if let Err(e) = self.repository.update_upload(&upload) {
            self.fail_upload(&mut upload, &e.to_string());
            return Err(e);
        }

        // The upload is final at this point; an audit failure is still reported
        self.repository.append_audit_entry(&AuditLogEntry::new(
            identity,
            AuditAction::MmImport,
            serde_json::json!({
                "upload_id": upload.id,
                "filename": upload.filename,
                "rows_total": rows_total,
                "rows_imported": rows_imported,
            }),
        ))?;

        info!(
            upload_id = %upload.id,
            status = upload.status.as_str(),
            rows_imported,
            rows_total,
            "Upload finished"
        );

        Ok(ImportSummary {
            upload_id: upload.id,
            status: upload.status,
            rows_total,
            rows_imported,
            rows_skipped: rows_total - rows_imported,
            needs_review,
        })
    }

    /// Steps 4-6. Returns (inserted, inserted needing review).
    fn ingest(
        &self,
        identity: &Identity,
        upload: &Upload,
        parsed: &[(RawRow, PreparedRow)],
    ) -> Result<(i64, i64)> {
        let source = self.settings.account_source.as_str();

        let raw_rows: Vec<RawTransaction> = parsed
            .iter()
            .map(|(raw, prepared)| RawTransaction::new(upload.id, &identity.id, source, raw, prepared))
            .collect();
        self.repository.insert_raw_transactions(&raw_rows)?;

        let rules = self.repository.get_rules(&identity.id)?;
        let prepared: Vec<PreparedRow> = parsed.iter().map(|(_, p)| p.clone()).collect();
        let suspects = self.duplicates.detect(&identity.id, &prepared)?;

        let keys: Vec<String> = prepared.iter().map(|p| p.key.clone()).collect();
        let mut seen = self.repository.find_existing_keys(&identity.id, &keys)?;
        debug!(existing = seen.len(), "Found already stored keys");

        let transactions: Vec<Transaction> = parsed
            .iter()
            .filter(|(_, prepared)| seen.insert(prepared.key.clone()))
            .map(|(raw, prepared)| {
                build_transaction(
                    identity,
                    upload.id,
                    source,
                    raw,
                    prepared,
                    &rules,
                    suspects.contains(&prepared.desc_norm),
                )
            })
            .collect();

        let needs_review = transactions.iter().filter(|t| t.needs_review).count() as i64;
        let inserted = self.repository.insert_transactions(&transactions)? as i64;
        Ok((inserted, needs_review.min(inserted)))
    }

    fn fail_upload(&self, upload: &mut Upload, message: &str) {
        upload.fail(message);
        if let Err(e) = self.repository.update_upload(upload) {
            warn!(upload_id = %upload.id, error = %e, "Could not record upload failure");
        }
    }

    /// The caller's uploads, newest first
    pub fn list_uploads(&self, identity: &Identity) -> Result<Vec<Upload>> {
        self.repository.list_uploads(&identity.id)
    }

    pub fn get_upload(&self, identity: &Identity, id: Uuid) -> Result<Upload> {
        self.repository
            .get_upload(&identity.id, id)?
            .ok_or_else(|| Error::not_found(format!("Upload {}", id)))
    }

    /// Raw rows received for one of the caller's uploads
    pub fn raw_rows(&self, identity: &Identity, upload_id: Uuid) -> Result<Vec<RawTransaction>> {
        self.repository.get_raw_transactions(&identity.id, upload_id)
    }
}

/// SHA-256 of the uploaded text, hex encoded
pub fn checksum(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Parse and normalize every data row, collecting all row errors
fn parse_rows(statement: &Statement<'_>) -> std::result::Result<Vec<(RawRow, PreparedRow)>, Vec<String>> {
    let mut parsed = Vec::new();
    let mut errors = Vec::new();

    for (line, raw) in statement.rows() {
        match prepare_row(&raw, line) {
            Ok(prepared) => parsed.push((raw, prepared)),
            Err(row_errors) => errors.extend(row_errors),
        }
    }

    if errors.is_empty() {
        Ok(parsed)
    } else {
        Err(errors)
    }
}

/// Assemble the final record for one row from its rule and duplicate outcome
pub fn build_transaction(
    identity: &Identity,
    upload_id: Uuid,
    source: &str,
    raw: &RawRow,
    prepared: &PreparedRow,
    rules: &[Rule],
    duplicate_suspect: bool,
) -> Transaction {
    let outcome = match_rules(&prepared.desc_norm, rules);
    let rule = outcome.rule();
    let effects = category_effects(rule.map(|r| r.category_1.as_str()));

    Transaction {
        id: Uuid::new_v4(),
        profile_id: identity.id.clone(),
        upload_id: Some(upload_id),
        payment_date: prepared.authorised_on,
        account_source: source.to_string(),
        desc_raw: prepared.desc_raw.clone(),
        desc_norm: prepared.desc_norm.clone(),
        amount: prepared.amount,
        amount_display: Some(raw.amount.clone()),
        currency: raw.currency.clone(),
        foreign_amount: prepared.foreign_amount,
        foreign_currency: raw.foreign_currency.clone(),
        exchange_rate: raw.exchange_rate,
        key: prepared.key.clone(),
        tx_type: rule.map(|r| r.rule_type),
        fix_var: rule.map(|r| r.fix_var),
        category_1: rule.map(|r| r.category_1.clone()),
        category_2: rule.and_then(|r| r.category_2.clone()),
        rule_id_applied: rule.map(|r| r.id.clone()),
        manual_override: false,
        exclude_from_budget: effects.exclude_from_budget,
        internal_transfer: effects.internal_transfer,
        needs_review: outcome.needs_review() || duplicate_suspect,
        rule_miss: outcome.is_miss(),
        rule_conflict: outcome.is_conflict(),
        duplicate_suspect,
        status: Some(raw.status.clone()).filter(|s| !s.is_empty()),
        created_at: Utc::now(),
    }
}
