//! Review service - manual confirmation of flagged transactions

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::rule::DEFAULT_CATEGORY;
use crate::domain::{
    AuditAction, AuditLogEntry, ConfirmationEdit, FixVar, Identity, NewRule, RuleType,
    Transaction,
};
use crate::ports::{Repository, TransactionFilter};
use crate::services::duplicates::parse_month;
use crate::services::rules::RuleService;

/// Filter for the review queue
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    /// `YYYY-MM`
    pub month: Option<String>,
    /// Statement status text, e.g. "Processed"
    pub status: Option<String>,
}

/// Result of a batch confirmation
#[derive(Debug, Clone, Serialize)]
pub struct BatchConfirmation {
    pub confirmed: usize,
    /// Rule created from the supplied keywords, if any
    pub rule_id: Option<String>,
}

pub struct ReviewService {
    repository: Arc<dyn Repository>,
    rules: RuleService,
}

impl ReviewService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self {
            rules: RuleService::new(Arc::clone(&repository)),
            repository,
        }
    }

    /// Transactions still needing review, newest payment date first
    pub fn pending(&self, identity: &Identity, filter: &PendingFilter) -> Result<Vec<Transaction>> {
        let mut query = TransactionFilter {
            needs_review: Some(true),
            status: filter.status.clone(),
            ..Default::default()
        };
        if let Some(month) = &filter.month {
            let (start, end) = parse_month(month)?;
            query.date_from = Some(start);
            query.date_to = Some(end);
        }
        self.repository.get_transactions(&identity.id, &query)
    }

    /// Confirm one transaction
    pub fn confirm(
        &self,
        identity: &Identity,
        id: Uuid,
        edit: &ConfirmationEdit,
    ) -> Result<Transaction> {
        let mut transaction = self.load(identity, id)?;
        transaction.apply_confirmation(edit);
        self.repository.update_transaction(&transaction)?;

        self.repository.append_audit_entry(&AuditLogEntry::new(
            identity,
            AuditAction::ConfirmSingle,
            serde_json::json!({ "transaction_id": id, "edit": edit }),
        ))?;

        info!(transaction_id = %id, "Transaction confirmed");
        Ok(transaction)
    }

    /// Confirm several transactions with the same edit.
    ///
    /// With `rule_keywords`, a rule is created from the edit first and linked
    /// to every confirmed transaction. Every id must exist before anything
    /// is written.
    pub fn confirm_batch(
        &self,
        identity: &Identity,
        ids: &[Uuid],
        edit: &ConfirmationEdit,
        rule_keywords: Option<&str>,
    ) -> Result<BatchConfirmation> {
        if ids.is_empty() {
            return Err(Error::validation("no transactions selected"));
        }

        let mut transactions = ids
            .iter()
            .map(|id| self.load(identity, *id))
            .collect::<Result<Vec<_>>>()?;

        let rule = match rule_keywords.map(str::trim).filter(|k| !k.is_empty()) {
            Some(keywords) => Some(self.rules.create(identity, rule_from_edit(edit, keywords))?),
            None => None,
        };

        for transaction in &mut transactions {
            transaction.apply_confirmation(edit);
            if let Some(rule) = &rule {
                transaction.rule_id_applied = Some(rule.id.clone());
            }
            self.repository.update_transaction(transaction)?;
        }

        let rule_id = rule.map(|r| r.id);
        self.repository.append_audit_entry(&AuditLogEntry::new(
            identity,
            AuditAction::ConfirmBatch,
            serde_json::json!({
                "transaction_ids": ids,
                "count": ids.len(),
                "rule_id": rule_id,
                "edit": edit,
            }),
        ))?;

        info!(count = ids.len(), "Transactions confirmed");
        Ok(BatchConfirmation {
            confirmed: transactions.len(),
            rule_id,
        })
    }

    fn load(&self, identity: &Identity, id: Uuid) -> Result<Transaction> {
        self.repository
            .get_transaction(&identity.id, id)?
            .ok_or_else(|| Error::not_found(format!("Transaction {}", id)))
    }
}

/// Rule implied by a batch edit; unset fields fall back to expense,
/// variable and `Outros`
fn rule_from_edit(edit: &ConfirmationEdit, keywords: &str) -> NewRule {
    NewRule {
        rule_type: edit.tx_type.unwrap_or(RuleType::Expense),
        fix_var: edit.fix_var.unwrap_or(FixVar::Variable),
        category_1: edit
            .category_1
            .clone()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        category_2: edit.category_2.clone(),
        keywords: keywords.to_string(),
    }
}
