//! Budget service - monthly category budgets

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Budget, Identity};
use crate::ports::Repository;
use crate::services::duplicates::parse_month;

pub struct BudgetService {
    repository: Arc<dyn Repository>,
}

impl BudgetService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Set the budget of `category` for `month` (`YYYY-MM`), replacing any
    /// earlier amount for the same pair
    pub fn set(
        &self,
        identity: &Identity,
        month: &str,
        category: &str,
        amount: Decimal,
    ) -> Result<Budget> {
        let (start, _) = parse_month(month)?;
        if category.trim().is_empty() {
            return Err(Error::validation("budget needs a category"));
        }
        if amount.is_sign_negative() {
            return Err(Error::validation("budget amount cannot be negative"));
        }

        let budget = Budget::new(&identity.id, start, category, amount);
        self.repository.upsert_budget(&budget)?;
        info!(month = %start, category = %budget.category_1, "Budget set");

        self.repository
            .get_budgets(&identity.id, start)?
            .into_iter()
            .find(|b| b.category_1 == budget.category_1)
            .ok_or_else(|| Error::not_found(format!("Budget {}", budget.category_1)))
    }

    /// The caller's budgets for `month`, by category
    pub fn list(&self, identity: &Identity, month: &str) -> Result<Vec<Budget>> {
        let (start, _) = parse_month(month)?;
        self.repository.get_budgets(&identity.id, start)
    }

    pub fn remove(&self, identity: &Identity, id: Uuid) -> Result<()> {
        if !self.repository.delete_budget(&identity.id, id)? {
            return Err(Error::not_found(format!("Budget {}", id)));
        }
        Ok(())
    }
}
