//! Summary service - monthly spending figures, budgets and month-end projection

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::rule::{CATEGORY_ORDER, DEFAULT_CATEGORY};
use crate::domain::{Budget, FixVar, Identity, RuleType, Transaction};
use crate::ports::{Repository, TransactionFilter};
use crate::services::duplicates::parse_month;

/// Spend in one primary category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category: String,
    pub spent: Decimal,
}

/// One budget line against what its category spent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryBudget {
    pub category: String,
    pub budget: Decimal,
    pub spent: Decimal,
    pub remaining: Decimal,
}

/// Where spending is heading by the end of the month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Projection {
    pub spent_so_far: Decimal,
    /// Fixed expenses dated after today
    pub fixed_remaining: Decimal,
    /// Variable spend per elapsed day
    pub variable_run_rate: Decimal,
    pub days_remaining: i64,
    pub projected: Decimal,
}

/// Dashboard figures for one month
#[derive(Debug, Clone, Serialize)]
pub struct MonthSummary {
    pub month: String,
    pub spent: Decimal,
    pub income: Decimal,
    pub categories: Vec<CategorySpend>,
    pub budget_total: Decimal,
    pub remaining: Decimal,
    pub budgets: Vec<CategoryBudget>,
    pub projection: Projection,
    pub needs_review: usize,
    pub transactions: usize,
}

pub struct SummaryService {
    repository: Arc<dyn Repository>,
}

impl SummaryService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Figures for `month` (`YYYY-MM`), optionally limited to one statement status
    pub fn month(
        &self,
        identity: &Identity,
        month: &str,
        status: Option<&str>,
    ) -> Result<MonthSummary> {
        self.month_as_of(identity, month, status, Utc::now().date_naive())
    }

    /// Same as `month`, projecting from `today` instead of the clock
    pub fn month_as_of(
        &self,
        identity: &Identity,
        month: &str,
        status: Option<&str>,
        today: NaiveDate,
    ) -> Result<MonthSummary> {
        let range = parse_month(month)?;
        let filter = TransactionFilter {
            date_from: Some(range.0),
            date_to: Some(range.1),
            status: status.map(str::to_string),
            ..Default::default()
        };
        let transactions = self.repository.get_transactions(&identity.id, &filter)?;
        let budgets = self.repository.get_budgets(&identity.id, range.0)?;
        Ok(summarize(month.trim(), range, &transactions, &budgets, today))
    }
}

fn counts_as_expense(tx: &Transaction) -> bool {
    tx.tx_type == Some(RuleType::Expense) && !tx.exclude_from_budget
}

/// Amounts are signed: expenses are negative, so spend is `-amount`.
/// Rows excluded from the budget count toward neither total.
pub fn summarize(
    month: &str,
    range: (NaiveDate, NaiveDate),
    transactions: &[Transaction],
    budgets: &[Budget],
    today: NaiveDate,
) -> MonthSummary {
    let mut spent = Decimal::ZERO;
    let mut income = Decimal::ZERO;
    let mut by_category: HashMap<&str, Decimal> = HashMap::new();

    for tx in transactions.iter().filter(|tx| !tx.exclude_from_budget) {
        match tx.tx_type {
            Some(RuleType::Expense) => {
                spent -= tx.amount;
                let category = tx.category_1.as_deref().unwrap_or(DEFAULT_CATEGORY);
                *by_category.entry(category).or_insert(Decimal::ZERO) -= tx.amount;
            }
            Some(RuleType::Income) => income += tx.amount,
            None => {}
        }
    }

    let mut categories: Vec<CategorySpend> = CATEGORY_ORDER
        .iter()
        .filter_map(|category| {
            let spent = by_category.get(category).copied()?;
            (spent > Decimal::ZERO).then(|| CategorySpend {
                category: category.to_string(),
                spent,
            })
        })
        .collect();
    // stable: ties keep the fixed category order
    categories.sort_by(|a, b| b.spent.cmp(&a.spent));

    let budget_lines: Vec<CategoryBudget> = budgets
        .iter()
        .map(|budget| {
            let spent = by_category
                .get(budget.category_1.as_str())
                .copied()
                .unwrap_or(Decimal::ZERO);
            CategoryBudget {
                category: budget.category_1.clone(),
                budget: budget.amount,
                spent,
                remaining: budget.amount - spent,
            }
        })
        .collect();
    let budget_total: Decimal = budgets.iter().map(|b| b.amount).sum();

    MonthSummary {
        month: month.to_string(),
        spent,
        income,
        categories,
        budget_total,
        remaining: budget_total - spent,
        budgets: budget_lines,
        projection: project(range, spent, transactions, today),
        needs_review: transactions.iter().filter(|tx| tx.needs_review).count(),
        transactions: transactions.len(),
    }
}

/// Spent so far, plus fixed expenses still to come, plus the variable run
/// rate over the days left. `today` is clamped into the month, and today
/// itself counts as elapsed.
pub fn project(
    (start, end): (NaiveDate, NaiveDate),
    spent: Decimal,
    transactions: &[Transaction],
    today: NaiveDate,
) -> Projection {
    let today = today.clamp(start, end);
    let days_elapsed = ((today - start).num_days() + 1).max(1);
    let days_remaining = (end - today).num_days().max(0);

    let mut fixed_remaining = Decimal::ZERO;
    let mut variable_so_far = Decimal::ZERO;
    for tx in transactions.iter().filter(|tx| counts_as_expense(tx)) {
        match tx.fix_var {
            Some(FixVar::Fixed) if tx.payment_date > today => fixed_remaining -= tx.amount,
            Some(FixVar::Variable) if tx.payment_date <= today => variable_so_far -= tx.amount,
            _ => {}
        }
    }

    let run_rate = variable_so_far / Decimal::from(days_elapsed);
    let projected = spent + fixed_remaining + run_rate * Decimal::from(days_remaining);

    Projection {
        spent_so_far: spent,
        fixed_remaining,
        variable_run_rate: run_rate.round_dp(2),
        days_remaining,
        projected: projected.round_dp(2),
    }
}
