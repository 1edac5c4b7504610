//! Monthly category budgets

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Spending limit for one primary category in one month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: Uuid,
    pub profile_id: String,
    /// First day of the budgeted month
    pub month: NaiveDate,
    pub category_1: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn new(
        profile_id: impl Into<String>,
        month: NaiveDate,
        category_1: impl Into<String>,
        amount: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id: profile_id.into(),
            month,
            category_1: category_1.into().trim().to_string(),
            amount,
            created_at: Utc::now(),
        }
    }
}
