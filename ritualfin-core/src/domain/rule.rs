//! Categorization rule domain entity and matcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::statement::normalize_description;

/// Category that marks money moved between the user's own accounts
pub const INTERNAL_TRANSFER_CATEGORY: &str = "Interno";

/// Category used when nothing else applies
pub const DEFAULT_CATEGORY: &str = "Outros";

/// Standard primary categories, in display order
pub const CATEGORY_ORDER: [&str; 9] = [
    "Receitas",
    "Moradia",
    "Mercado",
    "Compras Online",
    "Transporte",
    "Saúde",
    "Lazer",
    "Outros",
    "Interno",
];

/// Whether a rule books money out or in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
    #[serde(rename = "Despesa")]
    Expense,
    #[serde(rename = "Receita")]
    Income,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Expense => "Despesa",
            RuleType::Income => "Receita",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Despesa" => Some(RuleType::Expense),
            "Receita" => Some(RuleType::Income),
            _ => None,
        }
    }
}

/// Fixed (recurring) or variable spending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixVar {
    #[serde(rename = "Fixo")]
    Fixed,
    #[serde(rename = "Variável")]
    Variable,
}

impl FixVar {
    pub fn as_str(&self) -> &'static str {
        match self {
            FixVar::Fixed => "Fixo",
            FixVar::Variable => "Variável",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Fixo" => Some(FixVar::Fixed),
            "Variável" => Some(FixVar::Variable),
            _ => None,
        }
    }
}

/// A user-owned keyword rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub profile_id: String,
    pub rule_type: RuleType,
    pub fix_var: FixVar,
    pub category_1: String,
    pub category_2: Option<String>,
    /// Semicolon-delimited keywords, e.g. "amazon; amzn"
    pub keywords: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub rule_type: RuleType,
    pub fix_var: FixVar,
    pub category_1: String,
    pub category_2: Option<String>,
    pub keywords: String,
}

impl Rule {
    pub fn new(profile_id: impl Into<String>, new_rule: NewRule) -> Self {
        let category_2 = new_rule
            .category_2
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Self {
            id: Uuid::new_v4().to_string(),
            profile_id: profile_id.into(),
            rule_type: new_rule.rule_type,
            fix_var: new_rule.fix_var,
            category_1: new_rule.category_1,
            category_2,
            keywords: new_rule.keywords.trim().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Keywords in matching form: split on `;`, trimmed, normalized, empties dropped
    pub fn normalized_keywords(&self) -> Vec<String> {
        self.keywords
            .split(';')
            .map(|k| normalize_description(k.trim()))
            .filter(|k| !k.is_empty())
            .collect()
    }

    /// True if any keyword is contained in the normalized description
    pub fn matches(&self, desc_norm: &str) -> bool {
        self.normalized_keywords()
            .iter()
            .any(|keyword| desc_norm.contains(keyword.as_str()))
    }
}

/// Outcome of evaluating every rule against one description
#[derive(Debug, Clone, Copy)]
pub enum RuleMatch<'a> {
    /// Exactly one rule matched
    Single(&'a Rule),
    /// No rule matched
    Miss,
    /// Two or more rules matched; none is applied
    Conflict(usize),
}

impl<'a> RuleMatch<'a> {
    pub fn rule(&self) -> Option<&'a Rule> {
        match self {
            RuleMatch::Single(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn needs_review(&self) -> bool {
        !matches!(self, RuleMatch::Single(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RuleMatch::Conflict(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, RuleMatch::Miss)
    }
}

/// Evaluate all rules against a normalized description.
///
/// Categorization is never guessed: anything other than exactly one hit is
/// left for manual review.
pub fn match_rules<'a>(desc_norm: &str, rules: &'a [Rule]) -> RuleMatch<'a> {
    let mut hits = rules.iter().filter(|rule| rule.matches(desc_norm));
    match (hits.next(), hits.next()) {
        (None, _) => RuleMatch::Miss,
        (Some(rule), None) => RuleMatch::Single(rule),
        (Some(_), Some(_)) => RuleMatch::Conflict(2 + hits.count()),
    }
}

/// Flags implied by a primary category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryEffects {
    pub internal_transfer: bool,
    pub exclude_from_budget: bool,
}

/// Post-match policy: the internal-transfer category takes the row out of
/// the budget.
pub fn category_effects(category_1: Option<&str>) -> CategoryEffects {
    if category_1 == Some(INTERNAL_TRANSFER_CATEGORY) {
        CategoryEffects {
            internal_transfer: true,
            exclude_from_budget: true,
        }
    } else {
        CategoryEffects::default()
    }
}
