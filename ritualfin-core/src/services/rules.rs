//! Rule service - keyword rule management and Markdown export

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::info;

use crate::domain::result::{Error, Result};
use crate::domain::rule::{CATEGORY_ORDER, DEFAULT_CATEGORY};
use crate::domain::{AuditAction, AuditLogEntry, Identity, NewRule, Rule};
use crate::ports::Repository;

/// Rule service for categorization rules
pub struct RuleService {
    repository: Arc<dyn Repository>,
}

impl RuleService {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Create a rule for the caller and audit it
    pub fn create(&self, identity: &Identity, new_rule: NewRule) -> Result<Rule> {
        if new_rule.category_1.trim().is_empty() {
            return Err(Error::validation("rule needs a primary category"));
        }

        let rule = Rule::new(&identity.id, new_rule);
        if rule.normalized_keywords().is_empty() {
            return Err(Error::validation("rule needs at least one keyword"));
        }

        self.repository.insert_rule(&rule)?;
        self.repository.append_audit_entry(&AuditLogEntry::new(
            identity,
            AuditAction::RuleCreated,
            serde_json::json!({
                "rule_id": rule.id,
                "category_1": rule.category_1,
                "keywords": rule.keywords,
            }),
        ))?;

        info!(rule_id = %rule.id, "Rule created");
        Ok(rule)
    }

    /// The caller's rules, by category then creation time
    pub fn list(&self, identity: &Identity) -> Result<Vec<Rule>> {
        self.repository.get_rules(&identity.id)
    }

    /// Render the caller's rules as a grouped Markdown document
    pub fn export_markdown(&self, identity: &Identity) -> Result<String> {
        Ok(render_rules_markdown(&self.list(identity)?))
    }
}

/// One section per category: standard categories in their fixed order,
/// then any others in first-seen order. Rules without a category land in
/// `Outros`.
pub fn render_rules_markdown(rules: &[Rule]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&Rule>> = HashMap::new();
    for rule in rules {
        let category = match rule.category_1.trim() {
            "" => DEFAULT_CATEGORY,
            _ => rule.category_1.as_str(),
        };
        grouped
            .entry(category)
            .or_insert_with(|| {
                order.push(category);
                Vec::new()
            })
            .push(rule);
    }

    let sections = CATEGORY_ORDER
        .iter()
        .copied()
        .filter(|c| grouped.contains_key(c))
        .chain(order.iter().copied().filter(|c| !CATEGORY_ORDER.contains(c)));

    let mut md = String::from("# RitualFin Categorization Rules (v1)\n\n");
    md.push_str("## Categories (Category I)\n");
    for category in CATEGORY_ORDER {
        let _ = writeln!(md, "- {}", category);
    }
    md.push_str("\n## Matching (v1)\n");
    md.push_str("- Match field: desc_norm\n");
    md.push_str("- Type: contains, case-insensitive, accent-insensitive\n");
    md.push_str("- Keywords separated by ;\n");
    md.push_str("- 2+ matching rules: needs_review\n\n");

    for category in sections {
        let _ = writeln!(md, "## Rules: {}", category);
        md.push_str("| Type | Fixed/Var | Category I | Category II | Keywords |\n");
        md.push_str("|---|---|---|---|---|\n");
        for rule in grouped.get(category).into_iter().flatten() {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                rule.rule_type.as_str(),
                rule.fix_var.as_str(),
                cell(&rule.category_1),
                cell(rule.category_2.as_deref().unwrap_or("")),
                cell(&rule.keywords),
            );
        }
        md.push('\n');
    }

    md
}

fn cell(value: &str) -> String {
    value.replace('|', "\\|")
}
