//! Review command - list and confirm flagged transactions

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;
use uuid::Uuid;

use super::{authenticated, FixVarArg, TypeArg};
use crate::output;
use ritualfin_core::services::PendingFilter;
use ritualfin_core::{ConfirmationEdit, Transaction};

#[derive(Subcommand)]
pub enum ReviewCommands {
    /// List transactions that need review
    List {
        /// Month as YYYY-MM
        #[arg(long)]
        month: Option<String>,
        /// Statement status, e.g. Processed
        #[arg(long)]
        status: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Confirm one or more transactions
    Confirm {
        /// Transaction IDs
        #[arg(required = true)]
        ids: Vec<String>,
        #[arg(long = "type", value_enum)]
        tx_type: Option<TypeArg>,
        #[arg(long, value_enum)]
        fix_var: Option<FixVarArg>,
        /// Category I
        #[arg(long)]
        category: Option<String>,
        /// Category II (empty string clears it)
        #[arg(long)]
        category2: Option<String>,
        /// Leave out of budget figures
        #[arg(long, conflicts_with = "include_in_budget")]
        exclude_from_budget: bool,
        /// Count in budget figures again
        #[arg(long)]
        include_in_budget: bool,
        /// Also create a rule with these keywords (';'-separated)
        #[arg(long)]
        rule_keywords: Option<String>,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl ReviewCommands {
    pub fn json(&self) -> bool {
        match self {
            ReviewCommands::List { json, .. } | ReviewCommands::Confirm { json, .. } => *json,
        }
    }
}

fn flags(tx: &Transaction) -> String {
    let mut flags = Vec::new();
    if tx.rule_conflict {
        flags.push("conflict");
    }
    if tx.rule_miss {
        flags.push("no rule");
    }
    if tx.duplicate_suspect {
        flags.push("duplicate?");
    }
    flags.join(", ")
}

pub fn run(command: ReviewCommands, token: Option<&str>) -> Result<()> {
    let (ctx, identity) = authenticated(token)?;

    match command {
        ReviewCommands::List {
            month,
            status,
            json,
        } => {
            let pending = ctx
                .review_service
                .pending(&identity, &PendingFilter { month, status })?;
            if json {
                return output::json_ok(&pending);
            }
            if pending.is_empty() {
                output::success("Nothing to review");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Date", "Amount", "Description", "Category", "Flags"]);
            for tx in &pending {
                table.add_row(vec![
                    tx.id.to_string(),
                    tx.payment_date.to_string(),
                    output::format_amount(tx.amount),
                    tx.desc_raw.clone(),
                    tx.category_1.clone().unwrap_or_else(|| "-".to_string()),
                    flags(tx),
                ]);
            }
            println!("{}", table);
            println!("{} transaction(s) need review", pending.len().to_string().yellow());
        }
        ReviewCommands::Confirm {
            ids,
            tx_type,
            fix_var,
            category,
            category2,
            exclude_from_budget,
            include_in_budget,
            rule_keywords,
            force,
            json,
        } => {
            let ids = ids
                .iter()
                .map(|id| Uuid::parse_str(id).map_err(|_| anyhow!("Invalid transaction ID: {}", id)))
                .collect::<Result<Vec<_>>>()?;

            let edit = ConfirmationEdit {
                tx_type: tx_type.map(Into::into),
                fix_var: fix_var.map(Into::into),
                category_1: category,
                category_2: category2,
                exclude_from_budget: match (exclude_from_budget, include_in_budget) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
            };

            if ids.len() > 1 && !force && !json {
                let prompt = format!("Confirm {} transactions with the same edit?", ids.len());
                if !Confirm::new().with_prompt(prompt).default(true).interact()? {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            if ids.len() == 1 && rule_keywords.is_none() {
                let tx = ctx.review_service.confirm(&identity, ids[0], &edit)?;
                if json {
                    return output::json_ok(&tx);
                }
                output::success(&format!("Confirmed {}", tx.id));
                return Ok(());
            }

            let result = ctx.review_service.confirm_batch(
                &identity,
                &ids,
                &edit,
                rule_keywords.as_deref(),
            )?;
            if json {
                return output::json_ok(&result);
            }
            output::success(&format!("Confirmed {} transaction(s)", result.confirmed));
            if let Some(rule_id) = result.rule_id {
                output::info(&format!("Rule {} created", rule_id));
            }
        }
    }

    Ok(())
}
