//! Budget command - monthly category budgets

use anyhow::{anyhow, Result};
use clap::Subcommand;
use uuid::Uuid;

use super::authenticated;
use crate::output;
use ritualfin_core::statement::parse_amount;

#[derive(Subcommand)]
pub enum BudgetCommands {
    /// Set a category budget for a month
    Set {
        /// Month as YYYY-MM
        #[arg(long)]
        month: String,
        /// Category I
        #[arg(long)]
        category: String,
        /// Amount, e.g. 350 or 350,50
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List budgets of a month
    List {
        /// Month as YYYY-MM
        #[arg(long)]
        month: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a budget
    Remove {
        /// Budget ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl BudgetCommands {
    pub fn json(&self) -> bool {
        match self {
            BudgetCommands::Set { json, .. }
            | BudgetCommands::List { json, .. }
            | BudgetCommands::Remove { json, .. } => *json,
        }
    }
}

pub fn run(command: BudgetCommands, token: Option<&str>) -> Result<()> {
    let (ctx, identity) = authenticated(token)?;

    match command {
        BudgetCommands::Set {
            month,
            category,
            amount,
            json,
        } => {
            let amount =
                parse_amount(&amount).ok_or_else(|| anyhow!("Invalid budget amount: {}", amount))?;
            let budget = ctx.budget_service.set(&identity, &month, &category, amount)?;
            if json {
                return output::json_ok(&budget);
            }
            output::success(&format!(
                "Budget for {} set to {}",
                budget.category_1,
                output::format_amount(budget.amount)
            ));
        }
        BudgetCommands::List { month, json } => {
            let budgets = ctx.budget_service.list(&identity, &month)?;
            if json {
                return output::json_ok(&budgets);
            }
            if budgets.is_empty() {
                println!("No budgets for {}.", month.trim());
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["ID", "Category", "Amount"]);
            for budget in &budgets {
                table.add_row(vec![
                    budget.id.to_string(),
                    budget.category_1.clone(),
                    output::format_amount(budget.amount),
                ]);
            }
            println!("{}", table);
        }
        BudgetCommands::Remove { id, json } => {
            let id = Uuid::parse_str(&id).map_err(|_| anyhow!("Invalid budget ID: {}", id))?;
            ctx.budget_service.remove(&identity, id)?;
            if json {
                return output::json_ok(serde_json::json!({ "removed": id }));
            }
            output::success("Budget removed");
        }
    }

    Ok(())
}
