//! Rules command - manage categorization rules

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::{authenticated, FixVarArg, TypeArg};
use crate::output;
use ritualfin_core::NewRule;

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List rules by category
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a keyword rule
    Add {
        /// Keywords separated by ';'
        #[arg(long)]
        keywords: String,
        /// Category I
        #[arg(long)]
        category: String,
        /// Category II
        #[arg(long)]
        category2: Option<String>,
        #[arg(long = "type", value_enum, default_value = "expense")]
        rule_type: TypeArg,
        #[arg(long, value_enum, default_value = "variable")]
        fix_var: FixVarArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export rules as Markdown
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl RulesCommands {
    pub fn json(&self) -> bool {
        match self {
            RulesCommands::List { json } | RulesCommands::Add { json, .. } => *json,
            RulesCommands::Export { .. } => false,
        }
    }
}

pub fn run(command: RulesCommands, token: Option<&str>) -> Result<()> {
    let (ctx, identity) = authenticated(token)?;

    match command {
        RulesCommands::List { json } => {
            let rules = ctx.rule_service.list(&identity)?;
            if json {
                return output::json_ok(&rules);
            }
            if rules.is_empty() {
                println!("No rules yet.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Category I", "Category II", "Type", "Fixed/Var", "Keywords"]);
            for rule in &rules {
                table.add_row(vec![
                    rule.category_1.as_str(),
                    rule.category_2.as_deref().unwrap_or("-"),
                    rule.rule_type.as_str(),
                    rule.fix_var.as_str(),
                    rule.keywords.as_str(),
                ]);
            }
            println!("{}", table);
        }
        RulesCommands::Add {
            keywords,
            category,
            category2,
            rule_type,
            fix_var,
            json,
        } => {
            let rule = ctx.rule_service.create(
                &identity,
                NewRule {
                    rule_type: rule_type.into(),
                    fix_var: fix_var.into(),
                    category_1: category,
                    category_2: category2,
                    keywords,
                },
            )?;
            if json {
                return output::json_ok(&rule);
            }
            output::success(&format!("Rule {} created", rule.id));
        }
        RulesCommands::Export { output: path } => {
            let markdown = ctx.rule_service.export_markdown(&identity)?;
            match path {
                Some(path) => {
                    std::fs::write(&path, markdown)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    output::success(&format!("Rules exported to {}", path.display()));
                }
                None => print!("{}", markdown),
            }
        }
    }

    Ok(())
}
