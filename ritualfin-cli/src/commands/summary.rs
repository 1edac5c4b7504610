//! Summary command - monthly spending figures

use anyhow::Result;
use colored::Colorize;

use super::authenticated;
use crate::output;

pub fn run(month: &str, status: Option<&str>, token: Option<&str>, json: bool) -> Result<()> {
    let (ctx, identity) = authenticated(token)?;
    let summary = ctx.summary_service.month(&identity, month, status)?;

    if json {
        return output::json_ok(&summary);
    }

    println!("{}", format!("Summary {}", summary.month).bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Spent", &output::format_amount(summary.spent)]);
    table.add_row(vec!["Income", &output::format_amount(summary.income)]);
    table.add_row(vec!["Budget", &output::format_amount(summary.budget_total)]);
    table.add_row(vec!["Remaining", &output::format_amount(summary.remaining)]);
    table.add_row(vec!["Transactions", &summary.transactions.to_string()]);
    table.add_row(vec!["Needs review", &summary.needs_review.to_string()]);
    println!("{}", table);

    if !summary.categories.is_empty() {
        println!();
        let mut categories = output::create_table();
        categories.set_header(vec!["Category", "Spent"]);
        for entry in &summary.categories {
            categories.add_row(vec![entry.category.clone(), output::format_amount(entry.spent)]);
        }
        println!("{}", categories);
    }

    if !summary.budgets.is_empty() {
        println!();
        let mut budgets = output::create_table();
        budgets.set_header(vec!["Budget", "Limit", "Spent", "Remaining"]);
        for line in &summary.budgets {
            let remaining = output::format_amount(line.remaining);
            let remaining = if line.remaining.is_sign_negative() {
                remaining.red().to_string()
            } else {
                remaining
            };
            budgets.add_row(vec![
                line.category.clone(),
                output::format_amount(line.budget),
                output::format_amount(line.spent),
                remaining,
            ]);
        }
        println!("{}", budgets);
    }

    let projection = &summary.projection;
    println!();
    println!("{}", "Month-end projection".bold());
    println!("  Spent so far: {}", output::format_amount(projection.spent_so_far));
    println!("  Fixed still due: {}", output::format_amount(projection.fixed_remaining));
    println!(
        "  Variable per day: {} ({} days left)",
        output::format_amount(projection.variable_run_rate),
        projection.days_remaining
    );
    println!("  Projected: {}", output::format_amount(projection.projected));

    Ok(())
}
