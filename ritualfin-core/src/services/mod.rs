//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod budget;
pub mod duplicates;
pub mod import;
pub mod logging;
pub mod migration;
mod review;
mod rules;
mod summary;

pub use budget::BudgetService;
pub use duplicates::{month_range, parse_month, DuplicateDetector};
pub use import::{ImportService, ImportSummary};
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use review::{BatchConfirmation, PendingFilter, ReviewService};
pub use rules::{render_rules_markdown, RuleService};
pub use summary::{
    project, summarize, CategoryBudget, CategorySpend, MonthSummary, Projection, SummaryService,
};
