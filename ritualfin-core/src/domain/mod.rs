//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with decision logic - no I/O or external dependencies.

mod audit;
mod budget;
mod identity;
pub mod result;
pub mod rule;
mod statement;
mod transaction;
mod upload;

pub use audit::{AuditAction, AuditLogEntry};
pub use budget::Budget;
pub use identity::Identity;
pub use rule::{
    category_effects, match_rules, CategoryEffects, FixVar, NewRule, Rule, RuleMatch, RuleType,
};
pub use statement::{PreparedRow, RawRow, RawTransaction};
pub use transaction::{ConfirmationEdit, Transaction};
pub use upload::{Upload, UploadStatus};
