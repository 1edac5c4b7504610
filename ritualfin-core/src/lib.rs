//! RitualFin Core - Statement import and categorization
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Upload, Transaction, Rule, etc.)
//! - **statement**: Header detection, row parsing and field normalization
//! - **ports**: Trait definitions for external dependencies (Repository, IdentityProvider)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB, local token table)

pub mod domain;
pub mod statement;
pub mod ports;
pub mod services;
pub mod adapters;
pub mod config;
pub mod migrations;
pub mod log_migrations;

use std::path::Path;
use std::sync::Arc;

use adapters::{DuckDbRepository, LocalIdentityProvider};
use config::Config;
use ports::IdentityProvider;
use services::*;

// Re-export commonly used types at crate root
pub use domain::{
    Budget, ConfirmationEdit, FixVar, Identity, NewRule, Rule, RuleType, Transaction, Upload,
    UploadStatus,
};
pub use domain::result::{Error, OperationResult, Result};

pub const DATABASE_FILE: &str = "ritualfin.duckdb";

/// Main context for RitualFin operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct RitualfinContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub identity_provider: LocalIdentityProvider,
    pub import_service: ImportService,
    pub budget_service: BudgetService,
    pub review_service: ReviewService,
    pub rule_service: RuleService,
    pub summary_service: SummaryService,
}

impl RitualfinContext {
    /// Open the data directory: settings, database and schema
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        std::fs::create_dir_all(data_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DATABASE_FILE))?);
        repository.ensure_schema()?;

        let identity_provider = LocalIdentityProvider::new(config.identities.clone());
        let import_service = ImportService::new(repository.clone(), config.import.clone());
        let review_service = ReviewService::new(repository.clone());
        let budget_service = BudgetService::new(repository.clone());
        let rule_service = RuleService::new(repository.clone());
        let summary_service = SummaryService::new(repository.clone());

        Ok(Self {
            config,
            repository,
            identity_provider,
            import_service,
            budget_service,
            review_service,
            rule_service,
            summary_service,
        })
    }

    /// Resolve the caller's token; no token is an authentication error
    pub fn authenticate(&self, token: Option<&str>) -> Result<Identity> {
        match token {
            Some(token) => self.identity_provider.resolve(token),
            None => Err(Error::authentication("missing access token")),
        }
    }
}
