//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the Repository port
//! - settings.json token table for the IdentityProvider port

pub mod duckdb;
pub mod local_identity;

pub use self::duckdb::DuckDbRepository;
pub use local_identity::LocalIdentityProvider;
