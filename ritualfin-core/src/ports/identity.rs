//! Identity port - session lookup

use crate::domain::result::Result;
use crate::domain::Identity;

/// Resolves a caller credential to a verified identity.
///
/// The import pipeline never authenticates on its own; it only consumes
/// what a provider returns.
pub trait IdentityProvider: Send + Sync {
    /// Fails with `Error::Authentication` for unknown or empty tokens
    fn resolve(&self, token: &str) -> Result<Identity>;
}
