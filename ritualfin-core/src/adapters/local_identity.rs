//! Identity provider backed by the token table in settings.json

use std::collections::HashMap;

use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::domain::Identity;
use crate::ports::IdentityProvider;

/// Resolves bearer tokens against a fixed table
#[derive(Debug, Clone, Default)]
pub struct LocalIdentityProvider {
    tokens: HashMap<String, Identity>,
}

impl LocalIdentityProvider {
    pub fn new(tokens: HashMap<String, Identity>) -> Self {
        Self { tokens }
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn resolve(&self, token: &str) -> Result<Identity> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::authentication("missing token"));
        }
        match self.tokens.get(token) {
            Some(identity) => {
                debug!(profile_id = %identity.id, "Resolved identity");
                Ok(identity.clone())
            }
            None => Err(Error::authentication("unknown token")),
        }
    }
}
