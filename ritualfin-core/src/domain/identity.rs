//! Caller identity

use serde::{Deserialize, Serialize};

/// An already-verified caller. Every record the pipeline touches is scoped
/// to `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }

    /// Name recorded as the actor of audit entries
    pub fn actor(&self) -> &str {
        self.email.as_deref().unwrap_or("user")
    }
}
