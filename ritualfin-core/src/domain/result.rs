//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Core library error type
///
/// The first six variants are the terminal outcomes of a statement import.
/// Review outcomes (rule miss, rule conflict, duplicate suspicion) are data,
/// never errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid header: missing columns {}", .missing.join(", "))]
    InvalidHeader {
        missing: Vec<String>,
        expected: Vec<String>,
    },

    #[error("CSV is empty")]
    EmptyInput,

    #[error("File is not valid UTF-8 (invalid byte at offset {offset})")]
    InvalidEncoding { offset: usize },

    #[error("Invalid CSV: {}", .errors.join(" "))]
    RowValidation { upload_id: Uuid, errors: Vec<String> },

    #[error("Database error: {0}")]
    Persistence(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create an authentication error
    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidHeader { .. } => "invalid_header",
            Error::EmptyInput => "empty_input",
            Error::InvalidEncoding { .. } => "invalid_encoding",
            Error::RowValidation { .. } => "row_validation",
            Error::Persistence(_) => "persistence",
            Error::Authentication(_) => "authentication",
            Error::NotFound(_) => "not_found",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
        }
    }

    /// True when the failure happened before any Upload record was created.
    pub fn is_pre_ingest(&self) -> bool {
        matches!(
            self,
            Error::InvalidHeader { .. }
                | Error::EmptyInput
                | Error::InvalidEncoding { .. }
                | Error::Authentication(_)
        )
    }

    /// Structured details for callers that render errors as data
    pub fn details(&self) -> Option<HashMap<String, serde_json::Value>> {
        let mut context = HashMap::new();
        match self {
            Error::InvalidHeader { missing, expected } => {
                context.insert("missing".to_string(), serde_json::json!(missing));
                context.insert("expected".to_string(), serde_json::json!(expected));
            }
            Error::RowValidation { upload_id, errors } => {
                context.insert("upload_id".to_string(), serde_json::json!(upload_id));
                context.insert("details".to_string(), serde_json::json!(errors));
            }
            Error::InvalidEncoding { offset } => {
                context.insert("offset".to_string(), serde_json::json!(offset));
            }
            _ => return None,
        }
        Some(context)
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Error::Persistence(err.to_string())
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            kind: None,
            context: None,
        }
    }

    /// Create a failed result carrying the error's kind and details
    pub fn from_error(error: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            kind: Some(error.kind().to_string()),
            context: error.details(),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::from_error(&e),
        }
    }
}
