//! Upload (import job) domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one import job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Processing,
    Ready,
    Error,
    /// Finished, but every row was already stored
    Duplicate,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Processing => "processing",
            UploadStatus::Ready => "ready",
            UploadStatus::Error => "error",
            UploadStatus::Duplicate => "duplicate",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(UploadStatus::Processing),
            "ready" => Some(UploadStatus::Ready),
            "error" => Some(UploadStatus::Error),
            "duplicate" => Some(UploadStatus::Duplicate),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Processing)
    }
}

/// One uploaded statement file and its import outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Upload {
    pub id: Uuid,
    pub profile_id: String,
    pub filename: String,
    pub status: UploadStatus,
    /// Expected number of data rows, computed before any row is parsed
    pub rows_total: i64,
    pub rows_imported: i64,
    pub error_message: Option<String>,
    /// SHA-256 of the uploaded text
    pub checksum: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Upload {
    /// Create an upload in the `processing` state
    pub fn start(
        profile_id: impl Into<String>,
        filename: impl Into<String>,
        rows_total: i64,
        checksum: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id: profile_id.into(),
            filename: filename.into(),
            status: UploadStatus::Processing,
            rows_total,
            rows_imported: 0,
            error_message: None,
            checksum,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Successful finish. A batch with rows where nothing was new is a
    /// duplicate upload.
    pub fn finish(&mut self, rows_total: i64, rows_imported: i64) {
        self.rows_total = rows_total;
        self.rows_imported = rows_imported;
        self.status = if rows_total > 0 && rows_imported == 0 {
            UploadStatus::Duplicate
        } else {
            UploadStatus::Ready
        };
        self.finished_at = Some(Utc::now());
    }

    /// Failed finish
    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = UploadStatus::Error;
        self.error_message = Some(message.into());
        self.finished_at = Some(Utc::now());
    }
}
