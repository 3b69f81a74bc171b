//! AI-sync webhook delivery log.
//!
//! # Invariants
//! - `retry_count` counts failed deliveries and never decreases.
//! - `Success` and `Abandoned` are terminal.

use super::{require_text, RecordId, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    Success,
    Failed,
    Abandoned,
}

db_enum!(SyncStatus {
    Pending => "Pending",
    Success => "Success",
    Failed => "Failed",
    Abandoned => "Abandoned",
});

impl SyncStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Abandoned)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: RecordId,
    /// Webhook event name, e.g. `attendance.checked_in`.
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub payload: serde_json::Value,
    pub status: SyncStatus,
    pub http_status: Option<u16>,
    pub response: Option<String>,
    pub error: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncAttempt {
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub payload: serde_json::Value,
}

impl NewSyncAttempt {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("sync event type", &self.event_type)?;
        require_text("sync entity type", &self.entity_type)
    }
}
