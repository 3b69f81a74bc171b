//! Government compliance documents held per person.
//!
//! # Invariants
//! - New documents start as `Pending`.
//! - Status moves only along `DocumentStatus::can_transition_to`.
//! - `expiry_date` is never earlier than `issue_date`.

use super::{require_text, PersonId, RecordId, ValidationError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Review lifecycle of one submitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    Pending,
    Verified,
    Rejected,
    Expired,
}

db_enum!(DocumentStatus {
    Pending => "Pending",
    Verified => "Verified",
    Rejected => "Rejected",
    Expired => "Expired",
});

impl DocumentStatus {
    /// Returns whether `self -> next` is an allowed review transition.
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Verified)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Expired)
                | (Self::Verified, Self::Expired)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceDocument {
    pub id: RecordId,
    pub person_id: PersonId,
    /// Free-form type label, e.g. `Immunization Record`.
    pub document_type: String,
    pub document_number: Option<String>,
    /// Path of the uploaded scan, owned by the host upload handler.
    pub file_path: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub status: DocumentStatus,
    pub reviewed_by: Option<PersonId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub notes: Option<String>,
    pub submitted_by: PersonId,
    pub created_at: DateTime<Utc>,
}

impl ComplianceDocument {
    /// Returns whether the document has passed its expiry date on `today`.
    pub fn is_past_expiry(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry < today)
    }
}

/// Write model for a newly submitted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub person_id: PersonId,
    pub document_type: String,
    pub document_number: Option<String>,
    pub file_path: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub submitted_by: PersonId,
}

impl NewDocument {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("document type", &self.document_type)?;
        if let (Some(issue), Some(expiry)) = (self.issue_date, self.expiry_date) {
            if expiry < issue {
                return Err(ValidationError::InvalidRange {
                    field: "expiry date",
                    details: format!("{expiry} is before issue date {issue}"),
                });
            }
        }
        Ok(())
    }
}
