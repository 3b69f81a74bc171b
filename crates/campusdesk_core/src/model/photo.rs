//! Photo metadata and person tags.
//!
//! Photo binaries are stored by the host upload handler; only the path is
//! kept here.

use super::{require_text, PersonId, RecordId, SchoolYearId, ValidationError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub file_path: String,
    pub caption: Option<String>,
    pub taken_on: Option<NaiveDate>,
    pub uploaded_by: PersonId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoTag {
    pub id: RecordId,
    pub photo_id: RecordId,
    pub person_id: PersonId,
    pub tagged_by: PersonId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPhoto {
    pub school_year_id: SchoolYearId,
    pub file_path: String,
    pub caption: Option<String>,
    pub taken_on: Option<NaiveDate>,
    pub uploaded_by: PersonId,
}

impl NewPhoto {
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("photo file path", &self.file_path)
    }
}
