//! Compliance document review and reporting.
//!
//! # Responsibility
//! - Drive the review lifecycle (verify, reject, expire).
//! - Report per-person compliance against a list of required types.
//!
//! # Invariants
//! - Transitions follow `DocumentStatus::can_transition_to`; anything else
//!   is `InvalidTransition` and leaves the row untouched.
//! - Rejections always carry a non-empty reason.

use crate::model::document::{ComplianceDocument, DocumentStatus, NewDocument};
use crate::model::{PersonId, RecordId, ValidationError};
use crate::repo::document_repo::{DocumentQuery, DocumentRepository, StatusChange};
use crate::repo::RepoError;
use chrono::{Duration, NaiveDate, Utc};
use log::info;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum DocumentServiceError {
    DocumentNotFound(RecordId),
    InvalidTransition {
        id: RecordId,
        from: DocumentStatus,
        to: DocumentStatus,
    },
    MissingRejectionReason,
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for DocumentServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DocumentNotFound(id) => write!(f, "document not found: {id}"),
            Self::InvalidTransition { id, from, to } => {
                write!(f, "document {id} cannot move from {from} to {to}")
            }
            Self::MissingRejectionReason => write!(f, "a rejection reason is required"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DocumentServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for DocumentServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { id, .. } => Self::DocumentNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type DocumentResult<T> = Result<T, DocumentServiceError>;

/// Best standing of one required document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ComplianceState {
    Verified,
    Pending,
    Rejected,
    Expired,
    Missing,
}

impl ComplianceState {
    /// Lower ranks win when several documents share a type.
    fn rank(self) -> u8 {
        match self {
            Self::Verified => 0,
            Self::Pending => 1,
            Self::Rejected => 2,
            Self::Expired => 3,
            Self::Missing => 4,
        }
    }

    fn of(document: &ComplianceDocument, today: NaiveDate) -> Self {
        if document.is_past_expiry(today) {
            return Self::Expired;
        }
        match document.status {
            DocumentStatus::Verified => Self::Verified,
            DocumentStatus::Pending => Self::Pending,
            DocumentStatus::Rejected => Self::Rejected,
            DocumentStatus::Expired => Self::Expired,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementStatus {
    pub document_type: String,
    pub state: ComplianceState,
    /// Document that produced `state`; `None` when missing.
    pub document_id: Option<RecordId>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplianceReport {
    pub person_id: PersonId,
    pub as_of: NaiveDate,
    pub requirements: Vec<RequirementStatus>,
    /// Every required type has a verified, unexpired document.
    pub is_compliant: bool,
}

pub struct DocumentService<R: DocumentRepository> {
    repo: R,
}

impl<R: DocumentRepository> DocumentService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn submit(&self, document: &NewDocument) -> DocumentResult<ComplianceDocument> {
        let id = self.repo.create_document(document)?;
        info!(
            "event=document_submit module=compliance status=ok document_id={} person_id={}",
            id, document.person_id
        );
        self.get(id)
    }

    pub fn get(&self, id: RecordId) -> DocumentResult<ComplianceDocument> {
        self.repo
            .get_document(id)?
            .ok_or(DocumentServiceError::DocumentNotFound(id))
    }

    pub fn list(&self, query: &DocumentQuery) -> DocumentResult<Vec<ComplianceDocument>> {
        Ok(self.repo.list_documents(query)?)
    }

    pub fn verify(&self, id: RecordId, staff_id: PersonId) -> DocumentResult<ComplianceDocument> {
        self.transition(id, DocumentStatus::Verified, Some(staff_id), None)
    }

    pub fn reject(
        &self,
        id: RecordId,
        staff_id: PersonId,
        reason: &str,
    ) -> DocumentResult<ComplianceDocument> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(DocumentServiceError::MissingRejectionReason);
        }
        self.transition(id, DocumentStatus::Rejected, Some(staff_id), Some(reason))
    }

    /// Expires pending and verified documents whose expiry date is before `today`.
    pub fn expire_overdue(&self, today: NaiveDate) -> DocumentResult<usize> {
        let expired = self.repo.expire_before(today, Utc::now())?;
        info!("event=document_expire module=compliance status=ok today={today} expired={expired}");
        Ok(expired)
    }

    /// Pending or verified documents expiring within `days` of `today`.
    pub fn expiring_within(
        &self,
        today: NaiveDate,
        days: u32,
    ) -> DocumentResult<Vec<ComplianceDocument>> {
        let horizon = today + Duration::days(i64::from(days));
        let mut documents = self.repo.list_documents(&DocumentQuery {
            expiring_on_or_before: Some(horizon),
            ..DocumentQuery::default()
        })?;
        documents.retain(|document| {
            matches!(
                document.status,
                DocumentStatus::Pending | DocumentStatus::Verified
            ) && !document.is_past_expiry(today)
        });
        documents.sort_by_key(|document| (document.expiry_date, document.id));
        Ok(documents)
    }

    pub fn compliance_report(
        &self,
        person_id: PersonId,
        required_types: &[String],
        today: NaiveDate,
    ) -> DocumentResult<ComplianceReport> {
        let documents = self.repo.list_documents(&DocumentQuery {
            person_id: Some(person_id),
            ..DocumentQuery::default()
        })?;

        let requirements = required_types
            .iter()
            .map(|required| required.trim())
            .filter(|required| !required.is_empty())
            .map(|required| requirement_status(required, &documents, today))
            .collect::<Vec<_>>();
        let is_compliant = requirements
            .iter()
            .all(|requirement| requirement.state == ComplianceState::Verified);

        Ok(ComplianceReport {
            person_id,
            as_of: today,
            requirements,
            is_compliant,
        })
    }

    fn transition(
        &self,
        id: RecordId,
        to: DocumentStatus,
        reviewed_by: Option<PersonId>,
        rejection_reason: Option<&str>,
    ) -> DocumentResult<ComplianceDocument> {
        let current = self.get(id)?;
        if !current.status.can_transition_to(to) {
            return Err(DocumentServiceError::InvalidTransition {
                id,
                from: current.status,
                to,
            });
        }

        let applied = self.repo.change_status(
            id,
            &StatusChange {
                from: current.status,
                to,
                reviewed_by,
                reviewed_at: Utc::now(),
                rejection_reason,
            },
        )?;
        if !applied {
            let latest = self.get(id)?;
            return Err(DocumentServiceError::InvalidTransition {
                id,
                from: latest.status,
                to,
            });
        }

        info!(
            "event=document_review module=compliance status=ok document_id={} from={} to={}",
            id, current.status, to
        );
        self.get(id)
    }
}

fn requirement_status(
    document_type: &str,
    documents: &[ComplianceDocument],
    today: NaiveDate,
) -> RequirementStatus {
    let best = documents
        .iter()
        .filter(|document| document.document_type.trim().eq_ignore_ascii_case(document_type))
        .map(|document| (ComplianceState::of(document, today), document))
        .min_by_key(|(state, document)| (state.rank(), std::cmp::Reverse(document.expiry_date)));

    match best {
        Some((state, document)) => RequirementStatus {
            document_type: document_type.to_string(),
            state,
            document_id: Some(document.id),
            expiry_date: document.expiry_date,
        },
        None => RequirementStatus {
            document_type: document_type.to_string(),
            state: ComplianceState::Missing,
            document_id: None,
            expiry_date: None,
        },
    }
}
