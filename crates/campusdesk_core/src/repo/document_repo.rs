//! Compliance document gateway.
//!
//! # Responsibility
//! - Persist submitted documents and their review status.
//! - Provide filtered listings for review queues and expiry sweeps.
//!
//! # Invariants
//! - Status writes are conditional on the expected current status.

use super::{enum_column, RepoError, RepoResult};
use crate::model::document::{ComplianceDocument, DocumentStatus, NewDocument};
use crate::model::{PersonId, RecordId};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const DOCUMENT_SELECT_SQL: &str = "SELECT
    complianceDocumentID,
    personID,
    complianceDocumentType,
    complianceDocumentNumber,
    complianceDocumentFilePath,
    complianceDocumentIssueDate,
    complianceDocumentExpiryDate,
    complianceDocumentStatus,
    complianceDocumentReviewedBy,
    complianceDocumentReviewedAt,
    complianceDocumentRejectionReason,
    complianceDocumentNotes,
    complianceDocumentSubmittedBy,
    complianceDocumentTimestampCreated
FROM complianceDocument";

/// Filter options for document listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentQuery {
    pub person_id: Option<PersonId>,
    pub document_type: Option<String>,
    pub status: Option<DocumentStatus>,
    /// Only documents whose expiry date is on or before this date.
    pub expiring_on_or_before: Option<NaiveDate>,
}

/// Review decision written together with a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange<'a> {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
    pub reviewed_by: Option<PersonId>,
    pub reviewed_at: DateTime<Utc>,
    pub rejection_reason: Option<&'a str>,
}

/// Gateway interface for compliance documents.
pub trait DocumentRepository {
    fn create_document(&self, document: &NewDocument) -> RepoResult<RecordId>;
    fn get_document(&self, id: RecordId) -> RepoResult<Option<ComplianceDocument>>;
    fn list_documents(&self, query: &DocumentQuery) -> RepoResult<Vec<ComplianceDocument>>;
    /// Applies `change` only if the row still has status `change.from`.
    ///
    /// Returns `false` when the row exists but its status moved on.
    fn change_status(&self, id: RecordId, change: &StatusChange<'_>) -> RepoResult<bool>;
    /// Marks every `Pending`/`Verified` document expiring before `today` as
    /// `Expired` and returns the affected count.
    fn expire_before(&self, today: NaiveDate, at: DateTime<Utc>) -> RepoResult<usize>;
}

pub struct SqliteDocumentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDocumentRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DocumentRepository for SqliteDocumentRepository<'_> {
    fn create_document(&self, document: &NewDocument) -> RepoResult<RecordId> {
        document.validate()?;

        self.conn.execute(
            "INSERT INTO complianceDocument (
                personID,
                complianceDocumentType,
                complianceDocumentNumber,
                complianceDocumentFilePath,
                complianceDocumentIssueDate,
                complianceDocumentExpiryDate,
                complianceDocumentStatus,
                complianceDocumentNotes,
                complianceDocumentSubmittedBy,
                complianceDocumentTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                document.person_id,
                document.document_type.trim(),
                document.document_number.as_deref(),
                document.file_path.as_deref(),
                document.issue_date,
                document.expiry_date,
                DocumentStatus::Pending.as_str(),
                document.notes.as_deref(),
                document.submitted_by,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_document(&self, id: RecordId) -> RepoResult<Option<ComplianceDocument>> {
        self.conn
            .query_row(
                &format!("{DOCUMENT_SELECT_SQL} WHERE complianceDocumentID = ?1;"),
                [id],
                |row| Ok(parse_document_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_documents(&self, query: &DocumentQuery) -> RepoResult<Vec<ComplianceDocument>> {
        let mut sql = format!("{DOCUMENT_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(person_id) = query.person_id {
            sql.push_str(" AND personID = ?");
            bind_values.push(Value::Integer(person_id));
        }
        if let Some(document_type) = query.document_type.as_ref() {
            sql.push_str(" AND complianceDocumentType = ? COLLATE NOCASE");
            bind_values.push(Value::Text(document_type.trim().to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND complianceDocumentStatus = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(limit_date) = query.expiring_on_or_before {
            sql.push_str(
                " AND complianceDocumentExpiryDate IS NOT NULL AND complianceDocumentExpiryDate <= ?",
            );
            bind_values.push(Value::Text(limit_date.to_string()));
        }
        sql.push_str(" ORDER BY complianceDocumentTimestampCreated DESC, complianceDocumentID DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_document_row(row)?);
        }
        Ok(documents)
    }

    fn change_status(&self, id: RecordId, change: &StatusChange<'_>) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE complianceDocument
             SET
                complianceDocumentStatus = ?3,
                complianceDocumentReviewedBy = COALESCE(?4, complianceDocumentReviewedBy),
                complianceDocumentReviewedAt = ?5,
                complianceDocumentRejectionReason = ?6
             WHERE complianceDocumentID = ?1
               AND complianceDocumentStatus = ?2;",
            params![
                id,
                change.from.as_str(),
                change.to.as_str(),
                change.reviewed_by,
                change.reviewed_at,
                change.rejection_reason,
            ],
        )?;
        if changed == 0 {
            let exists: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM complianceDocument WHERE complianceDocumentID = ?1);",
                [id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(RepoError::not_found("document", id));
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn expire_before(&self, today: NaiveDate, at: DateTime<Utc>) -> RepoResult<usize> {
        let changed = self.conn.execute(
            "UPDATE complianceDocument
             SET
                complianceDocumentStatus = ?1,
                complianceDocumentReviewedAt = ?2
             WHERE complianceDocumentStatus IN (?3, ?4)
               AND complianceDocumentExpiryDate IS NOT NULL
               AND complianceDocumentExpiryDate < ?5;",
            params![
                DocumentStatus::Expired.as_str(),
                at,
                DocumentStatus::Pending.as_str(),
                DocumentStatus::Verified.as_str(),
                today,
            ],
        )?;
        Ok(changed)
    }
}

fn parse_document_row(row: &Row<'_>) -> RepoResult<ComplianceDocument> {
    Ok(ComplianceDocument {
        id: row.get("complianceDocumentID")?,
        person_id: row.get("personID")?,
        document_type: row.get("complianceDocumentType")?,
        document_number: row.get("complianceDocumentNumber")?,
        file_path: row.get("complianceDocumentFilePath")?,
        issue_date: row.get("complianceDocumentIssueDate")?,
        expiry_date: row.get("complianceDocumentExpiryDate")?,
        status: enum_column(row, "complianceDocumentStatus", DocumentStatus::parse)?,
        reviewed_by: row.get("complianceDocumentReviewedBy")?,
        reviewed_at: row.get("complianceDocumentReviewedAt")?,
        rejection_reason: row.get("complianceDocumentRejectionReason")?,
        notes: row.get("complianceDocumentNotes")?,
        submitted_by: row.get("complianceDocumentSubmittedBy")?,
        created_at: row.get("complianceDocumentTimestampCreated")?,
    })
}
