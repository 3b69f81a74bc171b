//! AI-sync webhook attempt bookkeeping.
//!
//! # Invariants
//! - Only `Pending` and `Failed` entries accept a new outcome.
//! - Each failure adds one to `retry_count`; reaching `max_retries` makes
//!   the entry `Abandoned`.

use crate::model::sync::{NewSyncAttempt, SyncLogEntry, SyncStatus};
use crate::model::{RecordId, ValidationError};
use crate::repo::sync_log_repo::{DeliveryOutcome, SyncLogQuery, SyncLogRepository};
use crate::repo::RepoError;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_MAX_RETRIES: u32 = 5;

#[derive(Debug)]
pub enum SyncServiceError {
    EntryNotFound(RecordId),
    /// The entry already reached `Success` or `Abandoned`.
    AlreadyFinal { id: RecordId, status: SyncStatus },
    Validation(ValidationError),
    Repo(RepoError),
}

impl Display for SyncServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EntryNotFound(id) => write!(f, "sync log entry not found: {id}"),
            Self::AlreadyFinal { id, status } => {
                write!(f, "sync log entry {id} is already {status}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SyncServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound { id, .. } => Self::EntryNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncServiceError>;

/// Entry counts per status; absent statuses count zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub pending: u64,
    pub success: u64,
    pub failed: u64,
    pub abandoned: u64,
}

impl SyncStats {
    fn from_counts(counts: &BTreeMap<String, u64>) -> Self {
        let count = |status: SyncStatus| counts.get(status.as_str()).copied().unwrap_or_default();
        Self {
            pending: count(SyncStatus::Pending),
            success: count(SyncStatus::Success),
            failed: count(SyncStatus::Failed),
            abandoned: count(SyncStatus::Abandoned),
        }
    }

    pub fn total(&self) -> u64 {
        self.pending + self.success + self.failed + self.abandoned
    }
}

pub struct SyncLogService<R: SyncLogRepository> {
    repo: R,
    max_retries: u32,
}

impl<R: SyncLogRepository> SyncLogService<R> {
    pub fn new(repo: R, max_retries: u32) -> Self {
        Self { repo, max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn record_attempt(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: i64,
        payload: serde_json::Value,
    ) -> SyncResult<SyncLogEntry> {
        let id = self.repo.create_entry(&NewSyncAttempt {
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            payload,
        })?;
        info!(
            "event=ai_sync_attempt module=ai_sync status=pending entry_id={} entity_id={}",
            id, entity_id
        );
        self.get(id)
    }

    pub fn get(&self, id: RecordId) -> SyncResult<SyncLogEntry> {
        self.repo
            .get_entry(id)?
            .ok_or(SyncServiceError::EntryNotFound(id))
    }

    pub fn list(&self, query: &SyncLogQuery) -> SyncResult<Vec<SyncLogEntry>> {
        Ok(self.repo.list_entries(query)?)
    }

    pub fn mark_success(
        &self,
        id: RecordId,
        http_status: u16,
        response: Option<&str>,
    ) -> SyncResult<SyncLogEntry> {
        self.open_entry(id)?;
        self.repo.record_outcome(
            id,
            &DeliveryOutcome {
                status: SyncStatus::Success,
                http_status: Some(http_status),
                response,
                error: None,
                count_as_retry: false,
            },
        )?;
        info!(
            "event=ai_sync_delivery module=ai_sync status=ok entry_id={id} http_status={http_status}"
        );
        self.get(id)
    }

    /// Records a failed delivery; `http_status` is `None` for transport errors.
    pub fn mark_failure(
        &self,
        id: RecordId,
        http_status: Option<u16>,
        error: &str,
    ) -> SyncResult<SyncLogEntry> {
        let entry = self.open_entry(id)?;
        let attempts = entry.retry_count.saturating_add(1);
        let status = if attempts >= self.max_retries {
            SyncStatus::Abandoned
        } else {
            SyncStatus::Failed
        };

        self.repo.record_outcome(
            id,
            &DeliveryOutcome {
                status,
                http_status,
                response: None,
                error: Some(error),
                count_as_retry: true,
            },
        )?;
        warn!(
            "event=ai_sync_delivery module=ai_sync status={} entry_id={} retry_count={} http_status={}",
            status.as_str().to_ascii_lowercase(),
            id,
            attempts,
            http_status.map_or_else(|| "none".to_string(), |code| code.to_string())
        );
        self.get(id)
    }

    /// Failed entries still below the retry limit, oldest update first.
    pub fn retryable(&self) -> SyncResult<Vec<SyncLogEntry>> {
        Ok(self.repo.list_retryable(self.max_retries)?)
    }

    pub fn stats(&self) -> SyncResult<SyncStats> {
        Ok(SyncStats::from_counts(&self.repo.count_by_status()?))
    }

    /// Deletes `Success` and `Abandoned` entries last updated before `cutoff`.
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> SyncResult<usize> {
        let purged = self.repo.delete_terminal_before(cutoff)?;
        info!("event=ai_sync_purge module=ai_sync status=ok purged={purged}");
        Ok(purged)
    }

    fn open_entry(&self, id: RecordId) -> SyncResult<SyncLogEntry> {
        let entry = self.get(id)?;
        if entry.status.is_terminal() {
            return Err(SyncServiceError::AlreadyFinal {
                id,
                status: entry.status,
            });
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::SyncStats;
    use std::collections::BTreeMap;

    #[test]
    fn stats_fill_missing_statuses_with_zero() {
        let counts = BTreeMap::from([("Failed".to_string(), 3), ("Success".to_string(), 9)]);
        let stats = SyncStats::from_counts(&counts);
        assert_eq!(stats.failed, 3);
        assert_eq!(stats.success, 9);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total(), 12);
    }
}
