//! AI-sync webhook log gateway.

use super::{enum_column, RepoError, RepoResult};
use crate::model::sync::{NewSyncAttempt, SyncLogEntry, SyncStatus};
use crate::model::RecordId;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

const SYNC_LOG_SELECT_SQL: &str = "SELECT
    aiSyncLogID,
    aiSyncLogEventType,
    aiSyncLogEntityType,
    aiSyncLogEntityID,
    aiSyncLogPayload,
    aiSyncLogStatus,
    aiSyncLogHttpStatus,
    aiSyncLogResponse,
    aiSyncLogError,
    aiSyncLogRetryCount,
    aiSyncLogTimestampCreated,
    aiSyncLogTimestampUpdated
FROM aiSyncLog";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncLogQuery {
    pub status: Option<SyncStatus>,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub limit: Option<u32>,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome<'a> {
    pub status: SyncStatus,
    pub http_status: Option<u16>,
    pub response: Option<&'a str>,
    pub error: Option<&'a str>,
    /// Increments `retry_count` when set.
    pub count_as_retry: bool,
}

pub trait SyncLogRepository {
    fn create_entry(&self, attempt: &NewSyncAttempt) -> RepoResult<RecordId>;
    fn get_entry(&self, id: RecordId) -> RepoResult<Option<SyncLogEntry>>;
    fn list_entries(&self, query: &SyncLogQuery) -> RepoResult<Vec<SyncLogEntry>>;
    fn record_outcome(&self, id: RecordId, outcome: &DeliveryOutcome<'_>) -> RepoResult<()>;
    /// Failed entries whose retry count is below `max_retries`.
    fn list_retryable(&self, max_retries: u32) -> RepoResult<Vec<SyncLogEntry>>;
    fn count_by_status(&self) -> RepoResult<BTreeMap<String, u64>>;
    /// Deletes terminal entries last updated before `cutoff`.
    fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> RepoResult<usize>;
}

pub struct SqliteSyncLogRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSyncLogRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl SyncLogRepository for SqliteSyncLogRepository<'_> {
    fn create_entry(&self, attempt: &NewSyncAttempt) -> RepoResult<RecordId> {
        attempt.validate()?;

        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO aiSyncLog (
                aiSyncLogEventType,
                aiSyncLogEntityType,
                aiSyncLogEntityID,
                aiSyncLogPayload,
                aiSyncLogStatus,
                aiSyncLogTimestampCreated,
                aiSyncLogTimestampUpdated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6);",
            params![
                attempt.event_type.trim(),
                attempt.entity_type.trim(),
                attempt.entity_id,
                attempt.payload.to_string(),
                SyncStatus::Pending.as_str(),
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_entry(&self, id: RecordId) -> RepoResult<Option<SyncLogEntry>> {
        self.conn
            .query_row(
                &format!("{SYNC_LOG_SELECT_SQL} WHERE aiSyncLogID = ?1;"),
                [id],
                |row| Ok(parse_sync_log_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_entries(&self, query: &SyncLogQuery) -> RepoResult<Vec<SyncLogEntry>> {
        let mut sql = format!("{SYNC_LOG_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(status) = query.status {
            sql.push_str(" AND aiSyncLogStatus = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(entity_type) = query.entity_type.as_ref() {
            sql.push_str(" AND aiSyncLogEntityType = ?");
            bind_values.push(Value::Text(entity_type.clone()));
        }
        if let Some(entity_id) = query.entity_id {
            sql.push_str(" AND aiSyncLogEntityID = ?");
            bind_values.push(Value::Integer(entity_id));
        }
        sql.push_str(" ORDER BY aiSyncLogTimestampCreated DESC, aiSyncLogID DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        collect_entries(self.conn, &sql, bind_values)
    }

    fn record_outcome(&self, id: RecordId, outcome: &DeliveryOutcome<'_>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE aiSyncLog
             SET
                aiSyncLogStatus = ?2,
                aiSyncLogHttpStatus = ?3,
                aiSyncLogResponse = ?4,
                aiSyncLogError = ?5,
                aiSyncLogRetryCount = aiSyncLogRetryCount + ?6,
                aiSyncLogTimestampUpdated = ?7
             WHERE aiSyncLogID = ?1;",
            params![
                id,
                outcome.status.as_str(),
                outcome.http_status,
                outcome.response,
                outcome.error,
                i64::from(outcome.count_as_retry),
                Utc::now(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("sync log entry", id));
        }
        Ok(())
    }

    fn list_retryable(&self, max_retries: u32) -> RepoResult<Vec<SyncLogEntry>> {
        collect_entries(
            self.conn,
            &format!(
                "{SYNC_LOG_SELECT_SQL}
                 WHERE aiSyncLogStatus = ?
                   AND aiSyncLogRetryCount < ?
                 ORDER BY aiSyncLogTimestampUpdated ASC, aiSyncLogID ASC"
            ),
            vec![
                Value::Text(SyncStatus::Failed.as_str().to_string()),
                Value::Integer(i64::from(max_retries)),
            ],
        )
    }

    fn count_by_status(&self) -> RepoResult<BTreeMap<String, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT aiSyncLogStatus, COUNT(*) FROM aiSyncLog GROUP BY aiSyncLogStatus;",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .map(|entry| entry.map(|(status, count)| (status, count.unsigned_abs())))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    fn delete_terminal_before(&self, cutoff: DateTime<Utc>) -> RepoResult<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM aiSyncLog
             WHERE aiSyncLogStatus IN (?1, ?2)
               AND aiSyncLogTimestampUpdated < ?3;",
            params![
                SyncStatus::Success.as_str(),
                SyncStatus::Abandoned.as_str(),
                cutoff,
            ],
        )?;
        Ok(deleted)
    }
}

fn collect_entries(
    conn: &Connection,
    sql: &str,
    bind_values: Vec<Value>,
) -> RepoResult<Vec<SyncLogEntry>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_sync_log_row(row)?);
    }
    Ok(entries)
}

fn parse_sync_log_row(row: &Row<'_>) -> RepoResult<SyncLogEntry> {
    let payload_text: String = row.get("aiSyncLogPayload")?;
    let payload = serde_json::from_str(&payload_text).map_err(|err| {
        RepoError::InvalidData(format!("invalid JSON in aiSyncLogPayload: {err}"))
    })?;

    Ok(SyncLogEntry {
        id: row.get("aiSyncLogID")?,
        event_type: row.get("aiSyncLogEventType")?,
        entity_type: row.get("aiSyncLogEntityType")?,
        entity_id: row.get("aiSyncLogEntityID")?,
        payload,
        status: enum_column(row, "aiSyncLogStatus", SyncStatus::parse)?,
        http_status: row.get("aiSyncLogHttpStatus")?,
        response: row.get("aiSyncLogResponse")?,
        error: row.get("aiSyncLogError")?,
        retry_count: row.get("aiSyncLogRetryCount")?,
        created_at: row.get("aiSyncLogTimestampCreated")?,
        updated_at: row.get("aiSyncLogTimestampUpdated")?,
    })
}
