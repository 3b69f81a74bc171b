use campusdesk_core::db::open_db_in_memory;
use campusdesk_core::model::sync::SyncStatus;
use campusdesk_core::repo::sync_log_repo::{SyncLogQuery, SqliteSyncLogRepository};
use campusdesk_core::{SyncLogService, SyncServiceError, ValidationError};
use chrono::{Duration, Utc};
use serde_json::json;

#[test]
fn attempts_start_pending_and_keep_their_payload() {
    let conn = open_db_in_memory().unwrap();
    let service = SyncLogService::new(SqliteSyncLogRepository::new(&conn), 3);

    let entry = service
        .record_attempt(
            "attendance.checked_in",
            "careAttendance",
            41,
            json!({ "personID": 12, "time": "08:15" }),
        )
        .unwrap();
    assert_eq!(entry.status, SyncStatus::Pending);
    assert_eq!(entry.retry_count, 0);
    assert_eq!(entry.payload["personID"], 12);

    let blank = service
        .record_attempt(" ", "careAttendance", 41, json!({}))
        .unwrap_err();
    assert!(matches!(
        blank,
        SyncServiceError::Validation(ValidationError::EmptyField(_))
    ));
}

#[test]
fn failures_count_retries_until_abandoned() {
    let conn = open_db_in_memory().unwrap();
    let service = SyncLogService::new(SqliteSyncLogRepository::new(&conn), 3);
    let entry = service
        .record_attempt("incident.reported", "careIncident", 7, json!({ "severity": "Serious" }))
        .unwrap();

    let first = service.mark_failure(entry.id, Some(502), "bad gateway").unwrap();
    assert_eq!(first.status, SyncStatus::Failed);
    assert_eq!(first.retry_count, 1);
    assert_eq!(first.http_status, Some(502));
    assert_eq!(service.retryable().unwrap().len(), 1);

    let second = service.mark_failure(entry.id, None, "connection reset").unwrap();
    assert_eq!(second.status, SyncStatus::Failed);
    assert_eq!(second.http_status, None);

    let third = service.mark_failure(entry.id, Some(500), "internal error").unwrap();
    assert_eq!(third.status, SyncStatus::Abandoned);
    assert_eq!(third.retry_count, 3);
    assert!(service.retryable().unwrap().is_empty());

    assert!(matches!(
        service.mark_success(entry.id, 200, None),
        Err(SyncServiceError::AlreadyFinal {
            status: SyncStatus::Abandoned,
            ..
        })
    ));
}

#[test]
fn success_is_final_and_stats_count_each_status() {
    let conn = open_db_in_memory().unwrap();
    let service = SyncLogService::new(SqliteSyncLogRepository::new(&conn), 5);

    let delivered = service
        .record_attempt("photo.tagged", "photoTag", 1, json!({}))
        .unwrap();
    let failing = service
        .record_attempt("photo.tagged", "photoTag", 2, json!({}))
        .unwrap();
    service
        .record_attempt("photo.tagged", "photoTag", 3, json!({}))
        .unwrap();

    let success = service
        .mark_success(delivered.id, 200, Some("{\"ok\":true}"))
        .unwrap();
    assert_eq!(success.status, SyncStatus::Success);
    assert_eq!(success.response.as_deref(), Some("{\"ok\":true}"));
    assert!(matches!(
        service.mark_failure(delivered.id, Some(500), "late"),
        Err(SyncServiceError::AlreadyFinal { .. })
    ));
    service.mark_failure(failing.id, Some(503), "unavailable").unwrap();

    let stats = service.stats().unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.abandoned, 0);
    assert_eq!(stats.total(), 3);

    let for_entity = service
        .list(&SyncLogQuery {
            entity_id: Some(2),
            ..SyncLogQuery::default()
        })
        .unwrap();
    assert_eq!(for_entity.len(), 1);
    assert_eq!(for_entity[0].error.as_deref(), Some("unavailable"));

    assert!(matches!(
        service.mark_success(9_999, 200, None),
        Err(SyncServiceError::EntryNotFound(9_999))
    ));
}

#[test]
fn purge_removes_only_finished_entries_before_cutoff() {
    let conn = open_db_in_memory().unwrap();
    let service = SyncLogService::new(SqliteSyncLogRepository::new(&conn), 1);

    let delivered = service
        .record_attempt("attendance.checked_out", "careAttendance", 1, json!({}))
        .unwrap();
    service.mark_success(delivered.id, 204, None).unwrap();
    let abandoned = service
        .record_attempt("attendance.checked_out", "careAttendance", 2, json!({}))
        .unwrap();
    service.mark_failure(abandoned.id, Some(400), "rejected").unwrap();
    let pending = service
        .record_attempt("attendance.checked_out", "careAttendance", 3, json!({}))
        .unwrap();

    assert_eq!(service.purge_before(Utc::now() - Duration::days(1)).unwrap(), 0);
    assert_eq!(service.purge_before(Utc::now() + Duration::seconds(5)).unwrap(), 2);

    let remaining = service.list(&SyncLogQuery::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, pending.id);
}
