//! Core logic for the campusdesk school admin modules.
//!
//! Childcare tracking, document compliance, photo access, AI-sync logging
//! and accounting exports, each as a SQLite gateway plus a service.

pub mod config;
pub mod db;
pub mod export;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use export::{ExportError, ExportOutput, ExportSettings};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::{PersonId, RecordId, Role, SchoolYearId, ValidationError};
pub use repo::{RepoError, RepoResult};
pub use service::care_service::{CareService, CareServiceError, DailySummary};
pub use service::document_service::{
    ComplianceReport, ComplianceState, DocumentService, DocumentServiceError,
};
pub use service::export_service::{
    ExportFailure, ExportRequest, ExportSummary, FileVerification, LedgerExportService,
};
pub use service::photo_access::{can_view_photo, Actor, PhotoAction};
pub use service::photo_service::{PhotoServiceError, PhotoTagService};
pub use service::sync_service::{SyncLogService, SyncServiceError, SyncStats};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
