//! Ledger export orchestration.
//!
//! # Responsibility
//! - Validate the request, fetch ledger rows and render the target format.
//! - Write the file and keep the export log in step with every outcome.
//!
//! # Invariants
//! - An invalid date range fails before any log row is written.
//! - Every failure after the log row exists marks that row `Failed`.
//! - Empty row sets never create a directory or file.
//! - A completed log row always points at a file whose SHA-256 matches.

use crate::export::{
    file_checksum, BankReconciliation, ExportError, ExportOutput, ExportSettings, LedgerFormat,
    LedgerRow, QuickBooksInvoices, QuickBooksPayments, Sage50Invoices, Sage50Payments,
};
use crate::model::finance::{ExportCompletion, ExportLog, ExportType};
use crate::model::{PersonId, RecordId, SchoolYearId};
use crate::repo::finance_repo::{ExportLogQuery, FinanceRepository, LedgerQuery};
use crate::repo::RepoError;
use chrono::{NaiveDate, Utc};
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// One export invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRequest {
    pub export_type: ExportType,
    pub school_year_id: SchoolYearId,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub requested_by: Option<PersonId>,
}

impl ExportRequest {
    pub fn new(export_type: ExportType, school_year_id: SchoolYearId) -> Self {
        Self {
            export_type,
            school_year_id,
            date_from: None,
            date_to: None,
            requested_by: None,
        }
    }

    fn ledger_query(&self) -> Result<LedgerQuery, ExportError> {
        if let (Some(from), Some(to)) = (self.date_from, self.date_to) {
            if from > to {
                return Err(ExportError::InvalidDateRange { from, to });
            }
        }
        Ok(LedgerQuery {
            school_year_id: self.school_year_id,
            date_from: self.date_from,
            date_to: self.date_to,
        })
    }
}

/// Result of a completed export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub log_id: RecordId,
    pub export_type: ExportType,
    pub file_name: String,
    pub file_path: PathBuf,
    pub record_count: u64,
    pub total_amount: Decimal,
    pub file_size: u64,
    pub checksum: String,
}

/// Failed export together with the log row it was recorded on.
#[derive(Debug)]
pub struct ExportFailure {
    /// `None` when the request failed before a log row existed.
    pub log_id: Option<RecordId>,
    pub error: ExportError,
}

impl Display for ExportFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.log_id {
            Some(log_id) => write!(f, "export {log_id} failed: {}", self.error),
            None => write!(f, "export failed: {}", self.error),
        }
    }
}

impl Error for ExportFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.error)
    }
}

impl From<ExportError> for ExportFailure {
    fn from(error: ExportError) -> Self {
        Self {
            log_id: None,
            error,
        }
    }
}

/// Outcome of re-hashing an exported file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileVerification {
    pub log_id: RecordId,
    pub file_path: PathBuf,
    pub expected_checksum: String,
    pub actual_checksum: String,
    pub matches: bool,
}

pub struct LedgerExportService<R: FinanceRepository> {
    repo: R,
    output: ExportOutput,
    settings: ExportSettings,
}

impl<R: FinanceRepository> LedgerExportService<R> {
    pub fn new(repo: R, output: ExportOutput, settings: ExportSettings) -> Self {
        Self {
            repo,
            output,
            settings,
        }
    }

    /// Runs the export named by `request.export_type`.
    pub fn export(&self, request: &ExportRequest) -> Result<ExportSummary, ExportFailure> {
        let settings = &self.settings;
        match request.export_type {
            ExportType::Sage50Invoices => self.run(&Sage50Invoices::new(&settings.sage50), request),
            ExportType::Sage50Payments => self.run(&Sage50Payments::new(&settings.sage50), request),
            ExportType::QuickbooksInvoices => {
                self.run(&QuickBooksInvoices::new(&settings.quickbooks), request)
            }
            ExportType::QuickbooksPayments => {
                self.run(&QuickBooksPayments::new(&settings.quickbooks), request)
            }
            ExportType::BankReconciliation => self.run(
                &BankReconciliation::new(&settings.bank_reconciliation),
                request,
            ),
        }
    }

    /// Runs one format end to end, recording the outcome on a new log row.
    pub fn run<F: LedgerFormat>(
        &self,
        format: &F,
        request: &ExportRequest,
    ) -> Result<ExportSummary, ExportFailure> {
        let export_type = format.export_type();
        let started_at = Instant::now();
        info!(
            "event=export_run module=export status=start export_type={} school_year_id={}",
            export_type, request.school_year_id
        );

        let query = request.ledger_query().map_err(|err| {
            warn!(
                "event=export_run module=export status=error export_type={} error_code=invalid_date_range",
                export_type
            );
            ExportFailure::from(err)
        })?;
        let log_id = self
            .repo
            .create_export_log(export_type, &query, request.requested_by)
            .map_err(|err| ExportFailure::from(ExportError::from(err)))?;

        match self.generate(format, &query, log_id) {
            Ok(summary) => {
                info!(
                    "event=export_run module=export status=ok export_type={} log_id={} record_count={} file_size={} duration_ms={}",
                    export_type,
                    log_id,
                    summary.record_count,
                    summary.file_size,
                    started_at.elapsed().as_millis()
                );
                Ok(summary)
            }
            Err(err) => {
                error!(
                    "event=export_run module=export status=error export_type={} log_id={} duration_ms={} error={}",
                    export_type,
                    log_id,
                    started_at.elapsed().as_millis(),
                    err
                );
                if let Err(log_err) = self.repo.fail_export_log(log_id, &err.to_string()) {
                    error!(
                        "event=export_log module=export status=error log_id={} error_code=fail_write_failed error={}",
                        log_id, log_err
                    );
                }
                Err(ExportFailure {
                    log_id: Some(log_id),
                    error: err,
                })
            }
        }
    }

    pub fn get_log(&self, id: RecordId) -> Result<Option<ExportLog>, ExportError> {
        Ok(self.repo.get_export_log(id)?)
    }

    pub fn list_logs(&self, query: &ExportLogQuery) -> Result<Vec<ExportLog>, ExportError> {
        Ok(self.repo.list_export_logs(query)?)
    }

    /// Recomputes the SHA-256 of a completed export and compares it.
    pub fn verify_export_file(&self, log_id: RecordId) -> Result<FileVerification, ExportError> {
        let log = self
            .repo
            .get_export_log(log_id)?
            .ok_or_else(|| ExportError::Repo(RepoError::not_found("export log", log_id)))?;
        let (Some(file_path), Some(expected_checksum)) = (log.file_path, log.checksum) else {
            return Err(ExportError::Format(format!(
                "export log {log_id} is {} and has no file to verify",
                log.status
            )));
        };

        let file_path = PathBuf::from(file_path);
        let actual_checksum = file_checksum(&file_path)?;
        let matches = actual_checksum.eq_ignore_ascii_case(&expected_checksum);
        if !matches {
            warn!("event=export_verify module=export status=mismatch log_id={log_id}");
        }
        Ok(FileVerification {
            log_id,
            file_path,
            expected_checksum,
            actual_checksum,
            matches,
        })
    }

    fn generate<F: LedgerFormat>(
        &self,
        format: &F,
        query: &LedgerQuery,
        log_id: RecordId,
    ) -> Result<ExportSummary, ExportError> {
        let export_type = format.export_type();
        self.repo.mark_export_processing(log_id)?;

        let rows = <F::Row as LedgerRow>::fetch(&self.repo, query)?;
        if rows.is_empty() {
            return Err(ExportError::EmptyResult(export_type));
        }
        let total_amount: Decimal = rows.iter().map(LedgerRow::ledger_amount).sum();
        let bytes = format.render(&rows)?;

        let now = Utc::now();
        let file_name = ExportOutput::file_name(export_type, query.school_year_id, log_id, now);
        let written = self.output.write(export_type, &file_name, now, &bytes)?;

        let completion = ExportCompletion {
            file_name: written.file_name.clone(),
            file_path: written.path.display().to_string(),
            checksum: written.checksum.clone(),
            record_count: rows.len() as u64,
            total_amount,
            file_size: written.size,
        };
        if let Err(err) = self.repo.complete_export_log(log_id, &completion) {
            discard_file(&written.path, log_id);
            return Err(err.into());
        }

        Ok(ExportSummary {
            log_id,
            export_type,
            file_name: written.file_name,
            file_path: written.path,
            record_count: completion.record_count,
            total_amount,
            file_size: written.size,
            checksum: written.checksum,
        })
    }
}

fn discard_file(path: &Path, log_id: RecordId) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(
            "event=export_cleanup module=export status=error log_id={} error={}",
            log_id, err
        );
    }
}
