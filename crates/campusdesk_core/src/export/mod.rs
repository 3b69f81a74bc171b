//! Accounting ledger export generators.
//!
//! # Responsibility
//! - Map invoice/payment rows into Sage 50 CSV, QuickBooks IIF and bank
//!   reconciliation CSV bytes.
//! - Write files under the date-bucketed export tree and checksum them.
//!
//! # Invariants
//! - Renderers are pure: same rows and settings give byte-identical output.
//! - Renderers never see an empty row set; the export service rejects it
//!   before any file is created.

use crate::model::finance::{Customer, ExportType, Invoice, Payment};
use crate::repo::finance_repo::{FinanceRepository, LedgerQuery};
use crate::repo::{RepoError, RepoResult};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod bank_reconciliation;
pub mod format;
pub mod output;
pub mod quickbooks;
pub mod sage50;

pub use bank_reconciliation::{BankReconciliation, BankReconciliationSettings};
pub use format::{format_amount, sanitize_iif_text, sanitize_text, DateFormat};
pub use output::{file_checksum, sha256_hex, ExportOutput, WrittenFile};
pub use quickbooks::{QuickBooksInvoices, QuickBooksPayments, QuickBooksSettings};
pub use sage50::{Sage50Invoices, Sage50Payments, Sage50Settings};

/// Export pipeline failure.
#[derive(Debug)]
pub enum ExportError {
    InvalidDateRange { from: NaiveDate, to: NaiveDate },
    EmptyResult(ExportType),
    Repo(RepoError),
    Io { path: PathBuf, source: std::io::Error },
    Csv(csv::Error),
    Format(String),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDateRange { from, to } => {
                write!(f, "date range start {from} is after end {to}")
            }
            Self::EmptyResult(export_type) => {
                write!(f, "no records found for {export_type} export")
            }
            Self::Repo(err) => write!(f, "{err}"),
            Self::Io { path, source } => write!(f, "failed to write `{}`: {source}", path.display()),
            Self::Csv(err) => write!(f, "failed to encode rows: {err}"),
            Self::Format(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Csv(err) => Some(err),
            Self::InvalidDateRange { .. } | Self::EmptyResult(_) | Self::Format(_) => None,
        }
    }
}

impl From<RepoError> for ExportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<csv::Error> for ExportError {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

/// A source row an export can read and total.
pub trait LedgerRow: Sized {
    fn fetch<R: FinanceRepository + ?Sized>(repo: &R, query: &LedgerQuery) -> RepoResult<Vec<Self>>;
    /// Amount summed into the export log total.
    fn ledger_amount(&self) -> Decimal;
}

impl LedgerRow for Invoice {
    fn fetch<R: FinanceRepository + ?Sized>(repo: &R, query: &LedgerQuery) -> RepoResult<Vec<Self>> {
        repo.list_invoices(query)
    }

    fn ledger_amount(&self) -> Decimal {
        self.total
    }
}

impl LedgerRow for Payment {
    fn fetch<R: FinanceRepository + ?Sized>(repo: &R, query: &LedgerQuery) -> RepoResult<Vec<Self>> {
        repo.list_payments(query)
    }

    fn ledger_amount(&self) -> Decimal {
        self.amount
    }
}

/// One target file format over one kind of ledger row.
pub trait LedgerFormat {
    type Row: LedgerRow;

    fn export_type(&self) -> ExportType;
    fn render(&self, rows: &[Self::Row]) -> Result<Vec<u8>, ExportError>;
}

/// Account codes and layout options for every export target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    pub sage50: Sage50Settings,
    pub quickbooks: QuickBooksSettings,
    pub bank_reconciliation: BankReconciliationSettings,
}

/// Customer code used when a family has no explicit account code.
pub(crate) fn customer_code(customer: &Customer, prefix: &str) -> String {
    match customer.account_code.as_deref().map(sanitize_text) {
        Some(code) if !code.is_empty() => code,
        _ => format!("{prefix}{:05}", customer.family_id),
    }
}
