//! Invoice, payment and export-log records.
//!
//! # Invariants
//! - Amounts are persisted as integer cents and surfaced as 2-place decimals.
//! - `invoice.total == invoice.subtotal + invoice.tax`.
//! - Export logs move Pending -> Processing -> Completed | Failed.

use super::{require_text, FamilyId, PersonId, RecordId, SchoolYearId, ValidationError};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Converts stored integer cents into a 2-place decimal.
pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Converts a decimal amount into integer cents.
///
/// Rejects amounts with sub-cent precision instead of rounding them.
pub fn decimal_to_cents(amount: Decimal) -> Result<i64, ValidationError> {
    let scaled = amount * Decimal::ONE_HUNDRED;
    if !scaled.fract().is_zero() {
        return Err(ValidationError::InvalidAmount(format!(
            "{amount} has more than two decimal places"
        )));
    }
    scaled
        .to_i64()
        .ok_or_else(|| ValidationError::InvalidAmount(format!("{amount} is out of range")))
}

/// Billing family as seen by the accounting package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub family_id: FamilyId,
    pub name: String,
    /// Explicit ledger customer code; generated from `family_id` when absent.
    pub account_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Issued,
    Partial,
    Paid,
    Cancelled,
    Refunded,
}

db_enum!(InvoiceStatus {
    Pending => "Pending",
    Issued => "Issued",
    Partial => "Partial",
    Paid => "Paid",
    Cancelled => "Cancelled",
    Refunded => "Refunded",
});

impl InvoiceStatus {
    /// Statuses that represent revenue posted to the ledger.
    pub const EXPORTABLE: &'static [InvoiceStatus] = &[Self::Issued, Self::Partial, Self::Paid];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub customer: Customer,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub description: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
}

impl Invoice {
    pub fn has_tax(&self) -> bool {
        !self.tax.is_zero()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub school_year_id: SchoolYearId,
    pub family_id: FamilyId,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub description: String,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub status: InvoiceStatus,
}

impl NewInvoice {
    pub fn total(&self) -> Decimal {
        self.subtotal + self.tax
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("invoice number", &self.number)?;
        if self.subtotal.is_sign_negative() || self.tax.is_sign_negative() {
            return Err(ValidationError::InvalidAmount(
                "invoice subtotal and tax must not be negative".to_string(),
            ));
        }
        if let Some(due) = self.due_date {
            if due < self.issue_date {
                return Err(ValidationError::InvalidRange {
                    field: "invoice due date",
                    details: format!("{due} is before issue date {}", self.issue_date),
                });
            }
        }
        decimal_to_cents(self.subtotal)?;
        decimal_to_cents(self.tax)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Cheque,
    BankTransfer,
    CreditCard,
    Other,
}

db_enum!(PaymentMethod {
    Cash => "Cash",
    Cheque => "Cheque",
    BankTransfer => "Bank Transfer",
    CreditCard => "Credit Card",
    Other => "Other",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: RecordId,
    pub school_year_id: SchoolYearId,
    pub customer: Customer,
    pub invoice_id: Option<RecordId>,
    /// Number of the settled invoice, when linked.
    pub invoice_number: Option<String>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub school_year_id: SchoolYearId,
    pub family_id: FamilyId,
    pub invoice_id: Option<RecordId>,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub transaction_id: Option<String>,
    pub notes: Option<String>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.amount <= Decimal::ZERO {
            return Err(ValidationError::InvalidAmount(format!(
                "payment amount {} must be positive",
                self.amount
            )));
        }
        decimal_to_cents(self.amount)?;
        Ok(())
    }
}

/// Supported accounting export targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportType {
    Sage50Invoices,
    Sage50Payments,
    QuickbooksInvoices,
    QuickbooksPayments,
    BankReconciliation,
}

db_enum!(ExportType {
    Sage50Invoices => "sage50_invoices",
    Sage50Payments => "sage50_payments",
    QuickbooksInvoices => "quickbooks_invoices",
    QuickbooksPayments => "quickbooks_payments",
    BankReconciliation => "bank_reconciliation",
});

impl ExportType {
    /// Directory under the exports root that holds this target's files.
    pub fn module_dir(self) -> &'static str {
        match self {
            Self::Sage50Invoices | Self::Sage50Payments => "sage50",
            Self::QuickbooksInvoices | Self::QuickbooksPayments => "quickbooks",
            Self::BankReconciliation => "bank_reconciliation",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            Self::QuickbooksInvoices | Self::QuickbooksPayments => "iif",
            Self::Sage50Invoices | Self::Sage50Payments | Self::BankReconciliation => "csv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExportStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

db_enum!(ExportStatus {
    Pending => "Pending",
    Processing => "Processing",
    Completed => "Completed",
    Failed => "Failed",
});

/// Audit row for one export attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportLog {
    pub id: RecordId,
    pub export_type: ExportType,
    pub school_year_id: SchoolYearId,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub status: ExportStatus,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub checksum: Option<String>,
    pub record_count: Option<u64>,
    pub total_amount: Option<Decimal>,
    pub file_size: Option<u64>,
    pub error: Option<String>,
    pub created_by: Option<PersonId>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Final figures written onto a completed export log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportCompletion {
    pub file_name: String,
    pub file_path: String,
    pub checksum: String,
    pub record_count: u64,
    pub total_amount: Decimal,
    pub file_size: u64,
}
