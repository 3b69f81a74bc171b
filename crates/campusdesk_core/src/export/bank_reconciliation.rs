//! Bank reconciliation CSV: one row per received payment.

use super::format::{format_amount, sanitize_text, DateFormat, DelimitedWriter};
use super::sage50::{delimiter_byte, payment_reference};
use super::{ExportError, LedgerFormat};
use crate::model::finance::{ExportType, Payment};
use serde::{Deserialize, Serialize};

const HEADER: [&str; 8] = [
    "Date",
    "Reference",
    "Transaction ID",
    "Payer",
    "Payment Method",
    "Invoice Number",
    "Description",
    "Amount",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankReconciliationSettings {
    pub date_format: DateFormat,
    pub delimiter: char,
    pub include_header: bool,
}

impl Default for BankReconciliationSettings {
    fn default() -> Self {
        Self {
            date_format: DateFormat::YearMonthDay,
            delimiter: ',',
            include_header: true,
        }
    }
}

pub struct BankReconciliation<'a> {
    settings: &'a BankReconciliationSettings,
}

impl<'a> BankReconciliation<'a> {
    pub fn new(settings: &'a BankReconciliationSettings) -> Self {
        Self { settings }
    }
}

impl LedgerFormat for BankReconciliation<'_> {
    type Row = Payment;

    fn export_type(&self) -> ExportType {
        ExportType::BankReconciliation
    }

    fn render(&self, rows: &[Payment]) -> Result<Vec<u8>, ExportError> {
        let settings = self.settings;
        let mut writer = DelimitedWriter::csv(delimiter_byte(settings.delimiter)?);
        if settings.include_header {
            writer.row(HEADER)?;
        }

        for payment in rows {
            let description = payment
                .notes
                .as_deref()
                .map(sanitize_text)
                .filter(|notes| !notes.is_empty())
                .unwrap_or_else(|| format!("Payment from {}", sanitize_text(&payment.customer.name)));
            writer.row([
                settings.date_format.format(payment.date),
                payment_reference(payment),
                payment
                    .transaction_id
                    .as_deref()
                    .map(sanitize_text)
                    .unwrap_or_default(),
                sanitize_text(&payment.customer.name),
                payment.method.as_str().to_string(),
                payment
                    .invoice_number
                    .as_deref()
                    .map(sanitize_text)
                    .unwrap_or_default(),
                description,
                format_amount(payment.amount),
            ])?;
        }

        writer.finish()
    }
}
