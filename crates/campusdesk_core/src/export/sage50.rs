//! Sage 50 sales and cash receipts journal CSV.

use super::format::{format_amount, sanitize_text, DateFormat, DelimitedWriter};
use super::{customer_code, ExportError, LedgerFormat};
use crate::model::finance::{ExportType, Invoice, Payment};
use serde::{Deserialize, Serialize};

const INVOICE_HEADER: [&str; 12] = [
    "Customer ID",
    "Customer Name",
    "Invoice Number",
    "Date",
    "Date Due",
    "Accounts Receivable Account",
    "Description",
    "G/L Account",
    "Amount",
    "Tax Amount",
    "Sales Tax Account",
    "Invoice Total",
];

const PAYMENT_HEADER: [&str; 10] = [
    "Customer ID",
    "Customer Name",
    "Reference",
    "Date",
    "Payment Method",
    "Cash Account",
    "Accounts Receivable Account",
    "Invoice Paid",
    "Description",
    "Amount",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sage50Settings {
    pub date_format: DateFormat,
    pub delimiter: char,
    /// Prefix for generated customer ids (`FAM00042`).
    pub customer_prefix: String,
    pub receivable_account: String,
    pub revenue_account: String,
    pub tax_account: String,
    pub cash_account: String,
}

impl Default for Sage50Settings {
    fn default() -> Self {
        Self {
            date_format: DateFormat::MonthDayYear,
            delimiter: ',',
            customer_prefix: "FAM".to_string(),
            receivable_account: "1200".to_string(),
            revenue_account: "4000".to_string(),
            tax_account: "2300".to_string(),
            cash_account: "1010".to_string(),
        }
    }
}

impl Sage50Settings {
    pub(crate) fn delimiter_byte(&self) -> Result<u8, ExportError> {
        delimiter_byte(self.delimiter)
    }
}

/// Converts a configured delimiter into the single byte the writer needs.
pub(crate) fn delimiter_byte(delimiter: char) -> Result<u8, ExportError> {
    if !delimiter.is_ascii() || delimiter == '"' || delimiter == '\n' || delimiter == '\r' {
        return Err(ExportError::Format(format!(
            "unsupported CSV delimiter `{}`",
            delimiter.escape_default()
        )));
    }
    Ok(delimiter as u8)
}

/// Sage 50 sales journal: one row per invoice.
pub struct Sage50Invoices<'a> {
    settings: &'a Sage50Settings,
}

impl<'a> Sage50Invoices<'a> {
    pub fn new(settings: &'a Sage50Settings) -> Self {
        Self { settings }
    }
}

impl LedgerFormat for Sage50Invoices<'_> {
    type Row = Invoice;

    fn export_type(&self) -> ExportType {
        ExportType::Sage50Invoices
    }

    fn render(&self, rows: &[Invoice]) -> Result<Vec<u8>, ExportError> {
        let settings = self.settings;
        let mut writer = DelimitedWriter::csv(settings.delimiter_byte()?);
        writer.row(INVOICE_HEADER)?;

        for invoice in rows {
            let description = match sanitize_text(&invoice.description) {
                text if text.is_empty() => format!("Invoice {}", sanitize_text(&invoice.number)),
                text => text,
            };
            writer.row([
                customer_code(&invoice.customer, &settings.customer_prefix),
                sanitize_text(&invoice.customer.name),
                sanitize_text(&invoice.number),
                settings.date_format.format(invoice.issue_date),
                invoice
                    .due_date
                    .map(|due| settings.date_format.format(due))
                    .unwrap_or_default(),
                settings.receivable_account.clone(),
                description,
                settings.revenue_account.clone(),
                format_amount(invoice.subtotal),
                format_amount(invoice.tax),
                if invoice.has_tax() {
                    settings.tax_account.clone()
                } else {
                    String::new()
                },
                format_amount(invoice.total),
            ])?;
        }

        writer.finish()
    }
}

/// Sage 50 cash receipts journal: one row per payment.
pub struct Sage50Payments<'a> {
    settings: &'a Sage50Settings,
}

impl<'a> Sage50Payments<'a> {
    pub fn new(settings: &'a Sage50Settings) -> Self {
        Self { settings }
    }
}

impl LedgerFormat for Sage50Payments<'_> {
    type Row = Payment;

    fn export_type(&self) -> ExportType {
        ExportType::Sage50Payments
    }

    fn render(&self, rows: &[Payment]) -> Result<Vec<u8>, ExportError> {
        let settings = self.settings;
        let mut writer = DelimitedWriter::csv(settings.delimiter_byte()?);
        writer.row(PAYMENT_HEADER)?;

        for payment in rows {
            writer.row([
                customer_code(&payment.customer, &settings.customer_prefix),
                sanitize_text(&payment.customer.name),
                payment_reference(payment),
                settings.date_format.format(payment.date),
                payment.method.as_str().to_string(),
                settings.cash_account.clone(),
                settings.receivable_account.clone(),
                payment
                    .invoice_number
                    .as_deref()
                    .map(sanitize_text)
                    .unwrap_or_default(),
                payment
                    .notes
                    .as_deref()
                    .map(sanitize_text)
                    .unwrap_or_default(),
                format_amount(payment.amount),
            ])?;
        }

        writer.finish()
    }
}

/// Bank-facing reference: explicit reference, then gateway id, then row id.
pub(crate) fn payment_reference(payment: &Payment) -> String {
    [payment.reference.as_deref(), payment.transaction_id.as_deref()]
        .into_iter()
        .flatten()
        .map(sanitize_text)
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| format!("PMT-{:06}", payment.id))
}
