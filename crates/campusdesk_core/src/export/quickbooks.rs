//! QuickBooks Desktop IIF transaction import.
//!
//! Each source row becomes one `TRNS` debit line, one or more `SPL` credit
//! lines and a closing `ENDTRNS`. Credit lines carry negative amounts so the
//! block sums to zero.

use super::format::{format_amount, sanitize_iif_text, DateFormat, DelimitedWriter};
use super::sage50::payment_reference;
use super::{ExportError, LedgerFormat};
use crate::model::finance::{ExportType, Invoice, Payment};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const IIF_DATE_FORMAT: DateFormat = DateFormat::ShortMonthDayYear;
const TRNS_HEADER: [&str; 10] = [
    "!TRNS", "TRNSID", "TRNSTYPE", "DATE", "ACCNT", "NAME", "CLASS", "AMOUNT", "DOCNUM", "MEMO",
];
const SPL_HEADER: [&str; 10] = [
    "!SPL", "SPLID", "TRNSTYPE", "DATE", "ACCNT", "NAME", "CLASS", "AMOUNT", "DOCNUM", "MEMO",
];
const TRNSTYPE_INVOICE: &str = "INVOICE";
const TRNSTYPE_PAYMENT: &str = "PAYMENT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuickBooksSettings {
    pub receivable_account: String,
    pub revenue_account: String,
    pub tax_account: String,
    pub deposit_account: String,
    /// Optional QuickBooks class applied to every line.
    pub class: String,
}

impl Default for QuickBooksSettings {
    fn default() -> Self {
        Self {
            receivable_account: "Accounts Receivable".to_string(),
            revenue_account: "Tuition Income".to_string(),
            tax_account: "Sales Tax Payable".to_string(),
            deposit_account: "Undeposited Funds".to_string(),
            class: String::new(),
        }
    }
}

/// Fields shared by every line of one transaction block.
struct Transaction<'a> {
    kind: &'static str,
    date: NaiveDate,
    name: String,
    doc_number: String,
    settings: &'a QuickBooksSettings,
}

impl Transaction<'_> {
    fn line(
        &self,
        writer: &mut DelimitedWriter,
        marker: &str,
        account: &str,
        amount: Decimal,
        memo: &str,
    ) -> Result<(), ExportError> {
        writer.row([
            marker.to_string(),
            String::new(),
            self.kind.to_string(),
            IIF_DATE_FORMAT.format(self.date),
            sanitize_iif_text(account),
            self.name.clone(),
            sanitize_iif_text(&self.settings.class),
            format_amount(amount),
            self.doc_number.clone(),
            sanitize_iif_text(memo),
        ])
    }
}

fn start_document() -> Result<DelimitedWriter, ExportError> {
    let mut writer = DelimitedWriter::iif();
    writer.row(TRNS_HEADER)?;
    writer.row(SPL_HEADER)?;
    writer.row(["!ENDTRNS"])?;
    Ok(writer)
}

pub struct QuickBooksInvoices<'a> {
    settings: &'a QuickBooksSettings,
}

impl<'a> QuickBooksInvoices<'a> {
    pub fn new(settings: &'a QuickBooksSettings) -> Self {
        Self { settings }
    }
}

impl LedgerFormat for QuickBooksInvoices<'_> {
    type Row = Invoice;

    fn export_type(&self) -> ExportType {
        ExportType::QuickbooksInvoices
    }

    fn render(&self, rows: &[Invoice]) -> Result<Vec<u8>, ExportError> {
        let settings = self.settings;
        let mut writer = start_document()?;

        for invoice in rows {
            let transaction = Transaction {
                kind: TRNSTYPE_INVOICE,
                date: invoice.issue_date,
                name: sanitize_iif_text(&invoice.customer.name),
                doc_number: sanitize_iif_text(&invoice.number),
                settings,
            };
            let memo = invoice.description.as_str();

            transaction.line(
                &mut writer,
                "TRNS",
                &settings.receivable_account,
                invoice.total,
                memo,
            )?;
            if invoice.has_tax() {
                transaction.line(
                    &mut writer,
                    "SPL",
                    &settings.revenue_account,
                    -invoice.subtotal,
                    memo,
                )?;
                transaction.line(
                    &mut writer,
                    "SPL",
                    &settings.tax_account,
                    -invoice.tax,
                    "Sales tax",
                )?;
            } else {
                transaction.line(
                    &mut writer,
                    "SPL",
                    &settings.revenue_account,
                    -invoice.total,
                    memo,
                )?;
            }
            writer.row(["ENDTRNS"])?;
        }

        writer.finish()
    }
}

pub struct QuickBooksPayments<'a> {
    settings: &'a QuickBooksSettings,
}

impl<'a> QuickBooksPayments<'a> {
    pub fn new(settings: &'a QuickBooksSettings) -> Self {
        Self { settings }
    }
}

impl LedgerFormat for QuickBooksPayments<'_> {
    type Row = Payment;

    fn export_type(&self) -> ExportType {
        ExportType::QuickbooksPayments
    }

    fn render(&self, rows: &[Payment]) -> Result<Vec<u8>, ExportError> {
        let settings = self.settings;
        let mut writer = start_document()?;

        for payment in rows {
            let transaction = Transaction {
                kind: TRNSTYPE_PAYMENT,
                date: payment.date,
                name: sanitize_iif_text(&payment.customer.name),
                doc_number: sanitize_iif_text(&payment_reference(payment)),
                settings,
            };
            let memo = match payment.invoice_number.as_deref() {
                Some(number) => format!("{} payment for {number}", payment.method),
                None => format!("{} payment", payment.method),
            };

            transaction.line(
                &mut writer,
                "TRNS",
                &settings.deposit_account,
                payment.amount,
                &memo,
            )?;
            transaction.line(
                &mut writer,
                "SPL",
                &settings.receivable_account,
                -payment.amount,
                &memo,
            )?;
            writer.row(["ENDTRNS"])?;
        }

        writer.finish()
    }
}
