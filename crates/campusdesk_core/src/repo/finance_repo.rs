//! Finance gateway: invoice/payment reads for exports and export-log writes.
//!
//! # Responsibility
//! - Fetch ledger rows for one school year and optional date range.
//! - Own the export-log lifecycle columns.
//!
//! # Invariants
//! - Amounts cross this boundary as `Decimal`; SQLite stores integer cents.
//! - Export-log status only moves Pending -> Processing -> Completed | Failed;
//!   out-of-order writes are rejected as `InvalidData`.

use super::{enum_column, RepoError, RepoResult};
use crate::model::finance::{
    cents_to_decimal, decimal_to_cents, Customer, ExportCompletion, ExportLog, ExportStatus,
    ExportType, Invoice, InvoiceStatus, NewInvoice, NewPayment, Payment, PaymentMethod,
};
use crate::model::{PersonId, RecordId, SchoolYearId};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const INVOICE_SELECT_SQL: &str = "SELECT
    financeInvoice.financeInvoiceID,
    financeInvoice.schoolYearID,
    financeInvoice.familyID,
    family.familyName,
    family.familyAccountCode,
    financeInvoice.financeInvoiceNumber,
    financeInvoice.financeInvoiceIssueDate,
    financeInvoice.financeInvoiceDueDate,
    financeInvoice.financeInvoiceDescription,
    financeInvoice.financeInvoiceSubtotal,
    financeInvoice.financeInvoiceTax,
    financeInvoice.financeInvoiceTotal,
    financeInvoice.financeInvoiceStatus
FROM financeInvoice
INNER JOIN family ON family.familyID = financeInvoice.familyID";

const PAYMENT_SELECT_SQL: &str = "SELECT
    financePayment.financePaymentID,
    financePayment.schoolYearID,
    financePayment.familyID,
    family.familyName,
    family.familyAccountCode,
    financePayment.financeInvoiceID,
    financeInvoice.financeInvoiceNumber,
    financePayment.financePaymentDate,
    financePayment.financePaymentAmount,
    financePayment.financePaymentMethod,
    financePayment.financePaymentReference,
    financePayment.financePaymentTransactionID,
    financePayment.financePaymentNotes
FROM financePayment
INNER JOIN family ON family.familyID = financePayment.familyID
LEFT JOIN financeInvoice ON financeInvoice.financeInvoiceID = financePayment.financeInvoiceID";

const EXPORT_LOG_SELECT_SQL: &str = "SELECT
    financeExportLogID,
    financeExportLogType,
    schoolYearID,
    financeExportLogDateFrom,
    financeExportLogDateTo,
    financeExportLogStatus,
    financeExportLogFileName,
    financeExportLogFilePath,
    financeExportLogChecksum,
    financeExportLogRecordCount,
    financeExportLogTotalAmount,
    financeExportLogFileSize,
    financeExportLogError,
    financeExportLogCreatedBy,
    financeExportLogTimestampCreated,
    financeExportLogTimestampCompleted
FROM financeExportLog";

/// School-year scoped ledger selection with an optional inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerQuery {
    pub school_year_id: SchoolYearId,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl LedgerQuery {
    pub fn school_year(school_year_id: SchoolYearId) -> Self {
        Self {
            school_year_id,
            date_from: None,
            date_to: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportLogQuery {
    pub school_year_id: Option<SchoolYearId>,
    pub export_type: Option<ExportType>,
    pub status: Option<ExportStatus>,
    pub limit: Option<u32>,
}

/// Gateway interface for ledger rows and export logs.
pub trait FinanceRepository {
    fn create_invoice(&self, invoice: &NewInvoice) -> RepoResult<RecordId>;
    fn create_payment(&self, payment: &NewPayment) -> RepoResult<RecordId>;
    /// Exportable invoices (issued, partial, paid) ordered by issue date.
    fn list_invoices(&self, query: &LedgerQuery) -> RepoResult<Vec<Invoice>>;
    /// Payments ordered by payment date.
    fn list_payments(&self, query: &LedgerQuery) -> RepoResult<Vec<Payment>>;

    fn create_export_log(
        &self,
        export_type: ExportType,
        query: &LedgerQuery,
        created_by: Option<PersonId>,
    ) -> RepoResult<RecordId>;
    fn mark_export_processing(&self, id: RecordId) -> RepoResult<()>;
    fn complete_export_log(&self, id: RecordId, completion: &ExportCompletion) -> RepoResult<()>;
    fn fail_export_log(&self, id: RecordId, error: &str) -> RepoResult<()>;
    fn get_export_log(&self, id: RecordId) -> RepoResult<Option<ExportLog>>;
    fn list_export_logs(&self, query: &ExportLogQuery) -> RepoResult<Vec<ExportLog>>;
}

pub struct SqliteFinanceRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteFinanceRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn transition_export_log(
        &self,
        id: RecordId,
        from: &[ExportStatus],
        set_sql: &str,
        bind_values: Vec<Value>,
    ) -> RepoResult<()> {
        let mut sql = format!("UPDATE financeExportLog SET {set_sql} WHERE financeExportLogID = ?");
        let mut values = bind_values;
        values.push(Value::Integer(id));
        sql.push_str(&format!(
            " AND financeExportLogStatus IN ({})",
            vec!["?"; from.len()].join(", ")
        ));
        values.extend(
            from.iter()
                .map(|status| Value::Text(status.as_str().to_string())),
        );

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            let current = self.get_export_log(id)?;
            return match current {
                None => Err(RepoError::not_found("export log", id)),
                Some(log) => Err(RepoError::InvalidData(format!(
                    "export log {id} is {} and cannot move from {:?}",
                    log.status, from
                ))),
            };
        }
        Ok(())
    }
}

fn push_range(
    sql: &mut String,
    bind_values: &mut Vec<Value>,
    column: &str,
    query: &LedgerQuery,
) {
    if let Some(from) = query.date_from {
        sql.push_str(&format!(" AND {column} >= ?"));
        bind_values.push(Value::Text(from.to_string()));
    }
    if let Some(to) = query.date_to {
        sql.push_str(&format!(" AND {column} <= ?"));
        bind_values.push(Value::Text(to.to_string()));
    }
}

impl FinanceRepository for SqliteFinanceRepository<'_> {
    fn create_invoice(&self, invoice: &NewInvoice) -> RepoResult<RecordId> {
        invoice.validate()?;

        self.conn.execute(
            "INSERT INTO financeInvoice (
                schoolYearID,
                familyID,
                financeInvoiceNumber,
                financeInvoiceIssueDate,
                financeInvoiceDueDate,
                financeInvoiceDescription,
                financeInvoiceSubtotal,
                financeInvoiceTax,
                financeInvoiceTotal,
                financeInvoiceStatus
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                invoice.school_year_id,
                invoice.family_id,
                invoice.number.trim(),
                invoice.issue_date,
                invoice.due_date,
                invoice.description,
                decimal_to_cents(invoice.subtotal)?,
                decimal_to_cents(invoice.tax)?,
                decimal_to_cents(invoice.total())?,
                invoice.status.as_str(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn create_payment(&self, payment: &NewPayment) -> RepoResult<RecordId> {
        payment.validate()?;

        self.conn.execute(
            "INSERT INTO financePayment (
                schoolYearID,
                familyID,
                financeInvoiceID,
                financePaymentDate,
                financePaymentAmount,
                financePaymentMethod,
                financePaymentReference,
                financePaymentTransactionID,
                financePaymentNotes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                payment.school_year_id,
                payment.family_id,
                payment.invoice_id,
                payment.date,
                decimal_to_cents(payment.amount)?,
                payment.method.as_str(),
                payment.reference.as_deref(),
                payment.transaction_id.as_deref(),
                payment.notes.as_deref(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn list_invoices(&self, query: &LedgerQuery) -> RepoResult<Vec<Invoice>> {
        let mut sql = format!("{INVOICE_SELECT_SQL} WHERE financeInvoice.schoolYearID = ?");
        let mut bind_values = vec![Value::Integer(query.school_year_id)];

        sql.push_str(&format!(
            " AND financeInvoice.financeInvoiceStatus IN ({})",
            vec!["?"; InvoiceStatus::EXPORTABLE.len()].join(", ")
        ));
        bind_values.extend(
            InvoiceStatus::EXPORTABLE
                .iter()
                .map(|status| Value::Text(status.as_str().to_string())),
        );
        push_range(
            &mut sql,
            &mut bind_values,
            "financeInvoice.financeInvoiceIssueDate",
            query,
        );
        sql.push_str(
            " ORDER BY financeInvoice.financeInvoiceIssueDate ASC, financeInvoice.financeInvoiceID ASC",
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut invoices = Vec::new();
        while let Some(row) = rows.next()? {
            invoices.push(parse_invoice_row(row)?);
        }
        Ok(invoices)
    }

    fn list_payments(&self, query: &LedgerQuery) -> RepoResult<Vec<Payment>> {
        let mut sql = format!("{PAYMENT_SELECT_SQL} WHERE financePayment.schoolYearID = ?");
        let mut bind_values = vec![Value::Integer(query.school_year_id)];
        push_range(
            &mut sql,
            &mut bind_values,
            "financePayment.financePaymentDate",
            query,
        );
        sql.push_str(
            " ORDER BY financePayment.financePaymentDate ASC, financePayment.financePaymentID ASC",
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut payments = Vec::new();
        while let Some(row) = rows.next()? {
            payments.push(parse_payment_row(row)?);
        }
        Ok(payments)
    }

    fn create_export_log(
        &self,
        export_type: ExportType,
        query: &LedgerQuery,
        created_by: Option<PersonId>,
    ) -> RepoResult<RecordId> {
        self.conn.execute(
            "INSERT INTO financeExportLog (
                financeExportLogType,
                schoolYearID,
                financeExportLogDateFrom,
                financeExportLogDateTo,
                financeExportLogStatus,
                financeExportLogCreatedBy,
                financeExportLogTimestampCreated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                export_type.as_str(),
                query.school_year_id,
                query.date_from,
                query.date_to,
                ExportStatus::Pending.as_str(),
                created_by,
                Utc::now(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn mark_export_processing(&self, id: RecordId) -> RepoResult<()> {
        self.transition_export_log(
            id,
            &[ExportStatus::Pending],
            "financeExportLogStatus = ?",
            vec![Value::Text(ExportStatus::Processing.as_str().to_string())],
        )
    }

    fn complete_export_log(&self, id: RecordId, completion: &ExportCompletion) -> RepoResult<()> {
        self.transition_export_log(
            id,
            &[ExportStatus::Processing],
            "financeExportLogStatus = ?,
             financeExportLogFileName = ?,
             financeExportLogFilePath = ?,
             financeExportLogChecksum = ?,
             financeExportLogRecordCount = ?,
             financeExportLogTotalAmount = ?,
             financeExportLogFileSize = ?,
             financeExportLogError = NULL,
             financeExportLogTimestampCompleted = ?",
            vec![
                Value::Text(ExportStatus::Completed.as_str().to_string()),
                Value::Text(completion.file_name.clone()),
                Value::Text(completion.file_path.clone()),
                Value::Text(completion.checksum.clone()),
                Value::Integer(to_sql_count(completion.record_count)?),
                Value::Integer(decimal_to_cents(completion.total_amount)?),
                Value::Integer(to_sql_count(completion.file_size)?),
                Value::Text(Utc::now().to_rfc3339()),
            ],
        )
    }

    fn fail_export_log(&self, id: RecordId, error: &str) -> RepoResult<()> {
        self.transition_export_log(
            id,
            &[ExportStatus::Pending, ExportStatus::Processing],
            "financeExportLogStatus = ?,
             financeExportLogError = ?,
             financeExportLogTimestampCompleted = ?",
            vec![
                Value::Text(ExportStatus::Failed.as_str().to_string()),
                Value::Text(error.to_string()),
                Value::Text(Utc::now().to_rfc3339()),
            ],
        )
    }

    fn get_export_log(&self, id: RecordId) -> RepoResult<Option<ExportLog>> {
        self.conn
            .query_row(
                &format!("{EXPORT_LOG_SELECT_SQL} WHERE financeExportLogID = ?1;"),
                [id],
                |row| Ok(parse_export_log_row(row)),
            )
            .optional()?
            .transpose()
    }

    fn list_export_logs(&self, query: &ExportLogQuery) -> RepoResult<Vec<ExportLog>> {
        let mut sql = format!("{EXPORT_LOG_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(school_year_id) = query.school_year_id {
            sql.push_str(" AND schoolYearID = ?");
            bind_values.push(Value::Integer(school_year_id));
        }
        if let Some(export_type) = query.export_type {
            sql.push_str(" AND financeExportLogType = ?");
            bind_values.push(Value::Text(export_type.as_str().to_string()));
        }
        if let Some(status) = query.status {
            sql.push_str(" AND financeExportLogStatus = ?");
            bind_values.push(Value::Text(status.as_str().to_string()));
        }
        sql.push_str(" ORDER BY financeExportLogID DESC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut logs = Vec::new();
        while let Some(row) = rows.next()? {
            logs.push(parse_export_log_row(row)?);
        }
        Ok(logs)
    }
}

fn to_sql_count(value: u64) -> RepoResult<i64> {
    i64::try_from(value).map_err(|_| RepoError::InvalidData(format!("count {value} overflows")))
}

fn from_sql_count(value: Option<i64>, column: &str) -> RepoResult<Option<u64>> {
    value
        .map(|count| {
            u64::try_from(count)
                .map_err(|_| RepoError::InvalidData(format!("negative value {count} in {column}")))
        })
        .transpose()
}

fn parse_customer(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        family_id: row.get("familyID")?,
        name: row.get("familyName")?,
        account_code: row.get("familyAccountCode")?,
    })
}

fn parse_invoice_row(row: &Row<'_>) -> RepoResult<Invoice> {
    Ok(Invoice {
        id: row.get("financeInvoiceID")?,
        school_year_id: row.get("schoolYearID")?,
        customer: parse_customer(row)?,
        number: row.get("financeInvoiceNumber")?,
        issue_date: row.get("financeInvoiceIssueDate")?,
        due_date: row.get("financeInvoiceDueDate")?,
        description: row.get("financeInvoiceDescription")?,
        subtotal: cents_to_decimal(row.get("financeInvoiceSubtotal")?),
        tax: cents_to_decimal(row.get("financeInvoiceTax")?),
        total: cents_to_decimal(row.get("financeInvoiceTotal")?),
        status: enum_column(row, "financeInvoiceStatus", InvoiceStatus::parse)?,
    })
}

fn parse_payment_row(row: &Row<'_>) -> RepoResult<Payment> {
    Ok(Payment {
        id: row.get("financePaymentID")?,
        school_year_id: row.get("schoolYearID")?,
        customer: parse_customer(row)?,
        invoice_id: row.get("financeInvoiceID")?,
        invoice_number: row.get("financeInvoiceNumber")?,
        date: row.get("financePaymentDate")?,
        amount: cents_to_decimal(row.get("financePaymentAmount")?),
        method: enum_column(row, "financePaymentMethod", PaymentMethod::parse)?,
        reference: row.get("financePaymentReference")?,
        transaction_id: row.get("financePaymentTransactionID")?,
        notes: row.get("financePaymentNotes")?,
    })
}

fn parse_export_log_row(row: &Row<'_>) -> RepoResult<ExportLog> {
    Ok(ExportLog {
        id: row.get("financeExportLogID")?,
        export_type: enum_column(row, "financeExportLogType", ExportType::parse)?,
        school_year_id: row.get("schoolYearID")?,
        date_from: row.get("financeExportLogDateFrom")?,
        date_to: row.get("financeExportLogDateTo")?,
        status: enum_column(row, "financeExportLogStatus", ExportStatus::parse)?,
        file_name: row.get("financeExportLogFileName")?,
        file_path: row.get("financeExportLogFilePath")?,
        checksum: row.get("financeExportLogChecksum")?,
        record_count: from_sql_count(
            row.get("financeExportLogRecordCount")?,
            "financeExportLogRecordCount",
        )?,
        total_amount: row
            .get::<_, Option<i64>>("financeExportLogTotalAmount")?
            .map(cents_to_decimal),
        file_size: from_sql_count(
            row.get("financeExportLogFileSize")?,
            "financeExportLogFileSize",
        )?,
        error: row.get("financeExportLogError")?,
        created_by: row.get("financeExportLogCreatedBy")?,
        created_at: row.get("financeExportLogTimestampCreated")?,
        completed_at: row.get("financeExportLogTimestampCompleted")?,
    })
}
