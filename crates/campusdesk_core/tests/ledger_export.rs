mod common;

use campusdesk_core::db::open_db_in_memory;
use campusdesk_core::export::ExportError;
use campusdesk_core::model::finance::{
    ExportStatus, ExportType, InvoiceStatus, NewInvoice, NewPayment, PaymentMethod,
};
use campusdesk_core::repo::finance_repo::{
    ExportLogQuery, FinanceRepository, SqliteFinanceRepository,
};
use campusdesk_core::{ExportOutput, ExportRequest, ExportSettings, LedgerExportService};
use common::{date, seed_family, seed_school_year};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::fs;
use std::io::Write;

struct Ledger {
    school_year_id: i64,
}

fn seed_ledger(conn: &Connection) -> Ledger {
    let school_year_id = seed_school_year(conn);
    let okafor = seed_family(conn, "Okafor", Some("OKA-01"));
    let adeyemi = seed_family(conn, "Adeyemi", None);
    let repo = SqliteFinanceRepository::new(conn);

    let invoice = |family_id, number: &str, issued, due, subtotal, tax, status| NewInvoice {
        school_year_id,
        family_id,
        number: number.to_string(),
        issue_date: issued,
        due_date: due,
        description: format!("{number} tuition"),
        subtotal: Decimal::new(subtotal, 2),
        tax: Decimal::new(tax, 2),
        status,
    };
    repo.create_invoice(&invoice(
        okafor,
        "INV-1001",
        date(2024, 9, 5),
        None,
        120_000,
        6_000,
        InvoiceStatus::Issued,
    ))
    .unwrap();
    let paid = repo
        .create_invoice(&invoice(
            adeyemi,
            "INV-1002",
            date(2024, 9, 20),
            Some(date(2024, 10, 20)),
            85_000,
            0,
            InvoiceStatus::Paid,
        ))
        .unwrap();
    repo.create_invoice(&invoice(
        okafor,
        "INV-1003",
        date(2024, 9, 22),
        None,
        40_000,
        0,
        InvoiceStatus::Pending,
    ))
    .unwrap();
    repo.create_invoice(&invoice(
        adeyemi,
        "INV-1004",
        date(2024, 9, 23),
        None,
        10_000,
        0,
        InvoiceStatus::Cancelled,
    ))
    .unwrap();

    repo.create_payment(&NewPayment {
        school_year_id,
        family_id: adeyemi,
        invoice_id: Some(paid),
        date: date(2024, 9, 25),
        amount: Decimal::new(85_000, 2),
        method: PaymentMethod::BankTransfer,
        reference: Some("EFT-778".to_string()),
        transaction_id: Some("TX-1".to_string()),
        notes: None,
    })
    .unwrap();
    repo.create_payment(&NewPayment {
        school_year_id,
        family_id: okafor,
        invoice_id: None,
        date: date(2024, 10, 2),
        amount: Decimal::new(30_000, 2),
        method: PaymentMethod::Cheque,
        reference: None,
        transaction_id: None,
        notes: Some("Partial, tuition".to_string()),
    })
    .unwrap();

    Ledger { school_year_id }
}

fn service<'conn>(
    conn: &'conn Connection,
    root: &std::path::Path,
) -> LedgerExportService<SqliteFinanceRepository<'conn>> {
    LedgerExportService::new(
        SqliteFinanceRepository::new(conn),
        ExportOutput::new(root),
        ExportSettings::default(),
    )
}

fn lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .split("\r\n")
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[test]
fn sage50_invoice_export_writes_exportable_invoices_only() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let summary = service
        .export(&ExportRequest::new(
            ExportType::Sage50Invoices,
            ledger.school_year_id,
        ))
        .unwrap();

    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.total_amount, Decimal::new(211_000, 2));
    assert!(summary.file_path.starts_with(dir.path().join("exports").join("sage50")));
    assert!(summary.file_name.starts_with("sage50_invoices_sy1_"));
    assert!(summary.file_name.ends_with(&format!("_{}.csv", summary.log_id)));
    assert_eq!(
        fs::metadata(&summary.file_path).unwrap().len(),
        summary.file_size
    );

    let rows = lines(&summary.file_path);
    assert_eq!(rows.len(), 3);
    assert_eq!(
        rows[0],
        "Customer ID,Customer Name,Invoice Number,Date,Date Due,Accounts Receivable Account,\
Description,G/L Account,Amount,Tax Amount,Sales Tax Account,Invoice Total"
    );
    assert_eq!(
        rows[1],
        "OKA-01,Okafor,INV-1001,09/05/2024,,1200,INV-1001 tuition,4000,1200.00,60.00,2300,1260.00"
    );
    assert_eq!(
        rows[2],
        "FAM00002,Adeyemi,INV-1002,09/20/2024,10/20/2024,1200,INV-1002 tuition,4000,850.00,0.00,,850.00"
    );

    let log = service.get_log(summary.log_id).unwrap().unwrap();
    assert_eq!(log.status, ExportStatus::Completed);
    assert_eq!(log.record_count, Some(2));
    assert_eq!(log.total_amount, Some(Decimal::new(211_000, 2)));
    assert_eq!(log.checksum.as_deref(), Some(summary.checksum.as_str()));
    assert!(log.completed_at.is_some());
}

#[test]
fn quickbooks_invoice_export_splits_tax_onto_its_own_line() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let mut request = ExportRequest::new(ExportType::QuickbooksInvoices, ledger.school_year_id);
    request.date_from = Some(date(2024, 9, 1));
    request.date_to = Some(date(2024, 9, 10));
    let summary = service.export(&request).unwrap();

    assert_eq!(summary.record_count, 1);
    assert!(summary.file_name.ends_with(".iif"));
    let rows = lines(&summary.file_path);
    assert_eq!(rows.len(), 7);
    assert!(rows[0].starts_with("!TRNS\tTRNSID\tTRNSTYPE\tDATE"));
    assert!(rows[1].starts_with("!SPL\tSPLID"));
    assert_eq!(rows[2], "!ENDTRNS");
    assert_eq!(
        rows[3],
        "TRNS\t\tINVOICE\t09/05/24\tAccounts Receivable\tOkafor\t\t1260.00\tINV-1001\tINV-1001 tuition"
    );
    assert_eq!(
        rows[4],
        "SPL\t\tINVOICE\t09/05/24\tTuition Income\tOkafor\t\t-1200.00\tINV-1001\tINV-1001 tuition"
    );
    assert_eq!(
        rows[5],
        "SPL\t\tINVOICE\t09/05/24\tSales Tax Payable\tOkafor\t\t-60.00\tINV-1001\tSales tax"
    );
    assert_eq!(rows[6], "ENDTRNS");
}

#[test]
fn bank_reconciliation_lists_payments_with_references() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let summary = service
        .export(&ExportRequest::new(
            ExportType::BankReconciliation,
            ledger.school_year_id,
        ))
        .unwrap();

    assert_eq!(summary.record_count, 2);
    assert_eq!(summary.total_amount, Decimal::new(115_000, 2));
    let rows = lines(&summary.file_path);
    assert_eq!(
        rows,
        vec![
            "Date,Reference,Transaction ID,Payer,Payment Method,Invoice Number,Description,Amount"
                .to_string(),
            "2024-09-25,EFT-778,TX-1,Adeyemi,Bank Transfer,INV-1002,Payment from Adeyemi,850.00"
                .to_string(),
            "2024-10-02,PMT-000002,,Okafor,Cheque,,\"Partial, tuition\",300.00".to_string(),
        ]
    );
}

#[test]
fn empty_selection_fails_the_log_without_creating_files() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let mut request = ExportRequest::new(ExportType::Sage50Payments, ledger.school_year_id);
    request.date_from = Some(date(2025, 5, 1));
    request.date_to = Some(date(2025, 5, 31));
    let failure = service.export(&request).unwrap_err();

    assert!(matches!(
        failure.error,
        ExportError::EmptyResult(ExportType::Sage50Payments)
    ));
    let log_id = failure.log_id.unwrap();
    let log = service.get_log(log_id).unwrap().unwrap();
    assert_eq!(log.status, ExportStatus::Failed);
    assert!(log.error.unwrap().contains("no records"));
    assert!(log.file_path.is_none());
    assert!(!dir.path().join("exports").exists());
}

#[test]
fn reversed_date_range_is_rejected_before_logging() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let mut request = ExportRequest::new(ExportType::Sage50Invoices, ledger.school_year_id);
    request.date_from = Some(date(2024, 10, 1));
    request.date_to = Some(date(2024, 9, 1));
    let failure = service.export(&request).unwrap_err();

    assert!(failure.log_id.is_none());
    assert!(matches!(failure.error, ExportError::InvalidDateRange { .. }));
    assert!(service
        .list_logs(&ExportLogQuery::default())
        .unwrap()
        .is_empty());
}

#[test]
fn verification_detects_tampered_files() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let summary = service
        .export(&ExportRequest::new(
            ExportType::QuickbooksPayments,
            ledger.school_year_id,
        ))
        .unwrap();
    let verified = service.verify_export_file(summary.log_id).unwrap();
    assert!(verified.matches);
    assert_eq!(verified.actual_checksum, summary.checksum);

    let mut file = fs::OpenOptions::new()
        .append(true)
        .open(&summary.file_path)
        .unwrap();
    file.write_all(b"TRNS\textra\r\n").unwrap();
    drop(file);

    let tampered = service.verify_export_file(summary.log_id).unwrap();
    assert!(!tampered.matches);
    assert_ne!(tampered.actual_checksum, tampered.expected_checksum);
}

#[test]
fn export_logs_filter_by_type() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    service
        .export(&ExportRequest::new(ExportType::Sage50Invoices, ledger.school_year_id))
        .unwrap();
    service
        .export(&ExportRequest::new(ExportType::Sage50Payments, ledger.school_year_id))
        .unwrap();
    let failed = service
        .verify_export_file(9_999)
        .unwrap_err();
    assert!(matches!(failed, ExportError::Repo(_)));

    let payments = service
        .list_logs(&ExportLogQuery {
            export_type: Some(ExportType::Sage50Payments),
            ..ExportLogQuery::default()
        })
        .unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].record_count, Some(2));
    assert_eq!(
        service
            .list_logs(&ExportLogQuery::default())
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn quickbooks_untaxed_invoice_posts_a_single_revenue_line() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let mut request = ExportRequest::new(ExportType::QuickbooksInvoices, ledger.school_year_id);
    request.date_from = Some(date(2024, 9, 15));
    let summary = service.export(&request).unwrap();

    assert_eq!(summary.record_count, 1);
    assert_eq!(summary.total_amount, Decimal::new(85_000, 2));
    let rows = lines(&summary.file_path);
    assert_eq!(
        rows[3..],
        [
            "TRNS\t\tINVOICE\t09/20/24\tAccounts Receivable\tAdeyemi\t\t850.00\tINV-1002\tINV-1002 tuition",
            "SPL\t\tINVOICE\t09/20/24\tTuition Income\tAdeyemi\t\t-850.00\tINV-1002\tINV-1002 tuition",
            "ENDTRNS",
        ]
    );
}

#[test]
fn quickbooks_payment_moves_funds_out_of_receivables() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let service = service(&conn, dir.path());

    let summary = service
        .export(&ExportRequest::new(
            ExportType::QuickbooksPayments,
            ledger.school_year_id,
        ))
        .unwrap();

    assert_eq!(summary.record_count, 2);
    let rows = lines(&summary.file_path);
    assert_eq!(rows.len(), 3 + 2 * 3);
    assert_eq!(
        rows[3..6],
        [
            "TRNS\t\tPAYMENT\t09/25/24\tUndeposited Funds\tAdeyemi\t\t850.00\tEFT-778\tBank Transfer payment for INV-1002",
            "SPL\t\tPAYMENT\t09/25/24\tAccounts Receivable\tAdeyemi\t\t-850.00\tEFT-778\tBank Transfer payment for INV-1002",
            "ENDTRNS",
        ]
    );
    assert_eq!(
        rows[7],
        "SPL\t\tPAYMENT\t10/02/24\tAccounts Receivable\tOkafor\t\t-300.00\tPMT-000002\tCheque payment"
    );
}

#[test]
fn unwritable_export_root_fails_the_log_with_io_error() {
    let conn = open_db_in_memory().unwrap();
    let ledger = seed_ledger(&conn);
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, b"not a directory").unwrap();
    let service = service(&conn, &blocker);

    let failure = service
        .export(&ExportRequest::new(
            ExportType::Sage50Invoices,
            ledger.school_year_id,
        ))
        .unwrap_err();

    assert!(matches!(failure.error, ExportError::Io { .. }));
    let log_id = failure.log_id.unwrap();
    let log = service.get_log(log_id).unwrap().unwrap();
    assert_eq!(log.status, ExportStatus::Failed);
    assert!(log.error.unwrap().starts_with("failed to write"));
    assert!(log.file_path.is_none());
    assert!(log.checksum.is_none());
}
