//! `campusdesk` command line entry point.
//!
//! Loads the TOML config, starts file logging, opens the database and runs
//! one admin command. Results are printed to stdout as JSON.

use anyhow::{anyhow, bail, Context, Result};
use campusdesk_core::db::migrations::latest_version;
use campusdesk_core::db::Connection;
use campusdesk_core::model::finance::ExportType;
use campusdesk_core::repo::document_repo::SqliteDocumentRepository;
use campusdesk_core::repo::finance_repo::{ExportLogQuery, SqliteFinanceRepository};
use campusdesk_core::repo::sync_log_repo::SqliteSyncLogRepository;
use campusdesk_core::{
    init_logging, open_db, AppConfig, DocumentService, ExportOutput, ExportRequest,
    LedgerExportService, SyncLogService,
};
use chrono::{Duration, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "CAMPUSDESK_CONFIG";

#[derive(Parser)]
#[command(name = "campusdesk")]
#[command(about = "School admin modules: care, compliance, photos, AI sync and ledger exports")]
#[command(version)]
struct Cli {
    /// Path to the TOML config file (falls back to $CAMPUSDESK_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema and the export directory
    Init,

    /// Run an accounting export
    Export {
        /// sage50_invoices, sage50_payments, quickbooks_invoices, quickbooks_payments or bank_reconciliation
        #[arg(value_parser = parse_export_type)]
        export_type: ExportType,
        #[arg(long)]
        school_year: i64,
        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Inclusive end date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Person id recorded on the export log
        #[arg(long)]
        by: Option<i64>,
    },

    /// List export log rows, newest first
    ExportLogs {
        #[arg(long)]
        school_year: Option<i64>,
        #[arg(long = "type", value_parser = parse_export_type)]
        export_type: Option<ExportType>,
        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Re-hash an exported file and compare it with its log row
    VerifyExport { log_id: i64 },

    /// Compliance document maintenance
    Documents {
        #[command(subcommand)]
        command: DocumentsCommand,
    },

    /// AI-sync webhook log maintenance
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },
}

#[derive(Subcommand)]
enum DocumentsCommand {
    /// Expire documents whose expiry date has passed
    Expire {
        /// Defaults to the local date
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Compliance report for one person against the configured types
    Report {
        person_id: i64,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Documents expiring within the configured warning window
    Expiring {
        #[arg(long)]
        days: Option<u32>,
        #[arg(long)]
        today: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum SyncCommand {
    /// Failed entries below the retry limit
    Retryable,
    /// Entry counts per status
    Stats,
    /// Delete finished entries older than the given number of days
    Purge {
        #[arg(long, default_value = "90")]
        older_than_days: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    init_logging(&config.logging.level, &config.logging.dir)
        .map_err(|err| anyhow!(err))
        .context("failed to start logging")?;
    let conn = open_db(&config.database_path).with_context(|| {
        format!("failed to open database `{}`", config.database_path.display())
    })?;

    match cli.command {
        Command::Init => init(&config),
        Command::Export {
            export_type,
            school_year,
            from,
            to,
            by,
        } => export(
            &conn,
            &config,
            &ExportRequest {
                export_type,
                school_year_id: school_year,
                date_from: from,
                date_to: to,
                requested_by: by,
            },
        ),
        Command::ExportLogs {
            school_year,
            export_type,
            limit,
        } => {
            let service = export_service(&conn, &config);
            print_json(&service.list_logs(&ExportLogQuery {
                school_year_id: school_year,
                export_type,
                status: None,
                limit: Some(limit),
            })?)
        }
        Command::VerifyExport { log_id } => {
            let verification = export_service(&conn, &config).verify_export_file(log_id)?;
            print_json(&verification)?;
            if !verification.matches {
                bail!("checksum mismatch for export {log_id}");
            }
            Ok(())
        }
        Command::Documents { command } => documents(&conn, &config, command),
        Command::Sync { command } => sync(&conn, &config, command),
    }
}

fn load_config(flag: Option<PathBuf>) -> Result<AppConfig> {
    let path = flag.or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    match path {
        Some(path) => {
            let path = if path.is_relative() { cwd.join(path) } else { path };
            AppConfig::load(&path).with_context(|| format!("failed to load `{}`", path.display()))
        }
        None => {
            let mut config = AppConfig::default();
            config.resolve_paths(&cwd);
            config.validate()?;
            Ok(config)
        }
    }
}

fn init(config: &AppConfig) -> Result<()> {
    let exports_dir = config.upload_root.join("exports");
    std::fs::create_dir_all(&exports_dir)
        .with_context(|| format!("failed to create `{}`", exports_dir.display()))?;
    info!("event=cli_init module=cli status=ok schema_version={}", latest_version());
    print_json(&serde_json::json!({
        "database_path": config.database_path,
        "exports_dir": exports_dir,
        "schema_version": latest_version(),
    }))
}

fn export(conn: &Connection, config: &AppConfig, request: &ExportRequest) -> Result<()> {
    let summary = export_service(conn, config).export(request)?;
    print_json(&summary)
}

fn documents(conn: &Connection, config: &AppConfig, command: DocumentsCommand) -> Result<()> {
    let service = DocumentService::new(SqliteDocumentRepository::new(conn));
    match command {
        DocumentsCommand::Expire { today } => {
            let expired = service.expire_overdue(today.unwrap_or_else(local_today))?;
            print_json(&serde_json::json!({ "expired": expired }))
        }
        DocumentsCommand::Report { person_id, today } => {
            let report = service.compliance_report(
                person_id,
                &config.required_document_types(),
                today.unwrap_or_else(local_today),
            )?;
            print_json(&report)
        }
        DocumentsCommand::Expiring { days, today } => {
            let documents = service.expiring_within(
                today.unwrap_or_else(local_today),
                days.unwrap_or(config.compliance.expiry_warning_days),
            )?;
            print_json(&documents)
        }
    }
}

fn sync(conn: &Connection, config: &AppConfig, command: SyncCommand) -> Result<()> {
    let service = SyncLogService::new(
        SqliteSyncLogRepository::new(conn),
        config.ai_sync.max_retries,
    );
    match command {
        SyncCommand::Retryable => print_json(&service.retryable()?),
        SyncCommand::Stats => print_json(&service.stats()?),
        SyncCommand::Purge { older_than_days } => {
            let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
            let purged = service.purge_before(cutoff)?;
            print_json(&serde_json::json!({ "purged": purged, "cutoff": cutoff }))
        }
    }
}

fn export_service<'conn>(
    conn: &'conn Connection,
    config: &AppConfig,
) -> LedgerExportService<SqliteFinanceRepository<'conn>> {
    LedgerExportService::new(
        SqliteFinanceRepository::new(conn),
        ExportOutput::new(&config.upload_root),
        config.exports.clone(),
    )
}

fn parse_export_type(value: &str) -> Result<ExportType, String> {
    ExportType::parse(value.trim()).ok_or_else(|| {
        let known = ExportType::ALL
            .iter()
            .map(|export_type| export_type.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!("unknown export type `{value}`; expected one of {known}")
    })
}

fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
