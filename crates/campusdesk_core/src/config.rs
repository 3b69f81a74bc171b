//! TOML application configuration.
//!
//! Every section is optional; missing keys fall back to defaults. Relative
//! paths in a loaded file resolve against the file's directory.

use crate::export::sage50::delimiter_byte;
use crate::export::ExportSettings;
use crate::logging::default_log_level;
use crate::service::sync_service::DEFAULT_MAX_RETRIES;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config file: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub dir: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiSyncSettings {
    /// Failed deliveries allowed before an entry is abandoned.
    pub max_retries: u32,
}

impl Default for AiSyncSettings {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceSettings {
    pub required_document_types: Vec<String>,
    /// Look-ahead window for expiry warnings.
    pub expiry_warning_days: u32,
}

impl Default for ComplianceSettings {
    fn default() -> Self {
        Self {
            required_document_types: vec![
                "Immunization Record".to_string(),
                "Birth Certificate".to_string(),
                "Emergency Contact Form".to_string(),
            ],
            expiry_warning_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// Root of the upload tree; exports land in `<upload_root>/exports`.
    pub upload_root: PathBuf,
    pub logging: LoggingSettings,
    #[serde(flatten)]
    pub exports: ExportSettings,
    pub ai_sync: AiSyncSettings,
    pub compliance: ComplianceSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("campusdesk.sqlite3"),
            upload_root: PathBuf::from("uploads"),
            logging: LoggingSettings::default(),
            exports: ExportSettings::default(),
            ai_sync: AiSyncSettings::default(),
            compliance: ComplianceSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads, resolves and validates a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Makes relative paths absolute against `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.database_path,
            &mut self.upload_root,
            &mut self.logging.dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sage50 = &self.exports.sage50;
        let quickbooks = &self.exports.quickbooks;
        let accounts = [
            ("sage50.receivable_account", &sage50.receivable_account),
            ("sage50.revenue_account", &sage50.revenue_account),
            ("sage50.tax_account", &sage50.tax_account),
            ("sage50.cash_account", &sage50.cash_account),
            ("quickbooks.receivable_account", &quickbooks.receivable_account),
            ("quickbooks.revenue_account", &quickbooks.revenue_account),
            ("quickbooks.tax_account", &quickbooks.tax_account),
            ("quickbooks.deposit_account", &quickbooks.deposit_account),
        ];
        for (key, value) in accounts {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be empty")));
            }
        }

        for (key, delimiter) in [
            ("sage50.delimiter", sage50.delimiter),
            (
                "bank_reconciliation.delimiter",
                self.exports.bank_reconciliation.delimiter,
            ),
        ] {
            delimiter_byte(delimiter)
                .map_err(|err| ConfigError::Invalid(format!("{key}: {err}")))?;
        }

        if self.ai_sync.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "ai_sync.max_retries must be at least 1".to_string(),
            ));
        }
        if self.database_path.as_os_str().is_empty() || self.upload_root.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "database_path and upload_root must be set".to_string(),
            ));
        }
        Ok(())
    }

    /// Required document types with blanks removed.
    pub fn required_document_types(&self) -> Vec<String> {
        self.compliance
            .required_document_types
            .iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use crate::export::DateFormat;
    use std::path::{Path, PathBuf};

    #[test]
    fn empty_file_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            database_path = "/var/lib/campusdesk/db.sqlite3"

            [sage50]
            date_format = "DMY"
            receivable_account = "1100"

            [quickbooks]
            deposit_account = "Checking"

            [bank_reconciliation]
            delimiter = ";"
            include_header = false

            [ai_sync]
            max_retries = 3

            [compliance]
            required_document_types = ["Immunization Record", " "]
            "#,
        )
        .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/var/lib/campusdesk/db.sqlite3"));
        assert_eq!(config.exports.sage50.date_format, DateFormat::DayMonthYear);
        assert_eq!(config.exports.sage50.receivable_account, "1100");
        assert_eq!(config.exports.sage50.revenue_account, "4000");
        assert_eq!(config.exports.quickbooks.deposit_account, "Checking");
        assert_eq!(config.exports.bank_reconciliation.delimiter, ';');
        assert!(!config.exports.bank_reconciliation.include_header);
        assert_eq!(config.ai_sync.max_retries, 3);
        assert_eq!(config.required_document_types(), vec!["Immunization Record"]);
        config.validate().unwrap();
    }

    #[test]
    fn empty_account_code_is_rejected() {
        let config = AppConfig::from_toml_str("[quickbooks]\ntax_account = \"  \"\n").unwrap();
        let error = config.validate().unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(message) if message.contains("quickbooks.tax_account")));
    }

    #[test]
    fn quote_delimiter_is_rejected() {
        let config = AppConfig::from_toml_str("[sage50]\ndelimiter = '\"'\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_date_format_fails_to_parse() {
        let error = AppConfig::from_toml_str("[sage50]\ndate_format = \"YDM\"\n").unwrap_err();
        assert!(matches!(error, ConfigError::Parse(_)));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let mut config = AppConfig::default();
        config.resolve_paths(Path::new("/etc/campusdesk"));
        assert_eq!(config.database_path, PathBuf::from("/etc/campusdesk/campusdesk.sqlite3"));
        assert_eq!(config.upload_root, PathBuf::from("/etc/campusdesk/uploads"));
        assert_eq!(config.logging.dir, PathBuf::from("/etc/campusdesk/logs"));
    }

    #[test]
    fn load_reads_and_validates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campusdesk.toml");
        std::fs::write(&path, "upload_root = \"files\"\n[ai_sync]\nmax_retries = 0\n").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "upload_root = \"files\"\n").unwrap();
        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.upload_root, dir.path().join("files"));
    }
}
