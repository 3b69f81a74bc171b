//! Export file placement and integrity checks.
//!
//! Files land in `<root>/exports/<module>/<YYYY>/<MM>/` keyed by the time
//! the export ran. The SHA-256 of the written bytes is returned so it can
//! be stored on the export log and re-checked later.

use super::ExportError;
use crate::model::finance::ExportType;
use crate::model::{RecordId, SchoolYearId};
use chrono::{DateTime, Utc};
use log::warn;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const EXPORTS_DIR: &str = "exports";
const READ_CHUNK_BYTES: usize = 64 * 1024;

/// A file successfully written to the export tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub file_name: String,
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the file contents.
    pub checksum: String,
    pub size: u64,
}

/// Root of the upload tree that holds the `exports/` directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    root: PathBuf,
}

impl ExportOutput {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for files of `export_type` produced at `at`.
    pub fn bucket_dir(&self, export_type: ExportType, at: DateTime<Utc>) -> PathBuf {
        self.root
            .join(EXPORTS_DIR)
            .join(export_type.module_dir())
            .join(at.format("%Y").to_string())
            .join(at.format("%m").to_string())
    }

    /// File name unique per export log row.
    pub fn file_name(
        export_type: ExportType,
        school_year_id: SchoolYearId,
        log_id: RecordId,
        at: DateTime<Utc>,
    ) -> String {
        format!(
            "{}_sy{school_year_id}_{}_{log_id}.{}",
            export_type.as_str(),
            at.format("%Y%m%d_%H%M%S"),
            export_type.file_extension()
        )
    }

    /// Writes `bytes` into the bucket for `export_type` and checksums them.
    pub fn write(
        &self,
        export_type: ExportType,
        file_name: &str,
        at: DateTime<Utc>,
        bytes: &[u8],
    ) -> Result<WrittenFile, ExportError> {
        let dir = self.bucket_dir(export_type, at);
        fs::create_dir_all(&dir).map_err(|source| ExportError::Io {
            path: dir.clone(),
            source,
        })?;

        let path = dir.join(file_name);
        let file = File::create(&path).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        write_or_remove(&path, BufWriter::new(file), bytes)?;

        Ok(WrittenFile {
            file_name: file_name.to_string(),
            checksum: sha256_hex(bytes),
            size: bytes.len() as u64,
            path,
        })
    }
}

/// Writes and flushes `bytes`; a partially written `path` is removed on failure.
fn write_or_remove<W: Write>(path: &Path, mut writer: W, bytes: &[u8]) -> Result<(), ExportError> {
    let Err(source) = writer.write_all(bytes).and_then(|()| writer.flush()) else {
        return Ok(());
    };
    drop(writer);
    if let Err(err) = fs::remove_file(path) {
        warn!(
            "event=export_write module=export status=error error_code=partial_file_kept path={} error={}",
            path.display(),
            err
        );
    }
    Err(ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Streams `path` through SHA-256.
pub fn file_checksum(path: &Path) -> Result<String, ExportError> {
    let io_error = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; READ_CHUNK_BYTES];
    loop {
        let read = reader.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::{file_checksum, sha256_hex, write_or_remove, ExportOutput};
    use crate::export::ExportError;
    use crate::model::finance::ExportType;
    use chrono::{TimeZone, Utc};
    use std::io::{self, Write};

    /// Accepts a few bytes, then fails like a full disk.
    struct FullDisk {
        file: std::fs::File,
        remaining: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            let take = buf.len().min(self.remaining);
            self.remaining -= take;
            self.file.write(&buf[..take])
        }

        fn flush(&mut self) -> io::Result<()> {
            self.file.flush()
        }
    }

    #[test]
    fn bucket_follows_module_year_month() {
        let output = ExportOutput::new("/srv/uploads");
        let at = Utc.with_ymd_and_hms(2025, 3, 7, 14, 5, 9).unwrap();

        let dir = output.bucket_dir(ExportType::QuickbooksPayments, at);
        assert_eq!(
            dir,
            std::path::Path::new("/srv/uploads/exports/quickbooks/2025/03")
        );
        assert_eq!(
            ExportOutput::file_name(ExportType::QuickbooksPayments, 4, 12, at),
            "quickbooks_payments_sy4_20250307_140509_12.iif"
        );
    }

    #[test]
    fn written_checksum_matches_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let output = ExportOutput::new(dir.path());
        let at = Utc.with_ymd_and_hms(2024, 11, 30, 8, 0, 0).unwrap();

        let written = output
            .write(ExportType::Sage50Invoices, "ledger.csv", at, b"a,b\r\n")
            .unwrap();
        assert_eq!(written.size, 5);
        assert_eq!(written.checksum, sha256_hex(b"a,b\r\n"));
        assert_eq!(file_checksum(&written.path).unwrap(), written.checksum);
        assert!(written.path.ends_with("exports/sage50/2024/11/ledger.csv"));
    }

    #[test]
    fn failed_write_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.iif");
        let writer = FullDisk {
            file: std::fs::File::create(&path).unwrap(),
            remaining: 4,
        };

        let error = write_or_remove(&path, writer, b"!TRNS\tTRNSID\r\n").unwrap_err();
        assert!(matches!(error, ExportError::Io { ref path, .. } if path.ends_with("partial.iif")));
        assert!(!path.exists());
    }
}
