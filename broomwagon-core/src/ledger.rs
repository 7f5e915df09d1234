//! Append-only processing ledger backed by a text file.
//!
//! Each line records one completed file: `<absolute path>\t<RFC 3339 time>`.
//! Lookups compare the whole path, never a prefix or substring.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::contract::Ledger;
use crate::error::LedgerError;

/// Stable identity of an input file across runs.
///
/// Built from the canonicalised parent directory plus the file name, so it
/// can still be computed once the file itself has been renamed to its backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileIdentity(String);

impl FileIdentity {
    pub fn for_path(path: &Path) -> Result<Self, LedgerError> {
        let identity_err = |source| LedgerError::Identity {
            path: path.to_path_buf(),
            source,
        };
        let name = path.file_name().ok_or_else(|| {
            identity_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "path has no file name",
            ))
        })?;
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let parent = std::fs::canonicalize(&parent).map_err(identity_err)?;
        Ok(Self(parent.join(name).to_string_lossy().into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One parsed ledger line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub file: String,
    pub recorded_at: String,
}

impl LedgerEntry {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (file, recorded_at) = line
            .rsplit_once('\t')
            // entries written before the tab-separated format
            .or_else(|| line.rsplit_once(" - "))?;
        if file.is_empty() {
            return None;
        }
        Some(Self {
            file: file.to_string(),
            recorded_at: recorded_at.trim().to_string(),
        })
    }

    fn render(file: &FileIdentity, at: DateTime<Local>) -> String {
        format!("{}\t{}\n", file, at.to_rfc3339())
    }
}

pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// All well-formed entries, in append order. Missing file means none.
    pub async fn entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(LedgerError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        let content = String::from_utf8_lossy(&bytes);
        let mut entries = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match LedgerEntry::parse(line) {
                Some(entry) => entries.push(entry),
                None => warn!(ledger = %self.path.display(), line = n + 1, "Ignoring malformed ledger line"),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn is_processed(&self, file: &FileIdentity) -> Result<bool, LedgerError> {
        let found = self
            .entries()
            .await?
            .iter()
            .any(|entry| entry.file == file.as_str());
        debug!(file = %file, found, "Ledger lookup");
        Ok(found)
    }

    async fn mark_processed(&self, file: &FileIdentity) -> Result<(), LedgerError> {
        let append_err = |source| LedgerError::Append {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(append_err)?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(append_err)?;
        f.write_all(LedgerEntry::render(file, Local::now()).as_bytes())
            .await
            .map_err(append_err)?;
        f.sync_all().await.map_err(append_err)?;
        info!(file = %file, ledger = %self.path.display(), "Logged processed file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_line_formats() {
        let entry = LedgerEntry::parse("/in/a - b.csv\t2024-04-22T10:00:00+02:00").unwrap();
        assert_eq!(entry.file, "/in/a - b.csv");

        let legacy = LedgerEntry::parse("/in/tickets.xlsx - 2024-04-22 10:00:00.123").unwrap();
        assert_eq!(legacy.file, "/in/tickets.xlsx");
        assert_eq!(legacy.recorded_at, "2024-04-22 10:00:00.123");

        assert!(LedgerEntry::parse("no separator here").is_none());
    }
}
