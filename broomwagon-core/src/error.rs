//! Error types for the distribution engine and the file pipeline.
//!
//! Expected operational outcomes (already processed, missing columns) are not
//! errors; they are reported through [`crate::pipeline::FileOutcome`]. What
//! lives here is everything that stops a file from reaching the terminal
//! success state.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::PipelineState;

/// Failure to read the persisted Roster Record.
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("failed to read roster record {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("roster record {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to read or append to the processing ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to append to ledger {path}: {source}")]
    Append {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot derive a file identity for {path}: {source}")]
    Identity {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to decode a ticket dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed tabular data in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to open workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::XlsxError,
    },

    #[error("workbook {path} has no worksheet")]
    NoWorksheet { path: PathBuf },

    #[error("row {row} of {path} has {found} cells, header has {expected}")]
    RaggedRow {
        path: PathBuf,
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Failure of the formatter collaborator to produce the output file.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to write output {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode output {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to build workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    #[error("formatter rejected output {path}: {reason}")]
    Rejected { path: PathBuf, reason: String },
}

/// A file stopped before reaching `Logged`.
///
/// Every variant past [`PipelineState::Validated`] carries the backup path:
/// the original input only survives under that name until an operator
/// restores it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to derive identity for {file}: {source}")]
    Identity {
        file: PathBuf,
        #[source]
        source: LedgerError,
    },

    #[error("failed to read {file}: {source}")]
    Read {
        file: PathBuf,
        #[source]
        source: DatasetError,
    },

    #[error("backup {backup} already exists for {file}; a previous run was interrupted")]
    BackupConflict { file: PathBuf, backup: PathBuf },

    #[error("failed to move {file} to backup {backup}: {source}")]
    Backup {
        file: PathBuf,
        backup: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to commit output for {file} (original kept at {backup}): {source}")]
    Commit {
        file: PathBuf,
        backup: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("output for {file} written but not recorded as processed (original kept at {backup}): {source}")]
    Ledger {
        file: PathBuf,
        backup: PathBuf,
        #[source]
        source: LedgerError,
    },
}

impl PipelineError {
    /// The last state the file reached before failing.
    pub fn state(&self) -> PipelineState {
        match self {
            PipelineError::Identity { .. } | PipelineError::Read { .. } => {
                PipelineState::Discovered
            }
            PipelineError::BackupConflict { .. } | PipelineError::Backup { .. } => {
                PipelineState::Validated
            }
            PipelineError::Commit { .. } => PipelineState::Transformed,
            PipelineError::Ledger { .. } => PipelineState::Committed,
        }
    }

    /// Path of the Backup Artifact that holds the original data, if one was
    /// created.
    pub fn backup(&self) -> Option<&PathBuf> {
        match self {
            PipelineError::Commit { backup, .. } | PipelineError::Ledger { backup, .. } => {
                Some(backup)
            }
            _ => None,
        }
    }
}
