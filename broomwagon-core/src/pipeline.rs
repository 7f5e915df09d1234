//! Exactly-once file pipeline.
//!
//! Each input file walks the states
//! `Discovered -> Validated -> BackedUp -> Transformed -> Committed -> Logged`.
//! Rejection (already processed, missing columns) can only happen before
//! `BackedUp` and has no side effects. From `BackedUp` on, the original data
//! lives only in the Backup Artifact until the ledger entry is written, so
//! any failure in between leaves the artifact in place and the ledger
//! unmarked.
//!
//! # Navigation
//! - Per file: [`Pipeline::process_file`]
//! - Whole watch folder: [`Pipeline::run`]
//! - Undo an interrupted run: [`Pipeline::recover`]

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::contract::{DatasetReader, Formatter, Ledger, RosterStore};
use crate::error::PipelineError;
use crate::ledger::FileIdentity;
use crate::roster::{drivers_for, RosterSource, WeekId};
use crate::rotation::{allocate, rotation_offset, AllocationPlan};

/// Suffix appended to the file stem of a Backup Artifact.
pub const BACKUP_SUFFIX: &str = "_beforeupdate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Discovered,
    Validated,
    BackedUp,
    Transformed,
    Committed,
    Logged,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PipelineState::Discovered => "discovered",
            PipelineState::Validated => "validated",
            PipelineState::BackedUp => "backed_up",
            PipelineState::Transformed => "transformed",
            PipelineState::Committed => "committed",
            PipelineState::Logged => "logged",
        };
        f.write_str(s)
    }
}

/// A file that reached `Logged`.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub file: PathBuf,
    pub output: PathBuf,
    pub week: WeekId,
    pub roster_source: RosterSource,
    pub plan: AllocationPlan,
    /// Set when the backup could not be deleted after success.
    pub orphaned_backup: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Terminal outcome of a file that did not fail.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Processed(ProcessedFile),
    AlreadyProcessed { file: PathBuf },
    Rejected { file: PathBuf, missing_columns: Vec<String> },
}

#[derive(Debug)]
pub struct FileReport {
    pub file: PathBuf,
    pub result: Result<FileOutcome, PipelineError>,
}

/// Result of a folder run.
#[derive(Debug)]
pub enum RunReport {
    WatchFolderMissing { watch_dir: PathBuf },
    NoInputFiles { watch_dir: PathBuf },
    DiscoveryFailed { watch_dir: PathBuf, error: std::io::Error },
    Completed { files: Vec<FileReport> },
}

impl RunReport {
    /// True if any file ended in a failure state that needs an operator.
    pub fn has_failures(&self) -> bool {
        match self {
            RunReport::DiscoveryFailed { .. } => true,
            RunReport::Completed { files } => files.iter().any(|f| f.result.is_err()),
            _ => false,
        }
    }
}

/// What [`Pipeline::recover`] did with one Backup Artifact.
#[derive(Debug)]
pub enum RecoveryAction {
    /// Renamed back so the next run picks it up again.
    Restored { backup: PathBuf, original: PathBuf },
    /// Original already recorded in the ledger; the artifact was leftover.
    RemovedOrphan { backup: PathBuf },
    /// A file with the original name exists again; both were left alone.
    Conflict { backup: PathBuf, original: PathBuf },
    Failed { backup: PathBuf, error: String },
}

/// `reports/tickets.csv` -> `reports/tickets_beforeupdate.csv`
pub fn backup_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}{BACKUP_SUFFIX}.{}", ext.to_string_lossy()),
        None => format!("{stem}{BACKUP_SUFFIX}"),
    };
    path.with_file_name(name)
}

/// Inverse of [`backup_path`]; `None` if `path` is not a Backup Artifact.
pub fn original_path(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_str()?;
    let original_stem = stem.strip_suffix(BACKUP_SUFFIX)?;
    if original_stem.is_empty() {
        return None;
    }
    let name = match path.extension() {
        Some(ext) => format!("{original_stem}.{}", ext.to_string_lossy()),
        None => original_stem.to_string(),
    };
    Some(path.with_file_name(name))
}

pub struct Pipeline<R, L, D, F> {
    config: PipelineConfig,
    roster_store: R,
    ledger: L,
    reader: D,
    formatter: F,
}

impl<R, L, D, F> Pipeline<R, L, D, F>
where
    R: RosterStore,
    L: Ledger,
    D: DatasetReader,
    F: Formatter,
{
    pub fn new(config: PipelineConfig, roster_store: R, ledger: L, reader: D, formatter: F) -> Self {
        Self {
            config,
            roster_store,
            ledger,
            reader,
            formatter,
        }
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.config.extension))
    }

    /// Regular files in the watch folder with the configured extension,
    /// sorted by name.
    pub async fn discover(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(&self.config.watch_dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.matches_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Process every discovered file in order. One file failing never stops
    /// the others.
    pub async fn run(&self, today: NaiveDate) -> RunReport {
        let watch_dir = self.config.watch_dir.clone();
        info!(watch_dir = %watch_dir.display(), "Started broomwagon run");

        let files = match self.discover().await {
            Ok(files) => files,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!(watch_dir = %watch_dir.display(), "Watch folder does not exist");
                return RunReport::WatchFolderMissing { watch_dir };
            }
            Err(e) => {
                error!(watch_dir = %watch_dir.display(), error = %e, "Could not list watch folder");
                return RunReport::DiscoveryFailed { watch_dir, error: e };
            }
        };
        if files.is_empty() {
            warn!(watch_dir = %watch_dir.display(), "No files found to process");
            return RunReport::NoInputFiles { watch_dir };
        }

        let mut reports = Vec::with_capacity(files.len());
        for file in files {
            let result = self.process_file(&file, today).await;
            if let Err(e) = &result {
                error!(
                    file = %file.display(),
                    state = %e.state(),
                    backup = ?e.backup(),
                    error = %e,
                    "Error occurred while processing file"
                );
            }
            reports.push(FileReport { file, result });
        }
        RunReport::Completed { files: reports }
    }

    /// Drive one file through the state machine.
    pub async fn process_file(
        &self,
        path: &Path,
        today: NaiveDate,
    ) -> Result<FileOutcome, PipelineError> {
        let started = Instant::now();
        let file = path.to_path_buf();
        info!(file = %file.display(), state = %PipelineState::Discovered, "Started processing file");

        let identity = FileIdentity::for_path(path).map_err(|source| PipelineError::Identity {
            file: file.clone(),
            source,
        })?;

        match self.ledger.is_processed(&identity).await {
            Ok(true) => {
                info!(file = %identity, "File has already been processed");
                return Ok(FileOutcome::AlreadyProcessed { file });
            }
            Ok(false) => {}
            Err(e) => {
                warn!(file = %identity, error = %e, "Ledger unreadable, treating file as not processed");
            }
        }

        let dataset = self
            .reader
            .read(path)
            .await
            .map_err(|source| PipelineError::Read {
                file: file.clone(),
                source,
            })?;

        let missing_columns = dataset.missing_columns(&self.config.expected_columns);
        if !missing_columns.is_empty() {
            error!(file = %file.display(), missing = ?missing_columns, "Missing expected columns, file left untouched");
            return Ok(FileOutcome::Rejected {
                file,
                missing_columns,
            });
        }
        info!(file = %file.display(), state = %PipelineState::Validated, rows = dataset.row_count(), "Validated");

        let backup = backup_path(path);
        let backup_exists = tokio::fs::try_exists(&backup).await;
        match backup_exists {
            Ok(false) => {}
            Ok(true) => {
                error!(file = %file.display(), backup = %backup.display(), "Backup already exists, refusing to overwrite");
                return Err(PipelineError::BackupConflict { file, backup });
            }
            Err(source) => return Err(PipelineError::Backup { file, backup, source }),
        }
        let moved = tokio::fs::rename(path, &backup).await;
        if let Err(source) = moved {
            return Err(PipelineError::Backup { file, backup, source });
        }
        info!(file = %file.display(), backup = %backup.display(), state = %PipelineState::BackedUp, "Original moved to backup");

        let week = WeekId::from_date(today);
        let resolved = drivers_for(&self.roster_store, week, &self.config.default_roster).await;
        info!(week = %week, drivers = ?resolved.roster.drivers(), source = ?resolved.source, "Drivers used this week");
        let offset = rotation_offset(week, &resolved.roster);
        let plan = allocate(dataset.row_count(), &resolved.roster, offset);
        info!(total_tickets = plan.total, rotation_offset = offset, "Allocation computed");
        for assignment in &plan.assignments {
            match assignment.sheet_rows() {
                Some((first, last)) => info!(
                    driver = %assignment.driver,
                    tickets = assignment.len(),
                    "Assigned tickets (rows {first}-{last})"
                ),
                None => info!(driver = %assignment.driver, tickets = 0, "Assigned no tickets"),
            }
        }
        let labeled = dataset.label(&plan);
        debug!(file = %file.display(), state = %PipelineState::Transformed, "Rows labeled");

        let output = match path.file_name() {
            Some(name) => self.config.output_dir.join(name),
            None => self.config.output_dir.join(identity.as_str()),
        };
        let committed = self.formatter.write(&labeled, &output).await;
        if let Err(source) = committed {
            return Err(PipelineError::Commit {
                file,
                backup,
                source,
            });
        }
        info!(file = %file.display(), output = %output.display(), state = %PipelineState::Committed, "Output committed");

        let logged = self.ledger.mark_processed(&identity).await;
        if let Err(source) = logged {
            return Err(PipelineError::Ledger {
                file,
                backup,
                source,
            });
        }
        info!(file = %identity, state = %PipelineState::Logged, "Successfully completed processing");

        let cleaned = tokio::fs::remove_file(&backup).await;
        let orphaned_backup = match cleaned {
            Ok(()) => {
                info!(backup = %backup.display(), "Deleted backup file");
                None
            }
            Err(e) => {
                warn!(backup = %backup.display(), error = %e, "Could not delete backup file");
                Some(backup)
            }
        };

        Ok(FileOutcome::Processed(ProcessedFile {
            file,
            output,
            week,
            roster_source: resolved.source,
            plan,
            orphaned_backup,
            elapsed: started.elapsed(),
        }))
    }

    /// Resolve every Backup Artifact left in the watch folder.
    pub async fn recover(&self) -> std::io::Result<Vec<RecoveryAction>> {
        let mut actions = Vec::new();
        for backup in self.discover().await? {
            let Some(original) = original_path(&backup) else {
                continue;
            };
            actions.push(self.recover_one(backup, original).await);
        }
        Ok(actions)
    }

    async fn recover_one(&self, backup: PathBuf, original: PathBuf) -> RecoveryAction {
        let failed = |backup: PathBuf, error: String| {
            error!(backup = %backup.display(), error = %error, "Could not recover backup");
            RecoveryAction::Failed { backup, error }
        };

        let original_exists = tokio::fs::try_exists(&original).await;
        match original_exists {
            Ok(true) => {
                warn!(backup = %backup.display(), original = %original.display(), "Original exists next to its backup, leaving both");
                return RecoveryAction::Conflict { backup, original };
            }
            Ok(false) => {}
            Err(e) => return failed(backup, e.to_string()),
        }

        let identity = match FileIdentity::for_path(&original) {
            Ok(identity) => identity,
            Err(e) => return failed(backup, e.to_string()),
        };
        match self.ledger.is_processed(&identity).await {
            Ok(true) => {
                let removed = tokio::fs::remove_file(&backup).await;
                return match removed {
                    Ok(()) => {
                        info!(backup = %backup.display(), "Removed orphaned backup of processed file");
                        RecoveryAction::RemovedOrphan { backup }
                    }
                    Err(e) => failed(backup, e.to_string()),
                };
            }
            Ok(false) => {}
            Err(e) => return failed(backup, e.to_string()),
        }

        let restored = tokio::fs::rename(&backup, &original).await;
        match restored {
            Ok(()) => {
                info!(backup = %backup.display(), original = %original.display(), "Restored backup");
                RecoveryAction::Restored { backup, original }
            }
            Err(e) => failed(backup, e.to_string()),
        }
    }
}
