use std::path::PathBuf;

use tracing::{debug, info};

use crate::dataset::EXPECTED_COLUMNS;
use crate::roster::Roster;

/// Folder layout and validation rules for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Input files are discovered here.
    pub watch_dir: PathBuf,
    /// Transformed files are written here under their original name.
    pub output_dir: PathBuf,
    /// Input extension, without the dot, compared case-insensitively.
    pub extension: String,
    pub expected_columns: Vec<String>,
    /// Used for any week without a valid Roster Record entry.
    pub default_roster: Roster,
}

impl PipelineConfig {
    pub fn new(watch_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            output_dir: output_dir.into(),
            extension: "xlsx".to_string(),
            expected_columns: EXPECTED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            default_roster: Roster::default_roster(),
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            watch_dir = %self.watch_dir.display(),
            output_dir = %self.output_dir.display(),
            extension = %self.extension,
            default_drivers = self.default_roster.len(),
            "Loaded PipelineConfig"
        );
        debug!(?self, "PipelineConfig loaded (full debug)");
    }
}
