/// `load_config` module: loads the optional YAML config file and resolves it
/// into the folder layout and pipeline settings used by the CLI.
///
/// # Responsibilities
/// - Parse the user-supplied YAML into typed sections; every field has a default
/// - Resolve relative paths against the config file's directory
/// - Validate loosely-typed values (delimiter, extension, roster) up front
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{bail, Context, Result};
use broomwagon_core::config::PipelineConfig;
use broomwagon_core::roster::Roster;
use broomwagon_core::tabular::TabularFormat;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const ROSTER_FILE: &str = "driver_status.json";
const LEDGER_FILE: &str = "processed_files.log";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub folders: FoldersSection,
    pub input: InputSection,
    pub roster: RosterSection,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoldersSection {
    pub watch_dir: PathBuf,
    pub output_dir: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for FoldersSection {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("."),
            output_dir: PathBuf::from("Output"),
            config_dir: PathBuf::from("config"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputSection {
    pub extension: String,
    pub delimiter: String,
    pub expected_columns: Option<Vec<String>>,
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            extension: "xlsx".to_string(),
            delimiter: ",".to_string(),
            expected_columns: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RosterSection {
    pub default_drivers: Option<Vec<String>>,
}

/// Everything a command needs, with all paths absolute or relative to the
/// directory the config was loaded from.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pipeline: PipelineConfig,
    pub roster_path: PathBuf,
    pub ledger_path: PathBuf,
    pub log_dir: PathBuf,
    pub delimiter: u8,
    /// Codec for both input and output, chosen from `input.extension`.
    pub format: TabularFormat,
}

impl Settings {
    pub fn trace_loaded(&self) {
        self.pipeline.trace_loaded();
        info!(
            roster = %self.roster_path.display(),
            ledger = %self.ledger_path.display(),
            log_dir = %self.log_dir.display(),
            format = %self.format,
            "Resolved state file locations"
        );
    }
}

/// Loads `path` if given, otherwise uses defaults rooted at the current
/// directory.
pub fn load_config(path: Option<&Path>) -> Result<Settings> {
    let (raw, base) = match path {
        Some(path) => {
            info!(config_path = ?path, "Loading configuration from file");
            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    error!(error = ?e, config_path = ?path, "Failed to read config file");
                    return Err(anyhow::anyhow!("Failed to read config file {:?}: {}", path, e));
                }
            };
            let raw: CliConfig = if content.trim().is_empty() {
                CliConfig::default()
            } else {
                match serde_yaml::from_str(&content) {
                    Ok(conf) => conf,
                    Err(e) => {
                        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
                        return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
                    }
                }
            };
            let base = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (raw, base)
        }
        None => {
            info!("No config file given, using defaults");
            let base = std::env::current_dir().context("Failed to determine current directory")?;
            (CliConfig::default(), base)
        }
    };
    resolve(raw, &base)
}

fn resolve(raw: CliConfig, base: &Path) -> Result<Settings> {
    let at_base = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { base.join(p) };

    let delimiter = match raw.input.delimiter.as_bytes() {
        [b] if b.is_ascii() => *b,
        _ => bail!(
            "input.delimiter must be a single ASCII character, got {:?}",
            raw.input.delimiter
        ),
    };

    let extension = raw.input.extension.trim().trim_start_matches('.').to_string();
    if extension.is_empty() {
        bail!("input.extension must not be empty");
    }

    let format = TabularFormat::for_extension(&extension, delimiter);

    let mut pipeline = PipelineConfig::new(
        at_base(&raw.folders.watch_dir),
        at_base(&raw.folders.output_dir),
    );
    pipeline.extension = extension;
    if let Some(columns) = raw.input.expected_columns {
        pipeline.expected_columns = columns;
    }
    if let Some(drivers) = raw.roster.default_drivers {
        pipeline.default_roster = match Roster::new(&drivers) {
            Some(roster) => roster,
            None => bail!("roster.default_drivers must name at least one driver"),
        };
    }

    let config_dir = at_base(&raw.folders.config_dir);
    info!(
        watch_dir = %pipeline.watch_dir.display(),
        config_dir = %config_dir.display(),
        "Config loaded and resolved successfully"
    );

    Ok(Settings {
        pipeline,
        roster_path: config_dir.join(ROSTER_FILE),
        ledger_path: config_dir.join(LEDGER_FILE),
        log_dir: at_base(&raw.folders.log_dir),
        delimiter,
        format,
    })
}
