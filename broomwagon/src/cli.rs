//! CLI glue for broomwagon: command parsing, wiring the concrete
//! collaborators into the core pipeline, and operator-facing output.
//!
//! All business logic lives in `broomwagon-core`. Every outcome printed here
//! is also logged through `tracing` by the core crate.
use crate::load_config::Settings;
use anyhow::Result;
use broomwagon_core::ledger::FileLedger;
use broomwagon_core::pipeline::{FileOutcome, Pipeline, ProcessedFile, RecoveryAction, RunReport};
use broomwagon_core::roster::{drivers_for, JsonRosterStore, RosterSource, WeekId};
use broomwagon_core::rotation::rotation_offset;
use broomwagon_core::tabular::{TabularFormatter, TabularReader};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub type CliPipeline = Pipeline<JsonRosterStore, FileLedger, TabularReader, TabularFormatter>;

/// CLI for broomwagon: split ticket exports across this week's drivers.
#[derive(Parser)]
#[clap(
    name = "broomwagon",
    version,
    about = "Distribute ticket spreadsheets across the weekly driver rotation"
)]
pub struct Cli {
    /// Path to the YAML config file (defaults apply when omitted)
    #[clap(long, global = true, env = "BROOMWAGON_CONFIG")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every input file in the watch folder
    Process {
        /// Treat this date (YYYY-MM-DD) as today
        #[clap(long)]
        date: Option<NaiveDate>,
    },
    /// Restore or clean up backups left behind by an interrupted run
    Recover,
    /// Show the drivers and rotation offset in effect for a week
    Roster {
        /// Treat this date (YYYY-MM-DD) as today
        #[clap(long)]
        date: Option<NaiveDate>,
    },
}

pub fn build_pipeline(settings: &Settings) -> CliPipeline {
    Pipeline::new(
        settings.pipeline.clone(),
        JsonRosterStore::new(&settings.roster_path),
        FileLedger::new(&settings.ledger_path),
        settings.format.reader(),
        settings.format.formatter(),
    )
}

fn today_or(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| chrono::Local::now().date_naive())
}

/// CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli, settings: Settings) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Process { date } => {
            let pipeline = build_pipeline(&settings);
            tracing::info!(command = "process", "Starting processing run");
            let report = pipeline.run(today_or(date)).await;
            print_run_report(&report);
            if report.has_failures() {
                tracing::error!(command = "process", "Run finished with failures");
                anyhow::bail!("one or more files failed; see the log for details");
            }
            tracing::info!(command = "process", "Run complete");
            Ok(())
        }
        Commands::Recover => {
            let pipeline = build_pipeline(&settings);
            tracing::info!(command = "recover", "Starting recovery");
            let actions = match pipeline.recover().await {
                Ok(actions) => actions,
                Err(e) => {
                    eprintln!("[ERROR] Could not scan watch folder: {e}");
                    return Err(e.into());
                }
            };
            print_recovery(&actions);
            if actions.iter().any(|a| matches!(a, RecoveryAction::Failed { .. })) {
                anyhow::bail!("one or more backups could not be recovered");
            }
            Ok(())
        }
        Commands::Roster { date } => {
            let week = WeekId::from_date(today_or(date));
            let store = JsonRosterStore::new(&settings.roster_path);
            let resolved = drivers_for(&store, week, &settings.pipeline.default_roster).await;
            let source = match resolved.source {
                RosterSource::Record => "roster record",
                RosterSource::Default => "default roster",
            };
            println!("Week {week} ({source}):");
            for driver in resolved.roster.drivers() {
                println!("• {driver}");
            }
            println!("Rotation offset: {}", rotation_offset(week, &resolved.roster));
            Ok(())
        }
    }
}

fn print_run_report(report: &RunReport) {
    match report {
        RunReport::WatchFolderMissing { watch_dir } => {
            println!("[ERROR] Watch folder does not exist: {}", watch_dir.display());
        }
        RunReport::NoInputFiles { watch_dir } => {
            println!("[ERROR] No files found to process in {}", watch_dir.display());
        }
        RunReport::DiscoveryFailed { watch_dir, error } => {
            eprintln!("[ERROR] Could not list {}: {error}", watch_dir.display());
        }
        RunReport::Completed { files } => {
            for file in files {
                let name = file
                    .file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file.file.display().to_string());
                println!("File: {name}");
                match &file.result {
                    Ok(FileOutcome::Processed(processed)) => print_processed(processed),
                    Ok(FileOutcome::AlreadyProcessed { file }) => {
                        println!("[SKIP] This file has already been processed: {}", file.display());
                    }
                    Ok(FileOutcome::Rejected { missing_columns, .. }) => {
                        println!("[REJECTED] Missing expected columns: {}", missing_columns.join(", "));
                    }
                    Err(e) => {
                        eprintln!("[ERROR] {e}");
                        if let Some(backup) = e.backup() {
                            eprintln!(
                                "        Original data kept at {}. Run `broomwagon recover` to restore it.",
                                backup.display()
                            );
                        }
                    }
                }
                println!();
            }
        }
    }
}

fn print_processed(processed: &ProcessedFile) {
    println!("Total tickets: {}", processed.plan.total);
    println!("[OK] File processed successfully ({}).", processed.week);
    println!("Rotation offset: {}", processed.plan.rotation_offset);
    println!("Ticket distribution:");
    for assignment in &processed.plan.assignments {
        match assignment.sheet_rows() {
            Some((first, last)) => println!(
                "• {}: {} tickets (rows {first}-{last})",
                assignment.driver,
                assignment.len()
            ),
            None => println!("• {}: 0 tickets", assignment.driver),
        }
    }
    println!("Processed file: {}", processed.output.display());
    if let Some(backup) = &processed.orphaned_backup {
        println!("[WARN] Backup could not be deleted: {}", backup.display());
    }
    println!("Time taken: {:.2} seconds", processed.elapsed.as_secs_f64());
}

fn print_recovery(actions: &[RecoveryAction]) {
    if actions.is_empty() {
        println!("No backups to recover.");
    }
    for action in actions {
        match action {
            RecoveryAction::Restored { backup, original } => {
                println!("[RESTORED] {} -> {}", backup.display(), original.display());
            }
            RecoveryAction::RemovedOrphan { backup } => {
                println!("[REMOVED] {} (already processed)", backup.display());
            }
            RecoveryAction::Conflict { backup, original } => {
                println!(
                    "[CONFLICT] {} exists next to {}; resolve manually",
                    original.display(),
                    backup.display()
                );
            }
            RecoveryAction::Failed { backup, error } => {
                eprintln!("[ERROR] {}: {error}", backup.display());
            }
        }
    }
}
