//! Roster resolution: which drivers are on call for a given ISO week.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::contract::{RosterRecord, RosterStore};
use crate::error::RosterError;

/// Compiled-in fallback roster, used whenever the record has no valid entry
/// for the week.
pub const DEFAULT_DRIVERS: [&str; 6] = ["Hyndavi", "Sweta", "Shubham", "Joyita", "Shashwat", "Aman"];

/// ISO year + ISO week number, rendered as `2024-W17`.
///
/// The year is the ISO week-numbering year, which differs from the calendar
/// year for a few days around new year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekId {
    year: i32,
    week: u32,
}

impl WeekId {
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// ISO week number, 1..=53.
    pub fn week(&self) -> u32 {
        self.week
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWeekIdError(String);

impl fmt::Display for ParseWeekIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid week id {:?}, expected YYYY-Www", self.0)
    }
}

impl std::error::Error for ParseWeekIdError {}

impl FromStr for WeekId {
    type Err = ParseWeekIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseWeekIdError(s.to_string());
        let (year, week) = s.split_once("-W").ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let week: u32 = week.parse().map_err(|_| err())?;
        // Rejects week 53 in years that only have 52.
        NaiveDate::from_isoywd_opt(year, week, chrono::Weekday::Mon).ok_or_else(err)?;
        Ok(Self { year, week })
    }
}

/// An ordered, non-empty, duplicate-free list of driver names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster(Vec<String>);

impl Roster {
    /// Builds a roster, trimming names and dropping blanks and repeats.
    /// Returns `None` if nothing is left.
    pub fn new<I, S>(names: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut drivers: Vec<String> = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() || drivers.iter().any(|d| d == name) {
                continue;
            }
            drivers.push(name.to_string());
        }
        if drivers.is_empty() {
            None
        } else {
            Some(Self(drivers))
        }
    }

    pub fn default_roster() -> Self {
        Self(DEFAULT_DRIVERS.iter().map(|d| d.to_string()).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn drivers(&self) -> &[String] {
        &self.0
    }
}

/// Where a resolved roster came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RosterSource {
    Record,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoster {
    pub week: WeekId,
    pub roster: Roster,
    pub source: RosterSource,
}

/// Looks up the week in the Roster Record, falling back to `default`.
///
/// Never fails and never writes to the store: an unreadable record is
/// treated the same as a missing entry.
pub async fn drivers_for<S>(store: &S, week: WeekId, default: &Roster) -> ResolvedRoster
where
    S: RosterStore + ?Sized,
{
    let key = week.to_string();
    let record = match store.load().await {
        Ok(record) => record,
        Err(e) => {
            warn!(error = %e, week = %key, "Could not load roster record");
            RosterRecord::new()
        }
    };

    if let Some(roster) = record.get(&key).and_then(roster_from_value) {
        debug!(week = %key, drivers = ?roster.drivers(), "Roster found in record");
        return ResolvedRoster {
            week,
            roster,
            source: RosterSource::Record,
        };
    }

    info!(week = %key, "No valid roster found for week, using default drivers");
    ResolvedRoster {
        week,
        roster: default.clone(),
        source: RosterSource::Default,
    }
}

fn roster_from_value(value: &serde_json::Value) -> Option<Roster> {
    let items = value.as_array()?;
    let names: Option<Vec<&str>> = items.iter().map(|v| v.as_str()).collect();
    Roster::new(names?)
}

/// Roster Record persisted as a JSON object `{ "2024-W17": ["A", "B"] }`.
pub struct JsonRosterStore {
    path: PathBuf,
}

impl JsonRosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RosterStore for JsonRosterStore {
    async fn load(&self) -> Result<RosterRecord, RosterError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Roster record does not exist yet");
                return Ok(RosterRecord::new());
            }
            Err(source) => {
                return Err(RosterError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| RosterError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}
