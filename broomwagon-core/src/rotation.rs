//! Rotation-aware fair-share allocation of rows to drivers.
//!
//! Every driver receives `N / K` rows; the `N % K` leftover rows go to the
//! drivers whose rotated position `(i - offset) mod K` is below the
//! remainder. The offset moves with the ISO week, so the extra tickets
//! travel around the roster without any persisted state.

use std::ops::Range;

use crate::roster::{Roster, WeekId};

/// One driver's contiguous slice of the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub driver: String,
    /// Row positions, 0-based, excluding the header.
    pub rows: Range<usize>,
}

impl Assignment {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inclusive spreadsheet row numbers (header is row 1), or `None` for an
    /// empty share.
    pub fn sheet_rows(&self) -> Option<(usize, usize)> {
        if self.rows.is_empty() {
            None
        } else {
            Some((self.rows.start + 2, self.rows.end + 1))
        }
    }
}

/// Gap-free partition of `[0, total)` in roster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    pub total: usize,
    pub rotation_offset: usize,
    pub assignments: Vec<Assignment>,
}

impl AllocationPlan {
    /// Driver that owns the row at `position`.
    pub fn driver_at(&self, position: usize) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.rows.contains(&position))
            .map(|a| a.driver.as_str())
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.assignments.iter().map(Assignment::len).collect()
    }

    /// Drivers that received one row more than the base share.
    pub fn extra_receivers(&self) -> Vec<&str> {
        let base = self.total / self.assignments.len().max(1);
        self.assignments
            .iter()
            .filter(|a| a.len() > base)
            .map(|a| a.driver.as_str())
            .collect()
    }
}

/// Rotation offset for a week: `(iso_week - 1) mod K`.
pub fn rotation_offset(week: WeekId, roster: &Roster) -> usize {
    (week.week() as usize).saturating_sub(1) % roster.len()
}

/// Partition `total` rows across `roster`.
///
/// Deterministic: the same `(total, roster, rotation_offset)` always yields
/// the same plan. Offsets larger than the roster wrap around.
pub fn allocate(total: usize, roster: &Roster, rotation_offset: usize) -> AllocationPlan {
    let k = roster.len();
    let base = total / k;
    let extras = total % k;
    let offset = rotation_offset % k;

    let mut start = 0;
    let assignments = roster
        .drivers()
        .iter()
        .enumerate()
        .map(|(i, driver)| {
            let rotated = (i + k - offset) % k;
            let share = base + usize::from(rotated < extras);
            let rows = start..start + share;
            start = rows.end;
            Assignment {
                driver: driver.clone(),
                rows,
            }
        })
        .collect();

    AllocationPlan {
        total,
        rotation_offset: offset,
        assignments,
    }
}
