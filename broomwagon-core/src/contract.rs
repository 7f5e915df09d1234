//! # contract: the seams between the pipeline and its collaborators
//!
//! The pipeline never touches a global path. Everything it reads or writes
//! outside its own working folder goes through one of the traits below, and
//! the concrete implementations are injected by the caller:
//!
//! - [`RosterStore`]: the persisted week -> drivers record (read-only here)
//! - [`Ledger`]: the append-only record of completed files
//! - [`DatasetReader`]: decodes an input file into a [`TicketDataset`]
//! - [`Formatter`]: renders the labeled dataset at the output path
//!
//! ## Mocking & Testing
//! Every trait is annotated for `mockall`; the generated `Mock*` types are
//! exported under the `test-export-mocks` feature so integration tests can
//! inject faults at any stage.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use mockall::automock;

use crate::dataset::TicketDataset;
use crate::error::{DatasetError, FormatError, LedgerError, RosterError};
use crate::ledger::FileIdentity;

/// Raw Roster Record as persisted: week id to whatever value was stored.
///
/// Values are kept untyped so that a malformed entry for one week degrades to
/// the default roster instead of making the whole record unreadable.
pub type RosterRecord = BTreeMap<String, serde_json::Value>;

/// Read access to the Roster Record written by the roster editing front end.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// Load the full record. A missing record is an empty map, not an error.
    async fn load(&self) -> Result<RosterRecord, RosterError>;
}

/// The processing ledger: sole source of truth for "already processed".
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    /// True iff an entry for exactly this identity exists.
    async fn is_processed(&self, file: &FileIdentity) -> Result<bool, LedgerError>;

    /// Append an entry. Must be durable before returning.
    async fn mark_processed(&self, file: &FileIdentity) -> Result<(), LedgerError>;
}

/// Decodes an input file. Must not modify the file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait DatasetReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<TicketDataset, DatasetError>;
}

/// External formatter: receives the labeled dataset and an output path.
///
/// Responsible for presentation only. It must not reorder rows or alter the
/// `Driver` column, and must leave nothing under `output` unless it returns
/// `Ok`.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Formatter: Send + Sync {
    async fn write(&self, dataset: &TicketDataset, output: &Path) -> Result<(), FormatError>;
}
