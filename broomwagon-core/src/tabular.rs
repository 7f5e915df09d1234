//! Picks the dataset codec from the configured input extension.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::contract::{DatasetReader, Formatter};
use crate::dataset::{CsvDatasetReader, TicketDataset, XlsxDatasetReader};
use crate::error::{DatasetError, FormatError};
use crate::formatter::{CsvFormatter, XlsxFormatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Delimited { delimiter: u8 },
    Workbook,
}

impl TabularFormat {
    /// `xlsx` selects the workbook codec; anything else is delimited text.
    pub fn for_extension(extension: &str, delimiter: u8) -> Self {
        if extension.trim_start_matches('.').eq_ignore_ascii_case("xlsx") {
            TabularFormat::Workbook
        } else {
            TabularFormat::Delimited { delimiter }
        }
    }

    pub fn reader(self) -> TabularReader {
        match self {
            TabularFormat::Delimited { delimiter } => {
                TabularReader::Delimited(CsvDatasetReader::new(delimiter))
            }
            TabularFormat::Workbook => TabularReader::Workbook(XlsxDatasetReader::new()),
        }
    }

    pub fn formatter(self) -> TabularFormatter {
        match self {
            TabularFormat::Delimited { delimiter } => {
                TabularFormatter::Delimited(CsvFormatter::new(delimiter))
            }
            TabularFormat::Workbook => TabularFormatter::Workbook(XlsxFormatter::new()),
        }
    }
}

impl fmt::Display for TabularFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TabularFormat::Delimited { delimiter } => {
                write!(f, "delimited ({:?})", char::from(*delimiter))
            }
            TabularFormat::Workbook => f.write_str("xlsx workbook"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TabularReader {
    Delimited(CsvDatasetReader),
    Workbook(XlsxDatasetReader),
}

#[async_trait]
impl DatasetReader for TabularReader {
    async fn read(&self, path: &Path) -> Result<TicketDataset, DatasetError> {
        match self {
            TabularReader::Delimited(reader) => reader.read(path).await,
            TabularReader::Workbook(reader) => reader.read(path).await,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TabularFormatter {
    Delimited(CsvFormatter),
    Workbook(XlsxFormatter),
}

#[async_trait]
impl Formatter for TabularFormatter {
    async fn write(&self, dataset: &TicketDataset, output: &Path) -> Result<(), FormatError> {
        match self {
            TabularFormatter::Delimited(formatter) => formatter.write(dataset, output).await,
            TabularFormatter::Workbook(formatter) => formatter.write(dataset, output).await,
        }
    }
}
