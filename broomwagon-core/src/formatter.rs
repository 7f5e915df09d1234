//! Formatter collaborators: write the labeled dataset as delimited text or as
//! an `.xlsx` workbook.
//!
//! The output is staged in a temporary file inside the output directory and
//! only renamed onto the final name once fully written and synced.

use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

use crate::contract::Formatter;
use crate::dataset::TicketDataset;
use crate::error::FormatError;

#[derive(Debug, Clone)]
pub struct CsvFormatter {
    delimiter: u8,
}

impl CsvFormatter {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    pub fn encode(&self, dataset: &TicketDataset, output: &Path) -> Result<Vec<u8>, FormatError> {
        let csv_err = |source| FormatError::Csv {
            path: output.to_path_buf(),
            source,
        };
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(Vec::new());
        writer.write_record(dataset.headers()).map_err(csv_err)?;
        for row in dataset.rows() {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer.into_inner().map_err(|e| FormatError::Io {
            path: output.to_path_buf(),
            source: e.into_error(),
        })
    }
}

impl Default for CsvFormatter {
    fn default() -> Self {
        Self::new(b',')
    }
}

#[async_trait]
impl Formatter for CsvFormatter {
    async fn write(&self, dataset: &TicketDataset, output: &Path) -> Result<(), FormatError> {
        let bytes = self.encode(dataset, output)?;
        commit(bytes, output).await?;
        info!(output = %output.display(), rows = dataset.row_count(), "Output written");
        Ok(())
    }
}

/// Writes a single worksheet with the header in row 1. Every cell is a
/// string cell; blank cells are left empty.
#[derive(Debug, Clone, Default)]
pub struct XlsxFormatter;

impl XlsxFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, dataset: &TicketDataset, output: &Path) -> Result<Vec<u8>, FormatError> {
        let xlsx_err = |source| FormatError::Workbook {
            path: output.to_path_buf(),
            source,
        };
        let too_large = || FormatError::Rejected {
            path: output.to_path_buf(),
            reason: "dataset exceeds worksheet limits".to_string(),
        };

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let lines = std::iter::once(dataset.headers()).chain(dataset.rows().iter().map(Vec::as_slice));
        for (row, cells) in lines.enumerate() {
            let row = u32::try_from(row).map_err(|_| too_large())?;
            for (col, value) in cells.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let col = u16::try_from(col).map_err(|_| too_large())?;
                sheet.write_string(row, col, value).map_err(xlsx_err)?;
            }
        }
        workbook.save_to_buffer().map_err(xlsx_err)
    }
}

#[async_trait]
impl Formatter for XlsxFormatter {
    async fn write(&self, dataset: &TicketDataset, output: &Path) -> Result<(), FormatError> {
        let bytes = self.encode(dataset, output)?;
        commit(bytes, output).await?;
        info!(output = %output.display(), rows = dataset.row_count(), "Workbook written");
        Ok(())
    }
}

async fn commit(bytes: Vec<u8>, output: &Path) -> Result<(), FormatError> {
    let target = output.to_path_buf();
    tokio::task::spawn_blocking(move || persist(&bytes, &target))
        .await
        .map_err(|e| FormatError::Rejected {
            path: output.to_path_buf(),
            reason: format!("output writer task failed: {e}"),
        })?
}

fn persist(bytes: &[u8], output: &Path) -> Result<(), FormatError> {
    let io_err = |source| FormatError::Io {
        path: output.to_path_buf(),
        source,
    };
    let dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    let mut staged = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    debug!(staged = %staged.path().display(), "Staging output");
    staged.write_all(bytes).map_err(io_err)?;
    staged.as_file().sync_all().map_err(io_err)?;
    staged.persist(output).map_err(|e| io_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::DatasetReader;
    use crate::dataset::XlsxDatasetReader;

    #[tokio::test]
    async fn workbook_output_reads_back_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("Output").join("tickets.xlsx");
        let dataset = TicketDataset::new(
            vec!["Driver".into(), "Ticket#".into(), "Ticket action".into()],
            vec![
                vec!["A".into(), "000042".into(), String::new()],
                vec!["B".into(), "000043".into(), String::new()],
            ],
        );

        XlsxFormatter::new().write(&dataset, &output).await.unwrap();

        let read = XlsxDatasetReader::new().read(&output).await.unwrap();
        assert_eq!(read, dataset);
        let leftovers: Vec<_> = std::fs::read_dir(output.parent().unwrap())
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1, "no staged temp file left behind");
    }
}
