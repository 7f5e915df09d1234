//! Ticket datasets: decoding, column validation and driver labeling.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx};
use tracing::debug;

use crate::contract::DatasetReader;
use crate::error::DatasetError;
use crate::rotation::AllocationPlan;

pub const DRIVER_COLUMN: &str = "Driver";
pub const TICKET_COLUMN: &str = "Ticket#";
pub const TICKET_ACTION_COLUMN: &str = "Ticket action";
pub const INTERNAL_ACTION_COLUMN: &str = "Internal action";
pub const REMINDER_COLUMN: &str = "reminder number\n(no number => #1)";

/// Columns every ticket export must carry.
pub const EXPECTED_COLUMNS: [&str; 15] = [
    "Ticket#",
    "Age",
    "Title",
    "Created",
    "Last Changed",
    "Queue",
    "State",
    "Priority",
    "Customer ID",
    "Service",
    "SLA",
    "Responsible",
    "UpdateTimeDestinationDate",
    "SolutionTimeDestinationDate",
    "Ticket-Ersteller",
];

/// Placeholder columns inserted after `Ticket#` for manual annotation.
pub const PLACEHOLDER_COLUMNS: [&str; 3] =
    [TICKET_ACTION_COLUMN, INTERNAL_ACTION_COLUMN, REMINDER_COLUMN];

/// Header plus rows of text cells. Row order is significant and preserved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TicketDataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TicketDataset {
    /// Every row is padded to the header width.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, String::new());
                }
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }

    /// Expected columns absent from the header, in `expected` order.
    pub fn missing_columns<S: AsRef<str>>(&self, expected: &[S]) -> Vec<String> {
        expected
            .iter()
            .map(|c| c.as_ref().trim())
            .filter(|c| self.column_index(c).is_none())
            .map(str::to_string)
            .collect()
    }

    fn insert_column(&mut self, at: usize, name: &str, mut value: impl FnMut(usize) -> String) {
        self.headers.insert(at, name.to_string());
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.insert(at, value(i));
        }
    }

    /// Stamps every row with its driver and adds the blank annotation
    /// columns. The plan must cover exactly this dataset's rows.
    pub fn label(mut self, plan: &AllocationPlan) -> Self {
        debug_assert_eq!(plan.total, self.rows.len());
        self.insert_column(0, DRIVER_COLUMN, |i| {
            plan.driver_at(i).unwrap_or_default().to_string()
        });
        let anchor = self.column_index(TICKET_COLUMN).unwrap_or(0) + 1;
        for (offset, name) in PLACEHOLDER_COLUMNS.iter().enumerate() {
            self.insert_column(anchor + offset, name, |_| String::new());
        }
        self
    }
}

/// Reads delimited text (CSV by default) with a header row.
#[derive(Debug, Clone)]
pub struct CsvDatasetReader {
    delimiter: u8,
}

impl CsvDatasetReader {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Decodes an in-memory buffer; `path` is only used for error context.
    pub fn decode(&self, path: &Path, bytes: &[u8]) -> Result<TicketDataset, DatasetError> {
        let csv_err = |source| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(csv_err)?;
            if record.len() > headers.len() {
                return Err(DatasetError::RaggedRow {
                    path: path.to_path_buf(),
                    row: i + 2,
                    found: record.len(),
                    expected: headers.len(),
                });
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        debug!(path = %path.display(), columns = headers.len(), rows = rows.len(), "Decoded dataset");
        Ok(TicketDataset::new(headers, rows))
    }
}

impl Default for CsvDatasetReader {
    fn default() -> Self {
        Self::new(b',')
    }
}

#[async_trait]
impl DatasetReader for CsvDatasetReader {
    async fn read(&self, path: &Path) -> Result<TicketDataset, DatasetError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| DatasetError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        self.decode(path, &bytes)
    }
}

/// Reads the first worksheet of an `.xlsx` workbook. The first row is the
/// header; fully blank rows are skipped.
#[derive(Debug, Clone, Default)]
pub struct XlsxDatasetReader;

impl XlsxDatasetReader {
    pub fn new() -> Self {
        Self
    }

    pub fn decode(&self, path: &Path, bytes: Vec<u8>) -> Result<TicketDataset, DatasetError> {
        let workbook_err = |source| DatasetError::Workbook {
            path: path.to_path_buf(),
            source,
        };
        let mut workbook: Xlsx<_> =
            calamine::open_workbook_from_rs(std::io::Cursor::new(bytes)).map_err(workbook_err)?;
        let range = match workbook.worksheet_range_at(0) {
            Some(range) => range.map_err(workbook_err)?,
            None => {
                return Err(DatasetError::NoWorksheet {
                    path: path.to_path_buf(),
                })
            }
        };

        let mut sheet_rows = range.rows();
        let mut headers: Vec<String> = sheet_rows
            .next()
            .map(|row| row.iter().map(cell_text).collect())
            .unwrap_or_default();
        // The used range can be wider than the header row.
        while headers.last().is_some_and(|h| h.is_empty()) {
            headers.pop();
        }

        let mut rows = Vec::new();
        for (i, row) in sheet_rows.enumerate() {
            let mut cells: Vec<String> = row.iter().map(cell_text).collect();
            if cells.iter().all(String::is_empty) {
                continue;
            }
            if let Some(extra) = cells.iter().rposition(|c| !c.is_empty()) {
                if extra >= headers.len() {
                    return Err(DatasetError::RaggedRow {
                        path: path.to_path_buf(),
                        row: i + 2,
                        found: extra + 1,
                        expected: headers.len(),
                    });
                }
            }
            cells.truncate(headers.len());
            rows.push(cells);
        }
        debug!(path = %path.display(), columns = headers.len(), rows = rows.len(), "Decoded workbook");
        Ok(TicketDataset::new(headers, rows))
    }
}

/// Cell contents as text. Strings are kept verbatim so identifiers keep
/// their leading zeros.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => dt.as_f64().to_string(),
        },
        other => other.to_string(),
    }
}

#[async_trait]
impl DatasetReader for XlsxDatasetReader {
    async fn read(&self, path: &Path) -> Result<TicketDataset, DatasetError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| DatasetError::Io {
            path: PathBuf::from(path),
            source,
        })?;
        self.decode(path, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::Roster;
    use crate::rotation::allocate;

    fn sample() -> TicketDataset {
        TicketDataset::new(
            vec!["Title".into(), "Ticket#".into(), "Queue".into()],
            vec![
                vec!["a".into(), "0001".into(), "q1".into()],
                vec!["b".into(), "0002".into(), "q2".into()],
                vec!["c".into(), "0003".into()],
            ],
        )
    }

    #[test]
    fn label_inserts_driver_first_and_placeholders_after_ticket() {
        let roster = Roster::new(["A", "B"]).unwrap();
        let labeled = sample().label(&allocate(3, &roster, 0));
        assert_eq!(
            labeled.headers(),
            [
                DRIVER_COLUMN,
                "Title",
                "Ticket#",
                TICKET_ACTION_COLUMN,
                INTERNAL_ACTION_COLUMN,
                REMINDER_COLUMN,
                "Queue"
            ]
        );
        let drivers: Vec<_> = (0..3).map(|i| labeled.get(i, DRIVER_COLUMN).unwrap()).collect();
        assert_eq!(drivers, ["A", "A", "B"]);
        assert_eq!(labeled.get(2, "Ticket#"), Some("0003"));
        assert_eq!(labeled.get(2, "Queue"), Some(""));
        assert_eq!(labeled.get(0, TICKET_ACTION_COLUMN), Some(""));
    }

    #[test]
    fn missing_columns_compares_trimmed_names() {
        let ds = TicketDataset::new(vec![" Ticket# ".into(), "Age".into()], vec![]);
        assert_eq!(ds.missing_columns(&["Ticket#", "Age", "SLA"]), vec!["SLA"]);
    }

    #[test]
    fn decode_keeps_leading_zeros_and_strips_bom() {
        let reader = CsvDatasetReader::default();
        let ds = reader
            .decode(Path::new("t.csv"), b"\xEF\xBB\xBFTicket#,Title\n007,hello\n")
            .unwrap();
        assert_eq!(ds.headers(), ["Ticket#", "Title"]);
        assert_eq!(ds.get(0, "Ticket#"), Some("007"));
    }

    #[test]
    fn decode_rejects_rows_wider_than_header() {
        let reader = CsvDatasetReader::default();
        let err = reader
            .decode(Path::new("t.csv"), b"a,b\n1,2,3\n")
            .unwrap_err();
        assert!(matches!(err, DatasetError::RaggedRow { row: 2, found: 3, .. }));
    }

    fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, cells) in rows.iter().enumerate() {
            for (c, value) in cells.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn workbook_decode_keeps_text_and_skips_blank_rows() {
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Ticket#").unwrap();
        sheet.write_string(0, 1, "Priority").unwrap();
        sheet.write_string(1, 0, "000123").unwrap();
        sheet.write_number(1, 1, 3.0).unwrap();
        sheet.write_string(3, 0, "000124").unwrap();
        let bytes = workbook.save_to_buffer().unwrap();

        let ds = XlsxDatasetReader::new()
            .decode(Path::new("t.xlsx"), bytes)
            .unwrap();
        assert_eq!(ds.headers(), ["Ticket#", "Priority"]);
        assert_eq!(ds.row_count(), 2);
        assert_eq!(ds.get(0, "Ticket#"), Some("000123"));
        assert_eq!(ds.get(0, "Priority"), Some("3"));
        assert_eq!(ds.get(1, "Priority"), Some(""));
    }

    #[test]
    fn workbook_decode_rejects_cells_right_of_header() {
        let bytes = workbook_bytes(&[&["a", "b"], &["1", "2", "3"]]);
        let err = XlsxDatasetReader::new()
            .decode(Path::new("t.xlsx"), bytes)
            .unwrap_err();
        assert!(matches!(err, DatasetError::RaggedRow { row: 2, found: 3, expected: 2, .. }));
    }

    #[test]
    fn workbook_decode_reports_garbage() {
        let err = XlsxDatasetReader::new()
            .decode(Path::new("t.xlsx"), b"not a zip".to_vec())
            .unwrap_err();
        assert!(matches!(err, DatasetError::Workbook { .. }));
    }
}
