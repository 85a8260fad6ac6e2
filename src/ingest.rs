// 📂 Table Ingestion
// Reads a delimited source file into headers + string rows, nothing more

use crate::error::{Error, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// One source row. `line` is 1-based and counts the header as line 1.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub line: usize,
    pub cells: Vec<String>,
}

/// Raw tabular content of a source file
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl Table {
    /// Read a file with the given field separator (`b','` or `b'\t'`)
    pub fn from_path(path: &Path, delimiter: u8) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_reader(file, delimiter, path.to_path_buf())
    }

    /// Read from any reader; `origin` is only used in error messages
    pub fn from_reader<R: Read>(reader: R, delimiter: u8, origin: PathBuf) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|source| Error::Table {
                path: origin.clone(),
                source,
            })?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();

        let mut rows = Vec::new();

        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|source| Error::Table {
                path: origin.clone(),
                source,
            })?;

            rows.push(TableRow {
                line: index + 2, // +2 because: 1-indexed + header row
                cells: record.iter().map(str::to_string).collect(),
            });
        }

        Ok(Table { headers, rows })
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_comma_separated() {
        let data = "id,name,city\n1,Co.op Mart,Hà Nội\n2,,Đà Nẵng\n";
        let table = Table::from_reader(data.as_bytes(), b',', PathBuf::from("mem.csv")).unwrap();

        assert_eq!(table.headers, vec!["id", "name", "city"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].line, 2);
        assert_eq!(table.rows[1].cells[1], "");
    }

    #[test]
    fn test_read_tab_separated_with_quoted_latlng() {
        let data = "Column1\ttype\tlatlng\nNhà máy A\tĐiện gió\t\"10.5,106.7\"\n";
        let table = Table::from_reader(data.as_bytes(), b'\t', PathBuf::from("mem.tsv")).unwrap();

        assert!(table.has_column("latlng"));
        assert_eq!(table.rows[0].cells[2], "10.5,106.7");
    }

    #[test]
    fn test_short_rows_are_kept() {
        let data = "id,name,city\n1,Only Name\n";
        let table = Table::from_reader(data.as_bytes(), b',', PathBuf::from("mem.csv")).unwrap();

        assert_eq!(table.rows[0].cells.len(), 2);
    }

    #[test]
    fn test_missing_file_is_file_read_error() {
        let result = Table::from_path(Path::new("/definitely/not/here.csv"), b',');

        match result {
            Err(Error::FileRead { path, .. }) => {
                assert_eq!(path, PathBuf::from("/definitely/not/here.csv"));
            }
            other => panic!("expected FileRead, got {:?}", other),
        }
    }
}
