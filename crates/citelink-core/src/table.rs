//! Delimited text tables with named columns.
//!
//! Every input of the pipeline is a header-first delimited file. Tables are
//! loaded fully into memory; cells stay as strings until a typed record is
//! built from them.

use std::collections::HashMap;
use std::path::Path;

use crate::CoreError;

/// An in-memory delimited table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Human-readable name used in error messages and logs.
    pub name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Rows rejected because their cell count did not match the header.
    misaligned: usize,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
            misaligned: 0,
        }
    }

    /// Append a row. A row whose cell count differs from the header is not
    /// stored; it is counted in [`Table::misaligned_rows`] instead and
    /// `false` is returned.
    pub fn push_row(&mut self, row: Vec<String>) -> bool {
        if row.len() != self.headers.len() {
            self.misaligned += 1;
            return false;
        }
        self.rows.push(row);
        true
    }

    pub fn misaligned_rows(&self) -> usize {
        self.misaligned
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a column that must exist.
    pub fn require(&self, name: &str) -> Result<usize, CoreError> {
        self.column(name).ok_or_else(|| CoreError::MissingColumn {
            table: self.name.clone(),
            column: name.to_string(),
        })
    }

    pub(crate) fn headers_mut(&mut self) -> &mut Vec<String> {
        &mut self.headers
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Vec<String>> {
        &mut self.rows
    }

    /// Index rows by the value of `column`. Later duplicates overwrite
    /// earlier ones.
    pub fn index_by(&self, column: usize) -> HashMap<&str, &[String]> {
        self.rows
            .iter()
            .map(|row| (row[column].as_str(), row.as_slice()))
            .collect()
    }
}

/// Delimiter implied by a file name: `,` for `.csv`, tab otherwise.
pub fn delimiter_for_path(path: &Path) -> u8 {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}

/// Read a header-first delimited file.
pub fn read_table(path: &Path, delimiter: u8) -> Result<Table, CoreError> {
    let csv_err = |source| CoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(path).map_err(|source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(std::io::BufReader::new(file));

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let mut table = Table::new(name, headers);

    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let cells = record.len();
        if !table.push_row(record.iter().map(|c| c.to_string()).collect()) {
            tracing::warn!(
                table = %table.name,
                line = record.position().map(|p| p.line()).unwrap_or_default(),
                cells,
                expected = table.headers().len(),
                "skipping row with misaligned cells"
            );
        }
    }
    if table.misaligned_rows() > 0 {
        tracing::warn!(
            table = %table.name,
            skipped = table.misaligned_rows(),
            "rows skipped for not matching the header"
        );
    }

    tracing::debug!(
        path = %path.display(),
        rows = table.len(),
        columns = table.headers().len(),
        "loaded table"
    );
    Ok(table)
}

/// Write rows under `headers` to a delimited file, creating parent
/// directories as needed.
pub fn write_rows<I, R>(
    path: &Path,
    delimiter: u8,
    headers: &[&str],
    rows: I,
) -> Result<usize, CoreError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator,
    R::Item: AsRef<[u8]>,
{
    let io_err = |source| CoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source| CoreError::Csv {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(csv_err)?;
    writer.write_record(headers).map_err(csv_err)?;

    let mut written = 0;
    for row in rows {
        writer.write_record(row).map_err(csv_err)?;
        written += 1;
    }
    writer.flush().map_err(io_err)?;
    Ok(written)
}

/// Write a whole table.
pub fn write_table(path: &Path, delimiter: u8, table: &Table) -> Result<usize, CoreError> {
    let headers: Vec<&str> = table.headers().iter().map(String::as_str).collect();
    write_rows(path, delimiter, &headers, table.rows())
}
