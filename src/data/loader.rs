use crate::data::{RawTable, SchemaError};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Tsv,
    GzippedCsv,
    GzippedTsv,
}

impl FileFormat {
    /// Detect file format from path.
    ///
    /// Files without an extension (the Xena hub downloads) are tab-delimited.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (None, _) => Ok(FileFormat::Tsv),
            (Some("gz"), Some(stem)) => {
                if stem.ends_with(".csv") {
                    Ok(FileFormat::GzippedCsv)
                } else {
                    Ok(FileFormat::GzippedTsv)
                }
            }
            (Some("csv"), _) => Ok(FileFormat::Csv),
            (Some("tsv"), _) | (Some("txt"), _) => Ok(FileFormat::Tsv),
            (Some(other), _) => Err(anyhow::anyhow!(
                "Unsupported file format '.{}' for {:?}",
                other,
                path
            )),
        }
    }

    /// Get delimiter character
    pub fn delimiter(&self) -> u8 {
        match self {
            FileFormat::Csv | FileFormat::GzippedCsv => b',',
            FileFormat::Tsv | FileFormat::GzippedTsv => b'\t',
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedCsv | FileFormat::GzippedTsv)
    }
}

/// Receiver for rows streamed out of a delimited file
pub trait RowSink {
    /// Called once with the header row before any data row
    fn headers(&mut self, table: &str, headers: &[String]) -> Result<()>;

    /// Called for every data row, in file order
    fn row(&mut self, record: &StringRecord) -> Result<()>;
}

/// Sink that keeps every cell as text
#[derive(Debug, Default)]
struct RawTableSink {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RowSink for RawTableSink {
    fn headers(&mut self, table: &str, headers: &[String]) -> Result<()> {
        self.name = table.to_string();
        self.headers = headers.to_vec();
        Ok(())
    }

    fn row(&mut self, record: &StringRecord) -> Result<()> {
        self.rows.push(record.iter().map(|s| s.to_string()).collect());
        Ok(())
    }
}

impl From<RawTableSink> for RawTable {
    fn from(sink: RawTableSink) -> Self {
        RawTable {
            name: sink.name,
            headers: sink.headers,
            rows: sink.rows,
        }
    }
}

/// Loader for delimited tables with a header row
#[derive(Debug, Default)]
pub struct TableLoader;

impl TableLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a whole table into memory
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<RawTable> {
        let mut sink = RawTableSink::default();
        self.read_into(path, &mut sink)?;
        Ok(sink.into())
    }

    /// Stream a table from file into `sink`, returning the number of data rows
    pub fn read_into<P: AsRef<Path>, S: RowSink>(&self, path: P, sink: &mut S) -> Result<usize> {
        let path = path.as_ref();
        info!("Loading table from {:?}", path);

        let format = FileFormat::from_path(path)?;
        debug!("Detected file format: {:?}", format);

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("table")
            .to_string();

        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let parsed = if format.is_gzipped() {
            self.parse_into(BufReader::new(GzDecoder::new(file)), format, &name, sink)
        } else {
            self.parse_into(BufReader::new(file), format, &name, sink)
        };
        let rows = parsed.with_context(|| format!("Failed to parse {:?}", path))?;

        info!("Loaded {} rows from {}", rows, name);
        Ok(rows)
    }

    /// Parse a table from any reader into memory
    pub fn parse<R: Read>(&self, reader: R, format: FileFormat, name: &str) -> Result<RawTable> {
        let mut sink = RawTableSink::default();
        self.parse_into(reader, format, name, &mut sink)?;
        Ok(sink.into())
    }

    /// Parse a table from any reader into `sink`
    pub fn parse_into<R: Read, S: RowSink>(
        &self,
        reader: R,
        format: FileFormat,
        name: &str,
        sink: &mut S,
    ) -> Result<usize> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .context("Failed to read header row")?
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>();

        debug!("{} headers: {} columns", name, headers.len());
        sink.headers(name, &headers)?;

        let mut record = StringRecord::new();
        let mut rows = 0;
        loop {
            let more = csv_reader
                .read_record(&mut record)
                .with_context(|| format!("Malformed record at line {}", rows + 2))?;
            if !more {
                break;
            }
            sink.row(&record)?;
            rows += 1;

            if rows % 10000 == 0 {
                debug!("Read {} rows...", rows);
            }
        }

        if rows == 0 {
            return Err(SchemaError::EmptyTable {
                table: name.to_string(),
            }
            .into());
        }

        Ok(rows)
    }
}
