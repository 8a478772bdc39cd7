use crate::data::SampleRecord;
use crate::utils::ensure_dir;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Render a value the way pandas writes floats: integral values keep a trailing `.0`
pub fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else if value == f64::INFINITY {
        "inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{}", value)
    }
}

/// Write records as comma-separated rows: target first, then features.
/// No header row and no index column.
pub fn write_records<W: Write>(writer: W, records: &[SampleRecord]) -> Result<()> {
    let mut csv_writer = WriterBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .from_writer(writer);

    let mut row = Vec::new();
    for record in records {
        row.clear();
        row.push(record.target.to_string());
        row.extend(record.features.iter().map(|&v| format_value(v)));
        csv_writer
            .write_record(&row)
            .with_context(|| format!("Failed to write row for sample {}", record.sample))?;
    }

    csv_writer.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Write one partition to `path`, creating parent directories
pub fn write_partition<P: AsRef<Path>>(path: P, records: &[SampleRecord]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }

    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    write_records(file, records)?;

    info!("Wrote {} rows to {:?}", records.len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(sample: &str, target: u8, features: Vec<f64>) -> SampleRecord {
        SampleRecord {
            sample: sample.to_string(),
            target,
            features,
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(1.0), "1.0");
        assert_eq!(format_value(-3.0), "-3.0");
        assert_eq!(format_value(0.25), "0.25");
        assert_eq!(format_value(12.3456), "12.3456");
        assert_eq!(format_value(f64::INFINITY), "inf");
    }

    #[test]
    fn test_write_records_without_header() {
        let records = vec![
            record("S1", 1, vec![2.0, 5.5]),
            record("S2", 0, vec![3.25, 6.0]),
        ];
        let mut buf = Vec::new();
        write_records(&mut buf, &records).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "1,2.0,5.5\n0,3.25,6.0\n");
    }

    #[test]
    fn test_write_partition_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output").join("val").join("val.csv");

        write_partition(&path, &[record("S1", 0, vec![1.5])]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "0,1.5\n");
    }
}
