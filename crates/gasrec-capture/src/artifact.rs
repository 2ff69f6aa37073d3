//! Last-row extraction from the vendor's tabular export.
//!
//! Only three column positions of the export schema are consumed; the rest
//! of the row is vendor-internal and ignored.

use std::path::Path;

use gasrec_foundation::{CaptureError, Sample};

/// Fixed column positions in the vendor CSV. This mapping is part of the
/// vendor contract and must not change.
const COL_MAC: usize = 9;
const COL_O2: usize = 11;
const COL_DOSE: usize = 8;

/// Parse the latest sample from the export artifact: skip the header, take
/// the last record, extract MAC, O2, and dose.
///
/// Returns `ArtifactParse` when no data row exists yet or the last row's
/// fields do not parse as numbers; the caller carries the previous sample
/// forward in that case.
pub fn read_latest_sample(csv_path: &Path) -> Result<Sample, CaptureError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(csv_path)
        .map_err(|e| match e.kind() {
            csv::ErrorKind::Io(_) => {
                CaptureError::ArtifactRead(std::io::Error::other(e.to_string()))
            }
            _ => CaptureError::ArtifactParse,
        })?;

    let mut last = None;
    for record in reader.records() {
        // A torn trailing line (export mid-append) is not an error; keep the
        // last record that read cleanly.
        match record {
            Ok(r) => last = Some(r),
            Err(e) => tracing::debug!("Skipping unreadable export row: {}", e),
        }
    }

    let record = last.ok_or(CaptureError::ArtifactParse)?;
    Ok(Sample {
        mac: field_as_f64(&record, COL_MAC)?,
        o2: field_as_f64(&record, COL_O2)?,
        dose: field_as_f64(&record, COL_DOSE)?,
    })
}

fn field_as_f64(record: &csv::StringRecord, idx: usize) -> Result<f64, CaptureError> {
    record
        .get(idx)
        .and_then(|f| f.trim().parse::<f64>().ok())
        .ok_or(CaptureError::ArtifactParse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_export(rows: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "c0,c1,c2,c3,c4,c5,c6,c7,Dose,MAC,c10,O2,c12").unwrap();
        for row in rows {
            writeln!(f, "{}", row).unwrap();
        }
        f
    }

    #[test]
    fn extracts_fixed_columns_from_last_row() {
        let f = write_export(&[
            "0,0,0,0,0,0,0,0,0.5,0.2,0,30.0,0",
            "0,0,0,0,0,0,0,0,1.2,0.8,0,33.0,0",
        ]);
        let s = read_latest_sample(f.path()).unwrap();
        assert_eq!(s, Sample { mac: 0.8, o2: 33.0, dose: 1.2 });
    }

    #[test]
    fn header_only_export_fails_parse() {
        let f = write_export(&[]);
        assert!(matches!(
            read_latest_sample(f.path()),
            Err(CaptureError::ArtifactParse)
        ));
    }

    #[test]
    fn non_numeric_field_fails_parse() {
        let f = write_export(&["0,0,0,0,0,0,0,0,--,0.8,0,33.0,0"]);
        assert!(matches!(
            read_latest_sample(f.path()),
            Err(CaptureError::ArtifactParse)
        ));
    }

    #[test]
    fn short_row_fails_parse() {
        let f = write_export(&["0,0,0"]);
        assert!(matches!(
            read_latest_sample(f.path()),
            Err(CaptureError::ArtifactParse)
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            read_latest_sample(Path::new("/nonexistent/AS3DataExport.csv")),
            Err(CaptureError::ArtifactRead(_))
        ));
    }
}
