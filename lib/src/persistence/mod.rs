//! Persistence of decoded records
//!
//! Records go either to a Parquet table (one row per record, `parquet`
//! feature) or to a JSON lines file (one serialized [`DecodedRecord`] per
//! line). Torn records are skipped at write time, so a file only ever holds
//! records whose guards agree.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use log::{debug, trace};

use crate::decode::DecodedRecord;
use crate::errors::PersistenceError;

#[cfg(feature = "parquet")]
mod parquet;

/// File formats decoded records can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Apache Parquet table
    #[cfg(feature = "parquet")]
    Parquet,
    /// One JSON object per line
    JsonLines,
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "parquet")]
            "parquet" => Ok(FileType::Parquet),
            "jsonl" | "ndjson" => Ok(FileType::JsonLines),
            _ => Err(format!("Invalid file type: {}", s)),
        }
    }
}

/// Output file for decoded records
#[derive(Debug, Clone)]
pub struct CsiFile {
    pub file_path: PathBuf,
    pub file_type: FileType,
}

/// Writes decoded records in batches.
pub enum Writer {
    #[cfg(feature = "parquet")]
    Parquet(parquet::BatchWriter),
    JsonLines { out: BufWriter<File>, rows: u64 },
}

impl Writer {
    pub fn new(file: CsiFile) -> Result<Self, PersistenceError> {
        trace!("Creating record writer for {:?}", file);
        let writer = match file.file_type {
            #[cfg(feature = "parquet")]
            FileType::Parquet => Self::Parquet(parquet::BatchWriter::new(file.file_path)?),
            FileType::JsonLines => Self::JsonLines {
                out: BufWriter::new(File::create(&file.file_path)?),
                rows: 0,
            },
        };
        Ok(writer)
    }

    /// Write the intact records of `data`. Returns how many were written.
    pub fn add_batch(&mut self, data: &[DecodedRecord]) -> Result<usize, PersistenceError> {
        let intact: Vec<&DecodedRecord> = data.iter().filter(|r| r.is_intact()).collect();
        if intact.len() < data.len() {
            debug!("Skipping {} torn records", data.len() - intact.len());
        }

        match self {
            #[cfg(feature = "parquet")]
            Writer::Parquet(writer) => writer.add_batch(&intact)?,
            Writer::JsonLines { out, rows } => {
                for record in &intact {
                    serde_json::to_writer(&mut *out, record)?;
                    out.write_all(b"\n")?;
                }
                *rows += intact.len() as u64;
            }
        }
        Ok(intact.len())
    }

    /// Flush everything to disk. Returns the number of records written.
    pub fn finalize(&mut self) -> Result<u64, PersistenceError> {
        match self {
            #[cfg(feature = "parquet")]
            Writer::Parquet(writer) => writer.finalize(),
            Writer::JsonLines { out, rows } => {
                out.flush()?;
                Ok(*rows)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture_event::{MacAddress, RxControl};
    use serde_json::Value;

    fn record(head_guard: u32, tail_guard: u32) -> DecodedRecord {
        DecodedRecord {
            format: 3,
            record_len: 451,
            codec: 1,
            role: 0,
            device_mac: MacAddress([1, 2, 3, 4, 5, 6]),
            timestamp_s: 1_700_000_000,
            timestamp_us: 12,
            head_guard,
            source_mac: MacAddress([6, 5, 4, 3, 2, 1]),
            rx_ctrl: RxControl {
                timestamp: head_guard,
                ..Default::default()
            },
            first_word_invalid: false,
            csi_len: 2,
            csi_data: vec![4, -4],
            tail_guard,
        }
    }

    #[test]
    fn parses_file_types() {
        assert_eq!("JSONL".parse::<FileType>(), Ok(FileType::JsonLines));
        assert!("csv".parse::<FileType>().is_err());
        #[cfg(feature = "parquet")]
        assert_eq!("parquet".parse::<FileType>(), Ok(FileType::Parquet));
    }

    #[test]
    fn json_lines_skip_torn_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        let mut writer = Writer::new(CsiFile {
            file_path: path.clone(),
            file_type: FileType::JsonLines,
        })
        .unwrap();

        assert_eq!(writer.add_batch(&[record(1, 1), record(2, 3)]).unwrap(), 1);
        assert_eq!(writer.add_batch(&[record(4, 4)]).unwrap(), 1);
        assert_eq!(writer.finalize().unwrap(), 2);

        let text = std::fs::read_to_string(&path).unwrap();
        let guards: Vec<u64> = text
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["head_guard"].as_u64().unwrap())
            .collect();
        assert_eq!(guards, vec![1, 4]);
    }
}
