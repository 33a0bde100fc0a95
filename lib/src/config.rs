//! Export configuration and the record layout derived from it.
use std::str::FromStr;

use crate::codec::encoded_len;
use crate::errors::ConfigError;

/// Marker at the start of every binary record.
pub const BOM: u32 = 65534;

/// Payload encoding id: signed 8 bit QI pairs.
pub const CODEC_I8QI: u16 = 1;

/// Payload slot without STBC HT-LTF capture.
pub const STANDARD_MAX_PAYLOAD: usize = 384;

/// Payload slot with STBC HT-LTF capture.
pub const EXTENDED_MAX_PAYLOAD: usize = 612;

/// Bytes of a binary record that are not payload.
pub const RECORD_OVERHEAD: usize = 67;

/// Byte offset of the payload inside a binary record.
pub const PAYLOAD_OFFSET: usize = 63;

/// Wire formats a record can be exported in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Nothing is emitted; measures pipeline overhead
    Nop,
    /// Human readable comma separated line
    Csv,
    /// JSON array with a base64 payload
    Json,
    /// Base64 encoded fixed layout binary record
    Base64,
}

impl ExportFormat {
    /// Format id written into records.
    pub fn id(self) -> u16 {
        match self {
            ExportFormat::Nop => 0,
            ExportFormat::Csv => 1,
            ExportFormat::Json => 2,
            ExportFormat::Base64 => 3,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nop" => Ok(ExportFormat::Nop),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "base64" | "binary" => Ok(ExportFormat::Base64),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

/// Buffer sizes for one export format.
///
/// `record_len` is the byte record handed to the base64 codec and
/// `text_len` the length of its encoding (without the trailing newline).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    pub max_payload: usize,
    pub record_len: usize,
    pub text_len: usize,
}

impl RecordLayout {
    pub const fn new(format: ExportFormat, max_payload: usize) -> Self {
        let record_len = match format {
            ExportFormat::Base64 => RECORD_OVERHEAD + max_payload,
            ExportFormat::Json => max_payload,
            ExportFormat::Csv | ExportFormat::Nop => 0,
        };
        Self {
            max_payload,
            record_len,
            text_len: encoded_len(record_len),
        }
    }

    /// Byte offset of the tail guard in a binary record.
    pub fn tail_guard_offset(&self) -> usize {
        PAYLOAD_OFFSET + self.max_payload
    }
}

/// Configuration of the export pipeline
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Active wire format
    pub format: ExportFormat,
    /// Size of the fixed payload slot
    pub max_payload: usize,
    /// Log per record timing statistics
    pub summary_stats: bool,
    /// Number of records between two summary lines
    pub stats_report_interval: u32,
}

impl ExportConfig {
    /// Configuration for a format with the payload slot selected by the
    /// extended (STBC HT-LTF) mode flag.
    pub fn new(format: ExportFormat, extended: bool) -> Self {
        Self {
            format,
            max_payload: if extended {
                EXTENDED_MAX_PAYLOAD
            } else {
                STANDARD_MAX_PAYLOAD
            },
            summary_stats: false,
            stats_report_interval: 128,
        }
    }

    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.format, self.max_payload)
    }

    /// Check the invariants the encoders rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_payload == 0 {
            return Err(ConfigError::EmptyPayloadSlot);
        }
        // The payload length travels as a u16
        if self.max_payload > u16::MAX as usize {
            return Err(ConfigError::PayloadSlotTooLarge {
                given: self.max_payload,
                allowed: u16::MAX as usize,
            });
        }
        Ok(())
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self::new(ExportFormat::Base64, false)
    }
}
