//! Record decoding
//!
//! Turns exported lines back into [`DecodedRecord`]s. Binary records arrive
//! as base64 text starting with `/v` (the encoded marker), JSON hybrid
//! records as `[...]` arrays. Everything else on the stream (log output,
//! CSV lines) is skipped.
use std::io::BufRead;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, warn};
use serde::Serialize;
use serde_json::Value;

use crate::capture_event::{MacAddress, RxControl};
use crate::config::{BOM, PAYLOAD_OFFSET, RECORD_OVERHEAD};
use crate::errors::DecodeError;

/// Prefix of every base64 encoded binary record.
pub const BASE64_RECORD_PREFIX: &str = "/v";

/// Number of positions in a JSON hybrid record.
const JSON_FIELDS: usize = 43;

/// One exported record with all of its fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRecord {
    pub format: u16,
    pub record_len: u32,
    pub codec: u16,
    pub role: u8,
    pub device_mac: MacAddress,
    pub timestamp_s: u32,
    pub timestamp_us: u32,
    pub head_guard: u32,
    pub source_mac: MacAddress,
    #[serde(flatten)]
    pub rx_ctrl: RxControl,
    pub first_word_invalid: bool,
    pub csi_len: u16,
    pub csi_data: Vec<i8>,
    pub tail_guard: u32,
}

impl DecodedRecord {
    /// Whether both guards agree, i.e. the record was not torn while copied.
    pub fn is_intact(&self) -> bool {
        self.head_guard == self.tail_guard
    }
}

/// Little endian field reader over a decoded binary record.
struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize) -> &'a [u8] {
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        bytes
    }

    fn u8(&mut self) -> u8 {
        self.take(1)[0]
    }

    fn u16(&mut self) -> u16 {
        let b = self.take(2);
        u16::from_le_bytes([b[0], b[1]])
    }

    fn u32(&mut self) -> u32 {
        let b = self.take(4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn mac(&mut self) -> MacAddress {
        let mut mac = [0u8; 6];
        mac.copy_from_slice(self.take(6));
        MacAddress(mac)
    }
}

/// Decode one base64 binary record (without trailing newline).
pub fn decode_base64_record(text: &[u8]) -> Result<DecodedRecord, DecodeError> {
    let bytes = STANDARD.decode(text)?;
    if bytes.len() < RECORD_OVERHEAD {
        return Err(DecodeError::TooShort {
            required: RECORD_OVERHEAD,
            available: bytes.len(),
        });
    }

    let mut r = FieldReader::new(&bytes);
    let marker = r.u32();
    if marker != BOM {
        return Err(DecodeError::BadMarker(marker));
    }

    let format = r.u16();
    let record_len = r.u32();
    let codec = r.u16();
    let role = r.u8();
    let device_mac = r.mac();
    let timestamp_s = r.u32();
    let timestamp_us = r.u32();
    let head_guard = r.u32();
    let source_mac = r.mac();

    let rx_ctrl = RxControl {
        rssi: r.u8() as i8,
        rate: r.u8(),
        sig_mode: r.u8(),
        mcs: r.u8(),
        cwb: r.u8(),
        smoothing: r.u8(),
        not_sounding: r.u8(),
        aggregation: r.u8(),
        stbc: r.u8(),
        fec_coding: r.u8(),
        sgi: r.u8(),
        noise_floor: r.u8() as i8,
        ampdu_cnt: r.u8(),
        channel: r.u8(),
        secondary_channel: r.u8(),
        timestamp: r.u32(),
        ant: r.u8(),
        sig_len: r.u16(),
        rx_state: r.u8(),
    };
    let first_word_invalid = r.u8() != 0;
    let declared_len = r.u16();

    let slot = &bytes[PAYLOAD_OFFSET..bytes.len() - 4];
    let csi_len = (declared_len as usize).min(slot.len());
    let tail = &bytes[bytes.len() - 4..];

    Ok(DecodedRecord {
        format,
        record_len,
        codec,
        role,
        device_mac,
        timestamp_s,
        timestamp_us,
        head_guard,
        source_mac,
        rx_ctrl,
        first_word_invalid,
        csi_len: csi_len as u16,
        csi_data: slot[..csi_len].iter().map(|&b| b as i8).collect(),
        tail_guard: u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]),
    })
}

/// Positional access to a JSON hybrid record.
struct JsonFields<'a>(&'a [Value]);

impl JsonFields<'_> {
    fn int(&self, index: usize) -> Result<i64, DecodeError> {
        self.0
            .get(index)
            .and_then(Value::as_i64)
            .ok_or(DecodeError::JsonField {
                index,
                expected: "integer",
            })
    }

    fn u32(&self, index: usize) -> Result<u32, DecodeError> {
        Ok(self.int(index)? as u32)
    }

    fn u16(&self, index: usize) -> Result<u16, DecodeError> {
        Ok(self.int(index)? as u16)
    }

    fn u8(&self, index: usize) -> Result<u8, DecodeError> {
        Ok(self.int(index)? as u8)
    }

    fn i8(&self, index: usize) -> Result<i8, DecodeError> {
        Ok(self.int(index)? as i8)
    }

    fn mac(&self, start: usize) -> Result<MacAddress, DecodeError> {
        let mut mac = [0u8; 6];
        for (i, byte) in mac.iter_mut().enumerate() {
            *byte = self.u8(start + i)?;
        }
        Ok(MacAddress(mac))
    }

    fn str(&self, index: usize) -> Result<&str, DecodeError> {
        self.0
            .get(index)
            .and_then(Value::as_str)
            .ok_or(DecodeError::JsonField {
                index,
                expected: "string",
            })
    }
}

/// Decode one JSON hybrid record.
pub fn decode_json_record(text: &str) -> Result<DecodedRecord, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let items = value.as_array().ok_or(DecodeError::JsonField {
        index: 0,
        expected: "array",
    })?;
    let f = JsonFields(items);

    let marker = f.u32(0)?;
    if marker != BOM {
        return Err(DecodeError::BadMarker(marker));
    }
    if items.len() != JSON_FIELDS {
        return Err(DecodeError::JsonField {
            index: items.len().min(JSON_FIELDS),
            expected: "integer",
        });
    }

    let rx_ctrl = RxControl {
        rssi: f.i8(20)?,
        rate: f.u8(21)?,
        sig_mode: f.u8(22)?,
        mcs: f.u8(23)?,
        cwb: f.u8(24)?,
        smoothing: f.u8(25)?,
        not_sounding: f.u8(26)?,
        aggregation: f.u8(27)?,
        stbc: f.u8(28)?,
        fec_coding: f.u8(29)?,
        sgi: f.u8(30)?,
        noise_floor: f.i8(31)?,
        ampdu_cnt: f.u8(32)?,
        channel: f.u8(33)?,
        secondary_channel: f.u8(34)?,
        timestamp: f.u32(35)?,
        ant: f.u8(36)?,
        sig_len: f.u16(37)?,
        rx_state: f.u8(38)?,
    };

    let slot = STANDARD.decode(f.str(41)?)?;
    let csi_len = (f.u16(40)? as usize).min(slot.len());

    Ok(DecodedRecord {
        format: f.u16(1)?,
        record_len: f.u32(2)?,
        codec: f.u16(3)?,
        role: f.u8(4)?,
        device_mac: f.mac(5)?,
        timestamp_s: f.u32(11)?,
        timestamp_us: f.u32(12)?,
        head_guard: f.u32(13)?,
        source_mac: f.mac(14)?,
        rx_ctrl,
        first_word_invalid: f.int(39)? != 0,
        csi_len: csi_len as u16,
        csi_data: slot[..csi_len].iter().map(|&b| b as i8).collect(),
        tail_guard: f.u32(42)?,
    })
}

/// Decode one line of a capture log.
///
/// Returns `Ok(None)` for lines that are not records.
pub fn decode_line(line: &str) -> Result<Option<DecodedRecord>, DecodeError> {
    let line = line.trim();
    if line.starts_with('[') {
        decode_json_record(line).map(Some)
    } else if line.starts_with(BASE64_RECORD_PREFIX) {
        decode_base64_record(line.as_bytes()).map(Some)
    } else {
        Ok(None)
    }
}

/// Counters of a [`decode_reader`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub lines: u64,
    pub records: u64,
    pub torn: u64,
    pub malformed: u64,
}

/// Decode every intact record of a capture log.
///
/// Torn and malformed records are logged and skipped; only IO errors abort.
pub fn decode_reader<R: BufRead>(
    reader: R,
) -> Result<(Vec<DecodedRecord>, DecodeStats), DecodeError> {
    let mut records = Vec::new();
    let mut stats = DecodeStats::default();

    for line in reader.lines() {
        let line = line?;
        stats.lines += 1;
        match decode_line(&line) {
            Ok(Some(record)) if record.is_intact() => {
                stats.records += 1;
                records.push(record);
            }
            Ok(Some(record)) => {
                stats.torn += 1;
                debug!(
                    "Dropping torn record on line {} (guards {} != {})",
                    stats.lines, record.head_guard, record.tail_guard
                );
            }
            Ok(None) => {}
            Err(e) => {
                stats.malformed += 1;
                warn!("Skipping malformed record on line {}: {}", stats.lines, e);
            }
        }
    }

    Ok((records, stats))
}
