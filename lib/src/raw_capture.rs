//! Raw capture dumps
//!
//! Capture events as the radio hands them over, stored back to back:
//!
//! | bytes | content |
//! |-------|---------|
//! | 28 | packed receive control header |
//! | 6  | sender address |
//! | 1  | first word invalid flag |
//! | 1  | reserved |
//! | 2  | payload length (little endian) |
//! | n  | payload (signed 8 bit samples) |
//!
//! [`RawCaptureReader`] replays such a stream into the export pipeline, and
//! [`write_raw_capture`] records one.
use std::io::{ErrorKind, Read, Write};

use crate::capture_event::{CaptureEvent, CaptureView, MacAddress, RxControl};
use crate::errors::CaptureError;
use crate::hw_rx_ctrl::HW_RX_CTRL_LEN;

/// Length of the fixed part of a dump.
pub const DUMP_HEADER_LEN: usize = HW_RX_CTRL_LEN + 10;

/// Reads capture dumps from a byte stream.
///
/// Each event borrows the reader's internal buffer and is only valid until the
/// next call to [`RawCaptureReader::next_event`].
pub struct RawCaptureReader<R: Read> {
    reader: R,
    max_payload: usize,
    header: [u8; DUMP_HEADER_LEN],
    raw_payload: Vec<u8>,
    payload: Vec<i8>,
    events: u64,
}

impl<R: Read> RawCaptureReader<R> {
    pub fn new(reader: R, max_payload: usize) -> Self {
        Self {
            reader,
            max_payload,
            header: [0; DUMP_HEADER_LEN],
            raw_payload: Vec::with_capacity(max_payload),
            payload: Vec::with_capacity(max_payload),
            events: 0,
        }
    }

    /// Number of events read so far.
    pub fn events_read(&self) -> u64 {
        self.events
    }

    /// Read the next event. `Ok(None)` on a clean end of stream.
    pub fn next_event(&mut self) -> Result<Option<CaptureEvent<'_>>, CaptureError> {
        if !self.fill_header()? {
            return Ok(None);
        }

        let header = &self.header;
        let rx_ctrl = RxControl::from_hw_header(&header[..HW_RX_CTRL_LEN]);
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&header[HW_RX_CTRL_LEN..HW_RX_CTRL_LEN + 6]);
        let first_word_invalid = header[HW_RX_CTRL_LEN + 6] != 0;
        let len = u16::from_le_bytes([header[HW_RX_CTRL_LEN + 8], header[HW_RX_CTRL_LEN + 9]]) as usize;

        if len > self.max_payload {
            return Err(CaptureError::PayloadTooLong {
                len,
                max: self.max_payload,
            });
        }

        self.raw_payload.resize(len, 0);
        self.reader
            .read_exact(&mut self.raw_payload)
            .map_err(truncated)?;
        self.payload.clear();
        self.payload.extend(self.raw_payload.iter().map(|&b| b as i8));
        self.events += 1;

        Ok(Some(CaptureEvent {
            source_mac: MacAddress(mac),
            rx_ctrl,
            first_word_invalid,
            payload: &self.payload,
        }))
    }

    /// Fill the fixed header. Returns false on end of stream before its first byte.
    fn fill_header(&mut self) -> Result<bool, CaptureError> {
        let mut filled = 0;
        while filled < DUMP_HEADER_LEN {
            match self.reader.read(&mut self.header[filled..]) {
                Ok(0) if filled == 0 => return Ok(false),
                Ok(0) => return Err(truncated(ErrorKind::UnexpectedEof.into())),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(true)
    }
}

fn truncated(e: std::io::Error) -> CaptureError {
    if e.kind() == ErrorKind::UnexpectedEof {
        CaptureError::Truncated(e)
    } else {
        CaptureError::Io(e)
    }
}

/// Append one event to a dump stream.
pub fn write_raw_capture<W: Write, E: CaptureView + ?Sized>(
    out: &mut W,
    event: &E,
) -> Result<(), CaptureError> {
    let payload = event.payload();
    let len = u16::try_from(payload.len()).map_err(|_| CaptureError::PayloadTooLong {
        len: payload.len(),
        max: u16::MAX as usize,
    })?;

    let mut header = [0u8; DUMP_HEADER_LEN];
    header[..HW_RX_CTRL_LEN].copy_from_slice(&event.rx_ctrl().to_hw_header());
    header[HW_RX_CTRL_LEN..HW_RX_CTRL_LEN + 6].copy_from_slice(&event.source_mac().0);
    header[HW_RX_CTRL_LEN + 6] = event.first_word_invalid() as u8;
    header[HW_RX_CTRL_LEN + 8..].copy_from_slice(&len.to_le_bytes());
    out.write_all(&header)?;

    let bytes: Vec<u8> = payload.iter().map(|&s| s as u8).collect();
    out.write_all(&bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::test_support::event;
    use std::io::Cursor;

    fn dump(events: &[CaptureEvent<'_>]) -> Vec<u8> {
        let mut out = Vec::new();
        for event in events {
            write_raw_capture(&mut out, event).unwrap();
        }
        out
    }

    #[test]
    fn replays_recorded_events() {
        let first = event(&[1, -2, 3], 100);
        let mut second = event(&[-128, 127], 200);
        second.first_word_invalid = true;
        let bytes = dump(&[first, second]);
        assert_eq!(bytes.len(), 2 * DUMP_HEADER_LEN + 5);

        let mut reader = RawCaptureReader::new(Cursor::new(bytes), 384);
        {
            let replay = reader.next_event().unwrap().unwrap();
            assert_eq!(replay.payload, &[1, -2, 3]);
            assert_eq!(replay.rx_ctrl, first.rx_ctrl);
            assert_eq!(replay.source_mac, first.source_mac);
            assert!(!replay.first_word_invalid);
        }
        {
            let replay = reader.next_event().unwrap().unwrap();
            assert_eq!(replay.payload, &[-128, 127]);
            assert_eq!(replay.rx_timestamp(), 200);
            assert!(replay.first_word_invalid);
        }
        assert!(reader.next_event().unwrap().is_none());
        assert_eq!(reader.events_read(), 2);
    }

    #[test]
    fn rejects_payload_over_slot() {
        let bytes = dump(&[event(&[0; 10], 1)]);
        let mut reader = RawCaptureReader::new(Cursor::new(bytes), 8);
        assert!(matches!(
            reader.next_event(),
            Err(CaptureError::PayloadTooLong { len: 10, max: 8 })
        ));
    }

    #[test]
    fn truncated_dump_is_an_error() {
        let mut bytes = dump(&[event(&[1, 2, 3, 4], 1)]);
        bytes.pop();
        let mut reader = RawCaptureReader::new(Cursor::new(bytes.clone()), 384);
        assert!(matches!(reader.next_event(), Err(CaptureError::Truncated(_))));

        let mut reader = RawCaptureReader::new(Cursor::new(&bytes[..20]), 384);
        assert!(matches!(reader.next_event(), Err(CaptureError::Truncated(_))));
    }
}
