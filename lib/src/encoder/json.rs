//! JSON hybrid lines
//!
//! A positional JSON array holding the same fields, in the same order, as the
//! binary record. Metadata is written as decimals; the payload slot is base64
//! encoded and quoted.
use std::io::Write;

use log::warn;

use super::{EncodeBuffer, Frame, RecordEncoder};
use crate::capture_event::{CaptureView, DeviceIdentity};
use crate::clock::Clock;
use crate::codec::Base64Codec;
use crate::config::{ExportFormat, RecordLayout, BOM, CODEC_I8QI};

#[derive(Debug, Clone)]
pub struct JsonEncoder {
    layout: RecordLayout,
    codec: Base64Codec,
}

impl JsonEncoder {
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            layout,
            codec: Base64Codec::new(layout.max_payload),
        }
    }

    fn write_mac(out: &mut Vec<u8>, mac: &[u8; 6]) -> std::io::Result<()> {
        for byte in mac {
            write!(out, "{byte},")?;
        }
        Ok(())
    }

    fn write_line<E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        buffer: &mut EncodeBuffer,
    ) -> std::io::Result<()> {
        let EncodeBuffer { record, text } = buffer;
        let now = clock.wall_clock();

        write!(
            text,
            "[{},{},{},{},{},",
            BOM,
            ExportFormat::Json.id(),
            self.layout.max_payload,
            CODEC_I8QI,
            identity.role().id()
        )?;
        Self::write_mac(text, &identity.mac().0)?;
        write!(
            text,
            "{},{},{},",
            now.secs as u32,
            now.micros,
            event.rx_timestamp()
        )?;
        Self::write_mac(text, &event.source_mac().0)?;

        let rx = event.rx_ctrl();
        write!(
            text,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},",
            rx.rssi,
            rx.rate,
            rx.sig_mode,
            rx.mcs,
            rx.cwb,
            rx.smoothing,
            rx.not_sounding,
            rx.aggregation,
            rx.stbc,
            rx.fec_coding,
            rx.sgi,
            rx.noise_floor,
            rx.ampdu_cnt,
            rx.channel,
            rx.secondary_channel
        )?;

        let payload = event.payload();
        let copied = payload.len().min(self.layout.max_payload);
        write!(
            text,
            "{},{},{},{},{},{},\"",
            event.rx_timestamp(),
            rx.ant,
            rx.sig_len,
            rx.rx_state,
            event.first_word_invalid() as u8,
            copied
        )?;

        record.fill(0);
        for (dst, &sample) in record.iter_mut().zip(&payload[..copied]) {
            *dst = sample as u8;
        }
        let start = text.len();
        text.resize(start + self.codec.output_len(), 0);
        self.codec.encode(record, &mut text[start..]);

        write!(text, "\",{}]\n", event.rx_timestamp())?;
        Ok(())
    }
}

impl RecordEncoder for JsonEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn render<'b, E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        buffer: &'b mut EncodeBuffer,
    ) -> Frame<'b> {
        buffer.text.clear();
        if let Err(e) = self.write_line(event, identity, clock, buffer) {
            warn!("Failed to render JSON line: {e}");
            return Frame::Empty;
        }
        Frame::Line(&buffer.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, WallTime};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use crate::encoder::test_support::{event, identity};
    use serde_json::Value;

    fn render(max_payload: usize, payload: &[i8]) -> Vec<Value> {
        let layout = RecordLayout::new(ExportFormat::Json, max_payload);
        let encoder = JsonEncoder::new(layout);
        let mut buffer = EncodeBuffer::new(&layout);
        let clock = ManualClock::new(WallTime::new(1_700_000_000, 42));

        let frame = encoder.render(&event(payload, 31337), &identity(), &clock, &mut buffer);
        let line = frame.as_text().unwrap();
        assert!(line.ends_with("]\n"));
        match serde_json::from_str::<Value>(line).unwrap() {
            Value::Array(items) => items,
            other => panic!("expected array, got {other}"),
        }
    }

    #[test]
    fn line_is_valid_positional_json() {
        let items = render(8, &[1, -1, 5]);
        // 5 header + 6 mac + 3 time/guard + 6 mac + 15 metadata + 6 + slot + tail
        assert_eq!(items.len(), 43);
        assert_eq!(items[0], 65534);
        assert_eq!(items[1], 2);
        assert_eq!(items[2], 8);
        assert_eq!(items[3], 1);
        assert_eq!(items[4], 1);
        assert_eq!(items[5], 0x24);
        assert_eq!(items[11], 1_700_000_000u32);
        assert_eq!(items[12], 42);
        assert_eq!(items[13], 31337);
        assert_eq!(items[14], 0xaa);
        assert_eq!(items[20], -52);
        assert_eq!(items[31], -93);
        assert_eq!(items[35], 31337);
        assert_eq!(items[39], 0);
        assert_eq!(items[40], 3);
        assert_eq!(items[42], 31337);
    }

    #[test]
    fn payload_slot_is_zero_padded_base64() {
        let items = render(6, &[1, -1, 5]);
        let slot = items[41].as_str().unwrap();
        assert_eq!(slot.len(), 8);
        assert_eq!(
            STANDARD.decode(slot).unwrap(),
            vec![1, 0xff, 5, 0, 0, 0]
        );
    }

    #[test]
    fn guards_match_for_unmutated_event() {
        let items = render(4, &[]);
        assert_eq!(items[13], items[42]);
        assert_eq!(items[40], 0);
        assert_eq!(items[41], "AAAAAA==");
    }
}
