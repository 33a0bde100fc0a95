//! Base64 encoded binary records
//!
//! Every record has the same length. The hardware receive timestamp is
//! written right after the wall clock time (head guard) and again as the
//! final four bytes (tail guard). The radio may overwrite the event while it
//! is being copied; a consumer seeing different guards knows the record mixes
//! two packets and drops it.
use super::{EncodeBuffer, Frame, RecordEncoder};
use crate::capture_event::{CaptureView, DeviceIdentity};
use crate::clock::Clock;
use crate::codec::Base64Codec;
use crate::config::{ExportFormat, RecordLayout, BOM, CODEC_I8QI};

/// Sequential little endian writer over the record buffer.
struct RecordWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> RecordWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn put_u8(&mut self, value: u8) {
        self.put(&[value]);
    }

    fn put_u16(&mut self, value: u16) {
        self.put(&value.to_le_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.put(&value.to_le_bytes());
    }

    /// Hand out the next `len` bytes for direct filling.
    fn slot(&mut self, len: usize) -> &mut [u8] {
        let start = self.pos;
        self.pos += len;
        &mut self.buf[start..self.pos]
    }
}

#[derive(Debug, Clone)]
pub struct BinaryEncoder {
    layout: RecordLayout,
    codec: Base64Codec,
}

impl BinaryEncoder {
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            layout,
            codec: Base64Codec::new(layout.record_len),
        }
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    /// Fill the byte record. `record` must be `layout.record_len` long.
    fn write_record<E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        record: &mut [u8],
    ) {
        record.fill(0);
        let now = clock.wall_clock();
        let mut w = RecordWriter::new(record);

        // Header, constant per device
        w.put_u32(BOM);
        w.put_u16(ExportFormat::Base64.id());
        w.put_u32(self.layout.record_len as u32);
        w.put_u16(CODEC_I8QI);
        w.put_u8(identity.role().id());
        w.put(&identity.mac().0);

        // Body
        w.put_u32(now.secs as u32);
        w.put_u32(now.micros);
        w.put_u32(event.rx_timestamp());
        w.put(&event.source_mac().0);

        let rx = event.rx_ctrl();
        w.put_u8(rx.rssi as u8);
        w.put_u8(rx.rate);
        w.put_u8(rx.sig_mode);
        w.put_u8(rx.mcs);
        w.put_u8(rx.cwb);
        w.put_u8(rx.smoothing);
        w.put_u8(rx.not_sounding);
        w.put_u8(rx.aggregation);
        w.put_u8(rx.stbc);
        w.put_u8(rx.fec_coding);
        w.put_u8(rx.sgi);
        w.put_u8(rx.noise_floor as u8);
        w.put_u8(rx.ampdu_cnt);
        w.put_u8(rx.channel);
        w.put_u8(rx.secondary_channel);
        w.put_u32(event.rx_timestamp());
        w.put_u8(rx.ant);
        w.put_u16(rx.sig_len);
        w.put_u8(rx.rx_state);
        w.put_u8(event.first_word_invalid() as u8);

        let payload = event.payload();
        let copied = payload.len().min(self.layout.max_payload);
        w.put_u16(copied as u16);
        for (dst, &sample) in w.slot(self.layout.max_payload).iter_mut().zip(&payload[..copied]) {
            *dst = sample as u8;
        }

        // Tail guard
        w.put_u32(event.rx_timestamp());
    }
}

impl RecordEncoder for BinaryEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Base64
    }

    fn render<'b, E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        buffer: &'b mut EncodeBuffer,
    ) -> Frame<'b> {
        self.write_record(event, identity, clock, &mut buffer.record);

        buffer.text.clear();
        buffer.text.resize(self.codec.output_len(), 0);
        self.codec.encode(&buffer.record, &mut buffer.text);
        buffer.text.push(b'\n');
        Frame::Line(&buffer.text)
    }
}
