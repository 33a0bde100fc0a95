//! Human readable CSV lines
use std::io::Write;

use log::warn;

use super::{EncodeBuffer, Frame, RecordEncoder};
use crate::capture_event::{CaptureView, DeviceIdentity};
use crate::clock::Clock;
use crate::config::{ExportFormat, RecordLayout};

/// First column of every CSV line.
pub const CSV_TAG: &str = "CSI_DATA";

#[derive(Debug, Clone, Copy)]
pub struct CsvEncoder {
    layout: RecordLayout,
}

impl CsvEncoder {
    pub fn new(layout: RecordLayout) -> Self {
        Self { layout }
    }

    fn write_line<E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        out: &mut Vec<u8>,
    ) -> std::io::Result<()> {
        let rx = event.rx_ctrl();
        // Both timestamp columns carry the same sample.
        let now = clock.wall_clock().secs;
        write!(
            out,
            "{},{},{},{},",
            CSV_TAG,
            identity.role().id(),
            event.source_mac(),
            now
        )?;
        write!(
            out,
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
        write!(
            out,
            "{},{},{},{},{},{},",
            event.rx_timestamp(),
            rx.ant,
            rx.sig_len,
            rx.rx_state,
            clock.is_time_set() as u8,
            now
        )?;

        let payload = event.payload();
        let payload = &payload[..payload.len().min(self.layout.max_payload)];
        write!(out, "{},[", payload.len())?;
        for (i, sample) in payload.iter().enumerate() {
            if i > 0 {
                out.push(b' ');
            }
            write!(out, "{sample}")?;
        }
        out.extend_from_slice(b"]\n");
        Ok(())
    }
}

impl RecordEncoder for CsvEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn render<'b, E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        buffer: &'b mut EncodeBuffer,
    ) -> Frame<'b> {
        buffer.text.clear();
        if let Err(e) = self.write_line(event, identity, clock, &mut buffer.text) {
            warn!("Failed to render CSV line: {e}");
            return Frame::Empty;
        }
        Frame::Line(&buffer.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, WallTime};
    use crate::config::ExportConfig;
    use crate::encoder::test_support::{event, identity};

    fn render_with(layout: RecordLayout, payload: &[i8], clock: &ManualClock) -> String {
        let mut buffer = EncodeBuffer::new(&layout);
        let frame = CsvEncoder::new(layout).render(&event(payload, 4242), &identity(), clock, &mut buffer);
        frame.as_text().unwrap().to_string()
    }

    fn render_line(payload: &[i8], clock: &ManualClock) -> String {
        render_with(ExportConfig::new(ExportFormat::Csv, false).layout(), payload, clock)
    }

    #[test]
    fn renders_all_columns() {
        let clock = ManualClock::new(WallTime::new(1_700_000_000, 999));
        clock.advance_monotonic(17);
        let line = render_line(&[1, -2, 3], &clock);

        assert_eq!(
            line,
            "CSI_DATA,1,AA:BB:CC:DD:EE:01,1700000000,\
             -52,11,1,7,0,1,1,0,0,0,1,-93,0,6,0,\
             4242,0,86,0,0,1700000000,3,[1 -2 3]\n"
        );
    }

    #[test]
    fn timestamp_columns_share_one_source() {
        let clock = ManualClock::new(WallTime::new(50, 0));
        clock.advance_monotonic(9_000);
        clock.set_wall_clock(WallTime::new(1_234_567, 890));
        let line = render_line(&[], &clock);

        let columns: Vec<&str> = line.split(',').collect();
        assert_eq!(columns[3], "1234567");
        assert_eq!(columns[24], "1234567");
    }

    #[test]
    fn oversized_payload_is_cut_to_max() {
        let clock = ManualClock::new(WallTime::new(1, 0));
        let layout = RecordLayout::new(ExportFormat::Csv, 4);
        let line = render_with(layout, &[1, 2, 3, 4, 5, 6], &clock);

        assert!(line.ends_with(",1,4,[1 2 3 4]\n"), "{line}");
    }

    #[test]
    fn time_set_flag_follows_clock() {
        let clock = ManualClock::new(WallTime::default());
        let before = render_line(&[], &clock);
        clock.set_wall_clock(WallTime::new(12, 0));
        let after = render_line(&[], &clock);

        let column = |line: &str| line.split(',').nth(23).map(str::to_string);
        assert_eq!(column(&before).as_deref(), Some("0"));
        assert_eq!(column(&after).as_deref(), Some("1"));
        assert!(after.starts_with("CSI_DATA,1,AA:BB:CC:DD:EE:01,12,"));
        assert!(after.ends_with(",0,[]\n"));
    }
}
