//! Packed receive control header
//!
//! The radio reports per packet metadata as a packed bitfield struct of seven
//! little endian 32 bit words (ESP32 `wifi_pkt_rx_ctrl_t`). This module
//! defines the bit layout and converts between the packed bytes and
//! [`RxControl`].
use bilge::prelude::*;

use crate::capture_event::RxControl;

/// Length of the packed header in bytes.
pub const HW_RX_CTRL_LEN: usize = 28;

/// Words 0 to 2 of the packed header
#[bitsize(96)]
#[derive(FromBits, DebugBits)]
pub struct RxCtrlHead {
    pub rssi: u8,              // signed, dBm
    pub rate: u5,              // PHY rate encoding (legacy packets)
    pub reserved_0: u1,        // Reserved
    pub sig_mode: u2,          // 0: non HT, 1: HT, 3: VHT
    pub reserved_1: u16,       // Reserved
    pub mcs: u7,               // Modulation coding scheme (HT packets)
    pub cwb: u1,               // Channel bandwidth: 0 20MHz, 1 40MHz
    pub reserved_2: u16,       // Reserved
    pub smoothing: u1,         // Channel estimate smoothing
    pub not_sounding: u1,      // Whether the PPDU is a sounding PPDU
    pub reserved_3: u1,        // Reserved
    pub aggregation: u1,       // MPDU or AMPDU
    pub stbc: u2,              // Space time block code
    pub fec_coding: u1,        // LDPC
    pub sgi: u1,               // Short guard interval
    pub noise_floor: u8,       // signed, dBm
    pub ampdu_cnt: u8,         // Number of subframes aggregated
    pub channel: u4,           // Primary channel
    pub secondary_channel: u4, // 0: none, 1: above, 2: below
    pub reserved_4: u8,        // Reserved
}

/// Words 5 and 6 of the packed header
#[bitsize(64)]
#[derive(FromBits, DebugBits)]
pub struct RxCtrlTail {
    pub reserved_5: u31, // Reserved
    pub ant: u1,         // Antenna number
    pub sig_len: u12,    // Length of the packet including FCS
    pub reserved_6: u12, // Reserved
    pub rx_state: u8,    // Receive state, 0 if no error
}

impl RxControl {
    /// Extract the receive control from the packed header (requires first 28 bytes).
    pub fn from_hw_header(buf: &[u8]) -> Self {
        let mut head = [0u8; 16];
        head[..12].copy_from_slice(&buf[..12]);
        let head = RxCtrlHead::from(UInt::<u128, 96>::new(u128::from_le_bytes(head)));

        // Word 4 is reserved
        let timestamp = u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]);

        let mut tail = [0u8; 8];
        tail.copy_from_slice(&buf[20..28]);
        let tail = RxCtrlTail::from(u64::from_le_bytes(tail));

        Self {
            rssi: head.rssi() as i8,
            rate: head.rate().into(),
            sig_mode: head.sig_mode().into(),
            mcs: head.mcs().into(),
            cwb: head.cwb().into(),
            smoothing: head.smoothing().into(),
            not_sounding: head.not_sounding().into(),
            aggregation: head.aggregation().into(),
            stbc: head.stbc().into(),
            fec_coding: head.fec_coding().into(),
            sgi: head.sgi().into(),
            noise_floor: head.noise_floor() as i8,
            ampdu_cnt: head.ampdu_cnt(),
            channel: head.channel().into(),
            secondary_channel: head.secondary_channel().into(),
            timestamp,
            ant: tail.ant().into(),
            sig_len: tail.sig_len().into(),
            rx_state: tail.rx_state(),
        }
    }

    /// Pack into the hardware header layout. Values wider than their field are masked.
    pub fn to_hw_header(&self) -> [u8; HW_RX_CTRL_LEN] {
        let mut head = RxCtrlHead::from(UInt::<u128, 96>::new(0));
        head.set_rssi(self.rssi as u8);
        head.set_rate(u5::new(self.rate & 0x1f));
        head.set_sig_mode(u2::new(self.sig_mode & 0x03));
        head.set_mcs(u7::new(self.mcs & 0x7f));
        head.set_cwb(u1::new(self.cwb & 0x01));
        head.set_smoothing(u1::new(self.smoothing & 0x01));
        head.set_not_sounding(u1::new(self.not_sounding & 0x01));
        head.set_aggregation(u1::new(self.aggregation & 0x01));
        head.set_stbc(u2::new(self.stbc & 0x03));
        head.set_fec_coding(u1::new(self.fec_coding & 0x01));
        head.set_sgi(u1::new(self.sgi & 0x01));
        head.set_noise_floor(self.noise_floor as u8);
        head.set_ampdu_cnt(self.ampdu_cnt);
        head.set_channel(u4::new(self.channel & 0x0f));
        head.set_secondary_channel(u4::new(self.secondary_channel & 0x0f));

        let mut tail = RxCtrlTail::from(0u64);
        tail.set_ant(u1::new(self.ant & 0x01));
        tail.set_sig_len(u12::new(self.sig_len & 0x0fff));
        tail.set_rx_state(self.rx_state);

        let mut out = [0u8; HW_RX_CTRL_LEN];
        let head = UInt::<u128, 96>::from(head).value().to_le_bytes();
        out[..12].copy_from_slice(&head[..12]);
        out[12..16].copy_from_slice(&self.timestamp.to_le_bytes());
        out[20..28].copy_from_slice(&u64::from(tail).to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rx_ctrl_extraction() {
        // word 0: rssi -60 (0xC4), rate 11, sig_mode 1
        // .... .... .... .... 0100 1011 1100 0100
        // word 1: mcs 7, cwb 1, smoothing 1, aggregation 1, stbc 1, sgi 1
        // 1001 1001 .... .... .... .... 1000 0111
        // word 2: noise_floor -92 (0xA4), ampdu_cnt 3, channel 6, secondary 2
        // word 3: timestamp 0x01020304
        // word 5: ant 1 (bit 31)
        // word 6: sig_len 0x123, rx_state 0
        let byte_stream: &[u8] = &[
            0xC4, 0x4B, 0x00, 0x00, // word 0
            0x87, 0x00, 0x00, 0b1001_1001, // word 1
            0xA4, 0x03, 0x26, 0x00, // word 2
            0x04, 0x03, 0x02, 0x01, // word 3
            0xFF, 0xFF, 0xFF, 0xFF, // word 4 (reserved)
            0x00, 0x00, 0x00, 0x80, // word 5
            0x23, 0x01, 0x00, 0x00, // word 6
        ];

        let result = RxControl::from_hw_header(byte_stream);
        assert_eq!(result.rssi, -60);
        assert_eq!(result.rate, 11);
        assert_eq!(result.sig_mode, 1);
        assert_eq!(result.mcs, 7);
        assert_eq!(result.cwb, 1);
        assert_eq!(result.smoothing, 1);
        assert_eq!(result.not_sounding, 0);
        assert_eq!(result.aggregation, 1);
        assert_eq!(result.stbc, 1);
        assert_eq!(result.fec_coding, 0);
        assert_eq!(result.sgi, 1);
        assert_eq!(result.noise_floor, -92);
        assert_eq!(result.ampdu_cnt, 3);
        assert_eq!(result.channel, 6);
        assert_eq!(result.secondary_channel, 2);
        assert_eq!(result.timestamp, 0x01020304);
        assert_eq!(result.ant, 1);
        assert_eq!(result.sig_len, 0x123);
        assert_eq!(result.rx_state, 0);
    }

    #[test]
    fn packing_matches_extraction() {
        let rx_ctrl = RxControl {
            rssi: -71,
            rate: 0x1f,
            sig_mode: 1,
            mcs: 5,
            cwb: 1,
            smoothing: 1,
            not_sounding: 1,
            aggregation: 0,
            stbc: 1,
            fec_coding: 1,
            sgi: 0,
            noise_floor: -95,
            ampdu_cnt: 9,
            channel: 11,
            secondary_channel: 1,
            timestamp: 987_654_321,
            ant: 0,
            sig_len: 4095,
            rx_state: 3,
        };
        let packed = rx_ctrl.to_hw_header();
        assert_eq!(&packed[16..20], &[0, 0, 0, 0]);
        assert_eq!(RxControl::from_hw_header(&packed), rx_ctrl);
    }
}
