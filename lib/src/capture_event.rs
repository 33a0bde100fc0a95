//! Capture event and device identity types used throughout the library.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// A 6 byte hardware address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split([':', '-']);
        for byte in bytes.iter_mut() {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| ConfigError::InvalidMac(s.to_string()))?;
            *byte = u8::from_str_radix(part, 16).map_err(|_| ConfigError::InvalidMac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(ConfigError::InvalidMac(s.to_string()));
        }
        Ok(MacAddress(bytes))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What the capturing device is doing on the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum Role {
    /// Promiscuous listener
    Passive = 0,
    /// Station sending probe packets to an access point
    Station = 1,
    /// Soft access point receiving from stations
    SoftAp = 2,
}

impl Role {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passive" => Ok(Role::Passive),
            "station" | "sta" => Ok(Role::Station),
            "softap" | "ap" => Ok(Role::SoftAp),
            _ => Err(ConfigError::InvalidRole(s.to_string())),
        }
    }
}

/// Identity of the exporting device; fixed once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    role: Role,
    mac: MacAddress,
}

impl DeviceIdentity {
    pub fn new(role: Role, mac: MacAddress) -> Self {
        Self { role, mac }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }
}

/**
 * Receive metadata reported by the radio for a single packet
 */
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RxControl {
    pub rssi: i8,
    pub rate: u8,
    pub sig_mode: u8,
    pub mcs: u8,
    pub cwb: u8,
    pub smoothing: u8,
    pub not_sounding: u8,
    pub aggregation: u8,
    pub stbc: u8,
    pub fec_coding: u8,
    pub sgi: u8,
    pub noise_floor: i8,
    pub ampdu_cnt: u8,
    pub channel: u8,
    pub secondary_channel: u8,
    /// Hardware receive timestamp in microseconds since radio start
    pub timestamp: u32,
    pub ant: u8,
    pub sig_len: u16,
    pub rx_state: u8,
}

/// Read access to one capture event.
///
/// Encoders only see events through this trait. The receive timestamp is
/// read through [`CaptureView::rx_timestamp`] every time it is written, so a
/// source that changes underneath the encoder produces differing guards.
pub trait CaptureView {
    /// Receive metadata of the packet
    fn rx_ctrl(&self) -> RxControl;
    /// Hardware address of the sender
    fn source_mac(&self) -> MacAddress;
    /// Whether the first four payload bytes are invalid
    fn first_word_invalid(&self) -> bool;
    /// Raw channel samples, signed QI pairs
    fn payload(&self) -> &[i8];

    /// Hardware receive timestamp; the guard value of binary records.
    fn rx_timestamp(&self) -> u32 {
        self.rx_ctrl().timestamp
    }
}

/**
 * A single measurement delivered by the radio
 *
 * The payload is borrowed from the producer and only valid for one
 * callback; events can not outlive it.
 */
#[derive(Debug, Clone, Copy)]
pub struct CaptureEvent<'a> {
    pub source_mac: MacAddress,
    pub rx_ctrl: RxControl,
    pub first_word_invalid: bool,
    pub payload: &'a [i8],
}

impl CaptureView for CaptureEvent<'_> {
    fn rx_ctrl(&self) -> RxControl {
        self.rx_ctrl
    }

    fn source_mac(&self) -> MacAddress {
        self.source_mac
    }

    fn first_word_invalid(&self) -> bool {
        self.first_word_invalid
    }

    fn payload(&self) -> &[i8] {
        self.payload
    }

    fn rx_timestamp(&self) -> u32 {
        self.rx_ctrl.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_formatting() {
        let mac = MacAddress([0x24, 0x0a, 0xc4, 0x00, 0xff, 0x01]);
        assert_eq!(mac.to_string(), "24:0A:C4:00:FF:01");
        assert_eq!("24:0a:c4:00:ff:01".parse::<MacAddress>().unwrap(), mac);
        assert_eq!("24-0A-C4-00-FF-01".parse::<MacAddress>().unwrap(), mac);
    }

    #[test]
    fn mac_parse_rejects_bad_input() {
        assert!("24:0A:C4:00:FF".parse::<MacAddress>().is_err());
        assert!("24:0A:C4:00:FF:01:02".parse::<MacAddress>().is_err());
        assert!("24:0A:C4:00:FF:1".parse::<MacAddress>().is_err());
        assert!("zz:0A:C4:00:FF:01".parse::<MacAddress>().is_err());
    }

    #[test]
    fn role_ids() {
        assert_eq!(Role::Passive.id(), 0);
        assert_eq!(Role::Station.id(), 1);
        assert_eq!(Role::SoftAp.id(), 2);
        assert_eq!("AP".parse::<Role>().unwrap(), Role::SoftAp);
        assert!("mesh".parse::<Role>().is_err());
    }

    #[test]
    fn identity_accessors() {
        let identity = DeviceIdentity::new(Role::Station, MacAddress([1, 2, 3, 4, 5, 6]));
        assert_eq!(identity.mac(), MacAddress([1, 2, 3, 4, 5, 6]));
        assert_eq!(identity.role().id(), 1);
    }
}
