//! Error types used by this lib.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Packet rate must be at least one packet per second")]
    ZeroRate,
    #[error("Scheduler tick must be a non-zero duration")]
    ZeroTick,
    #[error("Payload slot must hold at least one byte")]
    EmptyPayloadSlot,
    #[error("Payload slot of {given} bytes exceeds the wire limit of {allowed}")]
    PayloadSlotTooLarge { given: usize, allowed: usize },
    #[error("Invalid export format: {0}")]
    InvalidFormat(String),
    #[error("Invalid device role: {0}")]
    InvalidRole(String),
    #[error("Invalid hardware address: {0}")]
    InvalidMac(String),
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Captured payload of {len} bytes exceeds the configured slot of {max}")]
    PayloadTooLong { len: usize, max: usize },
    #[error("Capture stream ended inside a dump ({0})")]
    Truncated(std::io::Error),
    #[error("IO error while reading captures: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Frame queue is full; frame dropped")]
    QueueFull,
    #[error("Frame queue receiver is gone")]
    Disconnected,
    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },
    #[error("IO error on transport: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Record text is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Record too short: {available} bytes (required: {required})")]
    TooShort { required: usize, available: usize },
    #[error("Unexpected record marker {0} (expected 65534)")]
    BadMarker(u32),
    #[error("Malformed JSON record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("JSON record field {index} is missing or not a {expected}")]
    JsonField { index: usize, expected: &'static str },
    #[error("IO error while reading records: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RemapError {
    #[error("Odd number of CSI values ({0}), must be QI pairs")]
    OddLength(usize),
    #[error("Unsupported radio configuration: secondary_channel={secondary_channel}, sig_mode={sig_mode}, cwb={cwb}, stbc={stbc}")]
    Unsupported {
        secondary_channel: u8,
        sig_mode: u8,
        cwb: u8,
        stbc: u8,
    },
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[cfg(feature = "parquet")]
    #[error("Error in writing parquet file: {0}")]
    Parquet(String),
    #[error("Error in writing JSON lines: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error in file persistence: {0}")]
    Io(#[from] std::io::Error),
}
