mod capture_event;
mod clock;
mod codec;
mod config;
mod console;
mod decode;
mod encoder;
mod errors;
mod hw_rx_ctrl;
mod pacer;
mod persistence;
mod pipeline;
mod raw_capture;
mod remap;
mod sink;
mod stats;
mod transmit;

// Public re-export
pub use crate::capture_event::{CaptureEvent, CaptureView, DeviceIdentity, MacAddress, Role, RxControl};
pub use crate::clock::{apply_time_command, parse_time_command, Clock, ManualClock, SystemClock, WallTime};
pub use crate::codec::{encoded_len, Base64Codec};
pub use crate::config::{
    ExportConfig, ExportFormat, RecordLayout, BOM, CODEC_I8QI, EXTENDED_MAX_PAYLOAD, PAYLOAD_OFFSET,
    RECORD_OVERHEAD, STANDARD_MAX_PAYLOAD,
};
pub use crate::console::{handle_input_line, run_console, ConsoleInput, MAX_LINE_LEN};
pub use crate::decode::{
    decode_base64_record, decode_json_record, decode_line, decode_reader, DecodeStats, DecodedRecord,
};
pub use crate::encoder::{
    ActiveEncoder, BinaryEncoder, CsvEncoder, EncodeBuffer, Frame, JsonEncoder, NopEncoder, RecordEncoder,
};
pub use crate::errors::{
    CaptureError, ConfigError, DecodeError, PersistenceError, RemapError, TransportError,
};
pub use crate::hw_rx_ctrl::HW_RX_CTRL_LEN;
pub use crate::pacer::{Delay, Pace, PacerConfig, RatePacer, ThreadDelay};
pub use crate::persistence::{CsiFile, FileType, Writer};
pub use crate::pipeline::{ExportPipeline, ExportSummary};
pub use crate::raw_capture::{write_raw_capture, RawCaptureReader, DUMP_HEADER_LEN};
pub use crate::remap::{qi_to_iq, remap_subcarriers, RemappedCsi, SubcarrierCsi};
pub use crate::sink::{spawn_frame_writer, ChannelSink, FrameSink, WriterSink, QUEUE_CAPACITY};
pub use crate::stats::{summarize_timings, ExportSample, ExportStats, IntervalReport, TimingSummary};
pub use crate::transmit::{PacketSender, TransmitSummary, Transmitter, PROBE_PAYLOAD};
