//! Record encoders
//!
//! One encoder per wire format. The format is chosen once at startup and the
//! encoder renders every capture event into the process wide
//! [`EncodeBuffer`], returning a [`Frame`] that borrows from it.
use crate::capture_event::{CaptureView, DeviceIdentity};
use crate::clock::Clock;
use crate::config::{ExportConfig, ExportFormat, RecordLayout};

mod binary;
mod csv;
mod json;

pub use binary::BinaryEncoder;
pub use csv::CsvEncoder;
pub use json::JsonEncoder;

/// Starting capacity of the text buffer for formats without a fixed length.
const TEXT_LINE_CAPACITY: usize = 4096;

/// Rendered output of one capture event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Nothing to emit
    Empty,
    /// One text line including its trailing newline
    Line(&'a [u8]),
}

impl<'a> Frame<'a> {
    pub fn as_bytes(&self) -> &'a [u8] {
        match self {
            Frame::Empty => &[],
            Frame::Line(line) => line,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// The line as text, if it is valid UTF-8.
    pub fn as_text(&self) -> Option<&'a str> {
        std::str::from_utf8(self.as_bytes()).ok()
    }
}

/// The reused record (`record`) and text (`text`) buffers.
///
/// Allocated once from the record layout; encoders overwrite them on every
/// export.
#[derive(Debug)]
pub struct EncodeBuffer {
    record: Vec<u8>,
    text: Vec<u8>,
}

impl EncodeBuffer {
    pub fn new(layout: &RecordLayout) -> Self {
        let text_capacity = if layout.text_len > 0 {
            // base64 text plus newline
            layout.text_len + 1
        } else {
            TEXT_LINE_CAPACITY
        };
        Self {
            record: vec![0; layout.record_len],
            text: Vec::with_capacity(text_capacity),
        }
    }
}

/// Renders capture events in one wire format.
pub trait RecordEncoder {
    fn format(&self) -> ExportFormat;

    /// Render `event` into `buffer` and return the frame to emit.
    fn render<'b, E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        buffer: &'b mut EncodeBuffer,
    ) -> Frame<'b>;
}

/// Encoder that renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopEncoder;

impl RecordEncoder for NopEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Nop
    }

    fn render<'b, E: CaptureView + ?Sized>(
        &self,
        _event: &E,
        _identity: &DeviceIdentity,
        _clock: &dyn Clock,
        _buffer: &'b mut EncodeBuffer,
    ) -> Frame<'b> {
        Frame::Empty
    }
}

/// The encoder selected by configuration.
#[derive(Debug, Clone)]
pub enum ActiveEncoder {
    Nop(NopEncoder),
    Csv(CsvEncoder),
    Json(JsonEncoder),
    Binary(BinaryEncoder),
}

impl ActiveEncoder {
    pub fn from_config(config: &ExportConfig) -> Self {
        let layout = config.layout();
        match config.format {
            ExportFormat::Nop => ActiveEncoder::Nop(NopEncoder),
            ExportFormat::Csv => ActiveEncoder::Csv(CsvEncoder::new(layout)),
            ExportFormat::Json => ActiveEncoder::Json(JsonEncoder::new(layout)),
            ExportFormat::Base64 => ActiveEncoder::Binary(BinaryEncoder::new(layout)),
        }
    }
}

impl RecordEncoder for ActiveEncoder {
    fn format(&self) -> ExportFormat {
        match self {
            ActiveEncoder::Nop(encoder) => encoder.format(),
            ActiveEncoder::Csv(encoder) => encoder.format(),
            ActiveEncoder::Json(encoder) => encoder.format(),
            ActiveEncoder::Binary(encoder) => encoder.format(),
        }
    }

    fn render<'b, E: CaptureView + ?Sized>(
        &self,
        event: &E,
        identity: &DeviceIdentity,
        clock: &dyn Clock,
        buffer: &'b mut EncodeBuffer,
    ) -> Frame<'b> {
        match self {
            ActiveEncoder::Nop(encoder) => encoder.render(event, identity, clock, buffer),
            ActiveEncoder::Csv(encoder) => encoder.render(event, identity, clock, buffer),
            ActiveEncoder::Json(encoder) => encoder.render(event, identity, clock, buffer),
            ActiveEncoder::Binary(encoder) => encoder.render(event, identity, clock, buffer),
        }
    }
}
