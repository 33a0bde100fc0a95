//! Frame sinks
//!
//! The export pipeline hands every rendered frame to a [`FrameSink`]. Sinks
//! writing straight to a stream or socket emit while the pipeline lock is
//! held. Slow consumers are decoupled through a [`ChannelSink`]: the frame is
//! copied into a bounded queue and a background writer drains it.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::io::Write;
use std::net::UdpSocket;
use std::thread::{self, JoinHandle};

use crate::encoder::Frame;
use crate::errors::TransportError;

/// Default capacity of the frame queue, in frames.
pub const QUEUE_CAPACITY: usize = 256;

/// A consumer of rendered frames.
pub trait FrameSink: Send {
    /// Emit one frame. Empty frames are accepted and ignored.
    fn emit(&mut self, frame: Frame<'_>) -> Result<(), TransportError>;
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn emit(&mut self, frame: Frame<'_>) -> Result<(), TransportError> {
        (**self).emit(frame)
    }
}

/// Writes frames to any byte stream (stdout, files), flushing after each line.
#[derive(Debug)]
pub struct WriterSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> FrameSink for WriterSink<W> {
    fn emit(&mut self, frame: Frame<'_>) -> Result<(), TransportError> {
        if frame.is_empty() {
            return Ok(());
        }
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Sends every frame as one datagram on a connected socket.
impl FrameSink for UdpSocket {
    fn emit(&mut self, frame: Frame<'_>) -> Result<(), TransportError> {
        let bytes = frame.as_bytes();
        if bytes.is_empty() {
            return Ok(());
        }
        let written = self.send(bytes)?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        Ok(())
    }
}

/// Copies frames into a bounded queue without blocking.
///
/// A full queue drops the frame and reports [`TransportError::QueueFull`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Creates a sink together with the receiving end of its queue.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = bounded(capacity);
        (Self::new(tx), rx)
    }
}

impl FrameSink for ChannelSink {
    fn emit(&mut self, frame: Frame<'_>) -> Result<(), TransportError> {
        if frame.is_empty() {
            return Ok(());
        }
        match self.tx.try_send(frame.as_bytes().to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(TransportError::Disconnected),
        }
    }
}

/// Spawns a background thread writing queued frames to `out`.
///
/// The thread runs until every sender of the queue is dropped and returns the
/// number of frames written.
///
/// # Parameters
/// - `rx`: Receiving end of a [`ChannelSink`] queue
/// - `out`: Stream to write the frames to
pub fn spawn_frame_writer<W>(rx: Receiver<Vec<u8>>, out: W) -> JoinHandle<std::io::Result<u64>>
where
    W: Write + Send + 'static,
{
    log::trace!("Spawning background thread to write queued frames");
    thread::spawn(move || write_queued_frames(rx, out))
}

fn write_queued_frames<W: Write>(rx: Receiver<Vec<u8>>, mut out: W) -> std::io::Result<u64> {
    let mut written = 0;
    while let Ok(frame) = rx.recv() {
        if let Err(e) = out.write_all(&frame).and_then(|_| out.flush()) {
            log::error!("Error writing queued frame: {}. Exiting writer.", e);
            return Err(e);
        }
        written += 1;
    }
    log::trace!("Frame queue closed after {} frames", written);
    Ok(written)
}
