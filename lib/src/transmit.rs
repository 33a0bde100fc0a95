//! Paced probe transmitter
//!
//! Sends a fixed probe packet at the configured rate so that the receiving
//! side has traffic to measure. Send failures are counted, never retried.
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{debug, info};

use crate::errors::TransportError;
use crate::pacer::{Delay, Pace, RatePacer};

/// Payload of every probe packet.
pub const PROBE_PAYLOAD: &[u8] = b"1\n";

/// Something that can send one packet.
pub trait PacketSender {
    fn send_packet(&mut self, bytes: &[u8]) -> Result<(), TransportError>;
}

impl PacketSender for UdpSocket {
    fn send_packet(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
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

/// Counters of a transmitter run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitSummary {
    pub sent: u64,
    pub failed: u64,
    pub late: u64,
}

pub struct Transmitter<P: PacketSender, D: Delay> {
    sender: P,
    pacer: RatePacer<D>,
    payload: Vec<u8>,
    sent: u64,
    failed: u64,
}

impl<P: PacketSender, D: Delay> Transmitter<P, D> {
    pub fn new(sender: P, pacer: RatePacer<D>) -> Self {
        Self::with_payload(sender, pacer, PROBE_PAYLOAD.to_vec())
    }

    pub fn with_payload(sender: P, pacer: RatePacer<D>, payload: Vec<u8>) -> Self {
        Self {
            sender,
            pacer,
            payload,
            sent: 0,
            failed: 0,
        }
    }

    /// One loop iteration: wait for the slot, then attempt one send.
    pub fn step(&mut self) -> Pace {
        let pace = self.pacer.wait();
        match self.sender.send_packet(&self.payload) {
            Ok(()) => self.sent += 1,
            Err(e) => {
                self.failed += 1;
                debug!("Probe send failed ({} failures): {}", self.failed, e);
            }
        }
        self.pacer.mark_sent(Instant::now());
        pace
    }

    /// Send until `running` is cleared.
    pub fn run(&mut self, running: &AtomicBool) -> TransmitSummary {
        info!(
            "Starting probe transmission every {:?}",
            self.pacer.interval()
        );
        while running.load(Ordering::SeqCst) {
            self.step();
        }
        let summary = self.summary();
        info!("Probe transmission stopped: {:?}", summary);
        summary
    }

    pub fn summary(&self) -> TransmitSummary {
        TransmitSummary {
            sent: self.sent,
            failed: self.failed,
            late: self.pacer.total_late(),
        }
    }

    pub fn into_sender(self) -> P {
        self.sender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pacer::PacerConfig;
    use std::time::Duration;

    /// Accepts packets and fails every `fail_every`th one.
    struct FakeSender {
        packets: Vec<Vec<u8>>,
        fail_every: usize,
        attempts: usize,
    }

    impl PacketSender for FakeSender {
        fn send_packet(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.attempts += 1;
            if self.fail_every > 0 && self.attempts % self.fail_every == 0 {
                return Err(TransportError::Disconnected);
            }
            self.packets.push(bytes.to_vec());
            Ok(())
        }
    }

    /// Stops the loop after a fixed number of waits.
    struct CountdownDelay<'a> {
        remaining: u32,
        running: &'a AtomicBool,
    }

    impl CountdownDelay<'_> {
        fn tick(&mut self) {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    impl Delay for CountdownDelay<'_> {
        fn coarse(&mut self, _duration: Duration) {
            self.tick();
        }

        fn precise(&mut self, _duration: Duration) {
            self.tick();
        }
    }

    fn config() -> PacerConfig {
        PacerConfig {
            rate: 10,
            tick: Duration::from_millis(1),
            too_slow_report_interval: 1024,
        }
    }

    #[test]
    fn failures_are_counted_not_retried() {
        let running = AtomicBool::new(true);
        let delay = CountdownDelay {
            remaining: 6,
            running: &running,
        };
        let sender = FakeSender {
            packets: Vec::new(),
            fail_every: 3,
            attempts: 0,
        };
        let pacer = RatePacer::new(&config(), delay).unwrap();
        let mut transmitter = Transmitter::new(sender, pacer);

        let summary = transmitter.run(&running);
        assert_eq!(summary.sent + summary.failed, 6);
        assert_eq!(summary.failed, 2);

        let sender = transmitter.into_sender();
        assert_eq!(sender.attempts, 6);
        assert!(sender.packets.iter().all(|p| p == b"1\n"));
    }

    #[test]
    fn stopped_flag_sends_nothing() {
        let running = AtomicBool::new(false);
        let delay = CountdownDelay {
            remaining: 1,
            running: &running,
        };
        let sender = FakeSender {
            packets: Vec::new(),
            fail_every: 0,
            attempts: 0,
        };
        let mut transmitter = Transmitter::new(sender, RatePacer::new(&config(), delay).unwrap());
        assert_eq!(transmitter.run(&running), TransmitSummary::default());
    }

    #[test]
    fn udp_probe_arrives() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.connect(receiver.local_addr().unwrap()).unwrap();

        let pacer = RatePacer::new(&config(), crate::pacer::ThreadDelay).unwrap();
        let mut transmitter = Transmitter::new(socket, pacer);
        transmitter.step();

        let mut buf = [0u8; 8];
        let len = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], PROBE_PAYLOAD);
        assert_eq!(transmitter.summary().sent, 1);
    }
}
