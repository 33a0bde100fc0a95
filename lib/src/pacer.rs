//! Packet rate pacer
//!
//! Holds a send loop to a target rate. Every iteration waits for what is left
//! of the packet interval since the previous send: long waits sleep in whole
//! scheduler ticks, short ones spin for the exact remainder. Iterations that
//! are already late do not wait at all and are counted; a warning goes out
//! once per report interval.
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::errors::ConfigError;

/// Waits handed out by the pacer. Split so each tier can be replaced in tests.
pub trait Delay {
    /// Scheduler sleep; `duration` is a whole number of ticks.
    fn coarse(&mut self, duration: Duration);
    /// Precise wait for exactly `duration`.
    fn precise(&mut self, duration: Duration);
}

/// Sleeps the current thread for coarse waits and spins for precise ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn coarse(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }

    fn precise(&mut self, duration: Duration) {
        let start = Instant::now();
        while start.elapsed() < duration {
            std::hint::spin_loop();
        }
    }
}

/// Pacer settings.
#[derive(Debug, Clone)]
pub struct PacerConfig {
    /// Target packets per second
    pub rate: u32,
    /// Scheduler tick; coarse sleeps are multiples of it
    pub tick: Duration,
    /// Late iterations between two warnings
    pub too_slow_report_interval: u32,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            rate: 100,
            tick: Duration::from_millis(1),
            too_slow_report_interval: 1024,
        }
    }
}

impl PacerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate == 0 {
            return Err(ConfigError::ZeroRate);
        }
        if self.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        Ok(())
    }

    /// Target time between two sends.
    pub fn interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.rate.max(1) as u64)
    }
}

/// What one iteration does before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Sleep for this many whole ticks' worth of time
    Coarse(Duration),
    /// Spin for exactly this long
    Precise(Duration),
    /// Already late by this much; send immediately
    Late(Duration),
}

#[derive(Debug)]
pub struct RatePacer<D: Delay = ThreadDelay> {
    interval: Duration,
    tick: Duration,
    report_interval: u32,
    delay: D,
    last_send: Instant,
    too_slow: u32,
    total_late: u64,
}

impl<D: Delay> RatePacer<D> {
    pub fn new(config: &PacerConfig, delay: D) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "Pacing at {} packets/s (interval {:?}, tick {:?})",
            config.rate,
            config.interval(),
            config.tick
        );
        Ok(Self {
            interval: config.interval(),
            tick: config.tick,
            report_interval: config.too_slow_report_interval.max(1),
            delay,
            last_send: Instant::now(),
            too_slow: 0,
            total_late: 0,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Late iterations since the last warning.
    pub fn too_slow_count(&self) -> u32 {
        self.too_slow
    }

    /// Late iterations since start.
    pub fn total_late(&self) -> u64 {
        self.total_late
    }

    /// Decide the wait for an iteration starting at `now`.
    pub fn plan(&self, now: Instant) -> Pace {
        let elapsed = now.saturating_duration_since(self.last_send);
        let Some(remaining) = self.interval.checked_sub(elapsed).filter(|r| !r.is_zero()) else {
            return Pace::Late(elapsed - self.interval);
        };

        let ticks = (remaining.as_nanos() / self.tick.as_nanos()) as u32;
        if ticks >= 2 {
            Pace::Coarse(self.tick * ticks)
        } else {
            Pace::Precise(remaining)
        }
    }

    /// Perform the wait planned for `now` and return it.
    pub fn pace_at(&mut self, now: Instant) -> Pace {
        let pace = self.plan(now);
        match pace {
            Pace::Coarse(duration) => self.delay.coarse(duration),
            Pace::Precise(duration) => self.delay.precise(duration),
            Pace::Late(lateness) => {
                self.too_slow += 1;
                self.total_late += 1;
                if self.too_slow >= self.report_interval {
                    warn!(
                        "Sending too slow: {} late iterations, latest {} us behind",
                        self.too_slow,
                        lateness.as_micros()
                    );
                    self.too_slow = 0;
                }
            }
        }
        debug!("{:?}", pace);
        pace
    }

    /// Wait until the next send is due.
    pub fn wait(&mut self) -> Pace {
        self.pace_at(Instant::now())
    }

    /// Record the send attempt at `now`, whether it succeeded or not.
    pub fn mark_sent(&mut self, now: Instant) {
        self.last_send = now;
    }
}
