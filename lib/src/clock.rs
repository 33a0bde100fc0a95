//! Clock adapter
//!
//! Records carry the wall clock time of capture. That clock is typically
//! synchronised from outside (a host writing `SETTIME: <s>.<us>` to the
//! console), so the adapter accepts corrections and remembers that one
//! happened.
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

const MICROS_PER_SEC: u64 = 1_000_000;

/// Wall clock time split into seconds and microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallTime {
    pub secs: u64,
    pub micros: u32,
}

impl WallTime {
    /// Build a time, carrying microseconds of a million or more into seconds.
    pub fn new(secs: u64, micros: u64) -> Self {
        Self {
            secs: secs.saturating_add(micros / MICROS_PER_SEC),
            micros: (micros % MICROS_PER_SEC) as u32,
        }
    }

    pub fn from_micros(total: u64) -> Self {
        Self::new(0, total)
    }

    pub fn as_micros(&self) -> u64 {
        self.secs
            .saturating_mul(MICROS_PER_SEC)
            .saturating_add(self.micros as u64)
    }
}

/// Time source used by the encoders.
pub trait Clock: Send + Sync {
    /// Whole seconds since the clock was created.
    fn monotonic_seconds(&self) -> u64;
    /// Current (corrected) wall clock time.
    fn wall_clock(&self) -> WallTime;
    /// Apply an external wall clock correction.
    fn set_wall_clock(&self, time: WallTime);
    /// Whether a correction has been applied since start.
    fn is_time_set(&self) -> bool;
}

/// Clock backed by the operating system.
///
/// Corrections are kept as an offset on top of the system time; the process
/// does not need the privilege to change the system clock.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
    offset_micros: AtomicI64,
    time_set: AtomicBool,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            offset_micros: AtomicI64::new(0),
            time_set: AtomicBool::new(false),
        }
    }

    fn system_micros() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
            .unwrap_or(0)
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    fn wall_clock(&self) -> WallTime {
        let corrected = Self::system_micros().saturating_add(self.offset_micros.load(Ordering::Relaxed));
        WallTime::from_micros(corrected.max(0) as u64)
    }

    fn set_wall_clock(&self, time: WallTime) {
        // Corrections past the i64 microsecond range pin the clock at its end
        let target = i64::try_from(time.as_micros()).unwrap_or(i64::MAX);
        self.offset_micros
            .store(target.saturating_sub(Self::system_micros()), Ordering::Relaxed);
        self.time_set.store(true, Ordering::SeqCst);
        log::info!("Wall clock set to {}.{:06}", time.secs, time.micros);
    }

    fn is_time_set(&self) -> bool {
        self.time_set.load(Ordering::SeqCst)
    }
}

/// Clock that only moves when told to. Used for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    wall: Mutex<WallTime>,
    monotonic_secs: AtomicU64,
    time_set: AtomicBool,
}

impl ManualClock {
    pub fn new(wall: WallTime) -> Self {
        Self {
            wall: Mutex::new(wall),
            monotonic_secs: AtomicU64::new(0),
            time_set: AtomicBool::new(false),
        }
    }

    /// Move the monotonic clock forward.
    pub fn advance_monotonic(&self, secs: u64) {
        self.monotonic_secs.fetch_add(secs, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn monotonic_seconds(&self) -> u64 {
        self.monotonic_secs.load(Ordering::Relaxed)
    }

    fn wall_clock(&self) -> WallTime {
        *self.wall.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_wall_clock(&self, time: WallTime) {
        *self.wall.lock().unwrap_or_else(|e| e.into_inner()) = time;
        self.time_set.store(true, Ordering::SeqCst);
    }

    fn is_time_set(&self) -> bool {
        self.time_set.load(Ordering::SeqCst)
    }
}

/// Parse a wall clock correction.
///
/// Accepts `SETTIME: <seconds>.<microseconds>` and `<seconds>.<microseconds>`.
/// Anything else yields `None`.
pub fn parse_time_command(line: &str) -> Option<WallTime> {
    let line = line.trim();
    let body = match line.strip_prefix("SETTIME:") {
        Some(rest) => rest.trim_start(),
        None => line,
    };

    let (secs, micros) = body.split_once('.')?;
    if !is_decimal(secs) || !is_decimal(micros) {
        return None;
    }
    Some(WallTime::new(secs.parse().ok()?, micros.parse().ok()?))
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Apply a correction line to the clock. Returns whether the line was one.
pub fn apply_time_command(clock: &dyn Clock, line: &str) -> bool {
    match parse_time_command(line) {
        Some(time) => {
            clock.set_wall_clock(time);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_patterns() {
        assert_eq!(
            parse_time_command("SETTIME: 1700000000.500000"),
            Some(WallTime {
                secs: 1_700_000_000,
                micros: 500_000
            })
        );
        assert_eq!(
            parse_time_command("1700000000.000042\n"),
            Some(WallTime {
                secs: 1_700_000_000,
                micros: 42
            })
        );
        assert_eq!(
            parse_time_command("SETTIME:12.5"),
            Some(WallTime { secs: 12, micros: 5 })
        );
    }

    #[test]
    fn rejects_malformed_input() {
        for line in [
            "garbage",
            "",
            "SETTIME:",
            "SETTIME: 1700000000",
            "1700000000",
            "1700000000.",
            ".5",
            "-5.10",
            "12.5.6",
            "settime: 1.2",
            "1 2.3",
        ] {
            assert_eq!(parse_time_command(line), None, "{line:?}");
        }
    }

    #[test]
    fn microsecond_overflow_carries() {
        assert_eq!(
            WallTime::new(10, 2_500_000),
            WallTime {
                secs: 12,
                micros: 500_000
            }
        );
    }

    #[test]
    fn time_command_updates_clock() {
        let clock = ManualClock::new(WallTime::new(5, 0));
        assert!(!apply_time_command(&clock, "garbage"));
        assert_eq!(clock.wall_clock(), WallTime::new(5, 0));
        assert!(!clock.is_time_set());

        assert!(apply_time_command(&clock, "SETTIME: 1700000000.500000"));
        assert_eq!(clock.wall_clock(), WallTime::new(1_700_000_000, 500_000));
        assert!(clock.is_time_set());
    }

    #[test]
    fn system_clock_applies_offset() {
        let clock = SystemClock::new();
        assert!(!clock.is_time_set());

        clock.set_wall_clock(WallTime::new(1_000_000_000, 250_000));
        let now = clock.wall_clock();
        assert!(clock.is_time_set());
        // Allow for the time passing between the two calls.
        assert!(now >= WallTime::new(1_000_000_000, 250_000));
        assert!(now < WallTime::new(1_000_000_005, 0));
        assert_eq!(clock.monotonic_seconds(), 0);
    }

    #[test]
    fn huge_correction_saturates() {
        let clock = SystemClock::new();
        // Past the i64 microsecond range: pinned at its end
        assert!(apply_time_command(&clock, "SETTIME: 9300000000000.0"));
        assert_eq!(clock.wall_clock(), WallTime::from_micros(i64::MAX as u64));

        assert!(apply_time_command(&clock, "SETTIME: 18000000000000000000.999999"));
        assert_eq!(clock.wall_clock(), WallTime::from_micros(i64::MAX as u64));

        // Just inside the range
        assert!(apply_time_command(&clock, "9000000000000.0"));
        let now = clock.wall_clock();
        assert!(now >= WallTime::new(9_000_000_000_000, 0));
        assert!(now < WallTime::new(9_000_000_000_005, 0));

        assert!(apply_time_command(&clock, "0.0"));
        assert!(clock.wall_clock() < WallTime::new(1, 0));
    }
}
