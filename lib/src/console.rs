//! Console input task
//!
//! Reads operator input line by line and applies wall clock corrections.
use std::io::BufRead;

use log::{info, warn};

use crate::clock::{apply_time_command, Clock};

/// Longest accepted input line in bytes, excluding the line terminator.
pub const MAX_LINE_LEN: usize = 254;

/// Outcome of one console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleInput {
    /// The wall clock was corrected
    TimeSet,
    /// Blank line
    Empty,
    /// Not a known command; nothing changed
    Ignored,
    /// Longer than [`MAX_LINE_LEN`]; dropped
    TooLong,
}

/// Handle one line of console input.
pub fn handle_input_line(clock: &dyn Clock, line: &str) -> ConsoleInput {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.len() > MAX_LINE_LEN {
        warn!("Dropping console line of {} bytes", line.len());
        return ConsoleInput::TooLong;
    }
    if line.trim().is_empty() {
        return ConsoleInput::Empty;
    }
    if apply_time_command(clock, line) {
        ConsoleInput::TimeSet
    } else {
        warn!("Unhandled console input: {:?}", line);
        ConsoleInput::Ignored
    }
}

/// Process console lines until the input ends. Returns the number of applied
/// time corrections.
pub fn run_console<R: BufRead>(mut reader: R, clock: &dyn Clock) -> std::io::Result<u64> {
    info!("Console ready for time corrections");
    let mut corrections = 0;
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        if handle_input_line(clock, &text) == ConsoleInput::TimeSet {
            corrections += 1;
        }
    }
    info!("Console input closed after {} corrections", corrections);
    Ok(corrections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, WallTime};
    use std::io::Cursor;

    #[test]
    fn dispatches_time_corrections() {
        let clock = ManualClock::new(WallTime::new(1, 0));
        assert_eq!(
            handle_input_line(&clock, "SETTIME: 1700000000.500000\r\n"),
            ConsoleInput::TimeSet
        );
        assert_eq!(clock.wall_clock(), WallTime::new(1_700_000_000, 500_000));
        assert_eq!(handle_input_line(&clock, "   \n"), ConsoleInput::Empty);
        assert_eq!(handle_input_line(&clock, "garbage"), ConsoleInput::Ignored);
        assert_eq!(clock.wall_clock(), WallTime::new(1_700_000_000, 500_000));
    }

    #[test]
    fn drops_overlong_lines() {
        let clock = ManualClock::new(WallTime::default());
        let long = format!("{}.1", "1".repeat(MAX_LINE_LEN));
        assert_eq!(handle_input_line(&clock, &long), ConsoleInput::TooLong);
        assert!(!clock.is_time_set());

        let fits = format!("{}.1", "0".repeat(MAX_LINE_LEN - 2));
        assert_eq!(handle_input_line(&clock, &fits), ConsoleInput::TimeSet);
    }

    #[test]
    fn reads_until_end_of_input() {
        let clock = ManualClock::new(WallTime::default());
        let input = "hello\nSETTIME: 10.5\n\n20.25";
        assert_eq!(run_console(Cursor::new(input), &clock).unwrap(), 2);
        assert_eq!(clock.wall_clock(), WallTime::new(20, 25));
    }
}
