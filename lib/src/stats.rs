//! Export timing statistics
//!
//! When enabled, the pipeline logs one JSON object per export
//! (`msgid` 1: time since the previous export finished and time spent
//! exporting) and one per report interval (`msgid` 2: average time per
//! packet). [`summarize_timings`] reads those objects back from a log.
use std::io::BufRead;
use std::time::{Duration, Instant};

use log::info;
use serde_json::Value;

/// Message id of the per export timing object.
pub const MSGID_EXPORT: u64 = 1;
/// Message id of the per interval summary object.
pub const MSGID_INTERVAL: u64 = 2;

/// Timing of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSample {
    /// Time between the end of the previous export and the start of this one
    pub since_last: Duration,
    /// Time spent rendering and emitting
    pub export: Duration,
}

/// Average time per packet over one report interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalReport {
    pub pkt_counter: u32,
    pub per_packet_us: f64,
}

/// Running statistics kept inside the pipeline state.
#[derive(Debug)]
pub struct ExportStats {
    report_interval: u32,
    last_finished: Option<Instant>,
    interval_start: Instant,
    pkt_counter: u32,
}

impl ExportStats {
    pub fn new(report_interval: u32, now: Instant) -> Self {
        Self {
            report_interval: report_interval.max(1),
            last_finished: None,
            interval_start: now,
            pkt_counter: 0,
        }
    }

    /// Mark the start of an export; returns the time since the previous one
    /// finished (zero for the first export).
    pub fn begin(&self, now: Instant) -> Duration {
        self.last_finished
            .map(|last| now.saturating_duration_since(last))
            .unwrap_or_default()
    }

    /// Mark the end of an export started at `started` and log its timing.
    pub fn finish(
        &mut self,
        since_last: Duration,
        started: Instant,
        now: Instant,
    ) -> (ExportSample, Option<IntervalReport>) {
        let sample = ExportSample {
            since_last,
            export: now.saturating_duration_since(started),
        };
        info!(
            "{{ \"msgid\":{}, \"dt since last call\":{}, \"export data dt\":{} }}",
            MSGID_EXPORT,
            sample.since_last.as_micros(),
            sample.export.as_micros()
        );

        self.pkt_counter += 1;
        self.last_finished = Some(now);

        // The interval-th export reports, so an interval of N covers exactly N exports.
        if self.pkt_counter < self.report_interval {
            return (sample, None);
        }

        let elapsed = now.saturating_duration_since(self.interval_start);
        let report = IntervalReport {
            pkt_counter: self.pkt_counter,
            per_packet_us: elapsed.as_micros() as f64 / self.pkt_counter as f64,
        };
        info!(
            "{{ \"msgid\":{}, \"pkt_counter\":{}, \"per packet dt\":{:.3} }}",
            MSGID_INTERVAL, report.pkt_counter, report.per_packet_us
        );
        self.pkt_counter = 0;
        self.interval_start = now;
        (sample, Some(report))
    }
}

/// Summary of the "time since last call" samples found in a log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSummary {
    pub count: usize,
    pub mean: f64,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

/// Scan a log for export timing objects and summarize them.
///
/// Lines without a parsable `msgid` 1 object are skipped. Returns `None` if
/// no sample was found.
pub fn summarize_timings<R: BufRead>(reader: R) -> std::io::Result<Option<TimingSummary>> {
    let mut samples = Vec::new();
    for line in reader.lines() {
        if let Some(dt) = export_timing(&line?) {
            samples.push(dt);
        }
    }
    Ok(summarize(samples))
}

/// Extract the "dt since last call" value of a msgid 1 object embedded in a line.
fn export_timing(line: &str) -> Option<f64> {
    let start = line.find('{')?;
    let end = line.rfind('}')?;
    if end < start {
        return None;
    }
    let object: Value = serde_json::from_str(&line[start..=end]).ok()?;
    if object.get("msgid")?.as_u64()? != MSGID_EXPORT {
        return None;
    }
    object.get("dt since last call")?.as_f64()
}

fn summarize(mut samples: Vec<f64>) -> Option<TimingSummary> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(f64::total_cmp);
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    Some(TimingSummary {
        count: samples.len(),
        mean,
        p10: percentile(&samples, 10.0),
        p50: percentile(&samples, 50.0),
        p90: percentile(&samples, 90.0),
    })
}

/// Percentile of sorted samples with linear interpolation between ranks.
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn first_export_has_no_gap() {
        let t0 = Instant::now();
        let stats = ExportStats::new(4, t0);
        assert_eq!(stats.begin(t0 + Duration::from_millis(5)), Duration::ZERO);
    }

    #[test]
    fn report_fires_on_the_interval_th_export() {
        let t0 = Instant::now();
        let mut stats = ExportStats::new(2, t0);
        let t1 = t0 + Duration::from_micros(10);
        let t2 = t0 + Duration::from_micros(20);

        assert!(stats.finish(Duration::ZERO, t0, t1).1.is_none());
        let report = stats.finish(Duration::ZERO, t1, t2).1.unwrap();
        assert_eq!(report.pkt_counter, 2);
        assert!(stats.finish(Duration::ZERO, t2, t2).1.is_none());
    }

    #[test]
    fn reports_every_interval() {
        let t0 = Instant::now();
        let mut stats = ExportStats::new(3, t0);
        let mut reports = Vec::new();

        for i in 0..7u64 {
            let started = t0 + Duration::from_micros(1000 * i);
            let since_last = stats.begin(started);
            let done = started + Duration::from_micros(200);
            let (sample, report) = stats.finish(since_last, started, done);

            assert_eq!(sample.export, Duration::from_micros(200));
            if i > 0 {
                assert_eq!(sample.since_last, Duration::from_micros(800));
            }
            reports.extend(report);
        }

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].pkt_counter, 3);
        // 2200us elapsed over 3 packets
        assert!((reports[0].per_packet_us - 2200.0 / 3.0).abs() < 1e-9);
        assert!((reports[1].per_packet_us - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn summarizes_log_lines() {
        let log = "\
            12:00:00 [INFO] { \"msgid\":1, \"dt since last call\":10, \"export data dt\":3 }\n\
            12:00:00 [INFO] { \"msgid\":2, \"pkt_counter\":128, \"per packet dt\":9.5 }\n\
            garbage {not json}\n\
            CSI_DATA,1,AA:BB:CC:DD:EE:FF\n\
            I (123) CSI_COLLECTION: { \"msgid\":1, \"dt since last call\":20, \"export data dt\":4 }\n\
            { \"msgid\":1, \"dt since last call\":30, \"export data dt\":5 }\n\
            { \"msgid\":1, \"dt since last call\":40, \"export data dt\":5 }\n";

        let summary = summarize_timings(Cursor::new(log)).unwrap().unwrap();
        assert_eq!(summary.count, 4);
        assert!((summary.mean - 25.0).abs() < 1e-9);
        assert!((summary.p10 - 13.0).abs() < 1e-9);
        assert!((summary.p50 - 25.0).abs() < 1e-9);
        assert!((summary.p90 - 37.0).abs() < 1e-9);
    }

    #[test]
    fn empty_log_has_no_summary() {
        assert_eq!(summarize_timings(Cursor::new("nothing here\n")).unwrap(), None);
    }
}
