//! Export pipeline
//!
//! Serializes capture events from any number of producer threads into one
//! frame stream. The active encoder, the reused encode buffer, the sink and
//! the statistics live together behind a single mutex; at most one event is
//! encoded at a time and the lock is released on every exit path.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, trace};

use crate::capture_event::{CaptureView, DeviceIdentity};
use crate::clock::Clock;
use crate::config::{ExportConfig, ExportFormat};
use crate::encoder::{ActiveEncoder, EncodeBuffer, RecordEncoder};
use crate::errors::ConfigError;
use crate::sink::FrameSink;
use crate::stats::ExportStats;

/// Everything only one export may touch at a time.
struct ExportState<S> {
    encoder: ActiveEncoder,
    buffer: EncodeBuffer,
    sink: S,
    stats: Option<ExportStats>,
}

/// Counters readable without taking the export lock.
#[derive(Debug, Default)]
struct ExportCounters {
    exported: AtomicU64,
    emitted: AtomicU64,
    failed: AtomicU64,
}

/// Snapshot of the pipeline counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Events handed to `export`
    pub exported: u64,
    /// Non-empty frames accepted by the sink
    pub emitted: u64,
    /// Frames the sink failed to take
    pub failed: u64,
}

pub struct ExportPipeline<S: FrameSink> {
    state: Mutex<ExportState<S>>,
    identity: DeviceIdentity,
    clock: Arc<dyn Clock>,
    format: ExportFormat,
    counters: ExportCounters,
}

impl<S: FrameSink> ExportPipeline<S> {
    /// Builds the pipeline and allocates its encode buffer.
    pub fn new(
        config: &ExportConfig,
        identity: DeviceIdentity,
        clock: Arc<dyn Clock>,
        sink: S,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let layout = config.layout();
        log::info!(
            "Export pipeline: format {:?}, payload slot {} bytes, record {} bytes",
            config.format,
            layout.max_payload,
            layout.record_len
        );

        let stats = config
            .summary_stats
            .then(|| ExportStats::new(config.stats_report_interval, Instant::now()));

        Ok(Self {
            state: Mutex::new(ExportState {
                encoder: ActiveEncoder::from_config(config),
                buffer: EncodeBuffer::new(&layout),
                sink,
                stats,
            }),
            identity,
            clock,
            format: config.format,
            counters: ExportCounters::default(),
        })
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    fn lock(&self) -> MutexGuard<'_, ExportState<S>> {
        // A panicking producer must not stop the others; the state is fully
        // rewritten on every export.
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("Export lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Render one capture event and hand it to the sink.
    ///
    /// Blocks until no other export is in flight. The event is only borrowed
    /// for the duration of the call. Sink failures are counted and logged.
    pub fn export<E: CaptureView + ?Sized>(&self, event: &E) {
        let mut guard = self.lock();
        let state = &mut *guard;

        let started = Instant::now();
        let since_last = state.stats.as_ref().map(|stats| stats.begin(started));

        let frame = state
            .encoder
            .render(event, &self.identity, self.clock.as_ref(), &mut state.buffer);
        let non_empty = !frame.is_empty();

        match state.sink.emit(frame) {
            Ok(()) if non_empty => {
                self.counters.emitted.fetch_add(1, Ordering::Relaxed);
            }
            Ok(()) => {}
            Err(e) => {
                let failed = self.counters.failed.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("Failed to emit frame ({} failures so far): {}", failed, e);
            }
        }
        self.counters.exported.fetch_add(1, Ordering::Relaxed);

        if let (Some(stats), Some(since_last)) = (state.stats.as_mut(), since_last) {
            stats.finish(since_last, started, Instant::now());
        }
    }

    pub fn summary(&self) -> ExportSummary {
        ExportSummary {
            exported: self.counters.exported.load(Ordering::Relaxed),
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Tear the pipeline down and return its sink.
    pub fn into_sink(self) -> S {
        trace!("Shutting down export pipeline: {:?}", self.summary());
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.sink
    }
}
