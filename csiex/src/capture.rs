use csiex_lib::{
    run_console, spawn_frame_writer, ChannelSink, DeviceIdentity, ExportConfig, ExportPipeline,
    FrameSink, PacerConfig, RatePacer, RawCaptureReader, SystemClock, ThreadDelay, Transmitter,
    WriterSink,
};
use log::{info, warn};

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::net::UdpSocket;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::cli::{ExportArgs, TransmitArgs};

type BoxResult<T> = Result<T, Box<dyn Error>>;

/// Set up the `running` flag, cleared on CTRL+C
fn shutdown_flag() -> BoxResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;
    Ok(running)
}

pub fn run_export(args: ExportArgs) -> BoxResult<()> {
    let ExportArgs {
        input,
        format,
        extended,
        role,
        mac,
        udp,
        queued,
        queue_capacity,
        summary_stats,
        stats_interval,
        console,
    } = args;

    let running = shutdown_flag()?;

    let mut config = ExportConfig::new(format, extended);
    config.summary_stats = summary_stats;
    config.stats_report_interval = stats_interval;

    let clock = Arc::new(SystemClock::new());
    let identity = DeviceIdentity::new(role, mac);

    // Pick where frames go
    let mut writer: Option<JoinHandle<io::Result<u64>>> = None;
    let sink: Box<dyn FrameSink> = if let Some(target) = udp {
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        socket.connect(target)?;
        info!("Sending records to {}", target);
        Box::new(socket)
    } else if queued {
        let (sink, rx) = ChannelSink::bounded(queue_capacity);
        writer = Some(spawn_frame_writer(rx, io::stdout()));
        Box::new(sink)
    } else {
        Box::new(WriterSink::new(io::stdout()))
    };

    let pipeline = ExportPipeline::new(&config, identity, clock.clone(), sink)?;

    if console {
        let clock = Arc::clone(&clock);
        thread::spawn(move || {
            if let Err(e) = run_console(io::stdin().lock(), clock.as_ref()) {
                warn!("Console stopped: {}", e);
            }
        });
    }

    let source: Box<dyn Read> = match &input {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };
    let mut reader = RawCaptureReader::new(BufReader::new(source), config.max_payload);

    while running.load(Ordering::SeqCst) {
        match reader.next_event()? {
            Some(event) => pipeline.export(&event),
            None => break,
        }
    }

    let summary = pipeline.summary();
    info!(
        "Exported {} events: {} records emitted, {} failed",
        summary.exported, summary.emitted, summary.failed
    );

    // Dropping the sink closes the queue and lets the writer drain
    drop(pipeline.into_sink());
    if let Some(handle) = writer {
        match handle.join() {
            Ok(result) => {
                let written = result?;
                info!("Writer thread flushed {} records", written);
            }
            Err(_) => warn!("Writer thread panicked"),
        }
    }

    Ok(())
}

pub fn run_transmit(args: TransmitArgs) -> BoxResult<()> {
    let running = shutdown_flag()?;

    let config = PacerConfig {
        rate: args.rate,
        tick: Duration::from_micros(args.tick_us),
        too_slow_report_interval: args.report_interval,
    };
    let pacer = RatePacer::new(&config, ThreadDelay)?;

    let socket = UdpSocket::bind(args.bind)?;
    socket.connect(args.target)?;
    info!(
        "Sending probes to {} every {:?}",
        args.target,
        pacer.interval()
    );

    let mut transmitter = Transmitter::new(socket, pacer);
    let summary = transmitter.run(&running);

    info!(
        "Sent {} packets, {} failed, {} late",
        summary.sent, summary.failed, summary.late
    );
    Ok(())
}
