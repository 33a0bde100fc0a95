use clap::{Parser, Subcommand};
use csiex_lib::{ExportFormat, FileType, MacAddress, Role, QUEUE_CAPACITY};
use simplelog::LevelFilter;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Log level for output (error, warn, info, debug, trace)
    #[arg(global = true, long, default_value = "info")]
    pub loglevel: LevelFilter,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export raw capture dumps as CSI records
    Export(ExportArgs),

    /// Send paced probe packets to a receiver
    Transmit(TransmitArgs),

    /// Decode the records of a capture log
    Decode(DecodeArgs),

    /// Summarize export timing statistics found in a log
    Timings(TimingsArgs),
}

#[derive(Parser)]
pub struct ExportArgs {
    /// Raw capture dump to replay; reads stdin if omitted
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Record format: base64, json, csv or nop
    #[arg(long, default_value = "base64")]
    pub format: ExportFormat,

    /// Use the extended payload slot (STBC HT-LTF capture)
    #[arg(long, default_value = "false")]
    pub extended: bool,

    /// Role of the capturing device: passive, station or softap
    #[arg(long, default_value = "station")]
    pub role: Role,

    /// Hardware address of the capturing device
    #[arg(long, default_value = "00:00:00:00:00:00")]
    pub mac: MacAddress,

    /// Send records as UDP datagrams to this address instead of stdout
    #[arg(long)]
    pub udp: Option<SocketAddr>,

    /// Write stdout records from a background thread through a bounded queue
    #[arg(long, default_value = "false", conflicts_with = "udp")]
    pub queued: bool,

    /// Capacity of the record queue, in records
    #[arg(long, default_value_t = QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Log per record timing statistics
    #[arg(long, default_value = "false")]
    pub summary_stats: bool,

    /// Records between two interval summaries
    #[arg(long, default_value = "128")]
    pub stats_interval: u32,

    /// Accept `SETTIME: <s>.<us>` time corrections on stdin
    #[arg(long, default_value = "false", requires = "input")]
    pub console: bool,
}

#[derive(Parser)]
pub struct TransmitArgs {
    /// Address to send probe packets to
    #[arg(long)]
    pub target: SocketAddr,

    /// Local address to send from
    #[arg(long, default_value = "0.0.0.0:0")]
    pub bind: SocketAddr,

    /// Packets per second
    #[arg(long, default_value = "100")]
    pub rate: u32,

    /// Scheduler tick in microseconds
    #[arg(long, default_value = "1000")]
    pub tick_us: u64,

    /// Late packets between two warnings
    #[arg(long, default_value = "1024")]
    pub report_interval: u32,
}

#[derive(Parser)]
pub struct DecodeArgs {
    /// Capture log holding exported records
    #[arg(long)]
    pub input: PathBuf,

    /// Output file for decoded records
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Output format: parquet or jsonl
    #[arg(long, default_value = "parquet")]
    pub format: FileType,

    /// Records per written batch
    #[arg(long, default_value = "1000")]
    pub batch_size: usize,

    /// Whether to print decoded records as JSON lines
    #[arg(long, default_value = "false")]
    pub print: bool,
}

#[derive(Parser)]
pub struct TimingsArgs {
    /// Log written with summary statistics enabled
    #[arg(long)]
    pub input: PathBuf,
}
