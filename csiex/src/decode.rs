use csiex_lib::{decode_reader, summarize_timings, CsiFile, Writer};
use log::{info, warn};

use std::error::Error;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use crate::cli::{DecodeArgs, TimingsArgs};

pub fn run_decode(args: DecodeArgs) -> Result<(), Box<dyn Error>> {
    let DecodeArgs {
        input,
        out,
        format,
        batch_size,
        print,
    } = args;

    let reader = BufReader::new(File::open(&input)?);
    let (records, stats) = decode_reader(reader)?;
    info!(
        "Read {} lines: {} records, {} torn, {} malformed",
        stats.lines, stats.records, stats.torn, stats.malformed
    );

    if print {
        let mut stdout = BufWriter::new(io::stdout().lock());
        for record in &records {
            serde_json::to_writer(&mut stdout, record)?;
            stdout.write_all(b"\n")?;
        }
        stdout.flush()?;
    }

    if let Some(file_path) = out {
        let mut writer = Writer::new(CsiFile {
            file_path,
            file_type: format,
        })?;
        for batch in records.chunks(batch_size.max(1)) {
            writer.add_batch(batch)?;
        }
        let rows = writer.finalize()?;
        info!("Wrote {} records", rows);
    }

    Ok(())
}

pub fn run_timings(args: TimingsArgs) -> Result<(), Box<dyn Error>> {
    let reader = BufReader::new(File::open(&args.input)?);
    match summarize_timings(reader)? {
        Some(summary) => {
            println!("N= {}", summary.count);
            println!(
                "mean/10/50/90 percentile= {:.1} [{:.1} {:.1} {:.1}]",
                summary.mean, summary.p10, summary.p50, summary.p90
            );
        }
        None => warn!("No export timing samples found in {}", args.input.display()),
    }
    Ok(())
}
