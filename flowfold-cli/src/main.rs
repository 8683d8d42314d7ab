//! CSV driver for the flowfold aggregation engine.
//!
//! Reads one record per line from stdin (or a file), feeds them through the
//! engine, and prints one summarized CSV record per closed window on stdout.
//!
//! ```text
//! flowfold \
//!     --schema "SRC_IP:ip,BYTES:uint64,TIME_FIRST:time,TIME_LAST:time" \
//!     --agg "-k SRC_IP -s BYTES -t a:30" < flows.csv
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use flowfold_core::{AggSpec, Aggregator, FnSink, Record, RecordSchema};

mod csv;

#[derive(Parser, Debug)]
#[command(name = "flowfold")]
#[command(about = "Aggregate CSV-encoded flow records over time windows", long_about = None)]
struct Cli {
    /// Input schema template, e.g. "SRC_IP:ip,BYTES:uint64,TIME_FIRST:time,TIME_LAST:time"
    #[arg(long)]
    schema: String,

    /// Aggregation option string, e.g. "-k SRC_IP -s BYTES -t p:60"
    #[arg(long)]
    agg: String,

    /// Read records from this file instead of stdin
    #[arg(long)]
    input: Option<PathBuf>,

    /// Treat the first row as a header and skip it
    #[arg(long)]
    skip_header: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let schema = RecordSchema::parse(&cli.schema).context("bad --schema template")?;
    let spec = AggSpec::parse(&cli.agg).context("bad --agg option string")?;

    let sink = FnSink(|record: Record| -> Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", csv::format_record(&record))?;
        Ok(())
    });
    let agg = Aggregator::new(schema.clone(), &spec, vec![Box::new(sink)])?;
    println!("{}", csv::header(agg.output_schema()));

    let reader: Box<dyn BufRead> = match &cli.input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
        )),
        None => Box::new(io::stdin().lock()),
    };

    let mut accepted = 0u64;
    for (number, line) in reader.lines().enumerate() {
        let line = line.context("read failed")?;
        if line.is_empty() || (cli.skip_header && number == 0) {
            continue;
        }
        let record = match csv::parse_record(&schema, &line) {
            Ok(record) => record,
            Err(err) => {
                warn!(row = number + 1, error = %err, "skipping malformed row");
                continue;
            }
        };
        if let Err(err) = agg.process(&record) {
            warn!(row = number + 1, error = %err, "record rejected");
            continue;
        }
        accepted += 1;
    }

    agg.shutdown()?;
    tracing::info!(accepted, "input drained, all windows flushed");
    Ok(())
}
