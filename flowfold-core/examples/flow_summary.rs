//! Flow Summary Example
//!
//! Demonstrates the full engine surface:
//! - schema declaration and spec parsing
//! - keyed aggregation with several operators at once
//! - active-timeout window rollover driven by record timestamps
//! - shutdown flush
//!
//! Pipeline:
//! ```text
//! synthetic flows -> Aggregator (key: SRC_IP, active timeout 30s) -> CollectSink
//! ```

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Result;

use flowfold_core::{AggSpec, Aggregator, CollectSink, Record, RecordSchema, Value};

fn flow(schema: &RecordSchema, src: &str, bytes: u64, tf: u64, tl: u64) -> Result<Record> {
    let src: IpAddr = src.parse()?;
    Record::new(
        schema,
        vec![
            Value::Ip(src),
            Value::UInt64(bytes),
            Value::Time(tf),
            Value::Time(tl),
        ],
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let schema = RecordSchema::parse("SRC_IP:ip,BYTES:uint64,TIME_FIRST:time,TIME_LAST:time")?;
    let spec = AggSpec::parse("-k SRC_IP -s BYTES -t a:30")?;

    let sink = Arc::new(CollectSink::new());
    let agg = Aggregator::new(schema.clone(), &spec, vec![Box::new(Arc::clone(&sink))])?;
    let out_schema = agg.output_schema().clone();

    // Two bursts from the same source, 45 seconds apart: the second burst
    // rolls the window over, so the source yields two summaries.
    agg.process(&flow(&schema, "10.0.0.1", 500, 0, 1_000)?)?;
    agg.process(&flow(&schema, "10.0.0.1", 700, 2_000, 3_000)?)?;
    agg.process(&flow(&schema, "10.0.0.2", 50, 2_500, 2_600)?)?;
    agg.process(&flow(&schema, "10.0.0.1", 900, 45_000, 46_000)?)?;

    agg.shutdown()?;

    for record in sink.take() {
        let fields: Vec<String> = out_schema
            .iter()
            .zip(record.values())
            .map(|(field, value)| format!("{}={value:?}", field.name))
            .collect();
        println!("{}", fields.join(" "));
    }
    Ok(())
}
