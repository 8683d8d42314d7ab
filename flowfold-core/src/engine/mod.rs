//! The aggregation engine: keyed accumulator store, ingestion path,
//! finalization, and shutdown.
//!
//! # Processing model
//!
//! - **Records**: keyed by [`KeyCodec`](crate::key::KeyCodec), then merged
//!   into the group's [`Accumulator`] under the store lock. With an active
//!   timeout configured, a record arriving past the group's window triggers
//!   a rollover: the stored accumulator is finalized and emitted, and the
//!   record re-seeds the group.
//! - **Sweeps**: the Global/Passive/Mixed policies run one background
//!   thread (see [`sweeper`]) that evicts expired groups under the same
//!   store lock.
//! - **Shutdown**: the sweeper is signalled and joined before the final
//!   flush, so no concurrent store access survives it. Every live group is
//!   emitted exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{bail, Result};
use crossbeam_channel::Sender;
use tracing::{debug, info, warn};

use crate::config::{AggSpec, WindowConfig};
use crate::key::GroupKey;
use crate::layout::{OutputLayout, PlanKind};
use crate::record::{Record, RecordSchema, Timestamp, Value};
use crate::reduce::DistinctSet;
use crate::sink::Sink;

mod sweeper;

type Store = HashMap<GroupKey, Accumulator, ahash::RandomState>;

// ── Accumulator ───────────────────────────────────────────────────────────────

/// One accumulated field slot: a fixed value, or owned count-distinct state.
#[derive(Debug, Clone)]
enum AccSlot {
    Direct(Value),
    Distinct(DistinctSet),
}

/// The in-progress aggregate for one group within the current window.
#[derive(Debug, Clone)]
struct Accumulator {
    count: u64,
    window_start: Timestamp,
    window_end: Timestamp,
    /// One slot per configured output field, in layout order.
    slots: Vec<AccSlot>,
}

impl Accumulator {
    /// Seed a fresh accumulator from the first record of a window. Every
    /// slot copies the record's value; distinct slots start their set with
    /// it.
    fn seed(layout: &OutputLayout, record: &Record, tf: Timestamp, tl: Timestamp) -> Self {
        let slots = layout
            .plans()
            .iter()
            .map(|plan| {
                let value = record.get(plan.src).expect("record validated on ingest");
                match plan.kind {
                    PlanKind::Distinct => AccSlot::Distinct(DistinctSet::new(value.clone())),
                    _ => AccSlot::Direct(value.clone()),
                }
            })
            .collect();
        Self {
            count: 1,
            window_start: tf,
            window_end: tl,
            slots,
        }
    }

    /// Fold one more record into this accumulator.
    fn merge(&mut self, layout: &OutputLayout, record: &Record, tf: Timestamp, tl: Timestamp) {
        self.count += 1;
        self.window_start = self.window_start.min(tf);
        self.window_end = self.window_end.max(tl);
        for plan in layout.plans() {
            let src = record.get(plan.src).expect("record validated on ingest");
            match (&mut self.slots[plan.slot], &plan.kind) {
                (AccSlot::Direct(dst), PlanKind::Reduce(reducer)) => (reducer.merge)(dst, src),
                (AccSlot::Distinct(set), PlanKind::Distinct) => set.observe(src),
                // Key slots are byte-equal across the group by definition.
                (_, PlanKind::Key) => {}
                (slot, _) => unreachable!("slot/plan mismatch at {:?}", slot),
            }
        }
    }

    /// Apply finalize steps and collapse into the flat output record.
    fn finalize(self, layout: &OutputLayout) -> Record {
        let duration_secs = (self.window_end.saturating_sub(self.window_start)) / 1000;
        let mut values = Vec::with_capacity(layout.output().len());
        for (plan, slot) in layout.plans().iter().zip(self.slots) {
            match (slot, &plan.kind) {
                (AccSlot::Direct(mut value), PlanKind::Reduce(reducer)) => {
                    reducer.finalize_value(&mut value, self.count, duration_secs);
                    values.push(value);
                }
                (AccSlot::Direct(value), _) => values.push(value),
                (AccSlot::Distinct(set), _) => values.push(Value::UInt64(set.cardinality())),
            }
        }
        values.push(Value::UInt64(self.count));
        values.push(Value::Time(self.window_start));
        values.push(Value::Time(self.window_end));
        Record::from_values(values)
    }
}

// ── Shared engine state ───────────────────────────────────────────────────────

/// Logical clock driving the Passive/Mixed sweep. Seeded from the first
/// ingested record's `TIME_LAST`, then advanced by wall-clock elapsed time
/// each sweep tick. Guarded by its own lock, independent of the store lock.
#[derive(Debug, Default)]
struct SweepClock {
    now: Option<Timestamp>,
}

impl SweepClock {
    fn seed(&mut self, time_last: Timestamp) {
        if self.now.is_none() {
            self.now = Some(time_last);
        }
    }

    fn advance(&mut self, elapsed: Duration) {
        if let Some(now) = &mut self.now {
            *now += elapsed.as_millis() as Timestamp;
        }
    }

    /// Eviction threshold, or `None` before the first record is seen.
    fn cutoff(&self, timeout: Duration) -> Option<Timestamp> {
        self.now
            .map(|now| now.saturating_sub(timeout.as_millis() as Timestamp))
    }
}

/// State shared between the ingestion path and the background sweeper.
struct EngineShared {
    layout: OutputLayout,
    window: WindowConfig,
    store: Mutex<Store>,
    clock: Mutex<SweepClock>,
    sinks: Vec<Box<dyn Sink>>,
}

impl EngineShared {
    /// Finalize one accumulator and hand the result to every sink. Sink
    /// failures are logged; the accumulator is gone either way.
    fn finalize_and_emit(&self, acc: Accumulator) {
        let record = acc.finalize(&self.layout);
        for sink in &self.sinks {
            if let Err(err) = sink.emit(record.clone()) {
                warn!(error = %err, "sink rejected summarized record");
            }
        }
    }

    /// Emit and remove every live group. Returns the number flushed.
    fn flush_all(&self) -> usize {
        let mut store = self.store.lock().expect("store poisoned");
        let flushed = store.len();
        for (_, acc) in store.drain() {
            self.finalize_and_emit(acc);
        }
        flushed
    }

    /// Emit and remove groups whose window end predates `cutoff`. Returns
    /// the number evicted.
    fn evict_older_than(&self, cutoff: Timestamp) -> usize {
        let mut store = self.store.lock().expect("store poisoned");
        let expired: Vec<GroupKey> = store
            .iter()
            .filter(|(_, acc)| acc.window_end < cutoff)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            if let Some(acc) = store.remove(key) {
                self.finalize_and_emit(acc);
            }
        }
        expired.len()
    }
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// The windowed aggregation engine.
///
/// One instance serves one record stream. Ingestion is single-caller and
/// non-blocking apart from the store lock; the Global/Passive/Mixed
/// policies add one background sweeper thread that shares the store.
pub struct Aggregator {
    shared: Arc<EngineShared>,
    shutdown: Option<Sender<()>>,
    sweeper: Option<JoinHandle<()>>,
}

impl Aggregator {
    /// Resolve `spec` against `input` and start the engine.
    ///
    /// Fails when a configured field is unknown, when a variable-length
    /// field is keyed, or when the input schema lacks the TIME_FIRST /
    /// TIME_LAST window bounds. Unsupported operator/type combinations are
    /// downgraded with a diagnostic instead (see [`crate::layout`]).
    pub fn new(input: RecordSchema, spec: &AggSpec, sinks: Vec<Box<dyn Sink>>) -> Result<Self> {
        let layout = OutputLayout::resolve(input, spec)?;
        let shared = Arc::new(EngineShared {
            layout,
            window: spec.window,
            store: Mutex::new(Store::default()),
            clock: Mutex::new(SweepClock::default()),
            sinks,
        });
        let (shutdown, sweeper) = sweeper::spawn(&shared, spec.window)?;
        info!(window = ?spec.window, "aggregation engine started");
        Ok(Self {
            shared,
            shutdown,
            sweeper,
        })
    }

    /// Schema of the summarized records handed to the sinks.
    pub fn output_schema(&self) -> &RecordSchema {
        self.shared.layout.output()
    }

    /// Ingest one record.
    ///
    /// A record that does not match the input schema is rejected without
    /// touching the store; the engine stays usable for subsequent records.
    pub fn process(&self, record: &Record) -> Result<()> {
        let layout = &self.shared.layout;
        if !record.matches(layout.input()) {
            bail!("record does not match the configured input schema");
        }
        let tf = record_time(record, layout.time_first_in());
        let tl = record_time(record, layout.time_last_in());

        if matches!(
            self.shared.window,
            WindowConfig::Passive { .. } | WindowConfig::Mixed { .. }
        ) {
            self.shared.clock.lock().expect("clock poisoned").seed(tl);
        }

        let key = layout.key().encode(record)?;
        let mut store = self.shared.store.lock().expect("store poisoned");
        if let Some(acc) = store.get_mut(&key) {
            if let Some(active) = self.shared.window.active_timeout() {
                let limit = acc
                    .window_start
                    .saturating_add(active.as_millis() as Timestamp);
                if tf > limit {
                    // The record opens a new window for this key: emit the
                    // closed one and re-seed in place.
                    let closed = std::mem::replace(acc, Accumulator::seed(layout, record, tf, tl));
                    self.shared.finalize_and_emit(closed);
                    return Ok(());
                }
            }
            acc.merge(layout, record, tf, tl);
        } else {
            store.insert(key, Accumulator::seed(layout, record, tf, tl));
        }
        Ok(())
    }

    /// Number of groups currently accumulating.
    pub fn live_groups(&self) -> usize {
        self.shared.store.lock().expect("store poisoned").len()
    }

    /// Stop the engine: join the sweeper, then emit every remaining group
    /// exactly once.
    pub fn shutdown(mut self) -> Result<()> {
        self.teardown();
        Ok(())
    }

    fn teardown(&mut self) {
        // Dropping the sender disconnects the sweeper's shutdown channel,
        // interrupting its sleep.
        if let Some(tx) = self.shutdown.take() {
            drop(tx);
        }
        if let Some(handle) = self.sweeper.take() {
            if handle.join().is_err() {
                warn!("sweeper thread panicked before shutdown");
            }
        }
        let flushed = self.shared.flush_all();
        if flushed > 0 {
            debug!(flushed, "final flush");
        }
    }
}

impl Drop for Aggregator {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn record_time(record: &Record, idx: usize) -> Timestamp {
    match record.get(idx) {
        Some(Value::Time(t)) => *t,
        _ => unreachable!("time field validated on ingest"),
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
