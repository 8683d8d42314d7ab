//! Downstream stage surface.
//!
//! Every finalized accumulator leaves the engine through [`Sink::emit`],
//! called once per summarized record for every registered sink. Sinks are
//! shared with the background sweeper, so implementations take `&self` and
//! must be `Send + Sync`.

use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::record::Record;

/// A successor pipeline stage receiving summarized records.
pub trait Sink: Send + Sync {
    fn emit(&self, record: Record) -> Result<()>;
}

impl<S: Sink + ?Sized> Sink for Arc<S> {
    fn emit(&self, record: Record) -> Result<()> {
        (**self).emit(record)
    }
}

/// Collects emitted records behind a lock. Intended for tests and examples.
#[derive(Debug, Default)]
pub struct CollectSink {
    records: Mutex<Vec<Record>>,
}

impl CollectSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far.
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().expect("collect sink poisoned").clone()
    }

    /// Drain and return everything emitted so far.
    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock().expect("collect sink poisoned"))
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("collect sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Sink for CollectSink {
    fn emit(&self, record: Record) -> Result<()> {
        self.records.lock().expect("collect sink poisoned").push(record);
        Ok(())
    }
}

/// Adapts a closure into a [`Sink`].
pub struct FnSink<F>(pub F);

impl<F> Sink for FnSink<F>
where
    F: Fn(Record) -> Result<()> + Send + Sync,
{
    fn emit(&self, record: Record) -> Result<()> {
        (self.0)(record)
    }
}
