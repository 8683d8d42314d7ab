//! # Flowfold Core
//!
//! Windowed aggregation engine for network-flow telemetry records.
//!
//! Records arrive one at a time, are grouped by a configurable composite
//! key, and fold incrementally into per-group accumulators until a time
//! window closes; each closed window emits one summarized record downstream.
//!
//! - [`record`] — Typed record model: [`RecordSchema`](record::RecordSchema),
//!   [`Record`](record::Record), [`Value`](record::Value),
//!   [`FieldType`](record::FieldType).
//! - [`config`] — [`AggSpec`](config::AggSpec): field rules plus the
//!   [`WindowConfig`](config::WindowConfig) windowing directive.
//! - [`reduce`] — Per-operator merge/finalize dispatch and the
//!   count-distinct state ([`DistinctSet`](reduce::DistinctSet)).
//! - [`key`] — Composite group-key encoding ([`KeyCodec`](key::KeyCodec)).
//! - [`layout`] — Configuration resolution into the engine's static field
//!   plan ([`OutputLayout`](layout::OutputLayout)).
//! - [`engine`] — The engine itself: [`Aggregator`](engine::Aggregator).
//! - [`sink`] — Downstream stage surface: [`Sink`](sink::Sink).

pub mod config;
pub mod engine;
pub mod key;
pub mod layout;
pub mod record;
pub mod reduce;
pub mod sink;

pub use config::{AggSpec, FieldRule, WindowConfig};
pub use engine::Aggregator;
pub use record::{FieldDef, FieldType, Record, RecordSchema, Value};
pub use reduce::AggOp;
pub use sink::{CollectSink, FnSink, Sink};
