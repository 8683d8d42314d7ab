//! Reducer registry: merge/finalize dispatch per (operator, field type).
//!
//! Every aggregated field resolves to a [`Reducer`] exactly once, at
//! configuration time. Unsupported (operator, type) combinations are
//! detected there and fall back to the no-op "first" reducer with a
//! diagnostic — the per-record merge path never re-checks type support.
//!
//! Count-distinct is the one indirect operator: its running state is an
//! owned [`DistinctSet`] rather than a fixed-size value, so it is resolved
//! to a plan marker instead of a `Reducer` (see [`crate::layout`]).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::record::{FieldType, Value};

mod distinct;

pub use distinct::DistinctSet;

// ── Operators ─────────────────────────────────────────────────────────────────

/// Aggregation operator assignable to one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggOp {
    /// The field is part of the group key (not reduced).
    Key,
    Sum,
    Avg,
    Min,
    Max,
    /// Keep the first observed value (seeded on insert, merge is a no-op).
    First,
    /// Keep the most recent observed value.
    Last,
    BitOr,
    BitAnd,
    /// Running sum finalized as per-second rate over the window span.
    Rate,
    /// Cardinality of the distinct values observed in the window.
    CountDistinct,
}

impl AggOp {
    pub fn name(self) -> &'static str {
        match self {
            Self::Key => "key",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
            Self::First => "first",
            Self::Last => "last",
            Self::BitOr => "bitor",
            Self::BitAnd => "bitand",
            Self::Rate => "rate",
            Self::CountDistinct => "count_distinct",
        }
    }
}

impl std::fmt::Display for AggOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Reducer ───────────────────────────────────────────────────────────────────

/// Merge function folding one incoming field value into the stored value.
pub type MergeFn = fn(&mut Value, &Value);

/// Post-aggregation step applied once, when the window closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalize {
    None,
    /// Divide the running sum by the record count (avg).
    DivByCount,
    /// Divide the running sum by the window span in whole seconds (rate);
    /// a zero-length window finalizes to 0 instead of dividing.
    DivByDuration,
}

/// Resolved reduction behavior for one direct field.
#[derive(Clone, Copy)]
pub struct Reducer {
    pub merge: MergeFn,
    pub finalize: Finalize,
}

impl Reducer {
    /// The "first value wins" reducer: merge is a no-op because the slot is
    /// seeded from the first record of the group. Also the fallback for
    /// unsupported operator/type combinations.
    pub fn first() -> Self {
        Self {
            merge: merge_nop,
            finalize: Finalize::None,
        }
    }

    /// Look up the reducer for `op` over `ty`, or `None` when the
    /// combination is unsupported. `Key` and `CountDistinct` are not direct
    /// reducers and always return `None`.
    pub fn resolve(op: AggOp, ty: FieldType) -> Option<Self> {
        let merge: MergeFn = match op {
            AggOp::Sum | AggOp::Avg | AggOp::Rate => {
                if !is_arithmetic(ty) {
                    return None;
                }
                merge_sum
            }
            AggOp::Min => {
                if !is_ordered(ty) {
                    return None;
                }
                merge_min
            }
            AggOp::Max => {
                if !is_ordered(ty) {
                    return None;
                }
                merge_max
            }
            AggOp::First => merge_nop,
            // Full copy-and-replace works for every type, including the
            // variable-length ones.
            AggOp::Last => merge_last,
            AggOp::BitOr => {
                if !is_bitwise(ty) {
                    return None;
                }
                merge_bit_or
            }
            AggOp::BitAnd => {
                if !is_bitwise(ty) {
                    return None;
                }
                merge_bit_and
            }
            AggOp::Key | AggOp::CountDistinct => return None,
        };
        let finalize = match op {
            AggOp::Avg => Finalize::DivByCount,
            AggOp::Rate => Finalize::DivByDuration,
            _ => Finalize::None,
        };
        Some(Self { merge, finalize })
    }

    /// Apply this reducer's finalize step to an accumulated value.
    pub fn finalize_value(&self, value: &mut Value, count: u64, duration_secs: u64) {
        match self.finalize {
            Finalize::None => {}
            Finalize::DivByCount => div_assign(value, count),
            Finalize::DivByDuration => {
                if duration_secs == 0 {
                    set_zero(value);
                } else {
                    div_assign(value, duration_secs);
                }
            }
        }
    }
}

/// True when `ty` supports count-distinct (any fixed-width comparable type).
pub fn distinct_supported(ty: FieldType) -> bool {
    !ty.is_variable()
}

// ── Type classes ──────────────────────────────────────────────────────────────

fn is_arithmetic(ty: FieldType) -> bool {
    matches!(
        ty,
        FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::UInt8
            | FieldType::UInt16
            | FieldType::UInt32
            | FieldType::UInt64
            | FieldType::Float
            | FieldType::Double
    )
}

fn is_ordered(ty: FieldType) -> bool {
    is_arithmetic(ty) || matches!(ty, FieldType::Bool | FieldType::Time | FieldType::Ip)
}

fn is_bitwise(ty: FieldType) -> bool {
    matches!(
        ty,
        FieldType::Int8
            | FieldType::Int16
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::UInt8
            | FieldType::UInt16
            | FieldType::UInt32
            | FieldType::UInt64
            | FieldType::Bool
    )
}

// ── Merge functions ───────────────────────────────────────────────────────────

fn merge_nop(_dst: &mut Value, _src: &Value) {}

fn merge_last(dst: &mut Value, src: &Value) {
    *dst = src.clone();
}

fn merge_sum(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Int8(d), Value::Int8(s)) => *d = d.wrapping_add(*s),
        (Value::Int16(d), Value::Int16(s)) => *d = d.wrapping_add(*s),
        (Value::Int32(d), Value::Int32(s)) => *d = d.wrapping_add(*s),
        (Value::Int64(d), Value::Int64(s)) => *d = d.wrapping_add(*s),
        (Value::UInt8(d), Value::UInt8(s)) => *d = d.wrapping_add(*s),
        (Value::UInt16(d), Value::UInt16(s)) => *d = d.wrapping_add(*s),
        (Value::UInt32(d), Value::UInt32(s)) => *d = d.wrapping_add(*s),
        (Value::UInt64(d), Value::UInt64(s)) => *d = d.wrapping_add(*s),
        (Value::Float(d), Value::Float(s)) => *d += *s,
        (Value::Double(d), Value::Double(s)) => *d += *s,
        _ => {}
    }
}

fn merge_min(dst: &mut Value, src: &Value) {
    if value_cmp(src, dst) == Some(Ordering::Less) {
        *dst = src.clone();
    }
}

fn merge_max(dst: &mut Value, src: &Value) {
    if value_cmp(src, dst) == Some(Ordering::Greater) {
        *dst = src.clone();
    }
}

fn merge_bit_or(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Int8(d), Value::Int8(s)) => *d |= *s,
        (Value::Int16(d), Value::Int16(s)) => *d |= *s,
        (Value::Int32(d), Value::Int32(s)) => *d |= *s,
        (Value::Int64(d), Value::Int64(s)) => *d |= *s,
        (Value::UInt8(d), Value::UInt8(s)) => *d |= *s,
        (Value::UInt16(d), Value::UInt16(s)) => *d |= *s,
        (Value::UInt32(d), Value::UInt32(s)) => *d |= *s,
        (Value::UInt64(d), Value::UInt64(s)) => *d |= *s,
        (Value::Bool(d), Value::Bool(s)) => *d |= *s,
        _ => {}
    }
}

fn merge_bit_and(dst: &mut Value, src: &Value) {
    match (dst, src) {
        (Value::Int8(d), Value::Int8(s)) => *d &= *s,
        (Value::Int16(d), Value::Int16(s)) => *d &= *s,
        (Value::Int32(d), Value::Int32(s)) => *d &= *s,
        (Value::Int64(d), Value::Int64(s)) => *d &= *s,
        (Value::UInt8(d), Value::UInt8(s)) => *d &= *s,
        (Value::UInt16(d), Value::UInt16(s)) => *d &= *s,
        (Value::UInt32(d), Value::UInt32(s)) => *d &= *s,
        (Value::UInt64(d), Value::UInt64(s)) => *d &= *s,
        (Value::Bool(d), Value::Bool(s)) => *d &= *s,
        _ => {}
    }
}

/// Ordering between two same-typed values.
///
/// Addresses compare structurally (family, then octets), not as flat
/// integers. Floats use their partial order; differing variants do not
/// compare.
fn value_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int8(x), Value::Int8(y)) => Some(x.cmp(y)),
        (Value::Int16(x), Value::Int16(y)) => Some(x.cmp(y)),
        (Value::Int32(x), Value::Int32(y)) => Some(x.cmp(y)),
        (Value::Int64(x), Value::Int64(y)) => Some(x.cmp(y)),
        (Value::UInt8(x), Value::UInt8(y)) => Some(x.cmp(y)),
        (Value::UInt16(x), Value::UInt16(y)) => Some(x.cmp(y)),
        (Value::UInt32(x), Value::UInt32(y)) => Some(x.cmp(y)),
        (Value::UInt64(x), Value::UInt64(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Ip(x), Value::Ip(y)) => Some(x.cmp(y)),
        (Value::Mac(x), Value::Mac(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// ── Finalize arithmetic ───────────────────────────────────────────────────────

fn div_assign(value: &mut Value, divisor: u64) {
    match value {
        Value::Int8(v) => *v = (i64::from(*v) / divisor as i64) as i8,
        Value::Int16(v) => *v = (i64::from(*v) / divisor as i64) as i16,
        Value::Int32(v) => *v = (i64::from(*v) / divisor as i64) as i32,
        Value::Int64(v) => *v /= divisor as i64,
        Value::UInt8(v) => *v = (u64::from(*v) / divisor) as u8,
        Value::UInt16(v) => *v = (u64::from(*v) / divisor) as u16,
        Value::UInt32(v) => *v = (u64::from(*v) / divisor) as u32,
        Value::UInt64(v) => *v /= divisor,
        Value::Float(v) => *v /= divisor as f32,
        Value::Double(v) => *v /= divisor as f64,
        _ => {}
    }
}

fn set_zero(value: &mut Value) {
    match value {
        Value::Int8(v) => *v = 0,
        Value::Int16(v) => *v = 0,
        Value::Int32(v) => *v = 0,
        Value::Int64(v) => *v = 0,
        Value::UInt8(v) => *v = 0,
        Value::UInt16(v) => *v = 0,
        Value::UInt32(v) => *v = 0,
        Value::UInt64(v) => *v = 0,
        Value::Float(v) => *v = 0.0,
        Value::Double(v) => *v = 0.0,
        _ => {}
    }
}

#[cfg(test)]
#[path = "tests/reduce_tests.rs"]
mod tests;
