//! Configuration resolution: turns an [`AggSpec`] plus the input schema into
//! the engine's static field plan.
//!
//! Resolution is the only place operator/type support is checked. An unknown
//! field name is fatal — the engine refuses to start. An unsupported
//! operator over a supported field degrades to the "first" reducer with a
//! diagnostic, so the ingestion path never branches on type support.

use anyhow::{anyhow, bail, Result};
use tracing::warn;

use crate::config::AggSpec;
use crate::key::KeyCodec;
use crate::record::{
    FieldDef, FieldType, RecordSchema, COUNT_FIELD, TIME_FIRST_FIELD, TIME_LAST_FIELD,
};
use crate::reduce::{distinct_supported, AggOp, Reducer};

/// How one output field slot accumulates.
#[derive(Clone)]
pub enum PlanKind {
    /// Key component: copied on seed, never merged (all records of a group
    /// share the value by definition).
    Key,
    /// Direct fixed-slot reduction.
    Reduce(Reducer),
    /// Indirect count-distinct state.
    Distinct,
}

/// One resolved output field: where it reads from and how it accumulates.
#[derive(Clone)]
pub struct FieldPlan {
    pub name: String,
    /// Input-schema index the per-record value is read from.
    pub src: usize,
    /// Accumulator slot / output-schema index.
    pub slot: usize,
    pub kind: PlanKind,
}

/// The engine-wide static description of the output record.
///
/// Slot order: configured fields in declared order, then the implicit
/// `COUNT`, `TIME_FIRST`, `TIME_LAST` fields.
pub struct OutputLayout {
    input: RecordSchema,
    output: RecordSchema,
    key: KeyCodec,
    plans: Vec<FieldPlan>,
    time_first_in: usize,
    time_last_in: usize,
}

impl OutputLayout {
    /// Resolve `spec` against the input schema.
    pub fn resolve(input: RecordSchema, spec: &AggSpec) -> Result<Self> {
        let time_first_in = require_time_field(&input, TIME_FIRST_FIELD)?;
        let time_last_in = require_time_field(&input, TIME_LAST_FIELD)?;

        let mut plans: Vec<FieldPlan> = Vec::with_capacity(spec.rules.len());
        let mut out_fields: Vec<FieldDef> = Vec::with_capacity(spec.rules.len() + 3);
        let mut key_fields: Vec<usize> = Vec::new();

        for rule in &spec.rules {
            let src = input.index_of(&rule.field).ok_or_else(|| {
                anyhow!(
                    "configured field {:?} is not in the input schema",
                    rule.field
                )
            })?;
            let ty = input.field(src).expect("resolved index").ty;

            let (kind, out_def) = match rule.op {
                AggOp::Key => {
                    key_fields.push(src);
                    (PlanKind::Key, FieldDef::new(&rule.field, ty))
                }
                AggOp::CountDistinct if distinct_supported(ty) => (
                    PlanKind::Distinct,
                    FieldDef::new(rule.output_name(), FieldType::UInt64),
                ),
                AggOp::CountDistinct => {
                    warn!(
                        field = rule.field.as_str(),
                        ty = %ty,
                        "count_distinct unsupported for this type, keeping first value"
                    );
                    (PlanKind::Reduce(Reducer::first()), FieldDef::new(&rule.field, ty))
                }
                op => {
                    let reducer = Reducer::resolve(op, ty).unwrap_or_else(|| {
                        warn!(
                            field = rule.field.as_str(),
                            op = %op,
                            ty = %ty,
                            "operator unsupported for this type, keeping first value"
                        );
                        Reducer::first()
                    });
                    (PlanKind::Reduce(reducer), FieldDef::new(&rule.field, ty))
                }
            };

            if out_fields.iter().any(|f| f.name == out_def.name) {
                bail!("output field {:?} configured twice", out_def.name);
            }
            plans.push(FieldPlan {
                name: out_def.name.clone(),
                src,
                slot: plans.len(),
                kind,
            });
            out_fields.push(out_def);
        }

        out_fields.push(FieldDef::new(COUNT_FIELD, FieldType::UInt64));
        out_fields.push(FieldDef::new(TIME_FIRST_FIELD, FieldType::Time));
        out_fields.push(FieldDef::new(TIME_LAST_FIELD, FieldType::Time));
        let output = RecordSchema::new(out_fields)?;

        let key = KeyCodec::new(&input, key_fields)?;

        Ok(Self {
            input,
            output,
            key,
            plans,
            time_first_in,
            time_last_in,
        })
    }

    pub fn input(&self) -> &RecordSchema {
        &self.input
    }

    pub fn output(&self) -> &RecordSchema {
        &self.output
    }

    pub fn key(&self) -> &KeyCodec {
        &self.key
    }

    pub fn plans(&self) -> &[FieldPlan] {
        &self.plans
    }

    /// Input-schema index of `TIME_FIRST`.
    pub fn time_first_in(&self) -> usize {
        self.time_first_in
    }

    /// Input-schema index of `TIME_LAST`.
    pub fn time_last_in(&self) -> usize {
        self.time_last_in
    }

    /// Output-schema index of the implicit `COUNT` field.
    pub fn count_slot(&self) -> usize {
        self.plans.len()
    }

    /// Output-schema index of the implicit `TIME_FIRST` field.
    pub fn time_first_slot(&self) -> usize {
        self.plans.len() + 1
    }

    /// Output-schema index of the implicit `TIME_LAST` field.
    pub fn time_last_slot(&self) -> usize {
        self.plans.len() + 2
    }
}

fn require_time_field(schema: &RecordSchema, name: &str) -> Result<usize> {
    let idx = schema
        .index_of(name)
        .ok_or_else(|| anyhow!("input schema is missing the {name} field"))?;
    let ty = schema.field(idx).expect("resolved index").ty;
    if ty != FieldType::Time {
        bail!("input field {name} must be of type time, found {ty}");
    }
    Ok(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldRule;

    fn input() -> RecordSchema {
        RecordSchema::parse(
            "SRC_IP:ip,DST_IP:ip,PORT:uint16,BYTES:uint64,URL:string,TIME_FIRST:time,TIME_LAST:time",
        )
        .unwrap()
    }

    fn spec(rules: Vec<FieldRule>) -> AggSpec {
        AggSpec::new(rules, Default::default())
    }

    #[test]
    fn test_resolve_builds_output_schema() {
        let layout = OutputLayout::resolve(
            input(),
            &spec(vec![
                FieldRule::new("SRC_IP", AggOp::Key),
                FieldRule::new("BYTES", AggOp::Sum),
                FieldRule::new("PORT", AggOp::CountDistinct),
            ]),
        )
        .unwrap();

        let out = layout.output();
        assert_eq!(out.len(), 6);
        assert_eq!(out.field(0).unwrap().name, "SRC_IP");
        assert_eq!(out.field(1).unwrap().name, "BYTES");
        assert_eq!(out.field(2).unwrap().name, "DISTINCT_PORT");
        assert_eq!(out.field(2).unwrap().ty, FieldType::UInt64);
        assert_eq!(out.field(3).unwrap().name, COUNT_FIELD);
        assert_eq!(out.field(4).unwrap().name, TIME_FIRST_FIELD);
        assert_eq!(out.field(5).unwrap().name, TIME_LAST_FIELD);
        assert_eq!(layout.count_slot(), 3);
        assert_eq!(layout.key().fields(), &[0]);
    }

    #[test]
    fn test_unknown_field_is_fatal() {
        let err = OutputLayout::resolve(input(), &spec(vec![FieldRule::new("NOPE", AggOp::Sum)]));
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_time_bounds_is_fatal() {
        let bare = RecordSchema::parse("BYTES:uint64").unwrap();
        assert!(OutputLayout::resolve(bare, &spec(vec![])).is_err());
    }

    #[test]
    fn test_unsupported_operator_falls_back_to_first() {
        let layout = OutputLayout::resolve(
            input(),
            &spec(vec![FieldRule::new("SRC_IP", AggOp::Sum)]),
        )
        .unwrap();
        // Field is kept in the output; merge keeps the seeded value.
        assert!(matches!(layout.plans()[0].kind, PlanKind::Reduce(_)));
        assert_eq!(layout.output().field(0).unwrap().ty, FieldType::Ip);
    }

    #[test]
    fn test_variable_length_key_is_fatal() {
        let err = OutputLayout::resolve(input(), &spec(vec![FieldRule::new("URL", AggOp::Key)]));
        assert!(err.is_err());
    }

    #[test]
    fn test_duplicate_output_field_is_fatal() {
        let err = OutputLayout::resolve(
            input(),
            &spec(vec![
                FieldRule::new("BYTES", AggOp::Sum),
                FieldRule::new("BYTES", AggOp::Min),
            ]),
        );
        assert!(err.is_err());
    }
}
