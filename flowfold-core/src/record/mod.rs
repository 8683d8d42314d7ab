//! Typed record and schema model.
//!
//! Records are flat, fixed-schema rows of telemetry fields. A
//! [`RecordSchema`] declares the ordered field list once; every [`Record`]
//! built against it carries one [`Value`] slot per field, addressed by field
//! index. Field access is typed — there are no raw byte offsets anywhere in
//! the engine.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

mod value;

pub use value::{FieldType, MacAddr, Timestamp, Value};

/// Name of the implicit aggregated-record counter field.
pub const COUNT_FIELD: &str = "COUNT";
/// Name of the implicit window-start timestamp field.
pub const TIME_FIRST_FIELD: &str = "TIME_FIRST";
/// Name of the implicit window-end timestamp field.
pub const TIME_LAST_FIELD: &str = "TIME_LAST";

// ── Schema ────────────────────────────────────────────────────────────────────

/// A single field declaration: name plus semantic type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered, immutable field list shared by every record of one stream.
///
/// Field order is significant: it defines slot indexes, key byte order and
/// CSV column order.
#[derive(Debug, Clone)]
pub struct RecordSchema {
    fields: Vec<FieldDef>,
    by_name: HashMap<String, usize>,
}

impl RecordSchema {
    /// Build a schema from an ordered field list. Duplicate names are
    /// rejected.
    pub fn new(fields: Vec<FieldDef>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), idx).is_some() {
                bail!("duplicate field name {:?} in schema", field.name);
            }
        }
        Ok(Self { fields, by_name })
    }

    /// Parse a `NAME:type,NAME:type,...` template string.
    ///
    /// Type names are the lowercase [`FieldType`] names, e.g.
    /// `"SRC_IP:ip,BYTES:uint64,TIME_FIRST:time,TIME_LAST:time"`.
    pub fn parse(template: &str) -> Result<Self> {
        let mut fields = Vec::new();
        for part in template.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, ty) = part
                .split_once(':')
                .ok_or_else(|| anyhow!("field spec {part:?} is not NAME:type"))?;
            let ty = FieldType::parse(ty.trim())
                .ok_or_else(|| anyhow!("unknown field type {:?} for field {name:?}", ty.trim()))?;
            fields.push(FieldDef::new(name.trim(), ty));
        }
        if fields.is_empty() {
            bail!("schema template {template:?} declares no fields");
        }
        Self::new(fields)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, idx: usize) -> Option<&FieldDef> {
        self.fields.get(idx)
    }

    /// Index of the field with the given name, if declared.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }
}

// ── Record ────────────────────────────────────────────────────────────────────

/// One telemetry record: a value slot per schema field.
///
/// A record does not carry its schema; the engine validates slot arity and
/// types against its configured input schema on ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    /// Build a record against `schema`, validating arity and slot types.
    pub fn new(schema: &RecordSchema, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.len() {
            bail!(
                "record has {} values, schema declares {} fields",
                values.len(),
                schema.len()
            );
        }
        for (idx, value) in values.iter().enumerate() {
            let field = schema.field(idx).expect("index within schema");
            if value.field_type() != field.ty {
                bail!(
                    "field {:?} expects {}, got {}",
                    field.name,
                    field.ty,
                    value.field_type()
                );
            }
        }
        Ok(Self { values })
    }

    /// Build a record from already-validated values. The caller guarantees
    /// the slots match the schema the record will be used with.
    pub(crate) fn from_values(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Check this record's slots against `schema` without consuming it.
    pub fn matches(&self, schema: &RecordSchema) -> bool {
        self.values.len() == schema.len()
            && self
                .values
                .iter()
                .zip(schema.iter())
                .all(|(value, field)| value.field_type() == field.ty)
    }
}
