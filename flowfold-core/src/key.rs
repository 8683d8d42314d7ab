//! Group key encoding.
//!
//! The key of a record is the concatenation of its key-designated fields'
//! fixed-width byte encodings, in declared order, with no separators. Two
//! records belong to the same group iff their encoded keys are byte-equal,
//! so the encoding must be deterministic — see
//! [`Value::write_key_bytes`](crate::record::Value) for the per-type layout.

use anyhow::{anyhow, Result};

use crate::record::{Record, RecordSchema};

/// Opaque aggregation-group identity. Byte-wise equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<u8>);

impl GroupKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Serializes the configured key fields of a record into a [`GroupKey`].
#[derive(Debug, Clone)]
pub struct KeyCodec {
    /// Input-schema indexes of the key fields, in declared order.
    fields: Vec<usize>,
    /// Total encoded width, fixed per configuration.
    width: usize,
}

impl KeyCodec {
    /// Build a codec over the given input-schema field indexes.
    ///
    /// Variable-length fields cannot be key fields: the key layout is
    /// position-based, so every component needs a schema-fixed width.
    pub fn new(schema: &RecordSchema, fields: Vec<usize>) -> Result<Self> {
        let mut width = 0;
        for &idx in &fields {
            let field = schema
                .field(idx)
                .ok_or_else(|| anyhow!("key field index {idx} out of schema range"))?;
            width += field.ty.key_width().ok_or_else(|| {
                anyhow!(
                    "variable-length field {:?} cannot be used as a key field",
                    field.name
                )
            })?;
        }
        Ok(Self { fields, width })
    }

    /// Input-schema indexes of the key fields.
    pub fn fields(&self) -> &[usize] {
        &self.fields
    }

    /// Encoded key width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Encode the key fields of `record`.
    pub fn encode(&self, record: &Record) -> Result<GroupKey> {
        let mut bytes = Vec::with_capacity(self.width);
        for &idx in &self.fields {
            let value = record
                .get(idx)
                .ok_or_else(|| anyhow!("record is missing key field index {idx}"))?;
            value.write_key_bytes(&mut bytes);
        }
        Ok(GroupKey(bytes))
    }
}
