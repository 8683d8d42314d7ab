//! Plain comma-separated text codec for records.
//!
//! One record per line, one column per schema field, in schema order. No
//! quoting: variable-length fields must not contain commas or newlines.

use anyhow::{anyhow, bail, Context, Result};
use flowfold_core::record::MacAddr;
use flowfold_core::{FieldType, Record, RecordSchema, Value};

/// Header line for `schema`.
pub fn header(schema: &RecordSchema) -> String {
    schema
        .iter()
        .map(|field| field.name.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse one CSV line against `schema`.
pub fn parse_record(schema: &RecordSchema, line: &str) -> Result<Record> {
    let parts: Vec<&str> = line.split(',').collect();
    if parts.len() != schema.len() {
        bail!(
            "row has {} columns, schema declares {}",
            parts.len(),
            schema.len()
        );
    }
    let mut values = Vec::with_capacity(schema.len());
    for (part, field) in parts.iter().zip(schema.iter()) {
        let value = parse_value(field.ty, part.trim())
            .with_context(|| format!("column {:?}", field.name))?;
        values.push(value);
    }
    Record::new(schema, values)
}

/// Render one record as a CSV line.
pub fn format_record(record: &Record) -> String {
    record
        .values()
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_value(ty: FieldType, text: &str) -> Result<Value> {
    let bad = || anyhow!("cannot parse {text:?} as {ty}");
    Ok(match ty {
        FieldType::Int8 => Value::Int8(text.parse().map_err(|_| bad())?),
        FieldType::Int16 => Value::Int16(text.parse().map_err(|_| bad())?),
        FieldType::Int32 => Value::Int32(text.parse().map_err(|_| bad())?),
        FieldType::Int64 => Value::Int64(text.parse().map_err(|_| bad())?),
        FieldType::UInt8 => Value::UInt8(text.parse().map_err(|_| bad())?),
        FieldType::UInt16 => Value::UInt16(text.parse().map_err(|_| bad())?),
        FieldType::UInt32 => Value::UInt32(text.parse().map_err(|_| bad())?),
        FieldType::UInt64 => Value::UInt64(text.parse().map_err(|_| bad())?),
        FieldType::Float => Value::Float(text.parse().map_err(|_| bad())?),
        FieldType::Double => Value::Double(text.parse().map_err(|_| bad())?),
        FieldType::Bool => match text {
            "0" | "false" => Value::Bool(false),
            "1" | "true" => Value::Bool(true),
            _ => return Err(bad()),
        },
        FieldType::Time => Value::Time(text.parse().map_err(|_| bad())?),
        FieldType::Ip => Value::Ip(text.parse().map_err(|_| bad())?),
        FieldType::Mac => Value::Mac(text.parse::<MacAddr>().map_err(|_| bad())?),
        FieldType::Str => Value::Str(text.to_string()),
        FieldType::Bytes => Value::Bytes(decode_hex(text).ok_or_else(bad)?),
    })
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Int8(v) => v.to_string(),
        Value::Int16(v) => v.to_string(),
        Value::Int32(v) => v.to_string(),
        Value::Int64(v) => v.to_string(),
        Value::UInt8(v) => v.to_string(),
        Value::UInt16(v) => v.to_string(),
        Value::UInt32(v) => v.to_string(),
        Value::UInt64(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Bool(v) => u8::from(*v).to_string(),
        Value::Time(v) => v.to_string(),
        Value::Ip(v) => v.to_string(),
        Value::Mac(v) => v.to_string(),
        Value::Str(v) => v.clone(),
        Value::Bytes(v) => encode_hex(v),
    }
}

fn decode_hex(text: &str) -> Option<Vec<u8>> {
    if text.len() % 2 != 0 {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
        .collect()
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> RecordSchema {
        RecordSchema::parse("SRC_IP:ip,PORT:uint16,BYTES:uint64,TIME_FIRST:time,TIME_LAST:time")
            .unwrap()
    }

    #[test]
    fn test_parse_and_format_round_trip() {
        let schema = schema();
        let line = "10.0.0.1,443,1500,1000,2000";
        let record = parse_record(&schema, line).unwrap();
        assert_eq!(format_record(&record), line);
    }

    #[test]
    fn test_parse_rejects_bad_rows() {
        let schema = schema();
        assert!(parse_record(&schema, "10.0.0.1,443,1500,1000").is_err());
        assert!(parse_record(&schema, "not-an-ip,443,1500,1000,2000").is_err());
        assert!(parse_record(&schema, "10.0.0.1,70000,1500,1000,2000").is_err());
    }

    #[test]
    fn test_header_follows_schema_order() {
        assert_eq!(
            header(&schema()),
            "SRC_IP,PORT,BYTES,TIME_FIRST,TIME_LAST"
        );
    }

    #[test]
    fn test_hex_bytes_round_trip() {
        let schema = RecordSchema::parse("PAYLOAD:bytes").unwrap();
        let record = parse_record(&schema, "deadbeef").unwrap();
        assert_eq!(
            record.get(0).unwrap(),
            &Value::Bytes(vec![0xde, 0xad, 0xbe, 0xef])
        );
        assert_eq!(format_record(&record), "deadbeef");
    }
}
