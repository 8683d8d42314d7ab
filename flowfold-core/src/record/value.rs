use std::fmt;
use std::net::{IpAddr, Ipv6Addr};

use serde::{Deserialize, Serialize};

/// Millisecond timestamp, the unit of all window arithmetic.
pub type Timestamp = u64;

/// 6-byte link-layer address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MacAddr(pub [u8; 6]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl std::str::FromStr for MacAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 6];
        let mut parts = s.split(':');
        for slot in &mut bytes {
            let part = parts
                .next()
                .ok_or_else(|| anyhow::anyhow!("MAC address {s:?} has fewer than 6 octets"))?;
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| anyhow::anyhow!("bad MAC octet {part:?} in {s:?}"))?;
        }
        if parts.next().is_some() {
            anyhow::bail!("MAC address {s:?} has more than 6 octets");
        }
        Ok(Self(bytes))
    }
}

// ── FieldType ─────────────────────────────────────────────────────────────────

/// Semantic type of one record field.
///
/// Mirrors the wire-format type set of flow telemetry exporters: fixed-width
/// numerics, timestamps, addresses, and two variable-length payload kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    /// Millisecond timestamp.
    Time,
    /// IPv4 or IPv6 address.
    Ip,
    /// Link-layer address.
    Mac,
    /// Variable-length UTF-8 text.
    Str,
    /// Variable-length raw bytes.
    Bytes,
}

impl FieldType {
    /// Parse a lowercase type name from a schema template string.
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "int8" => Self::Int8,
            "int16" => Self::Int16,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float" => Self::Float,
            "double" => Self::Double,
            "bool" => Self::Bool,
            "time" => Self::Time,
            "ip" => Self::Ip,
            "mac" => Self::Mac,
            "string" => Self::Str,
            "bytes" => Self::Bytes,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::Time => "time",
            Self::Ip => "ip",
            Self::Mac => "mac",
            Self::Str => "string",
            Self::Bytes => "bytes",
        }
    }

    /// True for types without a fixed wire width.
    pub fn is_variable(self) -> bool {
        matches!(self, Self::Str | Self::Bytes)
    }

    /// Width of this type's key encoding in bytes, `None` for
    /// variable-length types (which cannot participate in group keys).
    pub fn key_width(self) -> Option<usize> {
        Some(match self {
            Self::Int8 | Self::UInt8 | Self::Bool => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::Int32 | Self::UInt32 | Self::Float => 4,
            Self::Int64 | Self::UInt64 | Self::Double | Self::Time => 8,
            Self::Ip => 16,
            Self::Mac => 6,
            Self::Str | Self::Bytes => return None,
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A single typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Time(Timestamp),
    Ip(IpAddr),
    Mac(MacAddr),
    Str(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Int8(_) => FieldType::Int8,
            Self::Int16(_) => FieldType::Int16,
            Self::Int32(_) => FieldType::Int32,
            Self::Int64(_) => FieldType::Int64,
            Self::UInt8(_) => FieldType::UInt8,
            Self::UInt16(_) => FieldType::UInt16,
            Self::UInt32(_) => FieldType::UInt32,
            Self::UInt64(_) => FieldType::UInt64,
            Self::Float(_) => FieldType::Float,
            Self::Double(_) => FieldType::Double,
            Self::Bool(_) => FieldType::Bool,
            Self::Time(_) => FieldType::Time,
            Self::Ip(_) => FieldType::Ip,
            Self::Mac(_) => FieldType::Mac,
            Self::Str(_) => FieldType::Str,
            Self::Bytes(_) => FieldType::Bytes,
        }
    }

    /// Append this value's fixed-width key encoding to `out`.
    ///
    /// Big-endian for all numerics so the byte layout is deterministic
    /// across platforms. IPv4 addresses are widened to their IPv4-mapped
    /// IPv6 form so the IP slot is always 16 bytes.
    ///
    /// Variable-length values have no key encoding; callers reject them at
    /// configuration time.
    pub(crate) fn write_key_bytes(&self, out: &mut Vec<u8>) {
        match self {
            Self::Int8(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Int16(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Int32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Int64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::UInt8(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::UInt16(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::UInt32(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::UInt64(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Float(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Bool(v) => out.push(u8::from(*v)),
            Self::Time(v) => out.extend_from_slice(&v.to_be_bytes()),
            Self::Ip(addr) => {
                let v6: Ipv6Addr = match addr {
                    IpAddr::V4(v4) => v4.to_ipv6_mapped(),
                    IpAddr::V6(v6) => *v6,
                };
                out.extend_from_slice(&v6.octets());
            }
            Self::Mac(mac) => out.extend_from_slice(&mac.0),
            Self::Str(_) | Self::Bytes(_) => {
                debug_assert!(false, "variable-length values never reach key encoding");
            }
        }
    }
}

impl From<IpAddr> for Value {
    fn from(addr: IpAddr) -> Self {
        Self::Ip(addr)
    }
}
