//! Self-describing binary encoding of canonical values.
//!
//! Values are written as MessagePack using its native types: nil, bool,
//! compact integers, float64, str, bin, array and string-keyed map.
//! Instants use the MessagePack timestamp extension (type `-1`); the 96-bit
//! form is written, and the 32, 64 and 96-bit forms are all accepted on read.
//! Opaque values are encoded as their inner value.

use crate::common::Value;
use crate::errors::{CloverError, CloverResult};
use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

const TIMESTAMP_EXT_TYPE: i8 = -1;
const MAX_NANOS: u32 = 999_999_999;

/// Encodes a canonical value.
pub fn encode(value: &Value) -> CloverResult<Vec<u8>> {
    rmp_serde::to_vec(value).map_err(|err| {
        log::error!("Failed to encode value {}: {}", value, err);
        CloverError::from(err)
    })
}

/// Encodes a field map; an empty map encodes as the single byte `0x80`.
pub fn encode_map(map: &BTreeMap<String, Value>) -> CloverResult<Vec<u8>> {
    rmp_serde::to_vec(map).map_err(|err| {
        log::error!("Failed to encode field map: {}", err);
        CloverError::from(err)
    })
}

/// Decodes bytes produced by [encode].
pub fn decode(bytes: &[u8]) -> CloverResult<Value> {
    rmp_serde::from_slice(bytes).map_err(|err| {
        log::error!("Failed to decode {} bytes: {}", bytes.len(), err);
        CloverError::from(err)
    })
}

fn timestamp_payload(instant: &DateTime<Utc>) -> [u8; 12] {
    // leap seconds are reported as nanos above one second
    let nanos = instant.timestamp_subsec_nanos().min(MAX_NANOS);
    let mut payload = [0u8; 12];
    payload[..4].copy_from_slice(&nanos.to_be_bytes());
    payload[4..].copy_from_slice(&instant.timestamp().to_be_bytes());
    payload
}

fn parse_timestamp(payload: &[u8]) -> Result<DateTime<Utc>, String> {
    let (secs, nanos) = match payload.len() {
        4 => {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(payload);
            (u32::from_be_bytes(buf) as i64, 0u32)
        }
        8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(payload);
            let data = u64::from_be_bytes(buf);
            ((data & 0x0000_0003_ffff_ffff) as i64, (data >> 34) as u32)
        }
        12 => {
            let mut nanos = [0u8; 4];
            let mut secs = [0u8; 8];
            nanos.copy_from_slice(&payload[..4]);
            secs.copy_from_slice(&payload[4..]);
            (i64::from_be_bytes(secs), u32::from_be_bytes(nanos))
        }
        len => return Err(format!("invalid timestamp length {}", len)),
    };

    if nanos > MAX_NANOS {
        return Err(format!("timestamp nanoseconds out of range: {}", nanos));
    }
    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| format!("timestamp out of range: {}s {}ns", secs, nanos))
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::I64(i) => serializer.serialize_i64(*i),
            Value::U64(u) => serializer.serialize_u64(*u),
            Value::F64(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut state = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    state.serialize_entry(key, value)?;
                }
                state.end()
            }
            Value::Instant(instant) => {
                let payload = timestamp_payload(instant);
                serializer.serialize_newtype_struct(
                    rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                    &(TIMESTAMP_EXT_TYPE, serde_bytes::Bytes::new(&payload)),
                )
            }
            Value::Opaque(inner) => inner.serialize(serializer),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a self-describing canonical value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::I64(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::U64(v))
    }

    fn visit_f32<E: de::Error>(self, v: f32) -> Result<Value, E> {
        Ok(Value::F64(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::F64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(item) = seq.next_element::<Value>()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(key) = access.next_key::<Value>()? {
            let key = match key {
                Value::String(key) => key,
                other => {
                    return Err(de::Error::custom(format!(
                        "map key type must be a string, found {} key {}",
                        other.type_name(),
                        other
                    )))
                }
            };
            let value = access.next_value::<Value>()?;
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        let (ext_type, payload): (i8, serde_bytes::ByteBuf) = Deserialize::deserialize(deserializer)?;
        if ext_type != TIMESTAMP_EXT_TYPE {
            return Err(de::Error::custom(format!("unsupported extension type {}", ext_type)));
        }
        parse_timestamp(&payload).map(Value::Instant).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}
