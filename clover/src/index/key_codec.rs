//! Order-preserving encoding of index keys.
//!
//! An index entry key is laid out as
//!
//! ```text
//! "$idx" 0x00 esc(collection) 0x00 esc(field) 0x00 kind | encoded value | 0x00 doc_id
//! ```
//!
//! where `esc` replaces every `0x00` byte with `0x00 0xFF`. Encoded values
//! start with a type tag and compare byte-wise in the same order as the
//! values they encode, so a prefix scan walks an index in value order.

use crate::common::*;
use crate::errors::{CloverError, CloverResult, ErrorKind};
use crate::index::IndexInfo;
use std::ops::Bound;

const SIGN_BIT: u64 = 1 << 63;
const NUMBER_KIND_INTEGER: u8 = 0;
const NUMBER_KIND_FLOAT: u8 = 1;

/// Returns the key prefix shared by every entry of an index.
pub(crate) fn index_prefix(info: &IndexInfo) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(
        INDEX_KEY_PREFIX.len() + info.collection().len() + info.field().len() + 4,
    );
    prefix.extend_from_slice(INDEX_KEY_PREFIX);
    prefix.push(KEY_SEPARATOR);
    escape_into(&mut prefix, info.collection().as_bytes());
    prefix.push(KEY_SEPARATOR);
    escape_into(&mut prefix, info.field().as_bytes());
    prefix.push(KEY_SEPARATOR);
    prefix.push(info.index_type().marker());
    prefix
}

/// Appends `bytes` to `out`, escaping the separator byte.
pub(crate) fn escape_into(out: &mut Vec<u8>, bytes: &[u8]) {
    for byte in bytes {
        out.push(*byte);
        if *byte == KEY_SEPARATOR {
            out.push(ESCAPE_MARKER);
        }
    }
}

/// Encodes a scalar value so that byte order matches value order.
///
/// All numbers share one tag and compare by numeric value, whatever their
/// variant. Floats fold `-0.0` into `0.0`. Arrays, maps and opaque values
/// cannot be encoded.
pub(crate) fn encode_scalar(info: &IndexInfo, value: &Value) -> CloverResult<Vec<u8>> {
    let mut out = Vec::with_capacity(18);
    match value {
        Value::Null => out.push(TAG_NULL),
        Value::Bool(b) => {
            out.push(TAG_BOOL);
            out.push(*b as u8);
        }
        Value::I64(i) => encode_integer(&mut out, *i as i128),
        Value::U64(u) => encode_integer(&mut out, *u as i128),
        Value::F64(f) => {
            out.push(TAG_NUMBER);
            out.extend_from_slice(&ordered_float_bits(info, *f)?.to_be_bytes());
            out.extend_from_slice(&SIGN_BIT.to_be_bytes());
            out.push(NUMBER_KIND_FLOAT);
        }
        Value::String(s) => {
            out.push(TAG_STRING);
            escape_into(&mut out, s.as_bytes());
        }
        Value::Bytes(b) => {
            out.push(TAG_BYTES);
            escape_into(&mut out, b);
        }
        Value::Instant(instant) => {
            out.push(TAG_INSTANT);
            out.extend_from_slice(&((instant.timestamp() as u64) ^ SIGN_BIT).to_be_bytes());
            out.extend_from_slice(&instant.timestamp_subsec_nanos().to_be_bytes());
        }
        Value::Array(_) | Value::Map(_) | Value::Opaque(_) => {
            return Err(unsupported_value(info, value));
        }
    }
    Ok(out)
}

// A number is laid out as
//
//   tag | ordered bits of the nearest f64 | i64 remainder (sign flipped) | kind
//
// The remainder is the distance between an integer and its nearest f64, zero
// for floats. It is far below 2^63 because f64 spacing never exceeds 2^12 in
// the u64 range. Equal values put the integer first, as `Value::cmp` does.
fn encode_integer(out: &mut Vec<u8>, value: i128) {
    let nearest = value as f64;
    let remainder = (value - nearest as i128) as i64;
    out.push(TAG_NUMBER);
    out.extend_from_slice(&float_order_bits(nearest).to_be_bytes());
    out.extend_from_slice(&((remainder as u64) ^ SIGN_BIT).to_be_bytes());
    out.push(NUMBER_KIND_INTEGER);
}

fn float_order_bits(value: f64) -> u64 {
    let value = if value == 0.0 { 0.0 } else { value };
    let bits = value.to_bits();
    if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT
    }
}

fn ordered_float_bits(info: &IndexInfo, value: f64) -> CloverResult<u64> {
    if value.is_nan() {
        log::error!("Cannot index NaN in field {}", info.field());
        return Err(CloverError::new(
            &format!("cannot index NaN value of field {}", info.field()),
            ErrorKind::EncodingFailure,
        ));
    }

    Ok(float_order_bits(value))
}

pub(crate) fn unsupported_value(info: &IndexInfo, value: &Value) -> CloverError {
    log::error!(
        "Value {} of field {} cannot be stored in a {} index",
        value,
        info.field(),
        info.index_type()
    );
    CloverError::new(
        &format!(
            "unsupported {} value for {} index on field {}: {}",
            value.type_name(),
            info.index_type(),
            info.field(),
            value
        ),
        ErrorKind::UnsupportedIndexValueType,
    )
}

/// Builds the full key of an index entry.
pub(crate) fn entry_key(prefix: &[u8], encoded: &[u8], doc_id: &str) -> CloverResult<Vec<u8>> {
    if doc_id.as_bytes().contains(&KEY_SEPARATOR) {
        log::error!("Document id {:?} contains a NUL byte", doc_id);
        return Err(CloverError::new(
            &format!("document id {:?} cannot contain NUL bytes", doc_id),
            ErrorKind::InvalidOperation,
        ));
    }

    let mut key = Vec::with_capacity(prefix.len() + encoded.len() + doc_id.len() + 1);
    key.extend_from_slice(prefix);
    key.extend_from_slice(encoded);
    key.push(KEY_SEPARATOR);
    key.extend_from_slice(doc_id.as_bytes());
    Ok(key)
}

/// Extracts the document id from an entry key.
pub(crate) fn doc_id_of(key: &[u8]) -> CloverResult<&str> {
    let separator = key.iter().rposition(|byte| *byte == KEY_SEPARATOR).ok_or_else(|| {
        log::error!("Index key without separator: {:?}", key);
        CloverError::new("index key has no document id", ErrorKind::BackendError)
    })?;

    std::str::from_utf8(&key[separator + 1..]).map_err(|err| {
        log::error!("Index key holds a non UTF-8 document id: {}", err);
        CloverError::new(
            &format!("index key holds a non UTF-8 document id: {}", err),
            ErrorKind::BackendError,
        )
    })
}

/// Lowest key of the entries matching a lower value bound.
pub(crate) fn lower_key(prefix: &[u8], bound: Bound<Vec<u8>>) -> Vec<u8> {
    let mut key = prefix.to_vec();
    match bound {
        Bound::Included(encoded) => {
            key.extend_from_slice(&encoded);
            key.push(KEY_SEPARATOR);
        }
        Bound::Excluded(encoded) => {
            key.extend_from_slice(&encoded);
            key.push(KEY_SEPARATOR);
            key.push(ESCAPE_MARKER);
        }
        Bound::Unbounded => {}
    }
    key
}

/// Exclusive upper key of the entries matching an upper value bound;
/// `None` when the scan runs to the end of the index.
pub(crate) fn upper_key(prefix: &[u8], bound: Bound<Vec<u8>>) -> Option<Vec<u8>> {
    let mut key = prefix.to_vec();
    match bound {
        Bound::Included(encoded) => {
            key.extend_from_slice(&encoded);
            key.push(KEY_SEPARATOR);
            key.push(ESCAPE_MARKER);
            Some(key)
        }
        Bound::Excluded(encoded) => {
            key.extend_from_slice(&encoded);
            key.push(KEY_SEPARATOR);
            Some(key)
        }
        Bound::Unbounded => crate::store::prefix_successor(prefix),
    }
}
