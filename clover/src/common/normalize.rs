use crate::common::Value;
use crate::errors::{CloverError, CloverResult, ErrorKind};
use chrono::{DateTime, TimeZone, Utc};
use std::any::Any;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::hash::BuildHasher;
use std::rc::Rc;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

/// Conversion of an application value into the canonical [Value] taxonomy.
///
/// Every type that can be stored in a document registers its own
/// normalization by implementing this trait, either by hand or with
/// `#[derive(Normalize)]` from `clover_derive`. Dispatch is resolved at
/// compile time; only `dyn Any` values are inspected at runtime.
///
/// Normalization is pure: no I/O and no shared state, so it can run
/// concurrently on independent inputs. A failure anywhere in a nested value
/// aborts the whole conversion and no partial result is produced.
///
/// # Examples
///
/// ```rust,ignore
/// use clover::common::{Normalize, Value};
///
/// assert_eq!(7u16.normalize()?, Value::U64(7));
/// assert_eq!(vec![1u8, 2, 3].normalize()?, Value::Bytes(vec![1, 2, 3]));
/// assert_eq!(None::<i32>.normalize()?, Value::Null);
/// ```
pub trait Normalize {
    /// Converts the value into its canonical form.
    fn normalize(&self) -> CloverResult<Value>;

    /// Returns `true` when the value is the zero value of its base kind
    /// (zero number, `false`, empty string, sequence or map, `None`).
    ///
    /// Used by `omitempty` fields of derived records.
    fn is_zero(&self) -> bool {
        false
    }

    /// Normalizes a contiguous sequence of values.
    ///
    /// Sequences become [Value::Array] unless the element type overrides this,
    /// which is how sequences of bytes become a single [Value::Bytes] blob.
    #[doc(hidden)]
    fn normalize_slice(items: &[Self]) -> CloverResult<Value>
    where
        Self: Sized,
    {
        let mut array = Vec::with_capacity(items.len());
        for item in items {
            array.push(item.normalize()?);
        }
        Ok(Value::Array(array))
    }
}

/// Normalizes any value implementing [Normalize].
pub fn normalize<T: Normalize + ?Sized>(value: &T) -> CloverResult<Value> {
    value.normalize()
}

/// Capability of types that serialize themselves to an opaque binary form.
///
/// A record implementing it and deriving `Normalize` with `#[clover(binary)]`
/// is stored as [Value::Bytes] instead of being decomposed field by field.
pub trait MarshalBinary {
    fn marshal_binary(&self) -> CloverResult<Vec<u8>>;
}

/// Normalizes a value through its [MarshalBinary] capability.
pub fn normalize_binary<T: MarshalBinary + ?Sized>(value: &T) -> CloverResult<Value> {
    match value.marshal_binary() {
        Ok(bytes) => Ok(Value::Bytes(bytes)),
        Err(err) => {
            log::error!("Binary marshalling failed: {}", err);
            Err(CloverError::new_with_cause(
                "binary marshalling failed",
                ErrorKind::CodecFailure,
                err,
            ))
        }
    }
}

/// Inserts a normalized record field into the record's map.
///
/// Embedded fields whose value is a map are flattened into the parent;
/// everything else lands under `name`. Later calls overwrite earlier keys.
#[doc(hidden)]
pub fn insert_record_field(
    map: &mut BTreeMap<String, Value>,
    name: &str,
    value: Value,
    embedded: bool,
) {
    match value {
        Value::Map(nested) if embedded => map.extend(nested),
        other => {
            map.insert(name.to_string(), other);
        }
    }
}

fn normalize_map<'a, K, V, I>(entries: I) -> CloverResult<Value>
where
    K: Normalize + 'a,
    V: Normalize + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    let mut map = BTreeMap::new();
    for (key, value) in entries {
        let key = match key.normalize()? {
            Value::String(key) => key,
            other => {
                log::error!("Map key {} is not a string", other);
                return Err(CloverError::new(
                    &format!("map key type must be a string, found {} key {}", other.type_name(), other),
                    ErrorKind::InvalidMapKey,
                ));
            }
        };
        map.insert(key, value.normalize()?);
    }
    Ok(Value::Map(map))
}

macro_rules! impl_normalize_signed {
    ($($ty:ty),*) => {
        $(
            impl Normalize for $ty {
                fn normalize(&self) -> CloverResult<Value> {
                    Ok(Value::I64(*self as i64))
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

macro_rules! impl_normalize_unsigned {
    ($($ty:ty),*) => {
        $(
            impl Normalize for $ty {
                fn normalize(&self) -> CloverResult<Value> {
                    Ok(Value::U64(*self as u64))
                }

                fn is_zero(&self) -> bool {
                    *self == 0
                }
            }
        )*
    };
}

impl_normalize_signed!(i8, i16, i32, i64, isize);
impl_normalize_unsigned!(u16, u32, u64, usize);

impl Normalize for u8 {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::U64(*self as u64))
    }

    fn is_zero(&self) -> bool {
        *self == 0
    }

    fn normalize_slice(items: &[Self]) -> CloverResult<Value> {
        Ok(Value::Bytes(items.to_vec()))
    }
}

impl Normalize for f32 {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::F64(*self as f64))
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Normalize for f64 {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::F64(*self))
    }

    fn is_zero(&self) -> bool {
        *self == 0.0
    }
}

impl Normalize for bool {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::Bool(*self))
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

impl Normalize for () {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::Null)
    }

    fn is_zero(&self) -> bool {
        true
    }
}

impl Normalize for str {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::String(self.to_string()))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Normalize for String {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::String(self.clone()))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Normalize for Cow<'_, str> {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::String(self.to_string()))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl Normalize for char {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::String(self.to_string()))
    }

    fn is_zero(&self) -> bool {
        *self == '\0'
    }
}

impl Normalize for Value {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(self.clone())
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }
}

impl<Tz: TimeZone> Normalize for DateTime<Tz> {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::Instant(self.with_timezone(&Utc)))
    }
}

impl Normalize for SystemTime {
    fn normalize(&self) -> CloverResult<Value> {
        Ok(Value::Instant(DateTime::<Utc>::from(*self)))
    }
}

impl MarshalBinary for Uuid {
    fn marshal_binary(&self) -> CloverResult<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }
}

impl Normalize for Uuid {
    fn normalize(&self) -> CloverResult<Value> {
        normalize_binary(self)
    }

    fn is_zero(&self) -> bool {
        self.is_nil()
    }
}

impl<T: Normalize> Normalize for Option<T> {
    fn normalize(&self) -> CloverResult<Value> {
        match self {
            Some(value) => value.normalize(),
            None => Ok(Value::Null),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

impl<T: Normalize + ?Sized> Normalize for &T {
    fn normalize(&self) -> CloverResult<Value> {
        (**self).normalize()
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl<T: Normalize + ?Sized> Normalize for &mut T {
    fn normalize(&self) -> CloverResult<Value> {
        (**self).normalize()
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl<T: Normalize + ?Sized> Normalize for Box<T> {
    fn normalize(&self) -> CloverResult<Value> {
        (**self).normalize()
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl<T: Normalize + ?Sized> Normalize for Rc<T> {
    fn normalize(&self) -> CloverResult<Value> {
        (**self).normalize()
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl<T: Normalize + ?Sized> Normalize for Arc<T> {
    fn normalize(&self) -> CloverResult<Value> {
        (**self).normalize()
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl<T: Normalize> Normalize for [T] {
    fn normalize(&self) -> CloverResult<Value> {
        T::normalize_slice(self)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Normalize, const N: usize> Normalize for [T; N] {
    fn normalize(&self) -> CloverResult<Value> {
        T::normalize_slice(self)
    }

    fn is_zero(&self) -> bool {
        N == 0
    }
}

impl<T: Normalize> Normalize for Vec<T> {
    fn normalize(&self) -> CloverResult<Value> {
        T::normalize_slice(self)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Normalize> Normalize for VecDeque<T> {
    fn normalize(&self) -> CloverResult<Value> {
        let (front, back) = self.as_slices();
        let front = T::normalize_slice(front)?;
        if back.is_empty() {
            return Ok(front);
        }
        match (front, T::normalize_slice(back)?) {
            (Value::Bytes(mut head), Value::Bytes(tail)) => {
                head.extend(tail);
                Ok(Value::Bytes(head))
            }
            (Value::Array(mut head), Value::Array(tail)) => {
                head.extend(tail);
                Ok(Value::Array(head))
            }
            (head, tail) => {
                log::error!("Ring buffer halves normalized to {} and {}", head.type_name(), tail.type_name());
                Err(CloverError::new(
                    "ring buffer halves normalized to different kinds",
                    ErrorKind::InternalError,
                ))
            }
        }
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Normalize, V: Normalize, S: BuildHasher> Normalize for HashMap<K, V, S> {
    fn normalize(&self) -> CloverResult<Value> {
        normalize_map(self.iter())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<K: Normalize, V: Normalize> Normalize for BTreeMap<K, V> {
    fn normalize(&self) -> CloverResult<Value> {
        normalize_map(self.iter())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

macro_rules! try_normalize_as {
    ($any:expr, $($ty:ty),+ $(,)?) => {
        $(
            if let Some(value) = $any.downcast_ref::<$ty>() {
                return value.normalize();
            }
        )+
    };
}

/// Runtime dispatch for dynamically typed values, e.g. the values of a
/// `HashMap<String, Box<dyn Any>>` handed over by an embedding application.
impl Normalize for dyn Any {
    fn normalize(&self) -> CloverResult<Value> {
        try_normalize_as!(
            self,
            (),
            bool,
            i8,
            i16,
            i32,
            i64,
            isize,
            u8,
            u16,
            u32,
            u64,
            usize,
            f32,
            f64,
            char,
            String,
            &'static str,
            Value,
            Vec<u8>,
            Vec<String>,
            Vec<i64>,
            Vec<f64>,
            Vec<Value>,
            BTreeMap<String, Value>,
            DateTime<Utc>,
            SystemTime,
            Uuid,
            Box<dyn Any>,
            Option<Box<dyn Any>>,
            Vec<Box<dyn Any>>,
            HashMap<String, Box<dyn Any>>,
            BTreeMap<String, Box<dyn Any>>,
        );

        log::error!("Unsupported type {:?} cannot be normalized", self.type_id());
        Err(CloverError::new(
            &format!("unsupported type {:?}", self.type_id()),
            ErrorKind::UnsupportedType,
        ))
    }
}
