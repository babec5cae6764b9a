use crate::common::{normalize, Normalize, ReadExecutor, Value, DOC_EXPIRES_AT, DOC_ID, NO_EXPIRATION_MILLIS};
use crate::document::codec;
use crate::errors::{CloverError, CloverResult, ErrorKind};
use crate::FIELD_SEPARATOR;
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use once_cell::unsync::OnceCell;
use serde::de::DeserializeOwned;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

type PathSegments = SmallVec<[String; 4]>;

/// Encoded form of a document without fields (an empty MessagePack map).
const EMPTY_DOCUMENT: [u8; 1] = [0x80];

/// A schema-less record made of named fields holding canonical [Value]s.
///
/// A document owns a canonical field map together with its encoded byte form
/// and keeps both consistent at all times. Documents decoded from bytes stay
/// unmaterialized until a field is first accessed; the field map is then
/// decoded once and cached. Any mutation re-encodes the whole map eagerly.
///
/// Nested fields are addressed with paths joined by the field separator
/// (default: `.`), for example `document.get("location.address.zip")`. The
/// separator can be changed through [`crate::config::CloverConfig`].
///
/// Two fields are reserved:
///
/// * `_id` - the identifier of the document, a UUID string.
/// * `_expiresAt` - the expiration instant of the document.
///
/// Every accessor returns a [CloverResult] because materialization of stored
/// bytes can fail; such a failure is reported as
/// [`ErrorKind::CorruptedDocument`].
///
/// A document is not meant to be shared between threads while it is being
/// read or mutated. Clones share the encoded bytes and copy the field map.
#[derive(Clone)]
pub struct Document {
    encoded: Arc<[u8]>,
    fields: OnceCell<BTreeMap<String, Value>>,
}

impl Document {
    /// Creates a new empty document.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let doc = Document::new();
    /// assert_eq!(doc.size()?, 0);
    /// assert_eq!(&*encode(&doc), &[0x80]);
    /// ```
    pub fn new() -> Self {
        Document {
            encoded: Arc::from(&EMPTY_DOCUMENT[..]),
            fields: OnceCell::with_value(BTreeMap::new()),
        }
    }

    /// Creates a document from any value that normalizes to a map.
    ///
    /// The value is normalized and encoded immediately; the field map is
    /// materialized lazily on first access.
    ///
    /// # Errors
    ///
    /// Propagates the normalization failure, or returns
    /// [`ErrorKind::UnsupportedType`] when the value is not a map.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// #[derive(Normalize)]
    /// pub struct Todo {
    ///     pub title: String,
    ///     #[clover = "done,omitempty"]
    ///     pub completed: bool,
    /// }
    ///
    /// let doc = Document::from_value(&Todo { title: "write".into(), completed: false })?;
    /// assert!(doc.has("title")?);
    /// assert!(!doc.has("done")?);
    /// ```
    pub fn from_value<T: Normalize + ?Sized>(value: &T) -> CloverResult<Self> {
        match normalize(value)? {
            Value::Map(map) => Ok(Document {
                encoded: codec::encode_map(&map)?.into(),
                fields: OnceCell::new(),
            }),
            other => {
                log::error!("Cannot create a document from {} value", other.type_name());
                Err(CloverError::new(
                    &format!("document content must be a map, found {}", other.type_name()),
                    ErrorKind::UnsupportedType,
                ))
            }
        }
    }

    /// Returns `true` once the field map has been decoded and cached.
    pub fn is_materialized(&self) -> bool {
        self.fields.get().is_some()
    }

    /// Returns the value at `path`, or `None` when any segment of the path is
    /// missing or an intermediate segment is not a map.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.set("location.city", "Rome")?;
    /// assert_eq!(doc.get("location.city")?, Some(&Value::from("Rome")));
    /// assert_eq!(doc.get("location.city.name")?, None);
    /// ```
    pub fn get(&self, path: &str) -> CloverResult<Option<&Value>> {
        let mut current = self.materialize()?;
        let segments = split_path(path);
        let last = segments.len().saturating_sub(1);

        for (position, segment) in segments.iter().enumerate() {
            match current.get(segment.as_str()) {
                Some(value) if position == last => return Ok(Some(value)),
                Some(Value::Map(nested)) => current = nested,
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Returns `true` when `path` resolves to a field, including a field
    /// holding [Value::Null].
    pub fn has(&self, path: &str) -> CloverResult<bool> {
        Ok(self.get(path)?.is_some())
    }

    /// Normalizes `value` and assigns it at `path`.
    ///
    /// Missing intermediate segments, and intermediates holding a non-map
    /// value, are replaced by empty maps. Empty segments are plain field
    /// names, so `"a..b"` assigns `b` under the `""` key of `a`. Opaque
    /// markers are dropped before storing. The whole field map is re-encoded
    /// before the change becomes visible, so on any error the document is
    /// left untouched.
    ///
    /// # Errors
    ///
    /// * Any normalization error of `value`.
    /// * [`ErrorKind::CorruptedDocument`] if the stored bytes cannot be materialized.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.set("a", 1)?;
    /// doc.set("a.b", 2)?;
    /// assert_eq!(doc.get("a.b")?, Some(&Value::I64(2)));
    /// ```
    pub fn set<T: Normalize>(&mut self, path: &str, value: T) -> CloverResult<()> {
        let segments = split_path(path);
        let value = value.normalize()?.into_plain();

        let mut fields = self.materialize()?.clone();
        assign(&mut fields, &segments, value)?;

        let encoded = codec::encode_map(&fields)?;
        self.encoded = encoded.into();
        self.fields = OnceCell::with_value(fields);
        Ok(())
    }

    /// Same as [Document::set] but never fails; the error is logged and
    /// `false` is returned, leaving the document unchanged.
    pub fn set_lenient<T: Normalize>(&mut self, path: &str, value: T) -> bool {
        match self.set(path, value) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Ignoring value for field {}: {}", path, err);
                false
            }
        }
    }

    /// Applies [Document::set] to every entry in iteration order.
    ///
    /// Not transactional: the first failure stops the loop and is returned,
    /// entries applied before it stay applied.
    pub fn set_all<I, K, T>(&mut self, entries: I) -> CloverResult<()>
    where
        I: IntoIterator<Item = (K, T)>,
        K: AsRef<str>,
        T: Normalize,
    {
        for (path, value) in entries {
            self.set(path.as_ref(), value)?;
        }
        Ok(())
    }

    /// Returns a deep copy of the field map.
    pub fn to_map(&self) -> CloverResult<BTreeMap<String, Value>> {
        Ok(self.materialize()?.clone())
    }

    /// Returns the number of top-level fields.
    pub fn size(&self) -> CloverResult<usize> {
        Ok(self.materialize()?.len())
    }

    /// Returns the field names of the document in lexicographic order.
    ///
    /// With `include_nested`, nested maps are expanded into the paths of their
    /// leaves joined with the field separator; an empty nested map is listed
    /// as a leaf itself.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.set("b", 1)?;
    /// doc.set("a.y", 2)?;
    /// doc.set("a.x", 3)?;
    /// assert_eq!(doc.fields(false)?, vec!["a", "b"]);
    /// assert_eq!(doc.fields(true)?, vec!["a.x", "a.y", "b"]);
    /// ```
    pub fn fields(&self, include_nested: bool) -> CloverResult<Vec<String>> {
        let fields = self.materialize()?;
        if !include_nested {
            return Ok(fields.keys().cloned().collect());
        }

        let separator = FIELD_SEPARATOR.read_with(|s| s.clone());
        let mut paths = Vec::with_capacity(fields.len());
        collect_leaf_paths(fields, None, &separator, &mut paths);
        Ok(paths.into_iter().sorted().collect())
    }

    /// Returns a copy of the document. Equivalent to [Clone::clone].
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Returns the `_id` of the document, or an empty string when it is
    /// missing or not a string.
    pub fn object_id(&self) -> CloverResult<String> {
        Ok(self
            .get(DOC_ID)?
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default())
    }

    /// Returns the expiration instant, or `None` when `_expiresAt` is absent
    /// or does not hold an instant.
    pub fn expires_at(&self) -> CloverResult<Option<DateTime<Utc>>> {
        Ok(self.get(DOC_EXPIRES_AT)?.and_then(Value::as_instant).copied())
    }

    /// Sets the `_expiresAt` field.
    pub fn set_expires_at(&mut self, expiration: DateTime<Utc>) -> CloverResult<()> {
        self.set(DOC_EXPIRES_AT, expiration)
    }

    /// Returns the remaining time to live of the document.
    ///
    /// * `-1ms` when the document never expires.
    /// * Zero when the document is already expired or expires right now.
    /// * Otherwise the remaining duration, truncated to whole milliseconds.
    pub fn ttl(&self) -> CloverResult<TimeDelta> {
        let expires_at = match self.expires_at()? {
            Some(expires_at) => expires_at,
            None => return Ok(TimeDelta::milliseconds(NO_EXPIRATION_MILLIS)),
        };

        let now = Utc::now();
        if expires_at <= now {
            return Ok(TimeDelta::zero());
        }
        Ok(TimeDelta::milliseconds((expires_at - now).num_milliseconds()))
    }

    /// Decodes the encoded form of the document into an application type.
    pub fn unmarshal<T: DeserializeOwned>(&self) -> CloverResult<T> {
        rmp_serde::from_slice(&self.encoded).map_err(|err| {
            log::error!("Failed to unmarshal document: {}", err);
            CloverError::from(err)
        })
    }

    fn materialize(&self) -> CloverResult<&BTreeMap<String, Value>> {
        self.fields.get_or_try_init(|| {
            log::trace!("Materializing document of {} bytes", self.encoded.len());
            match codec::decode(&self.encoded) {
                Ok(Value::Map(fields)) => Ok(fields),
                Ok(other) => {
                    log::error!("Document bytes decoded to {} instead of a map", other.type_name());
                    Err(CloverError::new(
                        &format!("document bytes decoded to {} instead of a map", other.type_name()),
                        ErrorKind::CorruptedDocument,
                    ))
                }
                Err(err) => {
                    log::error!("Failed to materialize document: {}", err);
                    Err(CloverError::new_with_cause(
                        "failed to materialize document",
                        ErrorKind::CorruptedDocument,
                        err,
                    ))
                }
            }
        })
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        match (self.materialize(), other.materialize()) {
            (Ok(left), Ok(right)) => left == right,
            _ => self.encoded == other.encoded,
        }
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.materialize() {
            Ok(fields) => write!(f, "{}", Value::Map(fields.clone())),
            Err(_) => write!(f, "<corrupted document of {} bytes>", self.encoded.len()),
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.fields.get() {
            Some(fields) => write!(f, "Document({})", Value::Map(fields.clone())),
            None => write!(f, "Document(<{} encoded bytes>)", self.encoded.len()),
        }
    }
}

/// Returns the encoded form of a document. Never fails and does not copy.
pub fn encode(document: &Document) -> Arc<[u8]> {
    document.encoded.clone()
}

/// Wraps encoded bytes into an unmaterialized document. Never fails; invalid
/// bytes are detected on first field access.
pub fn decode(bytes: impl Into<Arc<[u8]>>) -> Document {
    Document {
        encoded: bytes.into(),
        fields: OnceCell::new(),
    }
}

/// Checks the reserved fields of a document.
///
/// # Errors
///
/// * [`ErrorKind::InvalidIdentifier`] when `_id` is missing or is not a UUID.
/// * [`ErrorKind::InvalidExpiration`] when `_expiresAt` is present but is
///   not an instant.
pub fn validate(document: &Document) -> CloverResult<()> {
    let id = document.object_id()?;
    if let Err(err) = Uuid::parse_str(&id) {
        log::error!("Invalid document id {:?}: {}", id, err);
        return Err(CloverError::new_with_cause(
            &format!("invalid {}: {}", DOC_ID, id),
            ErrorKind::InvalidIdentifier,
            err.into(),
        ));
    }

    if let Some(value) = document.get(DOC_EXPIRES_AT)? {
        if value.as_instant().is_none() {
            log::error!("Invalid document expiration {}", value);
            return Err(CloverError::new(
                &format!("invalid {}: {}", DOC_EXPIRES_AT, value),
                ErrorKind::InvalidExpiration,
            ));
        }
    }
    Ok(())
}

#[doc(hidden)]
pub fn field_name(key: &str) -> String {
    key.trim_matches('"').to_string()
}

fn split_path(path: &str) -> PathSegments {
    FIELD_SEPARATOR.read_with(|separator| path.split(separator.as_str()).map(str::to_string).collect())
}

fn assign(fields: &mut BTreeMap<String, Value>, segments: &[String], value: Value) -> CloverResult<()> {
    let (leaf, parents) = match segments.split_last() {
        Some(split) => split,
        None => {
            return Err(CloverError::new("empty field path", ErrorKind::InvalidFieldName));
        }
    };

    let mut current = fields;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Map(BTreeMap::new()));
        if !entry.is_map() {
            *entry = Value::Map(BTreeMap::new());
        }
        current = match entry {
            Value::Map(nested) => nested,
            _ => {
                return Err(CloverError::new(
                    &format!("field {} is not a map", segment),
                    ErrorKind::InternalError,
                ))
            }
        };
    }
    current.insert(leaf.clone(), value);
    Ok(())
}

fn collect_leaf_paths(
    fields: &BTreeMap<String, Value>,
    prefix: Option<&str>,
    separator: &str,
    paths: &mut Vec<String>,
) {
    for (key, value) in fields {
        let path = match prefix {
            Some(prefix) => format!("{}{}{}", prefix, separator, key),
            None => key.clone(),
        };
        match value {
            Value::Map(nested) if !nested.is_empty() => {
                collect_leaf_paths(nested, Some(&path), separator, paths)
            }
            _ => paths.push(path),
        }
    }
}

/// Creates a [Document] with JSON-like syntax.
///
/// Keys are identifiers or string literals (which may be dotted paths);
/// values are nested `{ ... }` maps, `[ ... ]` arrays, or any expression
/// implementing [`crate::common::Normalize`] (wrap compound expressions in
/// parentheses).
///
/// # Panics
///
/// Panics when a value fails to normalize or a key is not a valid path.
///
/// # Examples
///
/// ```rust
/// use clover::doc;
///
/// let empty = doc!{};
///
/// let base = 100;
/// let todo = doc!{
///     title: "buy milk",
///     priority: (base * 2),
///     "owner.name": "ada",
///     tags: ["home", "food"],
///     meta: {
///         source: "cli",
///     },
/// };
/// assert!(todo.has("owner.name").unwrap());
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::document::Document::new()
    };

    () => {
        $crate::document::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            let mut doc = $crate::document::Document::new();
            $(
                doc.set(&$crate::document::field_name(stringify!($key)), $crate::doc_value!($value))
                    .unwrap_or_else(|err| panic!("failed to set field {}: {}", stringify!($key), err));
            )*
            doc
        }
    };
}

/// Converts the values of the [doc!] macro.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::common::Value::Map(
            $crate::doc!{ $($key : $value),* }
                .to_map()
                .unwrap_or_else(|err| panic!("failed to build nested document: {}", err)),
        )
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::normalize(&$value)
            .unwrap_or_else(|err| panic!("failed to normalize {}: {}", stringify!($value), err))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use chrono::TimeZone;

    fn nested() -> Document {
        doc! {
            score: 1034,
            location: {
                state: "NY",
                city: "New York",
                address: {
                    line1: "40",
                    zip: 10001,
                },
            },
            category: ["food", "produce"],
        }
    }

    #[test]
    fn new_document_is_empty_map() {
        let doc = Document::new();
        assert_eq!(doc.size().unwrap(), 0);
        assert_eq!(&*encode(&doc), &[0x80]);
        assert!(doc.is_materialized());
    }

    #[test]
    fn get_walks_nested_maps() {
        let doc = nested();
        assert_eq!(doc.get("score").unwrap(), Some(&Value::I64(1034)));
        assert_eq!(doc.get("location.city").unwrap(), Some(&Value::from("New York")));
        assert_eq!(doc.get("location.address.zip").unwrap(), Some(&Value::I64(10001)));
        assert_eq!(doc.get("location.country").unwrap(), None);
        assert_eq!(doc.get("score.value").unwrap(), None);
        assert_eq!(doc.get("category.0").unwrap(), None);
        assert_eq!(doc.get("").unwrap(), None);
    }

    #[test]
    fn set_creates_and_replaces_intermediates() {
        let mut doc = Document::new();
        doc.set("a", 1).unwrap();
        doc.set("a.b", 2).unwrap();
        assert_eq!(doc.get("a").unwrap().map(Value::is_map), Some(true));
        assert_eq!(doc.get("a.b").unwrap(), Some(&Value::I64(2)));

        doc.set("x.y.z", "deep").unwrap();
        assert_eq!(doc.get("x.y.z").unwrap(), Some(&Value::from("deep")));
    }

    #[test]
    fn set_then_get_returns_normalized_value() {
        let mut doc = Document::new();
        doc.set("bytes", vec![1u8, 2]).unwrap();
        doc.set("small", 3u16).unwrap();
        doc.set("nothing", None::<i32>).unwrap();
        assert_eq!(doc.get("bytes").unwrap(), Some(&Value::Bytes(vec![1, 2])));
        assert_eq!(doc.get("small").unwrap(), Some(&Value::U64(3)));
        assert_eq!(doc.get("nothing").unwrap(), Some(&Value::Null));
    }

    #[test]
    fn set_keeps_encoding_consistent() {
        let mut doc = Document::new();
        doc.set("name", "ada").unwrap();
        doc.set("meta.tags", vec!["a", "b"]).unwrap();

        let reloaded = decode(encode(&doc));
        assert!(!reloaded.is_materialized());
        assert_eq!(reloaded.to_map().unwrap(), doc.to_map().unwrap());
        assert!(reloaded.is_materialized());
    }

    #[test]
    fn empty_segments_are_field_names() {
        let mut doc = Document::new();
        doc.set("", 1).unwrap();
        doc.set("a..b", 2).unwrap();
        doc.set("c.", 3).unwrap();

        assert_eq!(doc.get("").unwrap(), Some(&Value::I64(1)));
        assert_eq!(doc.get("a..b").unwrap(), Some(&Value::I64(2)));
        assert!(doc.get("a.").unwrap().unwrap().is_map());
        assert_eq!(doc.get("c.").unwrap(), Some(&Value::I64(3)));
        assert_eq!(doc.fields(false).unwrap(), vec!["", "a", "c"]);

        let reloaded = decode(encode(&doc));
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn opaque_values_are_stored_plain() {
        let mut doc = Document::new();
        doc.set("x", Value::opaque(Value::I64(1))).unwrap();
        doc.set(
            "list",
            Value::Array(vec![Value::opaque(Value::from("a")), Value::opaque(Value::F64(0.5))]),
        )
        .unwrap();

        assert_eq!(doc.get("x").unwrap(), Some(&Value::I64(1)));
        assert_eq!(
            doc.get("list").unwrap(),
            Some(&Value::Array(vec![Value::from("a"), Value::F64(0.5)]))
        );
        assert_eq!(decode(encode(&doc)), doc);
    }

    #[test]
    fn failed_set_leaves_document_untouched() {
        let mut doc = nested();
        let before = encode(&doc);
        let mut bad = BTreeMap::new();
        bad.insert(1i32, "one");

        let err = doc.set("location.bad", bad.clone()).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidMapKey);
        assert_eq!(encode(&doc), before);
        assert!(!doc.has("location.bad").unwrap());

        assert!(!doc.set_lenient("location.bad", bad));
        assert!(doc.set_lenient("location.good", 1));
        assert!(doc.has("location.good").unwrap());
    }

    #[test]
    fn set_all_stops_at_first_failure() {
        let mut doc = Document::new();
        let mut bad = BTreeMap::new();
        bad.insert(2i32, 2i32);
        let entries = vec![("a", BTreeMap::new()), ("b", bad), ("d", BTreeMap::new())];
        let err = doc.set_all(entries).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidMapKey);
        assert!(doc.has("a").unwrap());
        assert!(!doc.has("d").unwrap());
    }

    #[test]
    fn has_counts_null_as_present() {
        let mut doc = Document::new();
        doc.set("nullable", Value::Null).unwrap();
        assert!(doc.has("nullable").unwrap());
        assert!(!doc.has("missing").unwrap());
        assert!(!doc.has("nullable.child").unwrap());
    }

    #[test]
    fn fields_are_sorted() {
        let mut doc = nested();
        doc.set("empty", Value::Map(BTreeMap::new())).unwrap();
        assert_eq!(
            doc.fields(false).unwrap(),
            vec!["category", "empty", "location", "score"]
        );
        assert_eq!(
            doc.fields(true).unwrap(),
            vec![
                "category",
                "empty",
                "location.address.line1",
                "location.address.zip",
                "location.city",
                "location.state",
                "score",
            ]
        );
    }

    #[test]
    fn copy_is_independent() {
        let original = nested();
        let mut copy = original.copy();
        copy.set("score", 1).unwrap();
        copy.set("location.city", "Boston").unwrap();

        assert_eq!(original.get("score").unwrap(), Some(&Value::I64(1034)));
        assert_eq!(original.get("location.city").unwrap(), Some(&Value::from("New York")));
        assert_eq!(copy.get("score").unwrap(), Some(&Value::I64(1)));
    }

    #[test]
    fn to_map_is_deep_copy() {
        let doc = nested();
        let mut map = doc.to_map().unwrap();
        map.insert("score".to_string(), Value::Null);
        assert_eq!(doc.get("score").unwrap(), Some(&Value::I64(1034)));
    }

    #[test]
    fn object_id_defaults_to_empty() {
        let mut doc = Document::new();
        assert_eq!(doc.object_id().unwrap(), "");
        doc.set(DOC_ID, 12).unwrap();
        assert_eq!(doc.object_id().unwrap(), "");
        doc.set(DOC_ID, "abc").unwrap();
        assert_eq!(doc.object_id().unwrap(), "abc");
    }

    #[test]
    fn ttl_reports_sentinel_zero_and_remaining() {
        let mut doc = Document::new();
        assert_eq!(doc.ttl().unwrap(), TimeDelta::milliseconds(-1));

        doc.set_expires_at(Utc::now() - TimeDelta::seconds(5)).unwrap();
        assert_eq!(doc.ttl().unwrap(), TimeDelta::zero());

        doc.set_expires_at(Utc::now() + TimeDelta::hours(1)).unwrap();
        let ttl = doc.ttl().unwrap();
        assert!(ttl > TimeDelta::minutes(59));
        assert!(ttl <= TimeDelta::hours(1));
        assert_eq!(ttl.subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn expires_at_requires_instant() {
        let mut doc = Document::new();
        doc.set(DOC_EXPIRES_AT, "tomorrow").unwrap();
        assert_eq!(doc.expires_at().unwrap(), None);

        let instant = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        doc.set_expires_at(instant).unwrap();
        assert_eq!(doc.expires_at().unwrap(), Some(instant));
    }

    #[test]
    fn validate_checks_reserved_fields() {
        let mut doc = Document::new();
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIdentifier);

        doc.set(DOC_ID, "not-a-uuid").unwrap();
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidIdentifier);
        assert!(err.message().contains("not-a-uuid"));

        doc.set(DOC_ID, Uuid::new_v4().to_string()).unwrap();
        assert!(validate(&doc).is_ok());

        doc.set(DOC_EXPIRES_AT, 17).unwrap();
        let err = validate(&doc).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidExpiration);
        assert!(err.message().contains("17"));

        doc.set_expires_at(Utc::now()).unwrap();
        assert!(validate(&doc).is_ok());
    }

    #[test]
    fn corrupted_bytes_fail_on_access() {
        let doc = decode(vec![0x92, 0x01]);
        assert_eq!(doc.get("a").unwrap_err().kind(), &ErrorKind::CorruptedDocument);

        let doc = decode(vec![0x01]);
        assert_eq!(doc.size().unwrap_err().kind(), &ErrorKind::CorruptedDocument);
        assert!(!doc.is_materialized());
    }

    #[test]
    fn from_value_requires_map() {
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), 1u8);
        let doc = Document::from_value(&map).unwrap();
        assert!(!doc.is_materialized());
        assert_eq!(doc.get("k").unwrap(), Some(&Value::U64(1)));

        let err = Document::from_value(&vec![1, 2]).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedType);
    }

    #[test]
    fn unmarshal_into_application_type() {
        #[derive(serde::Deserialize, Debug, PartialEq)]
        struct Todo {
            title: String,
            done: bool,
        }

        let doc = doc! { title: "write tests", done: true };
        let todo: Todo = doc.unmarshal().unwrap();
        assert_eq!(
            todo,
            Todo {
                title: "write tests".to_string(),
                done: true
            }
        );
    }

    #[test]
    fn display_is_compact() {
        let doc = doc! { a: 1, b: "x" };
        assert_eq!(doc.to_string(), r#"{"a": 1, "b": "x"}"#);
    }

    mod custom_separator_test {
        use super::*;
        use crate::config::CloverConfig;

        #[test]
        #[cfg_attr(not(feature = "custom_separator"), ignore)]
        fn custom_separator_test_get_and_set() {
            CloverConfig::new().set_field_separator(":").expect("Failed to set separator");
            let mut doc = nested();
            assert_eq!(doc.get("location:address:zip").unwrap(), Some(&Value::I64(10001)));
            assert_eq!(doc.get("location.address.zip").unwrap(), None);

            doc.set("a.b:c", 1).unwrap();
            assert_eq!(doc.get("a.b:c").unwrap(), Some(&Value::I64(1)));
            assert!(doc.get("a.b").unwrap().map(Value::is_map).unwrap_or(false));
        }

        #[test]
        #[cfg_attr(not(feature = "custom_separator"), ignore)]
        fn custom_separator_test_fields() {
            CloverConfig::new().set_field_separator(":").expect("Failed to set separator");
            let doc = doc! { outer: { inner: 1 } };
            assert_eq!(doc.fields(true).unwrap(), vec!["outer:inner"]);
        }
    }
}
