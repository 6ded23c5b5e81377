use indexmap::IndexMap;
use itertools::Itertools;
use smallvec::SmallVec;

use crate::common::{Value, DOC_ID, FIELD_SEPARATOR};
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};

type FieldVec = SmallVec<[String; 8]>;

/// An ordered mapping from field names to [Value]s.
///
/// Documents are the unit of storage and transfer: every request the
/// collection layer sends and every reply it receives is a document.
///
/// Fields keep their insertion order, which matters wherever order carries
/// meaning (index key patterns, sort specifications, the command name being
/// the first field of a command). Equality, ordering and hashing on the
/// other hand ignore field order, so two documents holding the same fields
/// compare equal.
///
/// Keys containing the field separator (`.`) address embedded documents in
/// [Document::put], [Document::get] and [Document::remove]:
///
/// ```ignore
/// let mut doc = Document::new();
/// doc.put("address.city", "Lyon")?;
/// assert_eq!(doc.get("address.city"), Some(&Value::from("Lyon")));
/// ```
///
/// Use [Document::insert] to store a key verbatim, dots included.
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Document {
    data: IndexMap<String, Value>,
}

impl Document {
    /// Creates a new empty document.
    pub fn new() -> Self {
        Document {
            data: IndexMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Document {
            data: IndexMap::with_capacity(capacity),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Associates `value` with `key`, creating embedded documents along a
    /// dotted key as needed.
    ///
    /// # Errors
    ///
    /// * the key is empty or has an empty path segment
    /// * a path segment traverses a value that is neither a document nor an
    ///   array with that index
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut doc = Document::new();
    /// doc.put("name", "Alice")?;
    /// doc.put("stats.logins", 3)?;
    /// assert_eq!(doc.get("stats"), Some(&Value::from(doc!{ logins: 3 })));
    /// ```
    pub fn put<'a, T: Into<Value>>(
        &mut self,
        key: impl Into<Cow<'a, str>>,
        value: T,
    ) -> BasaltResult<()> {
        let key = key.into();
        if key.is_empty() {
            log::error!("Document does not support empty key");
            return Err(BasaltError::new(
                "Document does not support empty key",
                ErrorKind::InvalidOperation,
            ));
        }

        let value = value.into();
        if key.contains(FIELD_SEPARATOR) {
            let splits: Vec<&str> = key.split(FIELD_SEPARATOR).collect();
            self.deep_put(&splits, value)
        } else {
            self.data.insert(key.into_owned(), value);
            Ok(())
        }
    }

    /// Stores `value` under `key` verbatim, without interpreting dots.
    /// Returns the previous value for the key, if any.
    pub fn insert<T: Into<Value>>(&mut self, key: impl Into<String>, value: T) -> Option<Value> {
        self.data.insert(key.into(), value.into())
    }

    /// Returns the value at `key`, following dotted paths through embedded
    /// documents and array indices. Returns `None` if any segment is missing.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if let Some(value) = self.data.get(key) {
            return Some(value);
        }
        if !key.contains(FIELD_SEPARATOR) {
            return None;
        }

        let mut splits = key.split(FIELD_SEPARATOR);
        let mut current = self.data.get(splits.next()?)?;
        for part in splits {
            current = match current {
                Value::Document(doc) => doc.data.get(part)?,
                Value::Array(array) => array.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable counterpart of [Document::get].
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        if self.data.contains_key(key) || !key.contains(FIELD_SEPARATOR) {
            return self.data.get_mut(key);
        }

        let mut splits = key.split(FIELD_SEPARATOR);
        let mut current = self.data.get_mut(splits.next()?)?;
        for part in splits {
            current = match current {
                Value::Document(doc) => doc.data.get_mut(part)?,
                Value::Array(array) => array.get_mut(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Returns the `_id` value, if present.
    pub fn id(&self) -> Option<&Value> {
        self.data.get(DOC_ID)
    }

    pub fn has_id(&self) -> bool {
        self.data.contains_key(DOC_ID)
    }

    /// Returns the name of the first field. For a command document this is
    /// the command name.
    pub fn first_key(&self) -> Option<&str> {
        self.data.keys().next().map(|k| k.as_str())
    }

    /// Returns the top-level field names in order.
    pub fn fields(&self) -> FieldVec {
        self.data.keys().cloned().collect()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.data.values()
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.data.iter()
    }

    /// Removes the value at `key` (dotted paths allowed), keeping the order
    /// of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if self.data.contains_key(key) || !key.contains(FIELD_SEPARATOR) {
            return self.data.shift_remove(key);
        }

        let (parent, last) = key.rsplit_once(FIELD_SEPARATOR)?;
        match self.get_mut(parent)? {
            Value::Document(doc) => doc.data.shift_remove(last),
            Value::Array(array) => {
                // unset semantics: the slot stays, its value becomes null
                let slot = array.get_mut(last.parse::<usize>().ok()?)?;
                Some(slot.take())
            }
            _ => None,
        }
    }

    /// Checks for a top-level key.
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Checks for a field, following dotted paths.
    pub fn contains_field(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Merges `other` into this document. Embedded documents present on
    /// both sides are merged recursively; every other value from `other`
    /// overwrites.
    pub fn merge(&mut self, other: &Document) {
        for (key, value) in other.data.iter() {
            if let Value::Document(theirs) = value {
                if let Some(Value::Document(mine)) = self.data.get_mut(key) {
                    mine.merge(theirs);
                    continue;
                }
            }
            self.data.insert(key.clone(), value.clone());
        }
    }

    /// Strict comparison: same keys in the same order with identical
    /// values. See [Value::is_identical].
    pub fn is_identical(&self, other: &Document) -> bool {
        self.data.len() == other.data.len()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|((k1, v1), (k2, v2))| k1 == k2 && v1.is_identical(v2))
    }

    /// Renders the document as relaxed JSON text.
    pub fn to_json(&self) -> String {
        let body = self
            .data
            .iter()
            .map(|(k, v)| format!("\"{}\": {}", k, v.to_json()))
            .join(", ");
        format!("{{{}}}", body)
    }

    fn deep_put(&mut self, splits: &[&str], value: Value) -> BasaltResult<()> {
        let (first, rest) = match splits.split_first() {
            Some((first, rest)) if !first.is_empty() => (*first, rest),
            _ => return Err(invalid_path(splits)),
        };

        if rest.is_empty() {
            self.data.insert(first.to_string(), value);
            return Ok(());
        }

        let entry = self
            .data
            .entry(first.to_string())
            .or_insert_with(|| Value::Document(Document::new()));
        put_into_value(entry, rest, value)
    }

    fn sorted_entries(&self) -> Vec<(&String, &Value)> {
        self.data.iter().sorted_by(|a, b| a.0.cmp(b.0)).collect()
    }
}

fn put_into_value(target: &mut Value, splits: &[&str], value: Value) -> BasaltResult<()> {
    match target {
        Value::Document(doc) => doc.deep_put(splits, value),
        Value::Array(array) => {
            let index = splits[0].parse::<usize>().ok();
            match index.and_then(|i| array.get_mut(i)) {
                Some(slot) if splits.len() == 1 => {
                    *slot = value;
                    Ok(())
                }
                Some(slot) => {
                    if slot.is_null() {
                        *slot = Value::Document(Document::new());
                    }
                    put_into_value(slot, &splits[1..], value)
                }
                None => Err(invalid_path(splits)),
            }
        }
        other => {
            log::error!("Cannot create field '{}' in element {}", splits[0], other);
            Err(BasaltError::new(
                &format!("Cannot create field '{}' in element {}", splits[0], other),
                ErrorKind::InvalidOperation,
            ))
        }
    }
}

fn invalid_path(splits: &[&str]) -> BasaltError {
    let path = splits.join(FIELD_SEPARATOR);
    log::error!("Invalid field path '{}'", path);
    BasaltError::new(
        &format!("Invalid field path '{}'", path),
        ErrorKind::InvalidOperation,
    )
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl Eq for Document {}

impl PartialOrd for Document {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Document {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorted_entries().cmp(&other.sorted_entries())
    }
}

impl Hash for Document {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (key, value) in self.sorted_entries() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Document {
            data: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Document {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.data.insert(k.into(), v.into());
        }
    }
}

pub fn normalize(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Creates a [Document] with JSON-like syntax.
///
/// Keys are identifiers or string literals (use string literals for keys
/// such as `"$set"` or `"a.b"`) and are stored verbatim, so a dotted key
/// stays a path inside filters, updates and index specifications. Negative
/// numbers and other multi-token expressions go in parentheses.
///
/// # Examples
///
/// ```rust
/// use basalt::doc;
///
/// let empty = doc!{};
///
/// let simple = doc!{
///     name: "Alice",
///     age: 30
/// };
///
/// let index_keys = doc!{ score: (-1), name: 1 };
///
/// let update = doc!{
///     "$set": { status: "active" },
///     "$inc": { "stats.logins": 1 }
/// };
///
/// let complex = doc!{
///     user: {
///         name: "Charlie",
///         tags: ["admin", "user"]
///     },
///     values: [1, 2, 3]
/// };
/// ```
#[macro_export]
macro_rules! doc {
    ({}) => {
        $crate::collection::Document::new()
    };

    () => {
        $crate::collection::Document::new()
    };

    ({ $($key:tt : $value:tt),* $(,)? }) => {
        $crate::doc!($($key : $value),*)
    };

    ($($key:tt : $value:tt),* $(,)?) => {
        {
            #[allow(unused_imports)]
            use $crate::doc_value;

            let mut doc = $crate::collection::Document::new();
            $(
                doc.insert($crate::collection::normalize(stringify!($key)), $crate::doc_value!($value));
            )*
            doc
        }
    };
}

/// Helper macro converting values for the [doc!] macro.
#[macro_export]
macro_rules! doc_value {
    ({ $($key:tt : $value:tt),* $(,)? }) => {
        {
            $crate::common::Value::Document($crate::doc!{ $($key : $value),* })
        }
    };

    ([ $($value:tt),* $(,)? ]) => {
        $crate::common::Value::Array(vec![$($crate::doc_value!($value)),*])
    };

    ($value:expr) => {
        $crate::common::Value::from($value)
    };
}
