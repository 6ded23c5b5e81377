use crate::collection::Document;
use crate::common::{
    Value, INDEX_KIND_2D, INDEX_KIND_2DSPHERE, INDEX_KIND_HASHED, INDEX_KIND_TEXT,
};
use crate::errors::{BasaltError, BasaltResult, ErrorKind};
use itertools::Itertools;
use std::fmt::Display;

const OPT_NAME: &str = "name";
const OPT_UNIQUE: &str = "unique";
const OPT_SPARSE: &str = "sparse";
const OPT_BACKGROUND: &str = "background";
const OPT_EXPIRE_AFTER_SECONDS: &str = "expireAfterSeconds";
const OPT_KEY: &str = "key";
const OPT_VERSION: &str = "v";
const OPT_NAMESPACE: &str = "ns";

/// The direction or kind token attached to one field of an index key
/// pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Ascending,
    Descending,
    Geo2d,
    Geo2dSphere,
    Text,
    Hashed,
}

impl IndexKind {
    /// Parses a key pattern value: a non-zero number (sign gives the
    /// direction) or one of the kind tokens `2d`, `2dsphere`, `text`,
    /// `hashed`.
    pub fn from_value(value: &Value) -> BasaltResult<IndexKind> {
        match value {
            v if v.is_number() => match v.as_f64() {
                Some(n) if n > 0.0 => Ok(IndexKind::Ascending),
                Some(n) if n < 0.0 => Ok(IndexKind::Descending),
                _ => Err(invalid_key_value(value)),
            },
            Value::String(s) => match s.as_str() {
                INDEX_KIND_2D => Ok(IndexKind::Geo2d),
                INDEX_KIND_2DSPHERE => Ok(IndexKind::Geo2dSphere),
                INDEX_KIND_TEXT => Ok(IndexKind::Text),
                INDEX_KIND_HASHED => Ok(IndexKind::Hashed),
                _ => Err(invalid_key_value(value)),
            },
            _ => Err(invalid_key_value(value)),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            IndexKind::Ascending => Value::I32(1),
            IndexKind::Descending => Value::I32(-1),
            IndexKind::Geo2d => Value::from(INDEX_KIND_2D),
            IndexKind::Geo2dSphere => Value::from(INDEX_KIND_2DSPHERE),
            IndexKind::Text => Value::from(INDEX_KIND_TEXT),
            IndexKind::Hashed => Value::from(INDEX_KIND_HASHED),
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

fn invalid_key_value(value: &Value) -> BasaltError {
    log::error!("Invalid index key value {}", value.to_json());
    BasaltError::new(
        &format!(
            "Values in an index key pattern must be 1, -1 or one of '2d', '2dsphere', 'text', 'hashed'; got {}",
            value.to_json()
        ),
        ErrorKind::ValidationError,
    )
}

/// Validates an index key pattern and returns it in order with its kinds.
pub fn parse_key_pattern(keys: &Document) -> BasaltResult<Vec<(String, IndexKind)>> {
    if keys.is_empty() {
        log::error!("Index key pattern cannot be empty");
        return Err(BasaltError::new(
            "Index key pattern cannot be empty",
            ErrorKind::ValidationError,
        ));
    }

    keys.iter()
        .map(|(field, value)| {
            if field.is_empty() {
                log::error!("Index key pattern contains an empty field name");
                return Err(BasaltError::new(
                    "Index key pattern contains an empty field name",
                    ErrorKind::ValidationError,
                ));
            }
            Ok((field.clone(), IndexKind::from_value(value)?))
        })
        .collect()
}

/// Generates the default index name for a key pattern: each field joined
/// with its direction or kind, e.g. `{a: 1, b: -1}` becomes `a_1_b_-1` and
/// `{loc: "2d"}` becomes `loc_2d`.
pub fn index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, value)| {
            let token = match value {
                Value::String(s) => s.clone(),
                v => v.as_i64().map(|i| i.to_string()).unwrap_or_else(|| v.to_string()),
            };
            format!("{}_{}", field, token)
        })
        .join("_")
}

/// Options attached to an index.
///
/// Known options are typed; anything else goes into `extra` and is sent to
/// the store verbatim.
///
/// # Examples
///
/// ```rust,ignore
/// let options = IndexOptions::new()
///     .unique(true)
///     .expire_after_seconds(3600)
///     .option("collation", doc!{ locale: "fr" });
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    name: Option<String>,
    unique: bool,
    sparse: bool,
    background: bool,
    expire_after_seconds: Option<i64>,
    extra: Document,
}

impl IndexOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    pub fn sparse(mut self, sparse: bool) -> Self {
        self.sparse = sparse;
        self
    }

    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn expire_after_seconds(mut self, seconds: i64) -> Self {
        self.expire_after_seconds = Some(seconds);
        self
    }

    /// Adds a passthrough option.
    pub fn option<T: Into<Value>>(mut self, key: &str, value: T) -> Self {
        self.extra.insert(key, value);
        self
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn is_sparse(&self) -> bool {
        self.sparse
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn get_expire_after_seconds(&self) -> Option<i64> {
        self.expire_after_seconds
    }

    pub fn extra(&self) -> &Document {
        &self.extra
    }

    /// Reads options from a document such as `{unique: true, sparse: 1,
    /// expireAfterSeconds: 60, collation: {..}}`.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ValidationError] when a known option has the
    /// wrong type or `expireAfterSeconds` is negative.
    pub fn from_document(options: &Document) -> BasaltResult<IndexOptions> {
        let mut result = IndexOptions::new();
        for (key, value) in options.iter() {
            match key.as_str() {
                OPT_NAME => match value {
                    Value::String(name) if !name.is_empty() => result.name = Some(name.clone()),
                    _ => return Err(malformed_option(key, value, "a non-empty string")),
                },
                OPT_UNIQUE => result.unique = flag(key, value)?,
                OPT_SPARSE => result.sparse = flag(key, value)?,
                OPT_BACKGROUND => result.background = flag(key, value)?,
                OPT_EXPIRE_AFTER_SECONDS => match value.as_i64() {
                    Some(seconds) if seconds >= 0 => result.expire_after_seconds = Some(seconds),
                    _ => return Err(malformed_option(key, value, "a non-negative integer")),
                },
                _ => {
                    result.extra.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(result)
    }

    pub(crate) fn validate(&self) -> BasaltResult<()> {
        if let Some(seconds) = self.expire_after_seconds {
            if seconds < 0 {
                return Err(malformed_option(
                    OPT_EXPIRE_AFTER_SECONDS,
                    &Value::I64(seconds),
                    "a non-negative integer",
                ));
            }
        }
        if let Some(name) = &self.name {
            if name.is_empty() {
                return Err(malformed_option(OPT_NAME, &Value::from(name), "a non-empty string"));
            }
        }
        Ok(())
    }
}

fn flag(key: &str, value: &Value) -> BasaltResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        v if v.is_number() => Ok(v.is_truthy()),
        _ => Err(malformed_option(key, value, "a boolean")),
    }
}

fn malformed_option(key: &str, value: &Value, expected: &str) -> BasaltError {
    log::error!("Malformed index option {}: {}", key, value.to_json());
    BasaltError::new(
        &format!(
            "Malformed index option '{}': expected {}, got {}",
            key,
            expected,
            value.to_json()
        ),
        ErrorKind::ValidationError,
    )
}

/// An index to create: a key pattern plus options.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    keys: Document,
    options: IndexOptions,
}

impl IndexSpec {
    /// Creates a spec from a key pattern such as `{name: 1, age: -1}`.
    ///
    /// # Errors
    ///
    /// Returns [ErrorKind::ValidationError] for an empty pattern or an
    /// invalid direction/kind token.
    pub fn new(keys: Document) -> BasaltResult<IndexSpec> {
        parse_key_pattern(&keys)?;
        Ok(IndexSpec {
            keys,
            options: IndexOptions::default(),
        })
    }

    pub fn with_options(mut self, options: IndexOptions) -> BasaltResult<IndexSpec> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    pub fn keys(&self) -> &Document {
        &self.keys
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// The explicit name if one was given, otherwise the generated one.
    pub fn name(&self) -> String {
        self.options
            .name
            .clone()
            .unwrap_or_else(|| index_name(&self.keys))
    }

    /// Renders the spec as an entry of a `createIndexes` command.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert(OPT_KEY, self.keys.clone());
        doc.insert(OPT_NAME, self.name());
        if self.options.unique {
            doc.insert(OPT_UNIQUE, true);
        }
        if self.options.sparse {
            doc.insert(OPT_SPARSE, true);
        }
        if self.options.background {
            doc.insert(OPT_BACKGROUND, true);
        }
        if let Some(seconds) = self.options.expire_after_seconds {
            doc.insert(OPT_EXPIRE_AFTER_SECONDS, seconds);
        }
        for (key, value) in self.options.extra.iter() {
            doc.insert(key.clone(), value.clone());
        }
        doc
    }
}

/// An index descriptor as listed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexInfo {
    document: Document,
}

impl IndexInfo {
    pub fn new(document: Document) -> Self {
        IndexInfo { document }
    }

    pub fn name(&self) -> &str {
        self.document
            .get(OPT_NAME)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
    }

    pub fn key(&self) -> Document {
        self.document
            .get(OPT_KEY)
            .and_then(|v| v.as_document())
            .cloned()
            .unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.document.get(OPT_NAMESPACE).and_then(|v| v.as_str())
    }

    pub fn version(&self) -> Option<i32> {
        self.document.get(OPT_VERSION).and_then(|v| v.as_i32())
    }

    pub fn is_unique(&self) -> bool {
        self.document
            .get(OPT_UNIQUE)
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    pub fn is_sparse(&self) -> bool {
        self.document
            .get(OPT_SPARSE)
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    pub fn expire_after_seconds(&self) -> Option<i64> {
        self.document
            .get(OPT_EXPIRE_AFTER_SECONDS)
            .and_then(|v| v.as_i64())
    }

    /// Any option not covered by the accessors above.
    pub fn get(&self, option: &str) -> Option<&Value> {
        self.document.get(option)
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_index_kind_from_value() {
        assert_eq!(IndexKind::from_value(&Value::I32(1)).unwrap(), IndexKind::Ascending);
        assert_eq!(IndexKind::from_value(&Value::F64(-1.0)).unwrap(), IndexKind::Descending);
        assert_eq!(IndexKind::from_value(&Value::from("2d")).unwrap(), IndexKind::Geo2d);
        assert_eq!(IndexKind::from_value(&Value::from("hashed")).unwrap(), IndexKind::Hashed);
        assert!(IndexKind::from_value(&Value::I32(0)).is_err());
        assert!(IndexKind::from_value(&Value::from("bogus")).is_err());
        assert!(IndexKind::from_value(&Value::Bool(true)).is_err());
    }

    #[test]
    fn test_index_name_generation() {
        assert_eq!(index_name(&doc! { a: 1, b: (-1) }), "a_1_b_-1");
        assert_eq!(index_name(&doc! { loc: "2d" }), "loc_2d");
        assert_eq!(index_name(&doc! { "x.y": 1 }), "x.y_1");
        assert_eq!(index_name(&doc! { z: 1.0 }), "z_1");
    }

    #[test]
    fn test_spec_rejects_empty_and_bad_patterns() {
        let err = IndexSpec::new(doc! {}).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = IndexSpec::new(doc! { a: "sideways" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_spec_to_document_forwards_extra_options() {
        let spec = IndexSpec::new(doc! { name: 1 })
            .unwrap()
            .with_options(
                IndexOptions::new()
                    .unique(true)
                    .sparse(true)
                    .expire_after_seconds(60)
                    .option("dropDups", true),
            )
            .unwrap();

        let doc = spec.to_document();
        assert_eq!(doc.get("name"), Some(&Value::from("name_1")));
        assert_eq!(doc.get("unique"), Some(&Value::Bool(true)));
        assert_eq!(doc.get("sparse"), Some(&Value::Bool(true)));
        assert_eq!(doc.get("expireAfterSeconds"), Some(&Value::I64(60)));
        assert_eq!(doc.get("dropDups"), Some(&Value::Bool(true)));
        assert_eq!(doc.get("key"), Some(&Value::from(doc! { name: 1 })));
    }

    #[test]
    fn test_explicit_name_wins() {
        let spec = IndexSpec::new(doc! { a: 1 })
            .unwrap()
            .with_options(IndexOptions::new().name("by_a"))
            .unwrap();
        assert_eq!(spec.name(), "by_a");
    }

    #[test]
    fn test_options_from_document() {
        let options = IndexOptions::from_document(&doc! {
            unique: 1,
            background: true,
            expireAfterSeconds: 30,
            weights: { title: 10 }
        })
        .unwrap();
        assert!(options.is_unique());
        assert!(options.is_background());
        assert!(!options.is_sparse());
        assert_eq!(options.get_expire_after_seconds(), Some(30));
        assert_eq!(options.extra(), &doc! { weights: { title: 10 } });
    }

    #[test]
    fn test_options_from_document_rejects_malformed() {
        let err = IndexOptions::from_document(&doc! { unique: "yes" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = IndexOptions::from_document(&doc! { expireAfterSeconds: (-5) }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);

        let err = IndexOptions::from_document(&doc! { name: "" }).unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_with_options_rejects_negative_ttl() {
        let err = IndexSpec::new(doc! { a: 1 })
            .unwrap()
            .with_options(IndexOptions::new().expire_after_seconds(-1))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_index_info_accessors() {
        let info = IndexInfo::new(doc! {
            v: 2,
            key: { a: 1 },
            name: "a_1",
            ns: "db.coll",
            unique: true,
            expireAfterSeconds: 10,
            sparse: false
        });
        assert_eq!(info.name(), "a_1");
        assert_eq!(info.key(), doc! { a: 1 });
        assert_eq!(info.namespace(), Some("db.coll"));
        assert_eq!(info.version(), Some(2));
        assert!(info.is_unique());
        assert!(!info.is_sparse());
        assert_eq!(info.expire_after_seconds(), Some(10));
    }
}
