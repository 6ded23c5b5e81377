use crate::collection::{Document, ObjectId};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Compare two floats with NaN sorted below every other number.
#[inline]
fn num_cmp_float(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

/// Exact comparison of an integer with a float, without rounding the
/// integer through `f64`. NaN sorts below every number.
fn num_cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return Ordering::Greater;
    }
    if f >= TWO_POW_63 {
        return Ordering::Less;
    }
    if f < -TWO_POW_63 {
        return Ordering::Greater;
    }
    let truncated = f.trunc();
    match i.cmp(&(truncated as i64)) {
        Ordering::Equal => {
            let fract = f - truncated;
            if fract > 0.0 {
                Ordering::Less
            } else if fract < 0.0 {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
        ordering => ordering,
    }
}

/// Represents a [Document] value.
///
/// The variant set is closed: every value a document can hold and every
/// value a store reply can carry is one of these.
///
/// # Numeric equality
///
/// `I32`, `I64` and `F64` compare by numeric value, so `I32(1)`, `I64(1)`
/// and `F64(1.0)` are equal, order the same and hash the same. This is what
/// `distinct`, sorting and grouping rely on.
///
/// # Ordering
///
/// Values of different types order by type first:
/// null < numbers < string < document < array < binary < object id <
/// boolean < date.
///
/// # Usage
///
/// ```text
/// let v1: Value = 42.into();
/// let v2 = Value::from("hello");
/// let doc = doc!{ age: 42, name: "Alice" };
/// if let Some(name) = doc.get("name").and_then(|v| v.as_str()) { .. }
/// ```
#[derive(Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// Represents a null value.
    #[default]
    Null,
    /// Represents a boolean value.
    Bool(bool),
    /// Represents a signed 32-bit integer value.
    I32(i32),
    /// Represents a signed 64-bit integer value.
    I64(i64),
    /// Represents a 64-bit floating point value.
    F64(f64),
    /// Represents a string value.
    String(String),
    /// Represents an embedded document.
    Document(Document),
    /// Represents an array value.
    Array(Vec<Value>),
    /// Represents binary data.
    Binary(Vec<u8>),
    /// Represents a store generated identifier.
    ObjectId(ObjectId),
    /// Represents a UTC timestamp.
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Position of the value's type in the cross-type sort order.
    pub fn type_order(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::I32(_) | Value::I64(_) | Value::F64(_) => 1,
            Value::String(_) => 2,
            Value::Document(_) => 3,
            Value::Array(_) => 4,
            Value::Binary(_) => 5,
            Value::ObjectId(_) => 6,
            Value::Bool(_) => 7,
            Value::DateTime(_) => 8,
        }
    }

    /// Name of the value's type, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::I32(_) => "int",
            Value::I64(_) => "long",
            Value::F64(_) => "double",
            Value::String(_) => "string",
            Value::Document(_) => "object",
            Value::Array(_) => "array",
            Value::Binary(_) => "binData",
            Value::ObjectId(_) => "objectId",
            Value::DateTime(_) => "date",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(i) => Some(*i),
            Value::I64(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }

    /// Returns the value as an `i64` if it is an integer, or a float with no
    /// fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I32(i) => Some(*i as i64),
            Value::I64(i) => Some(*i),
            Value::F64(f)
                if f.fract() == 0.0 && f.is_finite() && *f >= -TWO_POW_63 && *f < TWO_POW_63 =>
            {
                Some(*f as i64)
            }
            _ => None,
        }
    }

    fn integer_part(&self) -> i64 {
        match self {
            Value::I32(i) => *i as i64,
            Value::I64(i) => *i,
            _ => 0,
        }
    }

    /// Strict equality: same variants, same field order, recursively.
    /// Unlike `==`, `I32(1)` and `F64(1.0)` are not identical.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Document(a), Value::Document(b)) => a.is_identical(b),
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_identical(y))
            }
            (Value::Binary(a), Value::Binary(b)) => a == b,
            (Value::ObjectId(a), Value::ObjectId(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            _ => false,
        }
    }

    /// Returns any numeric value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::I32(i) => Some(*i as f64),
            Value::I64(i) => Some(*i as f64),
            Value::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(bytes) => Some(bytes.as_slice()),
            _ => None,
        }
    }

    pub fn as_object_id(&self) -> Option<&ObjectId> {
        match self {
            Value::ObjectId(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<&DateTime<Utc>> {
        match self {
            Value::DateTime(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::I32(_) | Value::I64(_) | Value::F64(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    pub fn is_document(&self) -> bool {
        matches!(self, Value::Document(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    /// Truthiness used when reading flag fields such as `ok` or `unique`:
    /// booleans as-is, numbers when non-zero.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::I32(i) => *i != 0,
            Value::I64(i) => *i != 0,
            Value::F64(f) => *f != 0.0,
            Value::Null => false,
            _ => true,
        }
    }

    /// Takes the value out, leaving [Value::Null] in its place.
    pub fn take(&mut self) -> Value {
        std::mem::take(self)
    }

    /// Adds two numeric values.
    ///
    /// `I32 + I32` stays `I32` unless it overflows, integers widen to `I64`
    /// and anything involving a float yields `F64`. Returns `None` if either
    /// side is not a number.
    pub fn checked_add(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::I32(a), Value::I32(b)) => Some(
                a.checked_add(*b)
                    .map(Value::I32)
                    .unwrap_or_else(|| Value::I64(*a as i64 + *b as i64)),
            ),
            (Value::I32(_) | Value::I64(_), Value::I32(_) | Value::I64(_)) => {
                let a = self.as_i64()?;
                let b = other.as_i64()?;
                a.checked_add(b).map(Value::I64)
            }
            _ if self.is_number() && other.is_number() => {
                Some(Value::F64(self.as_f64()? + other.as_f64()?))
            }
            _ => None,
        }
    }

    /// Renders the value as relaxed JSON text.
    pub fn to_json(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::I32(i) => i.to_string(),
            Value::I64(i) => i.to_string(),
            Value::F64(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{:.1}", f)
                } else {
                    f.to_string()
                }
            }
            Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Value::Document(doc) => doc.to_json(),
            Value::Array(array) => format!("[{}]", array.iter().map(|v| v.to_json()).join(", ")),
            Value::Binary(bytes) => format!(
                "{{\"$binary\": \"{}\"}}",
                bytes.iter().map(|b| format!("{:02x}", b)).join("")
            ),
            Value::ObjectId(id) => format!("ObjectId(\"{}\")", id.to_hex()),
            Value::DateTime(dt) => format!("ISODate(\"{}\")", dt.to_rfc3339()),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::I32(i) => write!(f, "I32({})", i),
            Value::I64(i) => write!(f, "I64({})", i),
            Value::F64(v) => write!(f, "F64({})", v),
            Value::String(s) => write!(f, "String({:?})", s),
            Value::Document(doc) => write!(f, "Document({:?})", doc),
            Value::Array(array) => f.debug_list().entries(array.iter()).finish(),
            Value::Binary(bytes) => write!(f, "Binary({} bytes)", bytes.len()),
            Value::ObjectId(id) => write!(f, "ObjectId({})", id),
            Value::DateTime(dt) => write!(f, "DateTime({})", dt.to_rfc3339()),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::String(s) => write!(f, "{}", s),
            _ => write!(f, "{}", self.to_json()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        let type_order = self.type_order().cmp(&other.type_order());
        if type_order != Ordering::Equal {
            return type_order;
        }

        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Document(a), Value::Document(b)) => a.cmp(b),
            (Value::Array(a), Value::Array(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a.cmp(b),
            (Value::ObjectId(a), Value::ObjectId(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::F64(a), Value::F64(b)) => num_cmp_float(*a, *b),
            (Value::F64(a), _) => num_cmp_int_float(other.integer_part(), *a).reverse(),
            (_, Value::F64(b)) => num_cmp_int_float(self.integer_part(), *b),
            _ => self.integer_part().cmp(&other.integer_part()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_order().hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::I32(_) | Value::I64(_) | Value::F64(_) => match self.as_i64() {
                // integral numbers hash alike regardless of width
                Some(i) => i.hash(state),
                None => match self.as_f64() {
                    Some(f) if !f.is_nan() => f.to_bits().hash(state),
                    _ => f64::NAN.to_bits().hash(state),
                },
            },
            Value::String(s) => s.hash(state),
            Value::Document(doc) => doc.hash(state),
            Value::Array(array) => array.hash(state),
            Value::Binary(bytes) => bytes.hash(state),
            Value::ObjectId(id) => id.hash(state),
            Value::DateTime(dt) => dt.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::I32(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::I64(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::I64(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::I64(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::F64(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::F64(value as f64)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::String(value.clone())
    }
}

impl From<Document> for Value {
    fn from(value: Document) -> Self {
        Value::Document(value)
    }
}

impl From<ObjectId> for Value {
    fn from(value: ObjectId) -> Self {
        Value::ObjectId(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Value::Binary(value.to_vec())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_numeric_cross_width_equality() {
        assert_eq!(Value::I32(1), Value::I64(1));
        assert_eq!(Value::I64(1), Value::F64(1.0));
        assert_ne!(Value::I32(1), Value::F64(1.5));
        assert_eq!(hash_of(&Value::I32(7)), hash_of(&Value::F64(7.0)));
    }

    #[test]
    fn test_type_ordering() {
        assert!(Value::Null < Value::I32(0));
        assert!(Value::I64(100) < Value::String("a".into()));
        assert!(Value::String("z".into()) < Value::Document(doc! {}));
        assert!(Value::Bool(true) < Value::DateTime(Utc::now()));
        assert!(Value::F64(1.5) < Value::I32(2));
        assert!(Value::F64(f64::NAN) < Value::I32(i32::MIN));
    }

    #[test]
    fn test_hash_set_dedups_numbers() {
        let mut set = HashSet::new();
        set.insert(Value::I32(3));
        set.insert(Value::I64(3));
        set.insert(Value::F64(3.0));
        set.insert(Value::F64(3.5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_large_integers_compare_exactly_with_floats() {
        let big = Value::I64(9_007_199_254_740_993);
        let near = Value::F64(9_007_199_254_740_992.0);
        assert_ne!(big, near);
        assert_eq!(big.cmp(&near), Ordering::Greater);
        assert_eq!(near.cmp(&big), Ordering::Less);
        assert_eq!(Value::I64(9_007_199_254_740_992), near);
        assert_eq!(hash_of(&Value::I64(9_007_199_254_740_992)), hash_of(&near));

        // 2^63 does not fit an i64
        assert_eq!(Value::I64(i64::MAX).cmp(&Value::F64(9.223372036854775808e18)), Ordering::Less);
        assert_eq!(Value::F64(9.223372036854775808e18).as_i64(), None);
        assert_eq!(Value::I64(i64::MIN), Value::F64(-9.223372036854775808e18));

        assert_eq!(Value::I32(0).cmp(&Value::F64(-0.5)), Ordering::Greater);
        assert_eq!(Value::I32(-1).cmp(&Value::F64(-0.5)), Ordering::Less);
        assert_eq!(Value::I32(3).cmp(&Value::F64(f64::NAN)), Ordering::Greater);
    }

    #[test]
    fn test_numeric_order_is_transitive_near_float_precision() {
        let mut values = vec![
            Value::I64(9_007_199_254_740_993),
            Value::F64(9_007_199_254_740_992.0),
            Value::I64(9_007_199_254_740_992),
            Value::F64(9_007_199_254_740_994.0),
        ];
        values.sort();
        assert!(matches!(values[0], Value::F64(_) | Value::I64(9_007_199_254_740_992)));
        assert!(matches!(values[2], Value::I64(9_007_199_254_740_993)));
        assert!(matches!(values[3], Value::F64(_)));

        let set: std::collections::BTreeSet<Value> = values.into_iter().collect();
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_is_identical_checks_variants() {
        assert!(Value::I32(1).is_identical(&Value::I32(1)));
        assert!(!Value::I32(1).is_identical(&Value::I64(1)));
        assert!(!Value::I32(1).is_identical(&Value::F64(1.0)));
        assert!(Value::from(vec![Value::I32(1)]).is_identical(&Value::from(vec![Value::I32(1)])));
        assert!(!Value::from(vec![Value::I32(1)]).is_identical(&Value::from(vec![Value::F64(1.0)])));
        assert!(!Value::from(doc! { a: 1, b: 2 }).is_identical(&Value::from(doc! { b: 2, a: 1 })));
    }

    #[test]
    fn test_checked_add() {
        assert_eq!(Value::I32(2).checked_add(&Value::I32(3)), Some(Value::I32(5)));
        assert!(matches!(
            Value::I32(i32::MAX).checked_add(&Value::I32(1)),
            Some(Value::I64(_))
        ));
        assert!(matches!(
            Value::I64(2).checked_add(&Value::I32(3)),
            Some(Value::I64(5))
        ));
        assert!(matches!(
            Value::I32(2).checked_add(&Value::F64(0.5)),
            Some(Value::F64(_))
        ));
        assert_eq!(Value::String("a".into()).checked_add(&Value::I32(1)), None);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(Value::I32(5).as_i64(), Some(5));
        assert_eq!(Value::F64(5.0).as_i64(), Some(5));
        assert_eq!(Value::F64(5.5).as_i64(), None);
        assert_eq!(Value::from("x").as_str(), Some("x"));
        assert_eq!(Value::I64(1 << 40).as_i32(), None);
        assert!(Value::from(doc! { a: 1 }).is_document());
        assert!(Value::from(vec![1, 2]).is_array());
        assert!(Value::from(None::<i32>).is_null());
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::F64(1.0).is_truthy());
        assert!(!Value::I32(0).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_to_json() {
        let value = Value::from(doc! { name: "a\"b", n: 1, f: 2.0, list: [1, "x"] });
        assert_eq!(
            value.to_json(),
            "{\"name\": \"a\\\"b\", \"n\": 1, \"f\": 2.0, \"list\": [1, \"x\"]}"
        );
    }

    #[test]
    fn test_take_leaves_null() {
        let mut value = Value::from(10);
        let taken = value.take();
        assert_eq!(taken, Value::I32(10));
        assert!(value.is_null());
    }
}
