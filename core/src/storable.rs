//! Storable value model: the ordered key-value tree every document is built from.
//!
//! RULE: A StorableCollection is built fresh on every save and never mutated
//! after it has been handed to the codec. Key order is insertion order and
//! survives a serialize/deserialize round trip.
//!
//! Typed accessors fail with FieldMissing / TypeMismatch rather than panicking,
//! so a stale or hand-edited document surfaces as a SaveError.

use crate::{
    error::{SaveError, SaveResult},
    types::{Quat, Vec3},
};
use serde::{
    de::{self, MapAccess, SeqAccess, Visitor},
    ser::{self, SerializeMap, SerializeSeq},
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum StorableValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<StorableValue>),
    Collection(StorableCollection),
}

impl StorableValue {
    /// Stable name of the variant, used in TypeMismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null          => "null",
            Self::Bool(_)       => "bool",
            Self::Int(_)        => "int",
            Self::Float(_)      => "float",
            Self::String(_)     => "string",
            Self::List(_)       => "list",
            Self::Collection(_) => "collection",
        }
    }

    fn mismatch(&self, key: &str, expected: &'static str) -> SaveError {
        SaveError::TypeMismatch {
            key: key.to_string(),
            expected,
            found: self.kind(),
        }
    }

    pub fn as_bool(&self, key: &str) -> SaveResult<bool> {
        match self {
            Self::Bool(b) => Ok(*b),
            other => Err(other.mismatch(key, "bool")),
        }
    }

    pub fn as_i64(&self, key: &str) -> SaveResult<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            other => Err(other.mismatch(key, "int")),
        }
    }

    /// Integers widen to float: a whole-number float may come back as Int.
    pub fn as_f64(&self, key: &str) -> SaveResult<f64> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i)   => Ok(*i as f64),
            other => Err(other.mismatch(key, "float")),
        }
    }

    pub fn as_str(&self, key: &str) -> SaveResult<&str> {
        match self {
            Self::String(s) => Ok(s),
            other => Err(other.mismatch(key, "string")),
        }
    }

    pub fn as_list(&self, key: &str) -> SaveResult<&[StorableValue]> {
        match self {
            Self::List(items) => Ok(items),
            other => Err(other.mismatch(key, "list")),
        }
    }

    pub fn as_collection(&self, key: &str) -> SaveResult<&StorableCollection> {
        match self {
            Self::Collection(c) => Ok(c),
            other => Err(other.mismatch(key, "collection")),
        }
    }

    /// Array indexing with the same failure semantics as keyed lookup.
    pub fn index(&self, key: &str, i: usize) -> SaveResult<&StorableValue> {
        self.as_list(key)?
            .get(i)
            .ok_or_else(|| SaveError::FieldMissing { key: format!("{key}[{i}]") })
    }
}

// ── Conversions ──────────────────────────────────────────────

impl From<bool> for StorableValue {
    fn from(v: bool) -> Self { Self::Bool(v) }
}
impl From<i32> for StorableValue {
    fn from(v: i32) -> Self { Self::Int(v as i64) }
}
impl From<i64> for StorableValue {
    fn from(v: i64) -> Self { Self::Int(v) }
}
impl From<u32> for StorableValue {
    fn from(v: u32) -> Self { Self::Int(v as i64) }
}
impl From<f32> for StorableValue {
    fn from(v: f32) -> Self { Self::Float(v as f64) }
}
impl From<f64> for StorableValue {
    fn from(v: f64) -> Self { Self::Float(v) }
}
impl From<&str> for StorableValue {
    fn from(v: &str) -> Self { Self::String(v.to_string()) }
}
impl From<String> for StorableValue {
    fn from(v: String) -> Self { Self::String(v) }
}
impl From<StorableCollection> for StorableValue {
    fn from(v: StorableCollection) -> Self { Self::Collection(v) }
}
impl<T: Into<StorableValue>> From<Vec<T>> for StorableValue {
    fn from(v: Vec<T>) -> Self { Self::List(v.into_iter().map(Into::into).collect()) }
}

impl From<Vec3> for StorableValue {
    fn from(v: Vec3) -> Self {
        StorableCollection::new()
            .with("x", v.x)
            .with("y", v.y)
            .with("z", v.z)
            .into()
    }
}

impl From<Quat> for StorableValue {
    fn from(q: Quat) -> Self {
        StorableCollection::new()
            .with("x", q.x)
            .with("y", q.y)
            .with("z", q.z)
            .with("w", q.w)
            .into()
    }
}

// ── Collection ───────────────────────────────────────────────

/// Insertion-ordered mapping from string key to StorableValue.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorableCollection {
    entries: Vec<(String, StorableValue)>,
}

impl StorableCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. An existing key keeps its position and takes the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StorableValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder form of insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StorableValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&StorableValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StorableValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Keyed lookup that fails with FieldMissing.
    pub fn require(&self, key: &str) -> SaveResult<&StorableValue> {
        self.get(key)
            .ok_or_else(|| SaveError::FieldMissing { key: key.to_string() })
    }

    pub fn get_bool(&self, key: &str) -> SaveResult<bool> {
        self.require(key)?.as_bool(key)
    }

    pub fn get_i64(&self, key: &str) -> SaveResult<i64> {
        self.require(key)?.as_i64(key)
    }

    pub fn get_f64(&self, key: &str) -> SaveResult<f64> {
        self.require(key)?.as_f64(key)
    }

    pub fn get_str(&self, key: &str) -> SaveResult<&str> {
        self.require(key)?.as_str(key)
    }

    pub fn get_list(&self, key: &str) -> SaveResult<&[StorableValue]> {
        self.require(key)?.as_list(key)
    }

    pub fn get_collection(&self, key: &str) -> SaveResult<&StorableCollection> {
        self.require(key)?.as_collection(key)
    }

    pub fn get_vec3(&self, key: &str) -> SaveResult<Vec3> {
        let c = self.get_collection(key)?;
        Ok(Vec3::new(c.get_f64("x")?, c.get_f64("y")?, c.get_f64("z")?))
    }

    pub fn get_quat(&self, key: &str) -> SaveResult<Quat> {
        let c = self.get_collection(key)?;
        Ok(Quat::new(
            c.get_f64("x")?,
            c.get_f64("y")?,
            c.get_f64("z")?,
            c.get_f64("w")?,
        ))
    }
}

impl<K: Into<String>, V: Into<StorableValue>> FromIterator<(K, V)> for StorableCollection {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut collection = Self::new();
        for (k, v) in iter {
            collection.insert(k, v);
        }
        collection
    }
}

// ── Serde ────────────────────────────────────────────────────

impl Serialize for StorableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null          => serializer.serialize_unit(),
            Self::Bool(b)       => serializer.serialize_bool(*b),
            Self::Int(i)        => serializer.serialize_i64(*i),
            Self::Float(f) if !f.is_finite() => {
                Err(ser::Error::custom(format!("non-finite float {f} has no JSON form")))
            }
            Self::Float(f)      => serializer.serialize_f64(*f),
            Self::String(s)     => serializer.serialize_str(s),
            Self::List(items)   => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Collection(c) => c.serialize(serializer),
        }
    }
}

impl Serialize for StorableCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = StorableValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a storable value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<StorableValue, E> {
        Ok(StorableValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<StorableValue, E> {
        Ok(StorableValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<StorableValue, E> {
        Ok(match i64::try_from(v) {
            Ok(i) => StorableValue::Int(i),
            Err(_) => StorableValue::Float(v as f64),
        })
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<StorableValue, E> {
        Ok(StorableValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<StorableValue, E> {
        Ok(StorableValue::String(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<StorableValue, E> {
        Ok(StorableValue::String(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<StorableValue, E> {
        Ok(StorableValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<StorableValue, E> {
        Ok(StorableValue::Null)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StorableValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(StorableValue::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<StorableValue, A::Error> {
        CollectionVisitor.visit_map(map).map(StorableValue::Collection)
    }
}

struct CollectionVisitor;

impl<'de> Visitor<'de> for CollectionVisitor {
    type Value = StorableCollection;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a storable collection")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<StorableCollection, A::Error> {
        let mut collection = StorableCollection::new();
        while let Some((key, value)) = map.next_entry::<String, StorableValue>()? {
            if collection.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate key '{key}'")));
            }
            collection.entries.push((key, value));
        }
        Ok(collection)
    }
}

impl<'de> Deserialize<'de> for StorableValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl<'de> Deserialize<'de> for StorableCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(CollectionVisitor)
    }
}
