//! Structured record container: the decoded (or to-be-encoded) form of one section.
//!
//! Fields keep the order in which the description declared them. Raw bytes
//! consumed by `skip` are kept under the reserved [`SKIPPED_KEY`] so that a
//! decoded record re-encodes to the exact input.

use crate::value::Value;
use indexmap::IndexMap;
use std::ops::{Index, IndexMut};

/// Reserved key holding one `Bytes` entry per `skip` call, in order.
pub const SKIPPED_KEY: &str = "__skipped";

/// Ordered mapping from field name to [`Value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for hand-built records.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a field; returns the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Remove a field, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn bytes(&self, name: &str) -> Option<&[u8]> {
        self.get(name).and_then(Value::as_bytes)
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(Value::as_u64)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn tuple(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_tuple)
    }

    pub fn record(&self, name: &str) -> Option<&Record> {
        self.get(name).and_then(Value::as_record)
    }

    pub fn record_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.get_mut(name).and_then(Value::as_record_mut)
    }

    pub fn list(&self, name: &str) -> Option<&[Value]> {
        self.get(name).and_then(Value::as_list)
    }

    pub fn list_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        self.get_mut(name).and_then(Value::as_list_mut)
    }

    /// Element `index` of array field `name`, when that element is a sub-record.
    pub fn item(&self, name: &str, index: usize) -> Option<&Record> {
        self.list(name)?.get(index).and_then(Value::as_record)
    }

    pub fn item_mut(&mut self, name: &str, index: usize) -> Option<&mut Record> {
        self.list_mut(name)?.get_mut(index).and_then(Value::as_record_mut)
    }

    /// Skipped regions recorded by decode (or supplied by hand), if any.
    pub fn skipped(&self) -> Option<&[Value]> {
        self.list(SKIPPED_KEY)
    }
}

impl Index<&str> for Record {
    type Output = Value;

    /// Panics if the field is absent, like `HashMap`'s `Index`.
    fn index(&self, name: &str) -> &Value {
        &self.fields[name]
    }
}

impl IndexMut<&str> for Record {
    fn index_mut(&mut self, name: &str) -> &mut Value {
        &mut self.fields[name]
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Record {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
