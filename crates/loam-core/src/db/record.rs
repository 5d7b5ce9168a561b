use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Record
///
/// Backend-facing storage shape of one entity (or one nested embeddable).
/// Field names are storage names; insertion order is preserved.
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Record {
    pub name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    /// Set a field, replacing any existing value under the same name.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();

        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let pos = self.fields.iter().position(|(name, _)| name == field)?;

        Some(self.fields.remove(pos).1)
    }

    /// Look up a dot-joined path through nested records.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.get(path) {
            return Some(value);
        }

        let (head, rest) = path.split_once('.')?;
        self.get(head)?.as_record()?.get_path(rest)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{", self.name)?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut record = Record::new("Person").with("_id", 1u64).with("name", "Ada");
        record.set("_id", 2u64);

        assert_eq!(record.len(), 2);
        assert_eq!(record.fields[0], ("_id".to_string(), Value::Uint(2)));
    }

    #[test]
    fn get_path_descends_into_nested_records() {
        let address = Record::new("Address").with("city", "Paris");
        let record = Record::new("Person").with("address", address);

        assert_eq!(
            record.get_path("address.city"),
            Some(&Value::Text("Paris".to_string()))
        );
        assert_eq!(record.get_path("address.zip"), None);
    }

    #[test]
    fn display_lists_fields_in_order() {
        let record = Record::new("Person").with("name", "Ada").with("age", 36);
        assert_eq!(record.to_string(), "Person{name: 'Ada', age: 36}");
    }
}
