//! Enumerations: ordered, bidirectional name/value tables.

use parking_lot::RwLock;

use crate::custom_attributes::CustomAttributes;
use crate::logging::targets;

/// Descriptor of an enumeration.
///
/// Names and values are both unique. Values are added during module
/// initialization, after the descriptor may already be registered.
pub struct MetaEnum {
    name: String,
    values: RwLock<Vec<(String, i64)>>,
    attributes: CustomAttributes,
}

impl MetaEnum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: RwLock::new(Vec::new()),
            attributes: CustomAttributes::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a value.
    ///
    /// # Panics
    ///
    /// Panics if `name` or `value` is already present.
    pub fn add_value(&self, name: impl Into<String>, value: i64) {
        let name = name.into();
        let mut values = self.values.write();
        assert!(
            !values.iter().any(|(n, _)| *n == name),
            "{}: duplicate enum name {name}",
            self.name
        );
        assert!(
            !values.iter().any(|(_, v)| *v == value),
            "{}: duplicate enum value {value}",
            self.name
        );
        tracing::trace!(target: targets::META, enum_name = %self.name, %name, value, "enum value added");
        values.push((name, value));
    }

    pub fn nb_values(&self) -> usize {
        self.values.read().len()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn ith_name(&self, index: usize) -> String {
        self.values.read()[index].0.clone()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn ith_value(&self, index: usize) -> i64 {
        self.values.read()[index].1
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.find_value_by_name(name).is_some()
    }

    pub fn has_value(&self, value: i64) -> bool {
        self.find_name_by_value(value).is_some()
    }

    pub fn find_value_by_name(&self, name: &str) -> Option<i64> {
        self.values
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn find_name_by_value(&self, value: i64) -> Option<String> {
        self.values
            .read()
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| n.clone())
    }

    /// # Panics
    ///
    /// Panics if the enum has no value named `name`.
    pub fn get_value_by_name(&self, name: &str) -> i64 {
        match self.find_value_by_name(name) {
            Some(value) => value,
            None => panic!("{}: no enum value named {name}", self.name),
        }
    }

    /// # Panics
    ///
    /// Panics if no name maps to `value`.
    pub fn get_name_by_value(&self, value: i64) -> String {
        match self.find_name_by_value(value) {
            Some(name) => name,
            None => panic!("{}: no enum name for value {value}", self.name),
        }
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }
}
