//! Name/value annotations attached to meta information.
//!
//! Tooling (menus, icons, tooltips, help) declares its metadata through custom
//! attributes on types, members and arguments. The `help` attribute is used by
//! the documentation generators of this crate.

use parking_lot::RwLock;

/// Attribute holding the help text of a type, member or argument.
pub const HELP_ATTRIBUTE: &str = "help";

/// An ordered set of string attributes.
///
/// Meta information is shared immutably once registered; attributes are the
/// one part that may still be attached afterwards, hence the lock.
#[derive(Debug, Default)]
pub struct CustomAttributes {
    attributes: RwLock<Vec<(String, String)>>,
}

impl CustomAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nb_custom_attributes(&self) -> usize {
        self.attributes.read().len()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn ith_custom_attribute_name(&self, index: usize) -> String {
        self.attributes.read()[index].0.clone()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn ith_custom_attribute_value(&self, index: usize) -> String {
        self.attributes.read()[index].1.clone()
    }

    pub fn has_custom_attribute(&self, name: &str) -> bool {
        self.attributes.read().iter().any(|(n, _)| n == name)
    }

    /// Value of the attribute `name`, `None` when absent.
    pub fn custom_attribute_value(&self, name: &str) -> Option<String> {
        self.attributes
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    /// Append an attribute.
    pub fn create_custom_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.write().push((name.into(), value.into()));
    }

    /// Overwrite the attribute `name`, creating it if needed.
    pub fn set_custom_attribute(&self, name: &str, value: impl Into<String>) {
        let mut attributes = self.attributes.write();
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, v)) => *v = value.into(),
            None => attributes.push((name.to_string(), value.into())),
        }
    }

    pub fn clear_custom_attributes(&self) {
        self.attributes.write().clear();
    }

    /// The `help` attribute.
    pub fn help(&self) -> Option<String> {
        self.custom_attribute_value(HELP_ATTRIBUTE)
    }
}

impl Clone for CustomAttributes {
    fn clone(&self) -> Self {
        Self {
            attributes: RwLock::new(self.attributes.read().clone()),
        }
    }
}
