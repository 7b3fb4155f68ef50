//! Ordered, named argument lists for reflective calls.

use std::fmt;

use crate::any::{Any, FromAny};
use crate::error::{InvokeError, InvokeResult};

/// Name given to the `index`-th positional argument.
pub fn unnamed_arg_name(index: usize) -> String {
    format!("arg#{index}")
}

/// An ordered sequence of `(name, value)` pairs.
///
/// Insertion order is preserved. Names are not required to be unique; every
/// lookup by name returns the first match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgList {
    args: Vec<(String, Any)>,
}

static_assertions::assert_impl_all!(ArgList: Send, Sync);

impl ArgList {
    /// Create an empty argument list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`create_arg`](Self::create_arg).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Any>) -> Self {
        self.create_arg(name, value);
        self
    }

    /// Number of arguments.
    pub fn nb_args(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Index of the first argument named `name`.
    pub fn find_arg_index(&self, name: &str) -> Option<usize> {
        self.args.iter().position(|(n, _)| n == name)
    }

    pub fn has_arg(&self, name: &str) -> bool {
        self.find_arg_index(name).is_some()
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn ith_arg_name(&self, index: usize) -> &str {
        &self.args[index].0
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn ith_arg_value(&self, index: usize) -> &Any {
        &self.args[index].1
    }

    /// Value of the first argument named `name`.
    pub fn arg_value(&self, name: &str) -> Option<&Any> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Typed value of the first argument named `name`.
    ///
    /// `None` when the argument is missing or not convertible to `T`.
    pub fn get_arg<T: FromAny>(&self, name: &str) -> Option<T> {
        self.arg_value(name).and_then(T::from_any)
    }

    /// Typed value of the argument `name` of a call to `method`.
    ///
    /// Missing and non-convertible arguments are reported as errors.
    pub fn require<T: FromAny>(&self, method: &str, name: &str) -> InvokeResult<T> {
        match self.arg_value(name) {
            Some(value) => value.convert(method, name),
            None => Err(InvokeError::MissingArgument {
                method: method.to_string(),
                arg: name.to_string(),
            }),
        }
    }

    /// Append an argument.
    pub fn create_arg(&mut self, name: impl Into<String>, value: impl Into<Any>) {
        self.args.push((name.into(), value.into()));
    }

    /// Append a positional argument, named after its index.
    pub fn create_unnamed_arg(&mut self, value: impl Into<Any>) {
        let name = unnamed_arg_name(self.args.len());
        self.args.push((name, value.into()));
    }

    /// Overwrite the first argument named `name`, or append it.
    pub fn set_arg(&mut self, name: &str, value: impl Into<Any>) {
        match self.find_arg_index(name) {
            Some(index) => self.args[index].1 = value.into(),
            None => self.args.push((name.to_string(), value.into())),
        }
    }

    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn delete_ith_arg(&mut self, index: usize) {
        self.args.remove(index);
    }

    /// Rename the first argument named `old`. Returns whether it existed.
    pub fn rename_arg(&mut self, old: &str, new: &str) -> bool {
        match self.find_arg_index(old) {
            Some(index) => {
                self.args[index].0 = new.to_string();
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.args.clear();
    }

    /// Copy the arguments of `rhs` into this list.
    ///
    /// Existing names are overwritten when `overwrite` is set and left alone
    /// otherwise; new names are appended.
    pub fn append(&mut self, rhs: &ArgList, overwrite: bool) {
        for (name, value) in &rhs.args {
            match self.find_arg_index(name) {
                Some(index) if overwrite => self.args[index].1 = value.clone(),
                Some(_) => {}
                None => self.args.push((name.clone(), value.clone())),
            }
        }
    }

    /// Whether every argument is positional (`arg#0`, `arg#1`, ...).
    ///
    /// An empty list has no unnamed arguments.
    pub fn has_unnamed_args(&self) -> bool {
        !self.args.is_empty()
            && self
                .args
                .iter()
                .enumerate()
                .all(|(i, (name, _))| *name == unnamed_arg_name(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Any)> {
        self.args.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.args.iter().map(|(n, _)| n.as_str())
    }
}

impl fmt::Display for ArgList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.args.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            match value {
                Any::String(s) => write!(f, "{name}='{s}'")?,
                other => write!(f, "{name}={other}")?,
            }
        }
        Ok(())
    }
}

impl<N: Into<String>, V: Into<Any>> FromIterator<(N, V)> for ArgList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            args: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for ArgList {
    type Item = (String, Any);
    type IntoIter = std::vec::IntoIter<(String, Any)>;

    fn into_iter(self) -> Self::IntoIter {
        self.args.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_first_match() {
        let mut args = ArgList::new();
        args.create_arg("x", 1.0);
        args.create_arg("x", 2.0);
        assert_eq!(args.nb_args(), 2);
        assert_eq!(args.get_arg::<f64>("x"), Some(1.0));
    }

    #[test]
    fn test_set_arg_overwrites_or_appends() {
        let mut args = ArgList::new().with("a", 1);
        args.set_arg("a", 5);
        args.set_arg("b", "text");
        assert_eq!(args.nb_args(), 2);
        assert_eq!(args.get_arg::<i32>("a"), Some(5));
        assert_eq!(args.ith_arg_name(1), "b");
    }

    #[test]
    fn test_unnamed_args() {
        let mut args = ArgList::new();
        assert!(!args.has_unnamed_args());
        args.create_unnamed_arg(1.5);
        args.create_unnamed_arg("s");
        assert!(args.has_unnamed_args());
        assert_eq!(args.ith_arg_name(1), "arg#1");
        args.create_arg("named", true);
        assert!(!args.has_unnamed_args());
    }

    #[test]
    fn test_append_respects_overwrite() {
        let mut args = ArgList::new().with("a", 1).with("b", 2);
        let rhs = ArgList::new().with("b", 20).with("c", 30);

        let mut kept = args.clone();
        kept.append(&rhs, false);
        assert_eq!(kept.get_arg::<i32>("b"), Some(2));
        assert_eq!(kept.get_arg::<i32>("c"), Some(30));

        args.append(&rhs, true);
        assert_eq!(args.get_arg::<i32>("b"), Some(20));
        assert_eq!(args.nb_args(), 3);
    }

    #[test]
    fn test_delete_and_rename() {
        let mut args = ArgList::new().with("a", 1).with("b", 2);
        args.delete_ith_arg(0);
        assert!(!args.has_arg("a"));
        assert!(args.rename_arg("b", "value"));
        assert!(!args.rename_arg("missing", "x"));
        assert_eq!(args.get_arg::<i32>("value"), Some(2));
    }

    #[test]
    fn test_require() {
        let args = ArgList::new().with("n", "12");
        assert_eq!(args.require::<u32>("f", "n"), Ok(12));
        assert_eq!(
            args.require::<u32>("f", "m"),
            Err(InvokeError::MissingArgument { method: "f".into(), arg: "m".into() })
        );
        assert!(matches!(
            args.require::<bool>("f", "n"),
            Err(InvokeError::ArgumentType { .. })
        ));
    }

    #[test]
    fn test_display() {
        let args = ArgList::new().with("x", 1.5).with("name", "p");
        assert_eq!(args.to_string(), "x=1.5, name='p'");
    }
}
