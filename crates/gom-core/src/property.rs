//! Storage for reflected properties.
//!
//! Objects are shared through `Arc`, so the fields behind writable
//! properties need interior mutability. `#[derive(Object)]` generates the
//! property adapters over [`Property`] fields.
//!
//! # Example
//!
//! ```
//! use gom_core::property::Property;
//!
//! let count = Property::new(1_i64);
//! assert!(count.set(2));
//! assert!(!count.set(2));
//! assert_eq!(count.get(), 2);
//! ```

use std::fmt;

use parking_lot::RwLock;

use crate::any::{Any, FromAny};
use crate::error::InvokeResult;

/// A value cell that tracks changes.
///
/// `set()` compares the new value with the current one and reports whether
/// it changed, so that the caller emits the change notification only then.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    ///
    /// This clones the value. For large types, consider using `with()` instead.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Access the value through a closure without cloning.
    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        f(&self.value.read())
    }

    /// Set the value without change detection.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }

    /// Set the value, returning the old value if it changed.
    pub fn replace(&self, value: T) -> Option<T> {
        let mut current = self.value.write();
        if *current != value {
            Some(std::mem::replace(&mut *current, value))
        } else {
            None
        }
    }
}

impl<T: Clone + Into<Any>> Property<T> {
    /// The current value as an [`Any`].
    pub fn get_any(&self) -> Any {
        self.get().into()
    }
}

impl<T: Clone + PartialEq + FromAny> Property<T> {
    /// Convert and store `value`, returning whether it changed.
    ///
    /// `method` names the setter in conversion errors; the stored value is
    /// untouched when conversion fails.
    pub fn set_any(&self, value: &Any, method: &str) -> InvokeResult<bool> {
        let value: T = value.convert(method, "value")?;
        Ok(self.set(value))
    }
}

impl<T: Clone> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self::new(self.get())
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}

impl<T: Clone> From<T> for Property<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvokeError;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_property_set_detects_change() {
        let prop = Property::new(10);
        assert!(!prop.set(10));
        assert!(prop.set(20));
        assert_eq!(prop.get(), 20);
    }

    #[test]
    fn test_property_replace() {
        let prop = Property::new(String::from("hello"));
        assert_eq!(prop.replace(String::from("hello")), None);
        assert_eq!(prop.replace(String::from("world")), Some(String::from("hello")));
        assert_eq!(prop.with(|s| s.len()), 5);
    }

    #[test]
    fn test_property_thread_safe() {
        let prop = Arc::new(Property::new(0_i64));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let prop = Arc::clone(&prop);
                thread::spawn(move || {
                    prop.set_silent(i);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!((0..4).contains(&prop.get()));
    }

    #[test]
    fn test_any_access() {
        let prop = Property::new(1.5_f64);
        assert_eq!(prop.get_any(), Any::Double(1.5));
        assert_eq!(prop.set_any(&Any::from("2.5"), "Point::set_x"), Ok(true));
        assert_eq!(prop.set_any(&Any::Double(2.5), "Point::set_x"), Ok(false));
        let err = prop.set_any(&Any::from("wide"), "Point::set_x");
        assert!(matches!(err, Err(InvokeError::ArgumentType { .. })));
        assert_eq!(prop.get(), 2.5);
    }
}
