//! The dynamically typed value container.
//!
//! [`Any`] is what flows through every reflective call: argument values in an
//! [`ArgList`](crate::ArgList), property values, return values, and values
//! crossing into an embedded interpreter. Extraction is type-safe through
//! [`FromAny`], which also performs the conversions a script caller expects
//! (numeric kinds convert among each other, strings are parsed).

use std::fmt;
use std::sync::Arc;

use crate::error::{InvokeError, InvokeResult};
use crate::object::{Object, ObjectRef};

/// A discriminated value holder.
///
/// An `Object` payload holds a strong reference; dropping the `Any` releases
/// it. Use [`WeakObjectRef`](crate::WeakObjectRef) where a value must not keep
/// its object alive.
#[derive(Clone, Default)]
pub enum Any {
    /// No value. Also the result of procedures returning nothing.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    String(String),
    /// Fixed-size vectors (2 to 4 components) and variable-length arrays.
    Vector(Vec<f64>),
    /// Square matrices (2 to 4 rows), stored by rows.
    Matrix(Vec<Vec<f64>>),
    Object(ObjectRef),
}

static_assertions::assert_impl_all!(Any: Send, Sync);

impl Any {
    /// Create a value from anything convertible.
    pub fn new<T: Into<Any>>(value: T) -> Self {
        value.into()
    }

    /// Wrap a concrete object.
    pub fn from_object<T: Object>(object: Arc<T>) -> Self {
        Self::Object(object)
    }

    /// Whether this holds no value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the meta type describing the stored value.
    ///
    /// Objects report the pointer type of their dynamic class (`Point*`).
    pub fn type_name(&self) -> String {
        match self {
            Self::Null => "()".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) => "i64".to_string(),
            Self::UInt(_) => "u64".to_string(),
            Self::Float(_) => "f32".to_string(),
            Self::Double(_) => "f64".to_string(),
            Self::String(_) => "String".to_string(),
            Self::Vector(v) => match v.len() {
                2..=4 => format!("[f64;{}]", v.len()),
                _ => "Vec<f64>".to_string(),
            },
            Self::Matrix(rows) if is_square(rows, 2..=4) => {
                format!("[[f64;{n}];{n}]", n = rows.len())
            }
            Self::Matrix(_) => "Vec<Vec<f64>>".to_string(),
            Self::Object(obj) => format!("{}*", obj.meta_class().name()),
        }
    }

    /// Extract the value as `T`, converting when possible.
    pub fn get_value<T: FromAny>(&self) -> Option<T> {
        T::from_any(self)
    }

    /// Extract the value as `T` on behalf of argument `arg` of `method`.
    ///
    /// The error names the expected and the stored type.
    pub fn convert<T: FromAny>(&self, method: &str, arg: &str) -> InvokeResult<T> {
        T::from_any(self).ok_or_else(|| InvokeError::ArgumentType {
            method: method.to_string(),
            arg: arg.to_string(),
            expected: short_type_name::<T>(),
            found: self.type_name(),
        })
    }

    /// The stored object, if any.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Whether this holds exactly `object` (identity, not equality).
    pub fn is_object(&self, object: &ObjectRef) -> bool {
        match self {
            Self::Object(obj) => std::ptr::addr_eq(Arc::as_ptr(obj), Arc::as_ptr(object)),
            _ => false,
        }
    }

    /// Whether the stored value is a number of any kind.
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Self::Int(_) | Self::UInt(_) | Self::Float(_) | Self::Double(_)
        )
    }

    /// Canonical textual form.
    ///
    /// Objects are written as their string id (`@Point::#12`), vectors with
    /// space-separated components, matrices row by row with `;` between
    /// rows, `Null` as the empty string.
    pub fn as_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::UInt(u) => u.to_string(),
            Self::Float(x) => x.to_string(),
            Self::Double(x) => x.to_string(),
            Self::String(s) => s.clone(),
            Self::Vector(v) => v
                .iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            Self::Matrix(rows) => rows
                .iter()
                .map(|row| Self::Vector(row.clone()).as_string())
                .collect::<Vec<_>>()
                .join("; "),
            Self::Object(obj) => obj.base().string_id(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::UInt(u) => Some(*u as f64),
            Self::Float(x) => Some(f64::from(*x)),
            Self::Double(x) => Some(*x),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::UInt(u) => i64::try_from(*u).ok(),
            Self::Float(x) if x.is_finite() => Some(*x as i64),
            Self::Double(x) if x.is_finite() => Some(*x as i64),
            Self::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|x| x.is_finite()).map(|x| x as i64))
            }
            _ => None,
        }
    }

    fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(u) => Some(*u),
            Self::String(s) => s.trim().parse::<u64>().ok().or_else(|| {
                self.as_i64().and_then(|i| u64::try_from(i).ok())
            }),
            _ => self.as_i64().and_then(|i| u64::try_from(i).ok()),
        }
    }
}

impl fmt::Debug for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::UInt(u) => write!(f, "UInt({u})"),
            Self::Float(x) => write!(f, "Float({x})"),
            Self::Double(x) => write!(f, "Double({x})"),
            Self::String(s) => write!(f, "String({s:?})"),
            Self::Vector(v) => write!(f, "Vector({v:?})"),
            Self::Matrix(rows) => write!(f, "Matrix({rows:?})"),
            Self::Object(obj) => write!(f, "Object({})", obj.base().string_id()),
        }
    }
}

impl fmt::Display for Any {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl PartialEq for Any {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Vector(a), Self::Vector(b)) => a == b,
            (Self::Matrix(a), Self::Matrix(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => {
                std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
            }
            _ => false,
        }
    }
}

/// Whether `rows` is an `n` by `n` matrix with `n` in `sizes`.
pub(crate) fn is_square(rows: &[Vec<f64>], sizes: std::ops::RangeInclusive<usize>) -> bool {
    sizes.contains(&rows.len()) && rows.iter().all(|row| row.len() == rows.len())
}

/// `std::any::type_name` without module paths.
pub(crate) fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let mut result = String::with_capacity(full.len());
    let mut ident = String::new();
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        if c == ':' && chars.peek() == Some(&':') {
            chars.next();
            ident.clear();
        } else if c.is_alphanumeric() || c == '_' {
            ident.push(c);
        } else {
            result.push_str(&ident);
            ident.clear();
            result.push(c);
        }
    }
    result.push_str(&ident);
    result
}

/// Conversion out of an [`Any`].
///
/// Returns `None` when the stored value cannot represent a `T`.
pub trait FromAny: Sized {
    fn from_any(value: &Any) -> Option<Self>;
}

impl FromAny for Any {
    fn from_any(value: &Any) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromAny for bool {
    fn from_any(value: &Any) -> Option<Self> {
        match value {
            Any::Bool(b) => Some(*b),
            Any::Int(i) => Some(*i != 0),
            Any::UInt(u) => Some(*u != 0),
            Any::String(s) => match s.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

macro_rules! signed_from_any {
    ($($ty:ty),*) => {$(
        impl FromAny for $ty {
            fn from_any(value: &Any) -> Option<Self> {
                value.as_i64().and_then(|i| <$ty>::try_from(i).ok())
            }
        }
    )*};
}

macro_rules! unsigned_from_any {
    ($($ty:ty),*) => {$(
        impl FromAny for $ty {
            fn from_any(value: &Any) -> Option<Self> {
                value.as_u64().and_then(|u| <$ty>::try_from(u).ok())
            }
        }
    )*};
}

signed_from_any!(i8, i16, i32, i64, isize);
unsigned_from_any!(u8, u16, u32, u64, usize);

impl FromAny for f64 {
    fn from_any(value: &Any) -> Option<Self> {
        value.as_f64()
    }
}

impl FromAny for f32 {
    fn from_any(value: &Any) -> Option<Self> {
        value.as_f64().map(|x| x as f32)
    }
}

impl FromAny for String {
    fn from_any(value: &Any) -> Option<Self> {
        Some(value.as_string())
    }
}

impl FromAny for Vec<f64> {
    fn from_any(value: &Any) -> Option<Self> {
        match value {
            Any::Vector(v) => Some(v.clone()),
            Any::String(s) => s.split_whitespace().map(|x| x.parse().ok()).collect(),
            _ => None,
        }
    }
}

impl<const N: usize> FromAny for [f64; N] {
    fn from_any(value: &Any) -> Option<Self> {
        Vec::<f64>::from_any(value).and_then(|v| v.try_into().ok())
    }
}

impl FromAny for Vec<Vec<f64>> {
    fn from_any(value: &Any) -> Option<Self> {
        match value {
            Any::Matrix(rows) => Some(rows.clone()),
            Any::String(s) => s
                .split(';')
                .map(|row| Vec::<f64>::from_any(&Any::from(row)))
                .collect(),
            _ => None,
        }
    }
}

impl<const N: usize> FromAny for [[f64; N]; N] {
    fn from_any(value: &Any) -> Option<Self> {
        let rows = Vec::<Vec<f64>>::from_any(value)?
            .into_iter()
            .map(|row| row.try_into().ok())
            .collect::<Option<Vec<[f64; N]>>>()?;
        rows.try_into().ok()
    }
}

impl FromAny for ObjectRef {
    fn from_any(value: &Any) -> Option<Self> {
        value.as_object().cloned()
    }
}

impl FromAny for Option<ObjectRef> {
    fn from_any(value: &Any) -> Option<Self> {
        match value {
            Any::Null => Some(None),
            Any::Object(obj) => Some(Some(obj.clone())),
            _ => None,
        }
    }
}

impl From<()> for Any {
    fn from(_: ()) -> Self {
        Self::Null
    }
}

impl From<bool> for Any {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! any_from_int {
    ($variant:ident, $wide:ty, $($ty:ty),*) => {$(
        impl From<$ty> for Any {
            fn from(value: $ty) -> Self {
                Self::$variant(value as $wide)
            }
        }
    )*};
}

any_from_int!(Int, i64, i8, i16, i32, i64, isize);
any_from_int!(UInt, u64, u8, u16, u32, u64, usize);

impl From<f32> for Any {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for Any {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<String> for Any {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&String> for Any {
    fn from(value: &String) -> Self {
        Self::String(value.clone())
    }
}

impl From<&str> for Any {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<f64>> for Any {
    fn from(value: Vec<f64>) -> Self {
        Self::Vector(value)
    }
}

impl<const N: usize> From<[f64; N]> for Any {
    fn from(value: [f64; N]) -> Self {
        Self::Vector(value.to_vec())
    }
}

impl From<Vec<Vec<f64>>> for Any {
    fn from(value: Vec<Vec<f64>>) -> Self {
        Self::Matrix(value)
    }
}

impl<const N: usize> From<[[f64; N]; N]> for Any {
    fn from(value: [[f64; N]; N]) -> Self {
        Self::Matrix(value.iter().map(|row| row.to_vec()).collect())
    }
}

impl From<ObjectRef> for Any {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

impl<T: Into<Any>> From<Option<T>> for Any {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cross_conversion() {
        let any = Any::Double(2.75);
        assert_eq!(any.get_value::<i32>(), Some(2));
        assert_eq!(any.get_value::<f32>(), Some(2.75));
        assert_eq!(Any::Int(7).get_value::<f64>(), Some(7.0));
        assert_eq!(Any::UInt(3).get_value::<i64>(), Some(3));
    }

    #[test]
    fn test_negative_to_unsigned_fails() {
        assert_eq!(Any::Int(-1).get_value::<u32>(), None);
        assert_eq!(Any::Int(300).get_value::<u8>(), None);
    }

    #[test]
    fn test_string_is_parsed() {
        assert_eq!(Any::from("42").get_value::<i32>(), Some(42));
        assert_eq!(Any::from(" 1.5 ").get_value::<f64>(), Some(1.5));
        assert_eq!(Any::from("true").get_value::<bool>(), Some(true));
        assert_eq!(Any::from("1 2 3").get_value::<[f64; 3]>(), Some([1.0, 2.0, 3.0]));
        assert_eq!(Any::from("abc").get_value::<i32>(), None);
    }

    #[test]
    fn test_anything_converts_to_string() {
        assert_eq!(Any::Double(1.5).get_value::<String>().as_deref(), Some("1.5"));
        assert_eq!(Any::Bool(false).as_string(), "false");
        assert_eq!(Any::Vector(vec![1.0, 2.5]).as_string(), "1 2.5");
        assert_eq!(Any::Null.as_string(), "");
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Any::Null.type_name(), "()");
        assert_eq!(Any::from(3_i32).type_name(), "i64");
        assert_eq!(Any::from(3_u32).type_name(), "u64");
        assert_eq!(Any::from([0.0; 3]).type_name(), "[f64;3]");
        assert_eq!(Any::from(vec![0.0; 7]).type_name(), "Vec<f64>");
    }

    #[test]
    fn test_vector_shape_is_checked() {
        let any = Any::from([1.0, 2.0]);
        assert_eq!(any.get_value::<[f64; 2]>(), Some([1.0, 2.0]));
        assert_eq!(any.get_value::<[f64; 3]>(), None);
    }

    #[test]
    fn test_matrix_values() {
        let identity = Any::from([[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(identity.type_name(), "[[f64;2];2]");
        assert_eq!(identity.as_string(), "1 0; 0 1");
        assert_eq!(identity.get_value::<[[f64; 2]; 2]>(), Some([[1.0, 0.0], [0.0, 1.0]]));
        assert_eq!(identity.get_value::<[[f64; 3]; 3]>(), None);
        assert_eq!(
            Any::from("1 2; 3 4").get_value::<[[f64; 2]; 2]>(),
            Some([[1.0, 2.0], [3.0, 4.0]])
        );
        assert_eq!(Any::Matrix(vec![vec![1.0, 2.0]]).type_name(), "Vec<Vec<f64>>");
        assert_eq!(Any::from([0.0; 4]).get_value::<[[f64; 2]; 2]>(), None);
    }

    #[test]
    fn test_convert_reports_types() {
        let err = Any::from("abc").convert::<f64>("Point::scale", "factor").err();
        assert_eq!(
            err,
            Some(InvokeError::ArgumentType {
                method: "Point::scale".into(),
                arg: "factor".into(),
                expected: "f64".into(),
                found: "String".into(),
            })
        );
        assert_eq!(short_type_name::<Vec<String>>(), "Vec<String>");
    }

    #[test]
    fn test_option_maps_to_null() {
        assert!(Any::from(None::<f64>).is_null());
        assert_eq!(Any::from(Some(2_i64)), Any::Int(2));
        assert_eq!(Any::Null.get_value::<Option<ObjectRef>>().map(|o| o.is_none()), Some(true));
        assert!(Any::Null.get_value::<ObjectRef>().is_none());
    }
}
