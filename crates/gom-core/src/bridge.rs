//! The contract between the object model and an embedded language.
//!
//! Each language crate implements [`Bridge`] once. The helpers here hold
//! what the bridges share: classifying a declared type name, coercing a
//! best-guess native value to it, and building argument lists for a call
//! coming from script code.

use std::fmt;
use std::sync::Arc;

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::error::{InvokeError, InvokeResult};
use crate::meta_class::MetaClass;
use crate::meta_enum::MetaEnum;
use crate::meta_member::{MetaMethod, ARG_LIST_TYPE};
use crate::meta_type::POINTER_SUFFIX;
use crate::object::{ObjectHandle, ObjectRef};
use crate::registry::Meta;

/// Value conversion and wrapping between [`Any`] and a foreign runtime.
pub trait Bridge {
    /// A value of the foreign runtime.
    type Value;
    /// A function of the foreign runtime.
    type Function;

    fn meta(&self) -> &Meta;

    /// Convert a foreign value, guided by the expected type.
    fn to_native(&self, value: Self::Value, expected: &ExpectedType) -> InvokeResult<Any>;

    /// Convert a native value, guided by the expected type.
    fn to_foreign(&self, value: &Any, expected: &ExpectedType) -> InvokeResult<Self::Value>;

    /// A foreign handle on a native object.
    fn wrap_object(&self, handle: ObjectHandle) -> InvokeResult<Self::Value>;

    /// A native callable invoking a foreign function.
    fn wrap_callable(&self, function: Self::Function) -> ObjectRef;

    /// Arguments of a call made by script code to `method`.
    fn marshal_args(&self, args: Vec<Self::Value>, method: Option<&MetaMethod>) -> InvokeResult<ArgList>;
}

/// What a declared type name asks of a converted value.
#[derive(Clone)]
pub enum ExpectedType {
    /// No constraint: best-guess conversion.
    Any,
    Bool,
    Int,
    UInt,
    Float,
    Double,
    String,
    /// A vector of doubles, with a fixed length for `[f64;N]`.
    Vector(Option<usize>),
    /// An `N` by `N` matrix of doubles (`[[f64;N];N]`).
    Matrix(usize),
    /// An enum, given by entry name or value.
    Enum(Arc<MetaEnum>),
    /// An object of the class (any object when the pointee is unknown), or null.
    Object(Option<Arc<MetaClass>>),
    /// An object implementing the callable protocol, or a foreign function.
    Callable,
    /// The whole argument list.
    ArgList,
}

impl ExpectedType {
    /// Classify a type name against the registry.
    pub fn classify(meta: &Meta, type_name: &str) -> Self {
        let type_name = type_name.trim();
        match type_name {
            "" | "()" | "Any" => Self::Any,
            "bool" => Self::Bool,
            "i8" | "i16" | "i32" | "i64" | "isize" => Self::Int,
            "u8" | "u16" | "u32" | "u64" | "usize" => Self::UInt,
            "f32" => Self::Float,
            "f64" => Self::Double,
            "String" | "&str" => Self::String,
            "Vec<f64>" => Self::Vector(None),
            ARG_LIST_TYPE => Self::ArgList,
            _ => {
                if let Some(len) = fixed_vector_len(type_name) {
                    return Self::Vector(Some(len));
                }
                if let Some(size) = fixed_matrix_size(type_name) {
                    return Self::Matrix(size);
                }
                if let Some(pointee) = type_name.strip_suffix(POINTER_SUFFIX) {
                    return match meta.resolve_class(pointee) {
                        Some(class) if class.inherits("Callable") => Self::Callable,
                        Some(class) => Self::Object(Some(class)),
                        None => Self::Object(None),
                    };
                }
                match meta.resolve_enum(type_name) {
                    Some(meta_enum) => Self::Enum(meta_enum),
                    None => Self::Any,
                }
            }
        }
    }

    /// The expected type of the `index`-th argument of `method`.
    pub fn of_arg(meta: &Meta, method: Option<&MetaMethod>, index: usize) -> Self {
        match method {
            Some(method) if !method.takes_arg_list() && index < method.nb_args() => {
                Self::classify(meta, method.ith_arg(index).type_name())
            }
            _ => Self::Any,
        }
    }

    /// The expected type of the argument `name` of `method`.
    pub fn of_named_arg(meta: &Meta, method: Option<&MetaMethod>, name: &str) -> Self {
        match method.and_then(|m| m.find_arg(name)) {
            Some(arg) => Self::classify(meta, arg.type_name()),
            None => Self::Any,
        }
    }

    /// Convert a best-guess native value to this type.
    ///
    /// Bridges convert foreign values without looking at the declared type
    /// first, then call this; `method` and `arg` name the failing argument
    /// in errors.
    pub fn coerce(&self, meta: &Meta, value: Any, method: &str, arg: &str) -> InvokeResult<Any> {
        let mismatch = |value: &Any| InvokeError::ArgumentType {
            method: method.to_string(),
            arg: arg.to_string(),
            expected: self.to_string(),
            found: value.type_name(),
        };
        Ok(match self {
            Self::Any | Self::ArgList => value,
            Self::Bool => Any::Bool(value.convert(method, arg)?),
            Self::Int => Any::Int(value.convert(method, arg)?),
            Self::UInt => Any::UInt(value.convert(method, arg)?),
            Self::Float => Any::Float(value.convert(method, arg)?),
            Self::Double => Any::Double(value.convert(method, arg)?),
            Self::String => match value {
                Any::Object(_) => return Err(mismatch(&value)),
                other => Any::String(other.as_string()),
            },
            Self::Vector(len) => {
                let vector: Vec<f64> = value.convert(method, arg)?;
                if len.is_some_and(|n| n != vector.len()) {
                    return Err(mismatch(&value));
                }
                Any::Vector(vector)
            }
            Self::Matrix(size) => {
                let rows: Vec<Vec<f64>> = value.convert(method, arg)?;
                if !crate::any::is_square(&rows, *size..=*size) {
                    return Err(mismatch(&value));
                }
                Any::Matrix(rows)
            }
            Self::Enum(meta_enum) => match meta.enum_from_any(meta_enum.name(), &value) {
                Some(entry) => Any::Int(entry),
                None => return Err(mismatch(&value)),
            },
            Self::Object(class) => match &value {
                Any::Null => value,
                Any::Object(object)
                    if class
                        .as_ref()
                        .is_none_or(|c| object.meta_class().is_subclass_of(c)) =>
                {
                    value
                }
                _ => return Err(mismatch(&value)),
            },
            Self::Callable => match &value {
                Any::Null => value,
                Any::Object(object) if object.as_callable().is_some() => value,
                _ => return Err(mismatch(&value)),
            },
        })
    }
}

impl fmt::Display for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Bool => f.write_str("bool"),
            Self::Int => f.write_str("i64"),
            Self::UInt => f.write_str("u64"),
            Self::Float => f.write_str("f32"),
            Self::Double => f.write_str("f64"),
            Self::String => f.write_str("String"),
            Self::Vector(Some(n)) => write!(f, "[f64;{n}]"),
            Self::Vector(None) => f.write_str("Vec<f64>"),
            Self::Matrix(n) => write!(f, "[[f64;{n}];{n}]"),
            Self::Enum(meta_enum) => f.write_str(meta_enum.name()),
            Self::Object(Some(class)) => write!(f, "{}*", class.name()),
            Self::Object(None) => f.write_str("Object*"),
            Self::Callable => f.write_str("Callable*"),
            Self::ArgList => f.write_str(ARG_LIST_TYPE),
        }
    }
}

impl fmt::Debug for ExpectedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExpectedType({self})")
    }
}

/// `N` for `[f64;N]` (spaces allowed).
fn fixed_vector_len(type_name: &str) -> Option<usize> {
    let inner = type_name.strip_prefix('[')?.strip_suffix(']')?;
    let (elem, len) = inner.split_once(';')?;
    if elem.trim() != "f64" {
        return None;
    }
    len.trim().parse().ok()
}

/// `N` for `[[f64;N];N]`.
fn fixed_matrix_size(type_name: &str) -> Option<usize> {
    let inner = type_name.strip_prefix('[')?.strip_suffix(']')?;
    let (row, len) = inner.rsplit_once(';')?;
    let size = len.trim().parse().ok()?;
    (fixed_vector_len(row.trim()) == Some(size)).then_some(size)
}

/// Positional arguments of a script call.
///
/// Each value is converted with the type of the formal argument at the same
/// position; the arguments stay unnamed so that binding renames them.
pub fn marshal_positional<V, F>(
    meta: &Meta,
    method: Option<&MetaMethod>,
    values: impl IntoIterator<Item = V>,
    mut convert: F,
) -> InvokeResult<ArgList>
where
    F: FnMut(V, &ExpectedType) -> InvokeResult<Any>,
{
    let mut args = ArgList::new();
    for (index, value) in values.into_iter().enumerate() {
        let expected = ExpectedType::of_arg(meta, method, index);
        args.create_unnamed_arg(convert(value, &expected)?);
    }
    Ok(args)
}

/// Named arguments of a script call (a name-value table or map).
pub fn marshal_named<V, F>(
    meta: &Meta,
    method: Option<&MetaMethod>,
    pairs: impl IntoIterator<Item = (String, V)>,
    mut convert: F,
) -> InvokeResult<ArgList>
where
    F: FnMut(V, &ExpectedType) -> InvokeResult<Any>,
{
    let mut args = ArgList::new();
    for (name, value) in pairs {
        let expected = ExpectedType::of_named_arg(meta, method, &name);
        let value = convert(value, &expected)?;
        args.create_arg(name, value);
    }
    Ok(args)
}

/// Whether a call is written with named arguments: a single record argument
/// (string keys only) to a method that does not expect a record as its
/// only argument.
pub fn is_name_value_call(nb_args: usize, first_is_record: bool, method: Option<&MetaMethod>) -> bool {
    nb_args == 1
        && first_is_record
        && method.is_none_or(|m| m.takes_arg_list() || m.nb_args() != 1 || m.ith_arg(0).type_name() != "Any")
}
