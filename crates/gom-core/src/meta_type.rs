//! Meta types: runtime descriptors of the types known to the registry.
//!
//! A [`MetaType`] is a tagged variant over the four kinds of descriptors.
//! Narrowing to a kind goes through [`MetaType::kind`] or the `as_*`
//! accessors, never through a downcast.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use crate::custom_attributes::CustomAttributes;
use crate::meta_class::MetaClass;
use crate::meta_enum::MetaEnum;

/// Discriminator of a [`MetaType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaTypeKind {
    Builtin,
    Enum,
    Class,
    Struct,
}

/// A registered type descriptor.
#[derive(Clone)]
pub enum MetaType {
    Builtin(Arc<MetaBuiltinType>),
    Enum(Arc<MetaEnum>),
    Class(Arc<MetaClass>),
    Struct(Arc<MetaStruct>),
}

static_assertions::assert_impl_all!(MetaType: Send, Sync);

impl MetaType {
    pub fn kind(&self) -> MetaTypeKind {
        match self {
            Self::Builtin(_) => MetaTypeKind::Builtin,
            Self::Enum(_) => MetaTypeKind::Enum,
            Self::Class(_) => MetaTypeKind::Class,
            Self::Struct(_) => MetaTypeKind::Struct,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Builtin(t) => t.name(),
            Self::Enum(t) => t.name(),
            Self::Class(t) => t.name(),
            Self::Struct(t) => t.name(),
        }
    }

    /// The Rust type this descriptor was registered for, if any.
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            Self::Builtin(t) => t.type_id(),
            Self::Enum(_) | Self::Struct(_) => None,
            Self::Class(t) => t.type_id(),
        }
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        match self {
            Self::Builtin(t) => t.custom_attributes(),
            Self::Enum(t) => t.custom_attributes(),
            Self::Class(t) => t.custom_attributes(),
            Self::Struct(t) => t.custom_attributes(),
        }
    }

    pub fn as_builtin(&self) -> Option<&Arc<MetaBuiltinType>> {
        match self {
            Self::Builtin(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&Arc<MetaEnum>> {
        match self {
            Self::Enum(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<MetaClass>> {
        match self {
            Self::Class(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Arc<MetaStruct>> {
        match self {
            Self::Struct(t) => Some(t),
            _ => None,
        }
    }

    /// Whether a value of this type can be used where `other` is expected.
    ///
    /// Reflexive for every type. Classes and structs follow their base chain;
    /// pointer builtins recurse into the pointed-to types.
    pub fn is_subtype_of(&self, other: &MetaType) -> bool {
        if self.name() == other.name() {
            return true;
        }
        match (self, other) {
            (Self::Class(a), Self::Class(b)) => a.is_subclass_of(b),
            (Self::Struct(a), Self::Struct(b)) => a.is_substruct_of(b),
            (Self::Builtin(a), Self::Builtin(b)) => match (a.pointee(), b.pointee()) {
                (Some(pa), Some(pb)) => pa.is_subtype_of(pb),
                _ => false,
            },
            _ => false,
        }
    }

    /// Identity comparison of the underlying descriptors.
    pub fn ptr_eq(&self, other: &MetaType) -> bool {
        match (self, other) {
            (Self::Builtin(a), Self::Builtin(b)) => Arc::ptr_eq(a, b),
            (Self::Enum(a), Self::Enum(b)) => Arc::ptr_eq(a, b),
            (Self::Class(a), Self::Class(b)) => Arc::ptr_eq(a, b),
            (Self::Struct(a), Self::Struct(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for MetaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.name())
    }
}

/// Suffix appended to a type name to name the pointer type.
pub const POINTER_SUFFIX: char = '*';

/// Name of the pointer type to `name`.
pub fn pointer_type_name(name: &str) -> String {
    format!("{name}{POINTER_SUFFIX}")
}

/// Descriptor of a builtin type: scalars, strings, vectors and the
/// synthetic pointer types of registered classes.
pub struct MetaBuiltinType {
    name: String,
    type_id: Option<TypeId>,
    pointee: Option<MetaType>,
    attributes: CustomAttributes,
}

impl MetaBuiltinType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_id: None,
            pointee: None,
            attributes: CustomAttributes::new(),
        }
    }

    /// Builtin bound to the Rust type `T` (alternate registry key).
    pub fn of<T: 'static>(name: impl Into<String>) -> Self {
        Self {
            type_id: Some(TypeId::of::<T>()),
            ..Self::new(name)
        }
    }

    /// The pointer type to `pointee`, named `Pointee*`.
    pub fn pointer_to(pointee: MetaType) -> Self {
        Self {
            name: pointer_type_name(pointee.name()),
            type_id: None,
            pointee: Some(pointee),
            attributes: CustomAttributes::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    /// The pointed-to type, for pointer builtins.
    pub fn pointee(&self) -> Option<&MetaType> {
        self.pointee.as_ref()
    }

    pub fn is_pointer(&self) -> bool {
        self.pointee.is_some()
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }
}

/// Descriptor of a record type: ordered named fields and an optional base.
pub struct MetaStruct {
    name: String,
    fields: Vec<(String, String)>,
    super_struct: Option<Arc<MetaStruct>>,
    attributes: CustomAttributes,
}

impl MetaStruct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            super_struct: None,
            attributes: CustomAttributes::new(),
        }
    }

    /// Builder-style field declaration.
    pub fn field(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.fields.push((name.into(), type_name.into()));
        self
    }

    /// Builder-style base declaration.
    pub fn super_struct(mut self, base: &Arc<MetaStruct>) -> Self {
        self.super_struct = Some(base.clone());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Arc<MetaStruct>> {
        self.super_struct.as_ref()
    }

    /// Number of fields, inherited ones included.
    pub fn nb_fields(&self) -> usize {
        self.super_struct.as_ref().map_or(0, |s| s.nb_fields()) + self.fields.len()
    }

    /// Name and type name of the `index`-th field, base fields first.
    pub fn ith_field(&self, index: usize) -> Option<(&str, &str)> {
        let inherited = self.super_struct.as_ref().map_or(0, |s| s.nb_fields());
        if index < inherited {
            return self.super_struct.as_ref().and_then(|s| s.ith_field(index));
        }
        self.fields
            .get(index - inherited)
            .map(|(n, t)| (n.as_str(), t.as_str()))
    }

    /// Type name of the field `name`.
    pub fn field_type(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.as_str())
            .or_else(|| self.super_struct.as_ref().and_then(|s| s.field_type(name)))
    }

    pub fn is_substruct_of(&self, other: &MetaStruct) -> bool {
        let mut current = Some(self);
        while let Some(s) = current {
            if std::ptr::eq(s, other) {
                return true;
            }
            current = s.super_struct.as_deref();
        }
        false
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_struct_fields_include_base() {
        let base = Arc::new(MetaStruct::new("Vertex").field("index", "u32"));
        let derived = Arc::new(
            MetaStruct::new("ColoredVertex")
                .super_struct(&base)
                .field("color", "[f64;3]"),
        );

        assert_eq!(derived.nb_fields(), 2);
        assert_eq!(derived.ith_field(0), Some(("index", "u32")));
        assert_eq!(derived.ith_field(1), Some(("color", "[f64;3]")));
        assert_eq!(derived.field_type("index"), Some("u32"));
        assert!(derived.is_substruct_of(&base));
        assert!(!base.is_substruct_of(&derived));
    }

    #[test]
    fn test_pointer_builtin() {
        let base = MetaType::Struct(Arc::new(MetaStruct::new("S")));
        let ptr = MetaBuiltinType::pointer_to(base);
        assert_eq!(ptr.name(), "S*");
        assert!(ptr.is_pointer());
    }

    #[test]
    fn test_kind_narrowing() {
        let t = MetaType::Builtin(Arc::new(MetaBuiltinType::of::<f64>("f64")));
        assert_eq!(t.kind(), MetaTypeKind::Builtin);
        assert!(t.as_class().is_none());
        assert_eq!(t.type_id(), Some(TypeId::of::<f64>()));
        assert!(t.is_subtype_of(&t.clone()));
    }
}
