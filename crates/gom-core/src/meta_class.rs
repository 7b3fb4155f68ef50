//! Class descriptors.
//!
//! A [`MetaClass`] owns its members and refers to its super class. Member
//! lookups walk the super chain; constructors are never inherited.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::any::Any;
use crate::arg_list::ArgList;
use crate::custom_attributes::{CustomAttributes, HELP_ATTRIBUTE};
use crate::error::{InvokeError, InvokeResult};
use crate::logging::targets;
use crate::meta_member::{MemberKind, MetaMember, MetaMethod, MetaProperty};
use crate::meta_type::MetaType;
use crate::object::ObjectRef;

/// Descriptor of a reflected class.
pub struct MetaClass {
    name: String,
    super_class: Option<Arc<MetaClass>>,
    is_abstract: bool,
    type_id: Option<TypeId>,
    members: RwLock<Vec<MetaMember>>,
    attributes: CustomAttributes,
}

static_assertions::assert_impl_all!(MetaClass: Send, Sync);

/// Builder for [`MetaClass`].
///
/// # Example
///
/// ```
/// use gom_core::MetaClass;
///
/// let base = MetaClass::builder("Shape").abstract_class().build();
/// let circle = MetaClass::builder("Circle").super_class(&base).build();
/// assert!(circle.is_subclass_of(&base));
/// ```
pub struct MetaClassBuilder {
    name: String,
    super_class: Option<Arc<MetaClass>>,
    is_abstract: bool,
    type_id: Option<TypeId>,
    help: Option<String>,
}

impl MetaClassBuilder {
    pub fn super_class(mut self, super_class: &Arc<MetaClass>) -> Self {
        self.super_class = Some(super_class.clone());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Bind the class to the Rust type implementing it.
    pub fn type_id<T: 'static>(mut self) -> Self {
        self.type_id = Some(TypeId::of::<T>());
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn build(self) -> Arc<MetaClass> {
        let attributes = CustomAttributes::new();
        if let Some(help) = self.help {
            attributes.create_custom_attribute(HELP_ATTRIBUTE, help);
        }
        Arc::new(MetaClass {
            name: self.name,
            super_class: self.super_class,
            is_abstract: self.is_abstract,
            type_id: self.type_id,
            members: RwLock::new(Vec::new()),
            attributes,
        })
    }
}

impl MetaClass {
    pub fn builder(name: impl Into<String>) -> MetaClassBuilder {
        MetaClassBuilder {
            name: name.into(),
            super_class: None,
            is_abstract: false,
            type_id: None,
            help: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_class(&self) -> Option<&Arc<MetaClass>> {
        self.super_class.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn custom_attributes(&self) -> &CustomAttributes {
        &self.attributes
    }

    /// The descriptor as a [`MetaType`].
    pub fn meta_type(self: &Arc<Self>) -> MetaType {
        MetaType::Class(self.clone())
    }

    /// Reflexive, transitive subclass test.
    pub fn is_subclass_of(&self, other: &MetaClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if std::ptr::eq(class, other) {
                return true;
            }
            current = class.super_class.as_deref();
        }
        false
    }

    /// Whether this class or one of its bases is named `name`.
    pub fn inherits(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == name {
                return true;
            }
            current = class.super_class.as_deref();
        }
        false
    }

    /// Add a member declared for this class.
    ///
    /// # Panics
    ///
    /// Panics if the member was created for another class, or if a member of
    /// the same name and kind already exists in this class.
    pub fn add_member(&self, member: MetaMember) {
        assert!(
            std::ptr::eq(member.container_ptr(), self),
            "{}: member {} belongs to another class",
            self.name,
            member.name()
        );
        let mut members = self.members.write();
        assert!(
            !members
                .iter()
                .any(|m| m.kind() == member.kind() && m.name() == member.name()),
            "{}: duplicate member {}",
            self.name,
            member.name()
        );
        tracing::trace!(
            target: targets::META,
            class = %self.name,
            member = %member.name(),
            kind = ?member.kind(),
            "member added"
        );
        members.push(member);
    }

    pub fn add_property(&self, property: MetaProperty) -> Arc<MetaProperty> {
        let property = Arc::new(property);
        self.add_member(MetaMember::Property(property.clone()));
        property
    }

    pub fn add_slot(&self, method: MetaMethod) -> Arc<MetaMethod> {
        let method = Arc::new(method);
        self.add_member(MetaMember::Slot(method.clone()));
        method
    }

    pub fn add_signal(&self, method: MetaMethod) -> Arc<MetaMethod> {
        let method = Arc::new(method);
        self.add_member(MetaMember::Signal(method.clone()));
        method
    }

    pub fn add_constructor(&self, method: MetaMethod) -> Arc<MetaMethod> {
        let method = Arc::new(method);
        self.add_member(MetaMember::Constructor(method.clone()));
        method
    }

    /// Number of members, optionally counting those of the base classes.
    pub fn nb_members(&self, inherited: bool) -> usize {
        let own = self.members.read().len();
        match &self.super_class {
            Some(base) if inherited => base.nb_members(true) + own,
            _ => own,
        }
    }

    /// The `index`-th member; with `inherited`, base members come first.
    pub fn ith_member(&self, index: usize, inherited: bool) -> Option<MetaMember> {
        let skipped = match &self.super_class {
            Some(base) if inherited => {
                let n = base.nb_members(true);
                if index < n {
                    return base.ith_member(index, true);
                }
                n
            }
            _ => 0,
        };
        self.members.read().get(index - skipped).cloned()
    }

    /// Snapshot of the members, base members first when `inherited`.
    pub fn members(&self, inherited: bool) -> Vec<MetaMember> {
        let mut result = match &self.super_class {
            Some(base) if inherited => base.members(true),
            _ => Vec::new(),
        };
        result.extend(self.members.read().iter().cloned());
        result
    }

    /// Find a member by name; own members shadow inherited ones.
    pub fn find_member(&self, name: &str, inherited: bool) -> Option<MetaMember> {
        self.find_member_where(name, inherited, |_| true)
    }

    fn find_member_where(
        &self,
        name: &str,
        inherited: bool,
        pred: impl Fn(&MetaMember) -> bool + Copy,
    ) -> Option<MetaMember> {
        let own = self
            .members
            .read()
            .iter()
            .find(|m| m.name() == name && pred(m))
            .cloned();
        match (own, &self.super_class) {
            (Some(member), _) => Some(member),
            (None, Some(base)) if inherited => base.find_member_where(name, true, pred),
            _ => None,
        }
    }

    pub fn find_property(&self, name: &str) -> Option<Arc<MetaProperty>> {
        self.find_member_where(name, true, |m| m.kind() == MemberKind::Property)
            .and_then(|m| m.as_property().cloned())
    }

    pub fn find_slot(&self, name: &str) -> Option<Arc<MetaMethod>> {
        self.find_member_where(name, true, |m| m.kind() == MemberKind::Slot)
            .and_then(|m| m.as_method().cloned())
    }

    pub fn find_signal(&self, name: &str) -> Option<Arc<MetaMethod>> {
        self.find_member_where(name, true, |m| m.kind() == MemberKind::Signal)
            .and_then(|m| m.as_method().cloned())
    }

    /// Find an invocable member: slot, signal, own constructor, or a
    /// property accessor (`get_<p>`, `set_<p>`).
    pub fn find_method(&self, name: &str) -> Option<Arc<MetaMethod>> {
        let method = self
            .find_member_where(name, true, |m| {
                matches!(m.kind(), MemberKind::Slot | MemberKind::Signal)
            })
            .and_then(|m| m.as_method().cloned());
        if method.is_some() {
            return method;
        }
        if let Some(ctor) = self.constructors().into_iter().find(|c| c.name() == name) {
            return Some(ctor);
        }
        if let Some(property) = name.strip_prefix("get_").and_then(|p| self.find_property(p)) {
            return Some(property.getter().clone());
        }
        name.strip_prefix("set_")
            .and_then(|p| self.find_property(p))
            .and_then(|p| p.setter().cloned())
    }

    /// Constructors declared by this class, in declaration order.
    pub fn constructors(&self) -> Vec<Arc<MetaMethod>> {
        self.members
            .read()
            .iter()
            .filter_map(|m| match m {
                MetaMember::Constructor(c) => Some(c.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn nb_constructors(&self) -> usize {
        self.members
            .read()
            .iter()
            .filter(|m| m.kind() == MemberKind::Constructor)
            .count()
    }

    /// Name for the next constructor added to this class.
    pub fn new_constructor_name(&self) -> String {
        format!("constructor_{}", self.nb_constructors() + 1)
    }

    /// The constructor best matching `args`.
    ///
    /// Positional arguments select the constructor with the same arity.
    /// Named arguments select, among the constructors accepting them, the
    /// one using the most of them. Ties go to the later constructor.
    pub fn best_constructor(&self, args: &ArgList) -> Option<Arc<MetaMethod>> {
        let constructors = self.constructors();
        if args.has_unnamed_args() {
            return constructors
                .into_iter()
                .filter(|c| c.nb_args() == args.nb_args())
                .last();
        }
        let mut best: Option<(usize, Arc<MetaMethod>)> = None;
        for ctor in constructors {
            if !ctor.check_args(args) {
                continue;
            }
            let used = ctor.nb_used_args(args);
            if best.as_ref().is_none_or(|(n, _)| used >= *n) {
                best = Some((used, ctor));
            }
        }
        best.map(|(_, ctor)| ctor)
    }

    /// Create an instance.
    ///
    /// The best constructor receives the arguments it declares (defaults
    /// filled in); every other named argument matching a writable property
    /// is then assigned to the new object.
    pub fn create(self: &Arc<Self>, args: &ArgList) -> InvokeResult<ObjectRef> {
        if self.is_abstract {
            tracing::warn!(target: targets::META, class = %self.name, "cannot instantiate abstract class");
            return Err(InvokeError::AbstractClass {
                class: self.name.clone(),
            });
        }
        let Some(ctor) = self.best_constructor(args) else {
            tracing::warn!(
                target: targets::META,
                class = %self.name,
                args = %args,
                "no constructor matches the arguments"
            );
            return Err(InvokeError::NoMatchingConstructor {
                class: self.name.clone(),
            });
        };
        let object = ctor.construct(args)?;
        if !args.has_unnamed_args() && !ctor.takes_arg_list() {
            for (name, value) in args.iter() {
                if ctor.has_arg(name) {
                    continue;
                }
                match self.find_property(name) {
                    Some(property) if !property.read_only() => {
                        object.set_property(name, value.clone())?;
                    }
                    _ => tracing::debug!(
                        target: targets::META,
                        class = %self.name,
                        arg = %name,
                        "construction argument ignored"
                    ),
                }
            }
        }
        tracing::debug!(
            target: targets::OBJECT,
            object = %object.string_id(),
            "created"
        );
        Ok(object)
    }

    /// Create an instance from positional values.
    pub fn create_with<I, V>(self: &Arc<Self>, values: I) -> InvokeResult<ObjectRef>
    where
        I: IntoIterator<Item = V>,
        V: Into<Any>,
    {
        let mut args = ArgList::new();
        for value in values {
            args.create_unnamed_arg(value);
        }
        self.create(&args)
    }

    /// Interactive help text: the class name, then its help attribute.
    pub fn doc(&self) -> String {
        let mut result = self.name.clone();
        result.push('\n');
        if let Some(help) = self.attributes.help() {
            result.push_str(&help);
            result.push('\n');
        }
        result
    }
}

impl fmt::Debug for MetaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaClass")
            .field("name", &self.name)
            .field(
                "super_class",
                &self.super_class.as_ref().map(|c| c.name.as_str()),
            )
            .field("is_abstract", &self.is_abstract)
            .field("nb_members", &self.nb_members(false))
            .finish()
    }
}
