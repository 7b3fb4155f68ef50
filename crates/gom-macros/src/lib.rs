//! Procedural macros for the GOM reflection runtime.
//!
//! This crate provides `#[derive(Object)]`, which implements
//! `gom_core::Object` and registers the reflected properties of a struct,
//! and `#[slots]`, which registers the constructors, slots and signals
//! declared in an `impl` block.
//!
//! # Attributes
//!
//! ## `#[object]`
//!
//! Struct-level attribute for class configuration:
//!
//! ```ignore
//! #[derive(Object)]
//! #[object(class = "Point", super_class = "Node", help = "A point in the plane")]
//! struct Point {
//!     base: ObjectBase,
//!     #[node]
//!     links: NodeLinks,
//!     #[property(notify = "moved")]
//!     x: Property<f64>,
//!     #[property(read_only)]
//!     label: String,
//! }
//! ```
//!
//! Object attributes:
//! - `class = "Name"`: Class name (defaults to the struct name)
//! - `super_class = "Name"`: Registered super class (defaults to `Object`)
//! - `abstract_class`: The class cannot be instantiated
//! - `help = "..."`: Interactive help text
//! - `no_slots`: The type has no `#[slots]` block
//!
//! Property attributes:
//! - `notify = "signal_name"`: Signal emitted with the new `value` on change
//! - `read_only`: No setter is generated
//! - `name = "..."`: Reflected name (defaults to the field name)
//! - `type_name = "..."`: Reflected type name (defaults to the field type)
//!
//! Writable properties must be stored in a `Property<T>` cell.
//!
//! ## `#[slots]`
//!
//! ```ignore
//! #[slots]
//! impl Point {
//!     /// Create a point.
//!     #[constructor]
//!     fn new(base: ObjectBase, #[default(0.0)] x: f64) -> Self { ... }
//!
//!     #[slot]
//!     fn translate(&self, dx: f64) -> InvokeResult<()> { ... }
//!
//!     #[signal]
//!     fn moved(&self, value: f64) {}
//! }
//! ```
//!
//! Doc comments become the `help` attribute of the member. Parameters take
//! `#[default(expr)]` and `#[type_name = "..."]`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DeriveInput, Expr, ExprLit, Field, Fields,
    FnArg, GenericArgument, Ident, ImplItem, ImplItemFn, ItemImpl, Lit, LitStr, Meta, Pat,
    PathArguments, ReturnType, Type,
};

/// Derive `gom_core::Object` and generate the class registration.
///
/// This macro generates:
/// - The `Object` implementation over the `base` field (and the `#[node]`
///   field, if any)
/// - `CLASS_NAME`, the reflected class name
/// - `register_meta_class(meta)`, which builds the class with its
///   properties and the members of the `#[slots]` block
///
/// # Example
///
/// ```ignore
/// use gom::prelude::*;
///
/// #[derive(Object)]
/// #[object(no_slots)]
/// struct Counter {
///     base: ObjectBase,
///     #[property]
///     value: Property<i64>,
/// }
///
/// let class = Counter::register_meta_class(&meta);
/// ```
#[proc_macro_derive(Object, attributes(object, property, node))]
pub fn derive_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match impl_derive_object(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Register the `#[constructor]`, `#[slot]` and `#[signal]` functions of an
/// `impl` block as members of the type's class.
///
/// Generates `__gom_register_slots`, called by the `register_meta_class`
/// of `#[derive(Object)]`. Signal bodies are replaced by an emission of the
/// signal with the function's arguments; signals return whether every
/// listener succeeded.
#[proc_macro_attribute]
pub fn slots(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemImpl);

    match impl_slots(item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

/// Parsed struct-level object attributes.
struct ObjectAttrs {
    class: Option<String>,
    super_class: String,
    is_abstract: bool,
    help: Option<String>,
    no_slots: bool,
}

/// Parsed property information.
struct PropertyInfo {
    field_name: Ident,
    name: String,
    type_name: String,
    notify_signal: Option<String>,
    read_only: bool,
    is_property_wrapper: bool,
}

fn impl_derive_object(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Object derive does not support generic types",
        ));
    }

    let object_attrs = parse_object_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Object derive only supports structs with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Object derive only supports structs",
            ))
        }
    };

    if !fields
        .iter()
        .any(|f| f.ident.as_ref().is_some_and(|i| i == "base"))
    {
        return Err(syn::Error::new_spanned(
            input,
            "Object derive requires a `base: ObjectBase` field",
        ));
    }

    let mut properties = Vec::new();
    let mut node_field = None;
    for field in fields.iter() {
        if field.attrs.iter().any(|attr| attr.path().is_ident("node")) {
            if node_field.is_some() {
                return Err(syn::Error::new_spanned(field, "only one field can be `#[node]`"));
            }
            node_field = field.ident.clone();
        }
        if let Some(prop_info) = parse_property_field(field)? {
            properties.push(prop_info);
        }
    }

    let class_name = object_attrs
        .class
        .clone()
        .unwrap_or_else(|| struct_name.to_string());
    let super_name = &object_attrs.super_class;

    let node_fn = node_field.map(|field| {
        quote! {
            fn node(&self) -> ::std::option::Option<&::gom_core::NodeLinks> {
                ::std::option::Option::Some(&self.#field)
            }
        }
    });

    let abstract_call = object_attrs.is_abstract.then(|| quote! { .abstract_class() });
    let help_call = object_attrs.help.as_ref().map(|help| quote! { .help(#help) });
    let register_slots = (!object_attrs.no_slots).then(|| quote! { Self::__gom_register_slots(&class); });
    let property_registrations = properties
        .iter()
        .map(|prop| generate_property_registration(&class_name, prop));

    Ok(quote! {
        impl ::gom_core::Object for #struct_name {
            fn base(&self) -> &::gom_core::ObjectBase {
                &self.base
            }

            #node_fn
        }

        impl #struct_name {
            /// Name of the reflected class of this type.
            pub const CLASS_NAME: &'static str = #class_name;

            #[doc(hidden)]
            pub fn __gom_cast(
                obj: &dyn ::gom_core::Object,
            ) -> ::gom_core::InvokeResult<&Self> {
                ::gom_core::object_cast::<Self>(obj).ok_or_else(|| {
                    ::gom_core::InvokeError::TargetType {
                        expected: ::std::string::ToString::to_string(Self::CLASS_NAME),
                        found: ::std::string::ToString::to_string(
                            ::gom_core::Object::meta_class(obj).name(),
                        ),
                    }
                })
            }

            /// Register the reflected class of this type in `meta`.
            ///
            /// Registering again returns the class already registered.
            ///
            /// # Panics
            ///
            /// Panics if the super class is not registered in `meta`.
            pub fn register_meta_class(
                meta: &::gom_core::Meta,
            ) -> ::std::sync::Arc<::gom_core::MetaClass> {
                if let ::std::option::Option::Some(class) = meta.resolve_class(Self::CLASS_NAME) {
                    return class;
                }
                let ::std::option::Option::Some(super_class) = meta.resolve_class(#super_name) else {
                    panic!(
                        "{} : super class {} is not registered",
                        Self::CLASS_NAME,
                        #super_name
                    );
                };
                let class = ::gom_core::MetaClass::builder(Self::CLASS_NAME)
                    .super_class(&super_class)
                    #abstract_call
                    #help_call
                    .type_id::<Self>()
                    .build();
                #(#property_registrations)*
                #register_slots
                meta.register_class(&class);
                class
            }
        }
    })
}

/// Parse struct-level #[object(...)] attributes.
fn parse_object_attrs(attrs: &[Attribute]) -> syn::Result<ObjectAttrs> {
    let mut result = ObjectAttrs {
        class: None,
        super_class: "Object".to_string(),
        is_abstract: false,
        help: None,
        no_slots: false,
    };

    for attr in attrs {
        if !attr.path().is_ident("object") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("class") {
                result.class = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("super_class") {
                result.super_class = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("abstract_class") {
                result.is_abstract = true;
            } else if meta.path.is_ident("help") {
                result.help = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("no_slots") {
                result.no_slots = true;
            } else {
                return Err(meta.error("unknown object attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Parse a field with #[property] attribute.
fn parse_property_field(field: &Field) -> syn::Result<Option<PropertyInfo>> {
    let Some(attr) = field.attrs.iter().find(|attr| attr.path().is_ident("property")) else {
        return Ok(None);
    };
    let Some(field_name) = field.ident.clone() else {
        return Ok(None);
    };

    let mut name = None;
    let mut type_name = None;
    let mut notify_signal = None;
    let mut read_only = false;

    // #[property] alone carries no arguments
    if matches!(attr.meta, Meta::List(_)) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("notify") {
                notify_signal = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("read_only") {
                read_only = true;
            } else if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("type_name") {
                type_name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unknown property attribute"));
            }
            Ok(())
        })?;
    }

    let (inner_type, is_property_wrapper) = extract_inner_type(&field.ty);
    if !read_only && !is_property_wrapper {
        return Err(syn::Error::new_spanned(
            &field.ty,
            "writable properties must be `Property<T>`; add `read_only` for plain fields",
        ));
    }
    if read_only && notify_signal.is_some() {
        return Err(syn::Error::new_spanned(
            attr,
            "read-only properties cannot notify changes",
        ));
    }

    Ok(Some(PropertyInfo {
        name: name.unwrap_or_else(|| field_name.to_string()),
        type_name: type_name.unwrap_or_else(|| gom_type_name(&inner_type)),
        field_name,
        notify_signal,
        read_only,
        is_property_wrapper,
    }))
}

/// Extract inner type from Property<T> or return the original type.
fn extract_inner_type(ty: &Type) -> (Type, bool) {
    match generic_argument(ty, "Property") {
        Some(inner) => (inner.clone(), true),
        None => (ty.clone(), false),
    }
}

/// The first type argument of `ty` when its last path segment is `wrapper`.
fn generic_argument<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    if segment.ident != wrapper {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

fn last_segment_is(ty: &Type, name: &str) -> bool {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .is_some_and(|segment| segment.ident == name),
        _ => false,
    }
}

/// The reflected name of a Rust type.
///
/// Object handles map to `Object*`; paths map to their last segment.
fn gom_type_name(ty: &Type) -> String {
    match ty {
        Type::Reference(reference) => gom_type_name(&reference.elem),
        Type::Path(path) if path.path.is_ident("str") => "String".to_string(),
        _ if last_segment_is(ty, "ObjectRef") => "Object*".to_string(),
        _ if generic_argument(ty, "Option").is_some_and(|inner| last_segment_is(inner, "ObjectRef")) => {
            "Object*".to_string()
        }
        Type::Path(path)
            if path
                .path
                .segments
                .last()
                .is_some_and(|segment| segment.arguments.is_empty()) =>
        {
            path.path
                .segments
                .last()
                .map(|segment| segment.ident.to_string())
                .unwrap_or_default()
        }
        _ => type_to_string(ty),
    }
}

/// Convert a type to a string representation.
fn type_to_string(ty: &Type) -> String {
    quote!(#ty).to_string().replace(' ', "")
}

fn generate_property_registration(class_name: &str, prop: &PropertyInfo) -> TokenStream2 {
    let field_name = &prop.field_name;
    let name = &prop.name;
    let type_name = &prop.type_name;

    let getter_value = if prop.is_property_wrapper {
        quote! { this.#field_name.get_any() }
    } else {
        quote! { ::gom_core::Any::from(::std::clone::Clone::clone(&this.#field_name)) }
    };

    let setter = if prop.read_only {
        quote! {}
    } else {
        let setter_label = format!("{class_name}::set_{name}");
        let store = match &prop.notify_signal {
            Some(signal) => quote! {
                if this.#field_name.set_any(value, #setter_label)? {
                    this.base.emit_signal(
                        #signal,
                        &::gom_core::ArgList::new().with("value", this.#field_name.get_any()),
                    );
                }
            },
            None => quote! {
                this.#field_name.set_any(value, #setter_label)?;
            },
        };
        quote! {
            .with_setter(
                |obj: &dyn ::gom_core::Object,
                 value: &::gom_core::Any|
                 -> ::gom_core::InvokeResult<()> {
                    let this = Self::__gom_cast(obj)?;
                    #store
                    ::std::result::Result::Ok(())
                },
            )
        }
    };

    quote! {
        class.add_property(
            ::gom_core::MetaProperty::new(
                #name,
                &class,
                #type_name,
                |obj: &dyn ::gom_core::Object| -> ::gom_core::InvokeResult<::gom_core::Any> {
                    let this = Self::__gom_cast(obj)?;
                    ::std::result::Result::Ok(#getter_value)
                },
            )
            #setter
        );
    }
}

// ---------------------------------------------------------------------------
// #[slots]
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Constructor,
    Slot,
    Signal,
}

/// How a parameter is fed from the argument list.
enum ParamKind {
    /// Converted from the argument of the same name.
    Value(Type),
    /// `&str`, converted through `String`.
    Str,
    /// `&ArgList`: the whole argument list.
    ArgList,
    /// `ObjectBase` of a constructor: a fresh base for the new object.
    Base,
}

struct ParamInfo {
    ident: Ident,
    name: String,
    kind: ParamKind,
    type_name: String,
    default: Option<Expr>,
}

fn impl_slots(mut item: ItemImpl) -> syn::Result<TokenStream2> {
    if item.trait_.is_some() {
        return Err(syn::Error::new_spanned(
            &item.self_ty,
            "#[slots] applies to inherent impl blocks",
        ));
    }

    let mut registrations = Vec::new();
    for impl_item in item.items.iter_mut() {
        let ImplItem::Fn(function) = impl_item else {
            continue;
        };
        let Some(kind) = take_member_kind(&mut function.attrs)? else {
            continue;
        };
        let help = doc_comment(&function.attrs);
        let params = take_params(function, kind)?;
        let registration = match kind {
            MemberKind::Constructor => generate_constructor(function, &params)?,
            MemberKind::Slot => generate_slot(function, &params)?,
            MemberKind::Signal => generate_signal(function, &params)?,
        };
        let help = help.map(|help| {
            quote! {
                method.custom_attributes().create_custom_attribute("help", #help);
            }
        });
        registrations.push(quote! {
            {
                let method = #registration;
                #help
                let _ = method;
            }
        });
    }

    let self_ty = &item.self_ty;
    Ok(quote! {
        #item

        impl #self_ty {
            #[doc(hidden)]
            pub fn __gom_register_slots(class: &::std::sync::Arc<::gom_core::MetaClass>) {
                #(#registrations)*
            }
        }
    })
}

/// Remove the member attribute of a function and report its kind.
fn take_member_kind(attrs: &mut Vec<Attribute>) -> syn::Result<Option<MemberKind>> {
    let mut kind = None;
    let mut error = None;
    attrs.retain(|attr| {
        let found = if attr.path().is_ident("constructor") {
            MemberKind::Constructor
        } else if attr.path().is_ident("slot") {
            MemberKind::Slot
        } else if attr.path().is_ident("signal") {
            MemberKind::Signal
        } else {
            return true;
        };
        if kind.replace(found).is_some() {
            error = Some(syn::Error::new_spanned(attr, "a function declares a single member"));
        }
        false
    });
    match error {
        Some(err) => Err(err),
        None => Ok(kind),
    }
}

/// The doc comment of a function, trimmed and joined by newlines.
fn doc_comment(attrs: &[Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(ExprLit {
                    lit: Lit::Str(doc), ..
                }) => Some(doc.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .collect();
    let doc = lines.join("\n").trim().to_string();
    (!doc.is_empty()).then_some(doc)
}

/// Parse the parameters of a member function, stripping their attributes.
fn take_params(function: &mut ImplItemFn, kind: MemberKind) -> syn::Result<Vec<ParamInfo>> {
    let mut params = Vec::new();
    let mut has_receiver = false;
    let nb_inputs = function.sig.inputs.len();

    for (index, input) in function.sig.inputs.iter_mut().enumerate() {
        let pat_type = match input {
            FnArg::Receiver(receiver) => {
                if receiver.mutability.is_some() || receiver.reference.is_none() {
                    return Err(syn::Error::new_spanned(
                        receiver,
                        "reflected methods take `&self`",
                    ));
                }
                has_receiver = true;
                continue;
            }
            FnArg::Typed(pat_type) => pat_type,
        };

        let mut default = None;
        let mut type_name = None;
        let mut error = None;
        pat_type.attrs.retain(|attr| {
            if attr.path().is_ident("default") {
                match attr.parse_args::<Expr>() {
                    Ok(expr) => default = Some(expr),
                    Err(err) => error = Some(err),
                }
                false
            } else if attr.path().is_ident("type_name") {
                match &attr.meta {
                    Meta::NameValue(nv) => match &nv.value {
                        Expr::Lit(ExprLit {
                            lit: Lit::Str(name), ..
                        }) => type_name = Some(name.value()),
                        other => error = Some(syn::Error::new_spanned(other, "expected a string")),
                    },
                    other => {
                        error = Some(syn::Error::new_spanned(other, "expected `type_name = \"...\"`"))
                    }
                }
                false
            } else {
                true
            }
        });
        if let Some(err) = error {
            return Err(err);
        }

        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(syn::Error::new_spanned(
                &pat_type.pat,
                "reflected parameters must be plain identifiers",
            ));
        };
        let ident = pat_ident.ident.clone();
        let ty = pat_type.ty.as_ref();

        let param_kind = match ty {
            Type::Reference(reference) => match reference.elem.as_ref() {
                Type::Path(path) if path.path.is_ident("str") => ParamKind::Str,
                elem if last_segment_is(elem, "ArgList") => {
                    if nb_inputs != 2 || kind != MemberKind::Slot {
                        return Err(syn::Error::new_spanned(
                            ty,
                            "`&ArgList` must be the only parameter of a slot",
                        ));
                    }
                    ParamKind::ArgList
                }
                _ => {
                    return Err(syn::Error::new_spanned(
                        ty,
                        "reflected parameters are owned values, `&str` or `&ArgList`",
                    ))
                }
            },
            _ if kind == MemberKind::Constructor && index == 0 && last_segment_is(ty, "ObjectBase") => {
                ParamKind::Base
            }
            _ => ParamKind::Value(ty.clone()),
        };

        let type_name = match param_kind {
            ParamKind::ArgList => "ArgList".to_string(),
            _ => type_name.unwrap_or_else(|| gom_type_name(ty)),
        };
        let name = match param_kind {
            ParamKind::ArgList => "args".to_string(),
            _ => ident.to_string().trim_start_matches("r#").to_string(),
        };
        params.push(ParamInfo {
            ident,
            name,
            kind: param_kind,
            type_name,
            default,
        });
    }

    match kind {
        MemberKind::Constructor if has_receiver => Err(syn::Error::new_spanned(
            &function.sig,
            "constructors do not take `self`",
        )),
        MemberKind::Slot | MemberKind::Signal if !has_receiver => Err(syn::Error::new_spanned(
            &function.sig,
            "slots and signals take `&self`",
        )),
        _ => Ok(params),
    }
}

fn meta_args(params: &[ParamInfo]) -> Vec<TokenStream2> {
    params
        .iter()
        .filter(|param| !matches!(param.kind, ParamKind::Base))
        .map(|param| {
            let name = &param.name;
            let type_name = &param.type_name;
            let default = param
                .default
                .as_ref()
                .map(|expr| quote! { .with_default(#expr) });
            quote! {
                .with_arg(::gom_core::MetaArg::new(#name, #type_name) #default)
            }
        })
        .collect()
}

/// Whether the generated adapter reads the argument list.
fn uses_args(params: &[ParamInfo]) -> bool {
    params.iter().any(|param| !matches!(param.kind, ParamKind::Base))
}

/// Whether the generated adapter converts arguments, naming the method in
/// conversion errors.
fn converts_args(params: &[ParamInfo]) -> bool {
    params
        .iter()
        .any(|param| matches!(param.kind, ParamKind::Value(_) | ParamKind::Str))
}

/// Statements converting the argument list into locals, and the call
/// arguments passing them.
fn bind_params(params: &[ParamInfo]) -> (Vec<TokenStream2>, Vec<TokenStream2>) {
    let mut bindings = Vec::new();
    let mut call_args = Vec::new();
    for param in params {
        let ident = &param.ident;
        let name = &param.name;
        match &param.kind {
            ParamKind::Value(ty) => {
                bindings.push(quote! {
                    let #ident: #ty = __gom_args.require(&__gom_method, #name)?;
                });
                call_args.push(quote! { #ident });
            }
            ParamKind::Str => {
                bindings.push(quote! {
                    let #ident: ::std::string::String = __gom_args.require(&__gom_method, #name)?;
                });
                call_args.push(quote! { &#ident });
            }
            ParamKind::ArgList => call_args.push(quote! { __gom_args }),
            ParamKind::Base => call_args.push(quote! {
                ::gom_core::ObjectBase::new(::std::sync::Arc::clone(__gom_class))
            }),
        }
    }
    (bindings, call_args)
}

/// Return type name and whether the function returns a `Result`.
fn return_info(output: &ReturnType) -> (String, bool) {
    match output {
        ReturnType::Default => ("()".to_string(), false),
        ReturnType::Type(_, ty) => {
            if let Some(inner) =
                generic_argument(ty, "InvokeResult").or_else(|| generic_argument(ty, "Result"))
            {
                (gom_type_name(inner), true)
            } else {
                (gom_type_name(ty), false)
            }
        }
    }
}

fn generate_slot(function: &ImplItemFn, params: &[ParamInfo]) -> syn::Result<TokenStream2> {
    let fn_name = &function.sig.ident;
    let name = fn_name.to_string();
    let (return_type, fallible) = return_info(&function.sig.output);
    let (bindings, call_args) = bind_params(params);
    let meta_args = meta_args(params);

    let call = quote! { __gom_this.#fn_name(#(#call_args),*) };
    let result = match (&function.sig.output, fallible) {
        (ReturnType::Default, _) => quote! {
            #call;
            ::std::result::Result::Ok(::gom_core::Any::Null)
        },
        (_, true) => quote! {
            #call
                .map(::gom_core::Any::from)
                .map_err(::std::convert::Into::into)
        },
        (_, false) => quote! {
            ::std::result::Result::Ok(::gom_core::Any::from(#call))
        },
    };

    let method_name = converts_args(params).then(|| {
        quote! { let __gom_method = ::std::format!("{}::{}", class.name(), #name); }
    });
    let args_pat = if uses_args(params) {
        quote! { __gom_args }
    } else {
        quote! { _ }
    };

    Ok(quote! {
        {
            #method_name
            class.add_slot(
                ::gom_core::MetaMethod::slot(
                    #name,
                    class,
                    #return_type,
                    move |__gom_obj, #args_pat| {
                        let __gom_this = Self::__gom_cast(__gom_obj)?;
                        #(#bindings)*
                        #result
                    },
                )
                #(#meta_args)*
            )
        }
    })
}

fn generate_signal(function: &mut ImplItemFn, params: &[ParamInfo]) -> syn::Result<TokenStream2> {
    let name = function.sig.ident.to_string();
    if !matches!(function.sig.output, ReturnType::Default) {
        return Err(syn::Error::new_spanned(
            &function.sig.output,
            "signals are declared without return type",
        ));
    }
    let meta_args = meta_args(params);

    let mut values = Vec::new();
    for param in params {
        let ident = &param.ident;
        let arg_name = &param.name;
        match param.kind {
            ParamKind::Value(_) | ParamKind::Str => values.push(quote! { .with(#arg_name, #ident) }),
            ParamKind::ArgList | ParamKind::Base => {
                return Err(syn::Error::new_spanned(
                    &param.ident,
                    "signal arguments are owned values or `&str`",
                ))
            }
        }
    }

    function.sig.output = parse_quote! { -> bool };
    function.block = parse_quote! {
        {
            ::gom_core::Object::base(self).emit_signal(
                #name,
                &::gom_core::ArgList::new() #(#values)*,
            )
        }
    };

    Ok(quote! {
        class.add_signal(::gom_core::MetaMethod::signal(#name, class) #(#meta_args)*)
    })
}

fn generate_constructor(function: &ImplItemFn, params: &[ParamInfo]) -> syn::Result<TokenStream2> {
    let fn_name = &function.sig.ident;
    let returns_self = match &function.sig.output {
        ReturnType::Type(_, ty) => matches!(ty.as_ref(), Type::Path(path) if path.path.is_ident("Self")),
        ReturnType::Default => false,
    };
    if !returns_self {
        return Err(syn::Error::new_spanned(
            &function.sig,
            "constructors return `Self`",
        ));
    }
    let (bindings, call_args) = bind_params(params);
    let meta_args = meta_args(params);
    let method_name = converts_args(params).then(|| {
        quote! {
            let __gom_method = ::std::format!("{}::{}", class.name(), class.new_constructor_name());
        }
    });
    let args_pat = if uses_args(params) {
        quote! { __gom_args }
    } else {
        quote! { _ }
    };

    Ok(quote! {
        {
            #method_name
            class.add_constructor(
                ::gom_core::MetaMethod::constructor(
                    class,
                    move |__gom_class: &::std::sync::Arc<::gom_core::MetaClass>,
                          #args_pat: &::gom_core::ArgList|
                          -> ::std::option::Option<::gom_core::ObjectRef> {
                        let __gom_build = || -> ::gom_core::InvokeResult<Self> {
                            #(#bindings)*
                            ::std::result::Result::Ok(Self::#fn_name(#(#call_args),*))
                        };
                        match __gom_build() {
                            ::std::result::Result::Ok(object) => ::std::option::Option::Some(
                                ::gom_core::new_object(object) as ::gom_core::ObjectRef,
                            ),
                            ::std::result::Result::Err(err) => {
                                ::gom_core::factory_failed(__gom_class, &err)
                            }
                        }
                    },
                )
                #(#meta_args)*
            )
        }
    })
}
