//! Logging and debugging facilities for GOM.
//!
//! This module provides:
//! - The `tracing` targets every subsystem logs under
//! - Debug visualization of the class hierarchy and of object trees
//!
//! # Tracing Integration
//!
//! GOM uses the `tracing` crate for instrumentation. Failed calls, script
//! errors and ignored arguments are reported there rather than returned as
//! text. To see logs, install a subscriber in your application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt()
//!         .with_env_filter("gom_core::dispatch=warn,gom_lua=debug")
//!         .init();
//! }
//! ```
//!
//! # Debug Visualization
//!
//! ```ignore
//! use gom_core::logging::{ClassTreeDebug, NodeTreeDebug};
//!
//! println!("{}", ClassTreeDebug::new(&meta));
//! println!("{}", NodeTreeDebug::new(&root));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::meta_class::MetaClass;
use crate::meta_member::MemberKind;
use crate::object::ObjectRef;
use crate::registry::Meta;

/// Target names for log filtering.
///
/// Use these with `tracing` directives to filter logs by subsystem.
pub mod targets {
    /// Core runtime target.
    pub const CORE: &str = "gom_core";
    /// Registry and class model.
    pub const META: &str = "gom_core::meta";
    /// Object creation, destruction and trees.
    pub const OBJECT: &str = "gom_core::object";
    /// Method and property dispatch.
    pub const DISPATCH: &str = "gom_core::dispatch";
    /// Signal emission and connections.
    pub const SIGNAL: &str = "gom_core::signal";
    /// Interpreter commands and script errors.
    pub const INTERPRETER: &str = "gom_core::interpreter";
    /// Lua bridge.
    pub const LUA: &str = "gom_lua";
    /// Rhai bridge.
    pub const RHAI: &str = "gom_rhai";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show object ids (object trees).
    pub show_ids: bool,
    /// Whether to list members (class trees) or property values (object trees).
    pub show_properties: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_properties: false,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Create options for detailed debugging output.
    pub fn detailed() -> Self {
        Self {
            show_properties: true,
            ..Default::default()
        }
    }

    /// Create options for minimal output.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_properties: false,
            ..Default::default()
        }
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }
        let (branch, corner, last) = match self.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };
        let mut prefix = String::new();
        for _ in 0..(depth - 1) {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.indent_size));
        }
        prefix.push_str(if is_last { last } else { corner });
        prefix.push(' ');
        prefix
    }

    fn build_detail_prefix(&self, depth: usize) -> String {
        let branch = match self.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };
        let mut prefix = String::new();
        for _ in 0..depth {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.indent_size));
        }
        prefix
    }

    fn within_depth(&self, depth: usize) -> bool {
        self.max_depth.is_none_or(|max| depth <= max)
    }
}

/// The class hierarchy of a registry.
pub struct ClassTreeDebug<'a> {
    meta: &'a Meta,
    options: TreeFormatOptions,
}

impl<'a> ClassTreeDebug<'a> {
    pub fn new(meta: &'a Meta) -> Self {
        Self::with_options(meta, TreeFormatOptions::default())
    }

    pub fn with_options(meta: &'a Meta, options: TreeFormatOptions) -> Self {
        Self { meta, options }
    }

    fn format_class(
        &self,
        f: &mut fmt::Formatter<'_>,
        classes: &[Arc<MetaClass>],
        class: &Arc<MetaClass>,
        depth: usize,
        is_last: bool,
    ) -> fmt::Result {
        if !self.options.within_depth(depth) {
            return Ok(());
        }
        write!(f, "{}{}", self.options.build_prefix(depth, is_last), class.name())?;
        if class.is_abstract() {
            f.write_str(" (abstract)")?;
        }
        writeln!(f)?;
        if self.options.show_properties {
            let prefix = self.options.build_detail_prefix(depth);
            for member in class.members(false) {
                let kind = match member.kind() {
                    MemberKind::Property => "property",
                    MemberKind::Slot => "slot",
                    MemberKind::Signal => "signal",
                    MemberKind::Constructor => "constructor",
                };
                writeln!(f, "{prefix}  .{} : {kind}", member.name())?;
            }
        }
        let subclasses: Vec<&Arc<MetaClass>> = classes
            .iter()
            .filter(|c| c.super_class().is_some_and(|s| Arc::ptr_eq(s, class)))
            .collect();
        let count = subclasses.len();
        for (i, subclass) in subclasses.into_iter().enumerate() {
            self.format_class(f, classes, subclass, depth + 1, i + 1 == count)?;
        }
        Ok(())
    }
}

impl fmt::Display for ClassTreeDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = self.meta.list_classes();
        writeln!(f, "Class Tree ({} classes):", classes.len())?;
        let roots: Vec<&Arc<MetaClass>> = classes.iter().filter(|c| c.super_class().is_none()).collect();
        for root in roots {
            self.format_class(f, &classes, root, 0, true)?;
        }
        Ok(())
    }
}

/// An object tree, following node links from a root.
pub struct NodeTreeDebug<'a> {
    root: &'a ObjectRef,
    options: TreeFormatOptions,
}

impl<'a> NodeTreeDebug<'a> {
    pub fn new(root: &'a ObjectRef) -> Self {
        Self::with_options(root, TreeFormatOptions::default())
    }

    pub fn with_options(root: &'a ObjectRef, options: TreeFormatOptions) -> Self {
        Self { root, options }
    }

    fn format_node(
        &self,
        f: &mut fmt::Formatter<'_>,
        object: &ObjectRef,
        depth: usize,
        is_last: bool,
    ) -> fmt::Result {
        if !self.options.within_depth(depth) {
            return Ok(());
        }
        write!(f, "{}{}", self.options.build_prefix(depth, is_last), object.meta_class().name())?;
        if self.options.show_ids {
            write!(f, " [#{}]", object.base().id())?;
        }
        writeln!(f)?;
        if self.options.show_properties {
            let prefix = self.options.build_detail_prefix(depth);
            for member in object.meta_class().members(true) {
                if let Some(property) = member.as_property() {
                    if let Ok(value) = property.get_value(object.as_ref()) {
                        writeln!(f, "{prefix}  .{} = {value}", property.name())?;
                    }
                }
            }
        }
        let children = object.node().map(|links| links.children()).unwrap_or_default();
        let count = children.len();
        for (i, child) in children.iter().enumerate() {
            self.format_node(f, child, depth + 1, i + 1 == count)?;
        }
        Ok(())
    }
}

impl fmt::Display for NodeTreeDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format_node(f, self.root, 0, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{add_child, Node};

    #[test]
    fn test_class_tree() {
        let meta = Meta::new();
        let output = ClassTreeDebug::new(&meta).to_string();
        assert!(output.starts_with("Class Tree ("));
        assert!(output.contains("\nObject (abstract)\n"));
        assert!(output.contains("Node\n"));
        assert!(output.contains("Request"));
    }

    #[test]
    fn test_class_tree_members() {
        let meta = Meta::new();
        let options = TreeFormatOptions {
            max_depth: Some(0),
            ..TreeFormatOptions::detailed()
        };
        let output = ClassTreeDebug::with_options(&meta, options).to_string();
        assert!(output.contains(".string_id : property"));
        assert!(!output.contains("Node"));
    }

    #[test]
    fn test_node_tree_hierarchy() {
        let meta = Meta::new();
        let root: ObjectRef = Node::new(&meta);
        let a: ObjectRef = Node::new(&meta);
        let b: ObjectRef = Node::new(&meta);
        add_child(&root, &a).unwrap();
        add_child(&root, &b).unwrap();

        let output = NodeTreeDebug::new(&root).to_string();
        assert_eq!(output.lines().count(), 3);
        assert!(output.contains(&format!("[#{}]", b.base().id())));
        assert!(output.lines().nth(2).is_some_and(|l| l.starts_with('\u{2514}')));
    }

    #[test]
    fn test_node_tree_minimal() {
        let meta = Meta::new();
        let root: ObjectRef = Node::new(&meta);
        let options = TreeFormatOptions {
            style: TreeStyle::Ascii,
            ..TreeFormatOptions::minimal()
        };
        let output = NodeTreeDebug::with_options(&root, options).to_string();
        assert_eq!(output, "Node\n");
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<parking_lot::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_events_use_targets() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            let colors = crate::MetaEnum::new("Color");
            colors.add_value("RED", 0);
        });
        let output = String::from_utf8_lossy(&captured.0.lock()).into_owned();
        assert!(output.contains(&format!("{}: enum value added", targets::META)), "{output}");

        for target in [targets::META, targets::OBJECT, targets::DISPATCH, targets::SIGNAL, targets::INTERPRETER] {
            assert!(target.starts_with(targets::CORE), "{target}");
        }
        assert_eq!(targets::LUA, "gom_lua");
        assert_eq!(targets::RHAI, "gom_rhai");
    }

    #[test]
    fn test_node_tree_properties() {
        let meta = Meta::new();
        let root: ObjectRef = Node::new(&meta);
        let output = NodeTreeDebug::with_options(&root, TreeFormatOptions::detailed()).to_string();
        assert!(output.contains(".nb_children = 0"));
    }
}
