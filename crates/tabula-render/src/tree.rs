#![forbid(unsafe_code)]

//! The abstract node tree the table renders into.
//!
//! [`Tree`] is the minimal DOM-like surface the builder and reconciler need:
//! element and text nodes, attributes, inline style properties, and child
//! list edits. [`Document`](crate::Document) is the in-memory implementation;
//! a browser binding would implement the same trait over real DOM nodes.
//!
//! Node handles are plain `Copy` values owned by the tree. A node removed
//! from its parent stays valid (detached) until [`Tree::discard`] is called.

use std::fmt;

/// Structural kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind<'a> {
    Element(&'a str),
    Text,
}

/// Errors from structural tree edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// The handle refers to a discarded node.
    StaleNode,
    /// The node is not a child of the given parent.
    NotAChild,
    /// Inserting the node would make it its own ancestor.
    WouldCycle,
    /// Text nodes cannot have children.
    NotAnElement,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleNode => write!(f, "node handle refers to a discarded node"),
            Self::NotAChild => write!(f, "node is not a child of the given parent"),
            Self::WouldCycle => write!(f, "insertion would create a cycle"),
            Self::NotAnElement => write!(f, "text nodes cannot have children"),
        }
    }
}

impl std::error::Error for TreeError {}

/// A mutable tree of element and text nodes.
pub trait Tree {
    /// Node handle.
    type Node: Copy + Eq + fmt::Debug;

    fn kind(&self, node: Self::Node) -> Option<NodeKind<'_>>;
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;
    /// Children in order. Owned so callers can edit while walking.
    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    fn attribute(&self, node: Self::Node, name: &str) -> Option<&str>;
    /// Attributes in insertion order.
    fn attributes(&self, node: Self::Node) -> Vec<(String, String)>;
    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);
    fn remove_attribute(&mut self, node: Self::Node, name: &str) -> bool;

    fn style(&self, node: Self::Node, property: &str) -> Option<&str>;
    /// Inline style properties in insertion order.
    fn styles(&self, node: Self::Node) -> Vec<(String, String)>;
    fn set_style(&mut self, node: Self::Node, property: &str, value: &str);
    fn remove_style(&mut self, node: Self::Node, property: &str) -> bool;

    /// Content of a text node; `None` for elements.
    fn text(&self, node: Self::Node) -> Option<&str>;
    fn set_text(&mut self, node: Self::Node, text: &str);

    fn create_element(&mut self, tag: &str) -> Self::Node;
    fn create_text(&mut self, text: &str) -> Self::Node;

    /// Append `child`, detaching it from any previous parent.
    fn append_child(&mut self, parent: Self::Node, child: Self::Node) -> Result<(), TreeError>;
    /// Insert `child` before `reference` (append when `None`).
    fn insert_before(
        &mut self,
        parent: Self::Node,
        child: Self::Node,
        reference: Option<Self::Node>,
    ) -> Result<(), TreeError>;
    fn remove_child(&mut self, parent: Self::Node, child: Self::Node) -> Result<(), TreeError>;
    /// Put `new` where `old` is; `old` ends detached.
    fn replace_child(
        &mut self,
        parent: Self::Node,
        new: Self::Node,
        old: Self::Node,
    ) -> Result<(), TreeError>;

    /// Release a detached subtree. Trees without manual storage ignore this.
    fn discard(&mut self, _node: Self::Node) {}

    // -------------------------------------------------------------------------
    // Provided helpers
    // -------------------------------------------------------------------------

    /// Tag name, for elements.
    fn tag(&self, node: Self::Node) -> Option<&str> {
        match self.kind(node)? {
            NodeKind::Element(tag) => Some(tag),
            NodeKind::Text => None,
        }
    }

    /// Detach `node` from its parent, if it has one.
    fn detach(&mut self, node: Self::Node) {
        if let Some(parent) = self.parent(node) {
            let _ = self.remove_child(parent, node);
        }
    }

    /// Concatenated text of `node` and its descendants.
    fn text_content(&self, node: Self::Node) -> String {
        let mut out = String::new();
        collect_text(self, node, &mut out);
        out
    }

    fn has_class(&self, node: Self::Node, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    /// Add or remove `class` from the `class` attribute. Returns whether the
    /// attribute changed.
    fn toggle_class(&mut self, node: Self::Node, class: &str, on: bool) -> bool {
        if self.has_class(node, class) == on {
            return false;
        }
        let current = self.attribute(node, "class").unwrap_or_default().to_owned();
        let mut classes: Vec<&str> = current.split_ascii_whitespace().collect();
        if on {
            classes.push(class);
        } else {
            classes.retain(|c| *c != class);
        }
        if classes.is_empty() {
            self.remove_attribute(node, "class");
        } else {
            self.set_attribute(node, "class", &classes.join(" "));
        }
        true
    }

    /// Set or clear a boolean attribute (`checked`, `disabled`, ...).
    fn set_flag(&mut self, node: Self::Node, name: &str, on: bool) {
        if on {
            if self.attribute(node, name).is_none() {
                self.set_attribute(node, name, "");
            }
        } else {
            self.remove_attribute(node, name);
        }
    }

    fn flag(&self, node: Self::Node, name: &str) -> bool {
        self.attribute(node, name).is_some()
    }
}

fn collect_text<T: Tree + ?Sized>(tree: &T, node: T::Node, out: &mut String) {
    match tree.kind(node) {
        Some(NodeKind::Text) => out.push_str(tree.text(node).unwrap_or_default()),
        Some(NodeKind::Element(_)) => {
            for child in tree.children(node) {
                collect_text(tree, child, out);
            }
        }
        None => {}
    }
}
