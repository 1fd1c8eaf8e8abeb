#![forbid(unsafe_code)]

//! In-memory [`Tree`] implementation.
//!
//! Nodes live in an arena indexed by [`NodeId`]. Discarded nodes return their
//! slot to a free list; the slot's generation is bumped so stale handles are
//! detected instead of aliasing the next node.
//!
//! # Invariants
//!
//! 1. A node appears in at most one children list, and its `parent` field
//!    names that list's owner.
//! 2. No node is its own ancestor.
//! 3. A handle is live iff its generation matches its slot.

use std::fmt::{self, Write as _};

use smallvec::SmallVec;

use crate::tree::{NodeKind, Tree, TreeError};

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

type Pairs = SmallVec<[(String, String); 4]>;

#[derive(Debug, Clone)]
enum Content {
    Element { tag: String, attrs: Pairs, styles: Pairs },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    content: Content,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<NodeData>,
}

/// Arena-backed element/text tree.
#[derive(Debug, Clone, Default)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

fn get_pair<'a>(pairs: &'a Pairs, name: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn set_pair(pairs: &mut Pairs, name: &str, value: &str) {
    match pairs.iter_mut().find(|(k, _)| k == name) {
        Some((_, v)) => {
            if v != value {
                value.clone_into(v);
            }
        }
        None => pairs.push((name.to_owned(), value.to_owned())),
    }
}

fn remove_pair(pairs: &mut Pairs, name: &str) -> bool {
    match pairs.iter().position(|(k, _)| k == name) {
        Some(pos) => {
            pairs.remove(pos);
            true
        }
        None => false,
    }
}

impl Document {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    /// Whether `id` refers to a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.data(id).is_some()
    }

    fn data(&self, id: NodeId) -> Option<&NodeData> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn data_mut(&mut self, id: NodeId) -> Option<&mut NodeData> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.node.as_mut()
    }

    fn alloc(&mut self, content: Content) -> NodeId {
        let node = NodeData {
            content,
            parent: None,
            children: Vec::new(),
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        let index = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index,
            generation: 0,
        }
    }

    fn check_insert(&self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        let parent_data = self.data(parent).ok_or(TreeError::StaleNode)?;
        if !self.contains(child) {
            return Err(TreeError::StaleNode);
        }
        if matches!(parent_data.content, Content::Text(_)) {
            return Err(TreeError::NotAnElement);
        }
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node == child {
                return Err(TreeError::WouldCycle);
            }
            cursor = self.data(node).and_then(|d| d.parent);
        }
        Ok(())
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(parent) = self.data(child).and_then(|d| d.parent) else {
            return;
        };
        if let Some(p) = self.data_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.data_mut(child) {
            c.parent = None;
        }
    }

    fn adopt(&mut self, parent: NodeId, child: NodeId, at: Option<usize>) {
        if let Some(p) = self.data_mut(parent) {
            match at {
                Some(pos) if pos <= p.children.len() => p.children.insert(pos, child),
                _ => p.children.push(child),
            }
        }
        if let Some(c) = self.data_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn position(&self, parent: NodeId, child: NodeId) -> Result<usize, TreeError> {
        self.data(parent)
            .ok_or(TreeError::StaleNode)?
            .children
            .iter()
            .position(|c| *c == child)
            .ok_or(TreeError::NotAChild)
    }

    fn pairs(&self, node: NodeId, styles: bool) -> Option<&Pairs> {
        match &self.data(node)?.content {
            Content::Element { attrs, styles: s, .. } => Some(if styles { s } else { attrs }),
            Content::Text(_) => None,
        }
    }

    fn pairs_mut(&mut self, node: NodeId, styles: bool) -> Option<&mut Pairs> {
        match &mut self.data_mut(node)?.content {
            Content::Element { attrs, styles: s, .. } => Some(if styles { s } else { attrs }),
            Content::Text(_) => None,
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Descendants of `root` (inclusive, document order) carrying attribute
    /// `name`, optionally with exactly `value`.
    #[must_use]
    pub fn query_all(&self, root: NodeId, name: &str, value: Option<&str>) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            let Some(data) = self.data(node) else { continue };
            if let Some(found) = self.attribute(node, name) {
                if value.is_none_or(|v| v == found) {
                    out.push(node);
                }
            }
            stack.extend(data.children.iter().rev());
        }
        out
    }

    /// First match of [`query_all`](Self::query_all).
    #[must_use]
    pub fn query(&self, root: NodeId, name: &str, value: Option<&str>) -> Option<NodeId> {
        self.query_all(root, name, value).into_iter().next()
    }

    /// Serialize the subtree at `node`. Attributes keep insertion order;
    /// inline styles are emitted as a trailing `style` attribute.
    #[must_use]
    pub fn markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.data(node) else { return };
        match &data.content {
            Content::Text(text) => escape_into(text, out, false),
            Content::Element { tag, attrs, styles } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    let _ = write!(out, " {name}=\"");
                    escape_into(value, out, true);
                    out.push('"');
                }
                if !styles.is_empty() {
                    out.push_str(" style=\"");
                    for (i, (prop, value)) in styles.iter().enumerate() {
                        if i > 0 {
                            out.push(' ');
                        }
                        let _ = write!(out, "{prop}: ");
                        escape_into(value, out, true);
                        out.push(';');
                    }
                    out.push('"');
                }
                out.push('>');
                for child in &data.children {
                    self.write_markup(*child, out);
                }
                let _ = write!(out, "</{tag}>");
            }
        }
    }
}

fn escape_into(text: &str, out: &mut String, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

impl Tree for Document {
    type Node = NodeId;

    fn kind(&self, node: NodeId) -> Option<NodeKind<'_>> {
        Some(match &self.data(node)?.content {
            Content::Element { tag, .. } => NodeKind::Element(tag),
            Content::Text(_) => NodeKind::Text,
        })
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.data(node).map(|d| d.children.clone()).unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        get_pair(self.pairs(node, false)?, name)
    }

    fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        self.pairs(node, false).map(|p| p.to_vec()).unwrap_or_default()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(attrs) = self.pairs_mut(node, false) {
            set_pair(attrs, name, value);
        }
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> bool {
        self.pairs_mut(node, false).is_some_and(|attrs| remove_pair(attrs, name))
    }

    fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        get_pair(self.pairs(node, true)?, property)
    }

    fn styles(&self, node: NodeId) -> Vec<(String, String)> {
        self.pairs(node, true).map(|p| p.to_vec()).unwrap_or_default()
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        if let Some(styles) = self.pairs_mut(node, true) {
            set_pair(styles, property, value);
        }
    }

    fn remove_style(&mut self, node: NodeId, property: &str) -> bool {
        self.pairs_mut(node, true).is_some_and(|styles| remove_pair(styles, property))
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.data(node)?.content {
            Content::Text(text) => Some(text),
            Content::Element { .. } => None,
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(NodeData {
            content: Content::Text(current),
            ..
        }) = self.data_mut(node)
        {
            text.clone_into(current);
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.alloc(Content::Element {
            tag: tag.to_owned(),
            attrs: Pairs::new(),
            styles: Pairs::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(Content::Text(text.to_owned()))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_insert(parent, child)?;
        self.unlink(child);
        self.adopt(parent, child, None);
        Ok(())
    }

    fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), TreeError> {
        if reference == Some(child) {
            return self.position(parent, child).map(drop);
        }
        self.check_insert(parent, child)?;
        if let Some(reference) = reference {
            self.position(parent, reference)?;
        }
        self.unlink(child);
        let at = match reference {
            Some(reference) => Some(self.position(parent, reference)?),
            None => None,
        };
        self.adopt(parent, child, at);
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.position(parent, child)?;
        self.unlink(child);
        Ok(())
    }

    fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), TreeError> {
        if new == old {
            return self.position(parent, old).map(drop);
        }
        self.position(parent, old)?;
        self.check_insert(parent, new)?;
        self.unlink(new);
        let at = self.position(parent, old)?;
        if let Some(p) = self.data_mut(parent) {
            p.children[at] = new;
        }
        if let Some(n) = self.data_mut(new) {
            n.parent = Some(parent);
        }
        if let Some(o) = self.data_mut(old) {
            o.parent = None;
        }
        Ok(())
    }

    fn discard(&mut self, node: NodeId) {
        if !self.contains(node) {
            return;
        }
        self.unlink(node);
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            let Some(slot) = self.slots.get_mut(id.index as usize) else { continue };
            if slot.generation != id.generation {
                continue;
            }
            if let Some(data) = slot.node.take() {
                stack.extend(data.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(doc: &mut Document, n: usize) -> (NodeId, Vec<NodeId>) {
        let ul = doc.create_element("ul");
        let items = (0..n)
            .map(|i| {
                let li = doc.create_element("li");
                let text = doc.create_text(&i.to_string());
                doc.append_child(li, text).unwrap();
                doc.append_child(ul, li).unwrap();
                li
            })
            .collect();
        (ul, items)
    }

    #[test]
    fn markup_serializes_attributes_styles_and_text() {
        let mut doc = Document::new();
        let td = doc.create_element("td");
        doc.set_attribute(td, "class", "num");
        doc.set_attribute(td, "title", "a \"b\"");
        doc.set_style(td, "width", "10px");
        doc.set_style(td, "color", "red");
        let text = doc.create_text("1 < 2");
        doc.append_child(td, text).unwrap();
        assert_eq!(
            doc.markup(td),
            r#"<td class="num" title="a &quot;b&quot;" style="width: 10px; color: red;">1 &lt; 2</td>"#
        );
    }

    #[test]
    fn append_reparents() {
        let mut doc = Document::new();
        let (a, items) = list(&mut doc, 2);
        let b = doc.create_element("ol");
        doc.append_child(b, items[0]).unwrap();
        assert_eq!(doc.children(a), vec![items[1]]);
        assert_eq!(doc.parent(items[0]), Some(b));
    }

    #[test]
    fn insert_before_and_cycles() {
        let mut doc = Document::new();
        let (ul, items) = list(&mut doc, 3);
        doc.insert_before(ul, items[2], Some(items[0])).unwrap();
        assert_eq!(doc.children(ul), vec![items[2], items[0], items[1]]);
        doc.insert_before(ul, items[2], None).unwrap();
        assert_eq!(doc.children(ul), items);
        assert_eq!(doc.append_child(items[0], ul), Err(TreeError::WouldCycle));
        let text = doc.children(items[0])[0];
        assert_eq!(doc.append_child(text, ul), Err(TreeError::NotAnElement));
    }

    #[test]
    fn replace_child_detaches_old() {
        let mut doc = Document::new();
        let (ul, items) = list(&mut doc, 2);
        let fresh = doc.create_element("li");
        doc.replace_child(ul, fresh, items[0]).unwrap();
        assert_eq!(doc.children(ul), vec![fresh, items[1]]);
        assert_eq!(doc.parent(items[0]), None);
        assert_eq!(doc.remove_child(ul, items[0]), Err(TreeError::NotAChild));
    }

    #[test]
    fn discard_frees_subtree_and_invalidates_handles() {
        let mut doc = Document::new();
        let (ul, items) = list(&mut doc, 2);
        assert_eq!(doc.live_count(), 5);
        doc.discard(items[0]);
        assert_eq!(doc.live_count(), 3);
        assert!(!doc.contains(items[0]));
        assert_eq!(doc.children(ul), vec![items[1]]);

        let reused = doc.create_element("li");
        assert_ne!(reused, items[0]);
        assert_eq!(doc.append_child(ul, items[0]), Err(TreeError::StaleNode));
    }

    #[test]
    fn query_all_in_document_order() {
        let mut doc = Document::new();
        let (ul, items) = list(&mut doc, 3);
        for (i, li) in items.iter().enumerate() {
            doc.set_attribute(*li, "data-index", &i.to_string());
        }
        assert_eq!(doc.query_all(ul, "data-index", None), items);
        assert_eq!(doc.query(ul, "data-index", Some("2")), Some(items[2]));
        assert_eq!(doc.query(ul, "data-index", Some("9")), None);
    }

    #[test]
    fn class_helpers() {
        let mut doc = Document::new();
        let tr = doc.create_element("tr");
        assert!(doc.toggle_class(tr, "selected", true));
        assert!(!doc.toggle_class(tr, "selected", true));
        doc.set_attribute(tr, "class", "odd selected");
        assert!(doc.has_class(tr, "odd"));
        doc.toggle_class(tr, "selected", false);
        assert_eq!(doc.attribute(tr, "class"), Some("odd"));
        doc.toggle_class(tr, "odd", false);
        assert_eq!(doc.attribute(tr, "class"), None);
    }

    #[test]
    fn text_content_concatenates() {
        let mut doc = Document::new();
        let (ul, _) = list(&mut doc, 3);
        assert_eq!(doc.text_content(ul), "012");
    }
}
