use slotmap::{SlotMap, new_key_type};
use smol_str::SmolStr;

use crate::error::DocumentError;
use crate::node::{Element, NodeKind};
use crate::style;

new_key_type! {
    pub struct NodeId;
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// An element/text tree stored in a slot arena.
///
/// Nodes created through `create_*` start detached; they become part of the
/// tree once appended or inserted somewhere under [`Document::root`].
#[derive(Debug, Clone)]
pub struct Document {
    nodes: SlotMap<NodeId, NodeData>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(NodeData::new(NodeKind::Document));
        Self { nodes, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first element child of the root.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|id| self.is_element(*id))
    }

    pub fn create_element(&mut self, name: impl Into<SmolStr>) -> NodeId {
        self.nodes
            .insert(NodeData::new(NodeKind::Element(Element::new(name))))
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.nodes.insert(NodeData::new(NodeKind::Text(text.into())))
    }

    pub fn create_comment(&mut self, text: impl Into<String>) -> NodeId {
        self.nodes
            .insert(NodeData::new(NodeKind::Comment(text.into())))
    }

    pub fn create_doctype(&mut self, name: impl Into<SmolStr>) -> NodeId {
        self.nodes
            .insert(NodeData::new(NodeKind::Doctype(name.into())))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id).map(|n| &n.kind)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match self.kind(id)? {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut Element, DocumentError> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Element(element)) => Ok(element),
            Some(_) => Err(DocumentError::NotElement(id)),
            None => Err(DocumentError::UnknownNode(id)),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.name.as_str())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let index = self.index_in_parent(id)?;
        let parent = self.parent(id)?;
        index.checked_sub(1).and_then(|i| self.child(parent, i))
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let index = self.index_in_parent(id)?;
        let parent = self.parent(id)?;
        self.child(parent, index + 1)
    }

    /// Element children only.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
    }

    fn ensure(&self, id: NodeId) -> Result<(), DocumentError> {
        if self.nodes.contains_key(id) {
            Ok(())
        } else {
            Err(DocumentError::UnknownNode(id))
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut id: NodeId) -> bool {
        loop {
            if id == ancestor {
                return true;
            }
            match self.parent(id) {
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    pub fn append(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        self.ensure(parent)?;
        self.ensure(child)?;
        if self.is_ancestor_or_self(child, parent) {
            return Err(DocumentError::Cycle(child));
        }

        self.unlink(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        Ok(())
    }

    /// Inserts `node` as the sibling immediately before `reference`.
    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<(), DocumentError> {
        self.ensure(node)?;
        if node == reference {
            return Ok(());
        }
        let parent = self
            .parent(reference)
            .ok_or(DocumentError::Detached(reference))?;
        if self.is_ancestor_or_self(node, parent) {
            return Err(DocumentError::Cycle(node));
        }

        self.unlink(node);
        let index = self
            .index_in_parent(reference)
            .ok_or(DocumentError::Detached(reference))?;
        self.nodes[node].parent = Some(parent);
        self.nodes[parent].children.insert(index, node);
        Ok(())
    }

    fn unlink(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get_mut(id).and_then(|n| n.parent.take()) {
            self.nodes[parent].children.retain(|c| *c != id);
        }
    }

    /// Takes `id` out of its parent, keeping the subtree alive.
    pub fn detach(&mut self, id: NodeId) -> Result<(), DocumentError> {
        self.ensure(id)?;
        self.unlink(id);
        Ok(())
    }

    /// Detaches `id` and frees it together with all of its descendants.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DocumentError> {
        if id == self.root {
            return Err(DocumentError::Detached(id));
        }
        self.detach(id)?;

        for node in self.descendants(id) {
            self.nodes.remove(node);
        }
        Ok(())
    }

    /// Copies the subtree rooted at `id`. The copy is detached.
    pub fn deep_clone(&mut self, id: NodeId) -> Result<NodeId, DocumentError> {
        let data = self.nodes.get(id).ok_or(DocumentError::UnknownNode(id))?;
        let kind = data.kind.clone();
        let children = data.children.clone();

        let copy = self.nodes.insert(NodeData::new(kind));
        for child in children {
            let child_copy = self.deep_clone(child)?;
            self.append(copy, child_copy)?;
        }
        Ok(copy)
    }

    /// Pre-order traversal of the subtree rooted at `id`, `id` included.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];

        while let Some(node) = stack.pop() {
            if !self.contains(node) {
                continue;
            }
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }

        out
    }

    pub fn find(&self, id: NodeId, predicate: impl Fn(&Document, NodeId) -> bool) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|node| predicate(self, *node))
    }

    pub fn find_by_attribute(&self, id: NodeId, name: &str, value: &str) -> Option<NodeId> {
        self.find(id, |doc, node| doc.attribute(node, name) == Some(value))
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attribute(name)
    }

    pub fn attributes(&self, id: NodeId) -> &[(SmolStr, String)] {
        self.element(id)
            .map(|e| e.attributes.as_slice())
            .unwrap_or_default()
    }

    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DocumentError> {
        self.element_mut(id)?.set_attribute(name, value);
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<Option<String>, DocumentError> {
        Ok(self.element_mut(id)?.remove_attribute(name))
    }

    pub fn classes(&self, id: NodeId) -> Vec<&str> {
        self.attribute(id, "class")
            .map(|c| style::parse_classes(c).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).contains(&class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) -> Result<(), DocumentError> {
        let element = self.element_mut(id)?;
        let current = element.attribute("class").unwrap_or_default();
        if style::parse_classes(current).any(|c| c == class) {
            return Ok(());
        }

        let value = style::format_classes(style::parse_classes(current).chain([class]));
        element.set_attribute("class", value);
        Ok(())
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) -> Result<(), DocumentError> {
        let element = self.element_mut(id)?;
        let Some(current) = element.attribute("class") else {
            return Ok(());
        };

        let value = style::format_classes(style::parse_classes(current).filter(|c| *c != class));
        if value.is_empty() {
            element.remove_attribute("class");
        } else {
            element.set_attribute("class", value);
        }
        Ok(())
    }

    pub fn style(&self, id: NodeId, property: &str) -> Option<String> {
        let declarations = style::parse_style(self.attribute(id, "style")?);
        declarations
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    pub fn set_style(&mut self, id: NodeId, property: &str, value: &str) -> Result<(), DocumentError> {
        let element = self.element_mut(id)?;
        let mut declarations = style::parse_style(element.attribute("style").unwrap_or_default());

        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some((_, v)) => *v = value.to_string(),
            None => declarations.push((SmolStr::new(property), value.to_string())),
        }

        element.set_attribute("style", style::format_style(&declarations));
        Ok(())
    }

    pub fn remove_style(&mut self, id: NodeId, property: &str) -> Result<(), DocumentError> {
        let element = self.element_mut(id)?;
        let Some(current) = element.attribute("style") else {
            return Ok(());
        };

        let mut declarations = style::parse_style(current);
        declarations.retain(|(name, _)| name != property);

        if declarations.is_empty() {
            element.remove_attribute("style");
        } else {
            element.set_attribute("style", style::format_style(&declarations));
        }
        Ok(())
    }

    /// Content of a text or comment node.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text),
            _ => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: impl Into<String>) -> Result<(), DocumentError> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Text(text)) | Some(NodeKind::Comment(text)) => {
                *text = value.into();
                Ok(())
            }
            Some(_) => Err(DocumentError::NotText(id)),
            None => Err(DocumentError::UnknownNode(id)),
        }
    }

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .into_iter()
            .filter_map(|node| match self.kind(node) {
                Some(NodeKind::Text(text)) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn list() -> (Document, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let ul = doc.create_element("ul");
        doc.append(doc.root(), ul).unwrap();

        let items = (0..3)
            .map(|i| {
                let li = doc.create_element("li");
                let text = doc.create_text(format!("item {i}"));
                doc.append(li, text).unwrap();
                doc.append(ul, li).unwrap();
                li
            })
            .collect();

        (doc, ul, items)
    }

    #[rstest]
    fn test_tree_navigation(list: (Document, NodeId, Vec<NodeId>)) {
        let (doc, ul, items) = list;

        assert_eq!(doc.document_element(), Some(ul));
        assert_eq!(doc.children(ul), items.as_slice());
        assert_eq!(doc.child(ul, 1), Some(items[1]));
        assert_eq!(doc.previous_sibling(items[1]), Some(items[0]));
        assert_eq!(doc.previous_sibling(items[0]), None);
        assert_eq!(doc.next_sibling(items[1]), Some(items[2]));
        assert_eq!(doc.parent(items[2]), Some(ul));
        assert_eq!(doc.text_content(ul), "item 0item 1item 2");
    }

    #[rstest]
    fn test_insert_before_and_detach(list: (Document, NodeId, Vec<NodeId>)) {
        let (mut doc, ul, items) = list;
        let li = doc.create_element("li");

        doc.insert_before(items[0], li).unwrap();
        assert_eq!(doc.index_in_parent(li), Some(0));
        assert_eq!(doc.children(ul).len(), 4);

        doc.insert_before(li, items[2]).unwrap();
        assert_eq!(doc.children(ul), &[items[2], li, items[0], items[1]]);

        doc.detach(li).unwrap();
        assert_eq!(doc.parent(li), None);
        assert!(doc.contains(li));
    }

    #[rstest]
    fn test_insert_before_detached_reference() {
        let mut doc = Document::new();
        let a = doc.create_element("a");
        let b = doc.create_element("b");

        assert_eq!(doc.insert_before(a, b), Err(DocumentError::Detached(a)));
    }

    #[rstest]
    fn test_append_rejects_cycle(list: (Document, NodeId, Vec<NodeId>)) {
        let (mut doc, ul, items) = list;

        assert_eq!(doc.append(items[0], ul), Err(DocumentError::Cycle(ul)));
        assert_eq!(doc.append(ul, ul), Err(DocumentError::Cycle(ul)));
    }

    #[rstest]
    fn test_remove_frees_subtree(list: (Document, NodeId, Vec<NodeId>)) {
        let (mut doc, ul, items) = list;
        let text = doc.child(items[1], 0).unwrap();

        doc.remove(items[1]).unwrap();

        assert!(!doc.contains(items[1]));
        assert!(!doc.contains(text));
        assert_eq!(doc.children(ul), &[items[0], items[2]]);
    }

    #[rstest]
    fn test_deep_clone(list: (Document, NodeId, Vec<NodeId>)) {
        let (mut doc, ul, items) = list;
        doc.set_attribute(items[0], "id", "first").unwrap();

        let copy = doc.deep_clone(items[0]).unwrap();

        assert_eq!(doc.parent(copy), None);
        assert_eq!(doc.attribute(copy, "id"), Some("first"));
        assert_eq!(doc.text_content(copy), "item 0");
        assert_ne!(doc.child(copy, 0), doc.child(items[0], 0));
        assert_eq!(doc.children(ul).len(), 3);
    }

    #[rstest]
    #[case::add("a", "b", true, "a b")]
    #[case::add_existing("a b", "b", true, "a b")]
    #[case::remove("a b c", "b", false, "a c")]
    #[case::remove_missing("a", "b", false, "a")]
    fn test_classes(#[case] initial: &str, #[case] class: &str, #[case] add: bool, #[case] expected: &str) {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "class", initial).unwrap();

        if add {
            doc.add_class(div, class).unwrap();
        } else {
            doc.remove_class(div, class).unwrap();
        }

        assert_eq!(doc.attribute(div, "class"), Some(expected));
        assert_eq!(doc.has_class(div, class), add);
    }

    #[rstest]
    fn test_remove_last_class_drops_attribute() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.add_class(div, "on").unwrap();
        doc.remove_class(div, "on").unwrap();

        assert_eq!(doc.attribute(div, "class"), None);
    }

    #[rstest]
    fn test_styles() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attribute(div, "style", "color: red; margin: 0").unwrap();

        doc.set_style(div, "color", "blue").unwrap();
        doc.set_style(div, "padding", "1px").unwrap();
        assert_eq!(doc.style(div, "color").as_deref(), Some("blue"));
        assert_eq!(doc.attribute(div, "style"), Some("color: blue; margin: 0; padding: 1px"));

        doc.remove_style(div, "margin").unwrap();
        doc.remove_style(div, "color").unwrap();
        doc.remove_style(div, "padding").unwrap();
        assert_eq!(doc.attribute(div, "style"), None);
    }

    #[rstest]
    fn test_text_nodes() {
        let mut doc = Document::new();
        let text = doc.create_text("a");
        let div = doc.create_element("div");

        doc.set_text(text, "b").unwrap();
        assert_eq!(doc.text(text), Some("b"));
        assert_eq!(doc.set_text(div, "c"), Err(DocumentError::NotText(div)));
        assert_eq!(doc.set_attribute(text, "id", "x"), Err(DocumentError::NotElement(text)));
    }

    #[rstest]
    fn test_find_by_attribute(list: (Document, NodeId, Vec<NodeId>)) {
        let (mut doc, _, items) = list;
        doc.set_attribute(items[2], "data-weft", "3").unwrap();

        assert_eq!(doc.find_by_attribute(doc.root(), "data-weft", "3"), Some(items[2]));
        assert_eq!(doc.find_by_attribute(doc.root(), "data-weft", "4"), None);
    }
}
