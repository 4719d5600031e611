//! The capabilities the runtime needs from the environment it renders into.
use smol_str::SmolStr;
use weft_markup::{Document, NodeId};

use crate::error::HostError;
use crate::request::{Request, RequestId};

/// Document access, event wiring and outbound requests.
///
/// Nodes are addressed by [`NodeId`]; a host keeps whatever mapping it needs
/// between those ids and its own document.
pub trait Host {
    /// Node the compiled program is mounted under.
    fn root(&self) -> NodeId;
    fn children(&self, node: NodeId) -> Vec<NodeId>;
    fn previous_sibling(&self, node: NodeId) -> Option<NodeId>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError>;
    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError>;

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), HostError>;
    fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), HostError>;

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<(), HostError>;
    fn remove_style(&mut self, node: NodeId, property: &str) -> Result<(), HostError>;

    /// Replaces the content of text node `node`.
    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), HostError>;

    /// Deep copy of `node`, not yet attached anywhere.
    fn clone_fragment(&mut self, node: NodeId) -> Result<NodeId, HostError>;
    fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<(), HostError>;
    fn remove_fragment(&mut self, node: NodeId) -> Result<(), HostError>;

    fn listen(&mut self, node: NodeId, event: &str);
    fn unlisten(&mut self, node: NodeId, event: &str);

    /// Starts `request`. The response is handed back later through
    /// [`Runtime::complete_request`](crate::Runtime::complete_request).
    fn request(&mut self, id: RequestId, request: &Request);
}

/// A [`Host`] over an in-memory [`Document`]. Listeners and requests are
/// recorded for the caller to drive.
#[derive(Debug, Default)]
pub struct MemoryHost {
    document: Document,
    listeners: Vec<(NodeId, SmolStr)>,
    outbox: Vec<(RequestId, Request)>,
}

impl MemoryHost {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            listeners: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn listeners(&self) -> &[(NodeId, SmolStr)] {
        &self.listeners
    }

    pub fn is_listening(&self, node: NodeId, event: &str) -> bool {
        self.listeners.iter().any(|(n, e)| *n == node && e == event)
    }

    /// Requests issued since the last call, oldest first.
    pub fn take_requests(&mut self) -> Vec<(RequestId, Request)> {
        std::mem::take(&mut self.outbox)
    }
}

impl Host for MemoryHost {
    fn root(&self) -> NodeId {
        self.document.root()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.document.children(node).to_vec()
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.document.previous_sibling(node)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.document.attribute(node, name).map(str::to_string)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), HostError> {
        Ok(self.document.set_attribute(node, name, value)?)
    }

    fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), HostError> {
        self.document.remove_attribute(node, name)?;
        Ok(())
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), HostError> {
        Ok(self.document.add_class(node, class)?)
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), HostError> {
        Ok(self.document.remove_class(node, class)?)
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) -> Result<(), HostError> {
        Ok(self.document.set_style(node, property, value)?)
    }

    fn remove_style(&mut self, node: NodeId, property: &str) -> Result<(), HostError> {
        Ok(self.document.remove_style(node, property)?)
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), HostError> {
        Ok(self.document.set_text(node, text)?)
    }

    fn clone_fragment(&mut self, node: NodeId) -> Result<NodeId, HostError> {
        Ok(self.document.deep_clone(node)?)
    }

    fn insert_before(&mut self, reference: NodeId, node: NodeId) -> Result<(), HostError> {
        Ok(self.document.insert_before(reference, node)?)
    }

    fn remove_fragment(&mut self, node: NodeId) -> Result<(), HostError> {
        Ok(self.document.remove(node)?)
    }

    fn listen(&mut self, node: NodeId, event: &str) {
        self.listeners.push((node, event.into()));
    }

    fn unlisten(&mut self, node: NodeId, event: &str) {
        if let Some(index) = self.listeners.iter().position(|(n, e)| *n == node && e == event) {
            self.listeners.remove(index);
        }
    }

    fn request(&mut self, id: RequestId, request: &Request) {
        self.outbox.push((id, request.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn host() -> MemoryHost {
        let mut document = Document::new();
        let p = document.create_element("p");
        let text = document.create_text("old");
        document.append(document.root(), p).unwrap();
        document.append(p, text).unwrap();
        MemoryHost::new(document)
    }

    fn paragraph(host: &MemoryHost) -> NodeId {
        host.document().document_element().unwrap()
    }

    #[rstest]
    fn test_set_text(mut host: MemoryHost) {
        let p = paragraph(&host);
        let text = host.children(p)[0];

        host.set_text(text, "new").unwrap();

        assert_eq!(host.document().to_string(), "<p>new</p>");
        assert!(host.set_text(p, "x").is_err());
    }

    #[rstest]
    fn test_clone_and_remove(mut host: MemoryHost) {
        let p = paragraph(&host);
        let copy = host.clone_fragment(p).unwrap();

        host.set_attribute(copy, "id", "c").unwrap();
        host.insert_before(p, copy).unwrap();
        assert_eq!(host.document().to_string(), "<p id=\"c\">old</p><p>old</p>");
        assert_eq!(host.previous_sibling(p), Some(copy));

        host.remove_fragment(copy).unwrap();
        assert_eq!(host.document().to_string(), "<p>old</p>");
    }

    #[rstest]
    fn test_listeners(mut host: MemoryHost) {
        let p = paragraph(&host);

        host.listen(p, "click");
        host.listen(p, "click");
        host.unlisten(p, "click");

        assert!(host.is_listening(p, "click"));
        host.unlisten(p, "click");
        assert!(host.listeners().is_empty());
    }

    #[rstest]
    fn test_requests_are_recorded(mut host: MemoryHost) {
        let mut keys = slotmap::SlotMap::<RequestId, ()>::with_key();
        let id = keys.insert(());

        host.request(id, &Request::get("/a"));

        assert_eq!(host.take_requests(), vec![(id, Request::get("/a"))]);
        assert!(host.take_requests().is_empty());
    }
}
