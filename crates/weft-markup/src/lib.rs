//! A small element/text tree used as the host document model by weft.
//!
//! Nodes live in a slot arena and are addressed by [`NodeId`]. The tree can be
//! built by hand or, with the `html` feature, loaded from HTML source.
//!
//! ```rust
//! use weft_markup::Document;
//!
//! let mut doc = Document::new();
//! let p = doc.create_element("p");
//! let text = doc.create_text("hello");
//! doc.append(doc.root(), p).unwrap();
//! doc.append(p, text).unwrap();
//! doc.add_class(p, "greeting").unwrap();
//!
//! assert_eq!(doc.to_string(), "<p class=\"greeting\">hello</p>");
//! ```
mod document;
mod error;
mod html;
pub mod markers;
mod node;
pub mod style;

pub use document::{Document, NodeId};
pub use error::DocumentError;
pub use html::is_void_element;
pub use node::{Element, NodeKind};
