//! `weft-compiler` turns markup annotated with reactive attributes into a
//! [`Program`]: a tree of scope templates whose values are translated
//! expressions with their dependencies resolved against the enclosing scopes.
//!
//! The document is annotated in place: dynamic attributes are removed, bound
//! text is cleared and every scope element is tagged with its index.
//!
//! ## Examples
//!
//! ```rust
//! use weft_compiler::{Options, compile_html};
//!
//! let (document, compilation) = compile_html(
//!     "<html><body :name=\"[['John']]\"><p>Hello [[name]]</p></body></html>",
//!     &Options::default(),
//! );
//!
//! assert!(compilation.is_ok());
//! assert_eq!(compilation.program.scopes().len(), 4);
//! assert!(document.to_string().contains("<p data-weft=\"3\"></p>"));
//! ```
mod compiler;
mod error;
mod options;
mod program;
pub mod property;
mod scope;
mod source;

use weft_markup::Document;

pub use compiler::{Compilation, Compiler};
pub use error::{CompileError, CompileErrorKind, Warning};
pub use options::Options;
pub use program::{Builder, EventTemplate, Init, Program, ScopeTemplate, ValueKind, ValueTemplate};
pub use scope::{Scope, ScopeResolver, ScopeTree};

/// Compiles an already loaded document. `source` is the text it was loaded
/// from, used to attach line/column positions to diagnostics.
pub fn compile(document: &mut Document, source: Option<&str>, options: &Options) -> Compilation {
    Compiler::new(options, source).compile(document)
}

#[cfg(feature = "html")]
pub fn compile_html(source: &str, options: &Options) -> (Document, Compilation) {
    let mut document = Document::parse_html(source);
    let compilation = compile(&mut document, Some(source), options);
    (document, compilation)
}

#[cfg(feature = "html")]
pub fn compile_fragment(source: &str, options: &Options) -> (Document, Compilation) {
    let mut document = Document::parse_fragment(source);
    let compilation = compile(&mut document, Some(source), options);
    (document, compilation)
}
