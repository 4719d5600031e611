//! `weft-runtime` brings a compiled [`Program`](weft_compiler::Program) to
//! life on a host document.
//!
//! Every declared property becomes a reactive value. Values cache their
//! output per propagation cycle, re-run their expression when something they
//! read changes, and project the result onto the document through bindings:
//! classes, styles, attributes, text, list replication and data requests.
//!
//! ## Examples
//!
//! ```rust
//! use weft_lang::Value;
//! use weft_runtime::mount_html;
//!
//! let (mut runtime, compilation) = mount_html(
//!     r#"<html><body :name="[['John']]" :title="[['Hello ' + name]]"><h1>[[title]]</h1></body></html>"#,
//!     &weft_compiler::Options::default(),
//! );
//! assert!(compilation.is_ok());
//!
//! let body = runtime.children(runtime.root().unwrap())[1];
//! runtime.write(body, "name", Value::from("Jane"));
//!
//! let html = runtime.host().document().to_string();
//! assert!(html.contains(">Hello Jane</h1>"));
//! ```
mod binding;
mod error;
mod host;
mod options;
mod replicate;
mod request;
mod runtime;
mod scope;

pub use binding::{class_present, render};
pub use error::{HostError, RequestError, RuntimeError};
pub use host::{Host, MemoryHost};
pub use options::Options;
pub use replicate::window;
pub use request::{Method, Request, RequestId, Response, error_payload};
pub use runtime::{ListenerId, Runtime, ScopeId, Stats, ValueId};

/// Compiles `source` as a full HTML page and mounts it on an in-memory
/// document with default runtime options.
#[cfg(feature = "html")]
pub fn mount_html(
    source: &str,
    options: &weft_compiler::Options,
) -> (Runtime<MemoryHost>, weft_compiler::Compilation) {
    let (document, compilation) = weft_compiler::compile_html(source, options);
    let mut runtime = Runtime::new(compilation.program.clone(), MemoryHost::new(document));
    runtime.mount();
    (runtime, compilation)
}

/// Like [`mount_html`] for a fragment; the first element is the root scope.
#[cfg(feature = "html")]
pub fn mount_fragment(
    source: &str,
    options: &weft_compiler::Options,
) -> (Runtime<MemoryHost>, weft_compiler::Compilation) {
    let (document, compilation) = weft_compiler::compile_fragment(source, options);
    let mut runtime = Runtime::new(compilation.program.clone(), MemoryHost::new(document));
    runtime.mount();
    (runtime, compilation)
}
