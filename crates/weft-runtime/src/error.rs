use smol_str::SmolStr;
use thiserror::Error;
use weft_lang::{DepPath, EvalError};
use weft_markup::DocumentError;

/// Failure reported by a [`Host`](crate::Host) capability.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum HostError {
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum RequestError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Request failed with status {0}")]
    Status(u16),
    #[error("Invalid JSON response: {0}")]
    InvalidJson(String),
    #[error("Invalid request `{0}`, expected a URL or {{url, method, params}}")]
    InvalidRequest(String),
    #[error("Scope declaring `request` has no `data` to receive the response")]
    MissingTarget,
}

impl RequestError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RequestError::Status(status) => Some(*status),
            _ => None,
        }
    }
}

/// Non-fatal failure observed while the graph runs. These never stop
/// propagation; they are logged and collected for
/// [`Runtime::take_diagnostics`](crate::Runtime::take_diagnostics).
#[derive(Error, Debug, PartialEq, Clone)]
pub enum RuntimeError {
    #[error("Recomputing `{name}` failed, keeping the previous output: {source}")]
    Recompute { name: SmolStr, source: EvalError },
    #[error("Binding of `{name}` failed: {source}")]
    SideEffect { name: SmolStr, source: HostError },
    #[error("`{observer}` depends on `{path}`, which does not exist")]
    Unresolved { observer: SmolStr, path: DepPath },
    #[error("Linking `{observer}` to `{path}` would create a dependency cycle")]
    Cycle { observer: SmolStr, path: DepPath },
    #[error("Propagation stopped at `{name}` after reaching the maximum depth of {depth}")]
    DepthExceeded { name: SmolStr, depth: u32 },
    #[error("`{event}` handler failed: {source}")]
    Handler { event: SmolStr, source: EvalError },
    #[error("Request for `{url}` failed: {source}")]
    Request { url: String, source: RequestError },
    #[error("Replicating `{name}` failed: {source}")]
    Replication { name: SmolStr, source: HostError },
}
