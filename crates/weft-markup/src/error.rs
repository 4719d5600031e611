use thiserror::Error;

use crate::NodeId;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum DocumentError {
    #[error("Unknown node {0:?}")]
    UnknownNode(NodeId),
    #[error("Node {0:?} has no parent")]
    Detached(NodeId),
    #[error("Cannot move node {0:?} into its own subtree")]
    Cycle(NodeId),
    #[error("Node {0:?} is not an element")]
    NotElement(NodeId),
    #[error("Node {0:?} is not a text node")]
    NotText(NodeId),
}
