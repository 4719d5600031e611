pub mod constants;
pub mod error;
pub mod node;
pub mod parser;
pub mod path;

pub use node::{Args, BinaryOp, Expr, Literal, Node, Params, UnaryOp, UpdateOp};
pub use path::{DepPath, ScopeIndex};
