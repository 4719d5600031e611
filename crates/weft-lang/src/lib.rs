//! `weft-lang` parses the expressions embedded in weft markup, rewrites their
//! free identifiers into scope-qualified reads and writes, and evaluates them.
//!
//! ## Examples
//!
//! ```rust
//! use weft_lang::{NoAccessor, Value};
//!
//! let node = weft_lang::parse("[1, 2, 3].map(x => x * 2).join('-')").unwrap();
//! let value = weft_lang::eval(&node, &mut NoAccessor).unwrap();
//!
//! assert_eq!(value, Value::from("2-4-6"));
//! ```
mod ast;
mod error;
mod eval;
mod lexer;
mod number;
mod range;
mod translate;
mod value;

use std::rc::Rc;

use lexer::Lexer;

pub use ast::constants;
pub use ast::error::ParseError;
pub use ast::node::Args as AstArgs;
pub use ast::node::BinaryOp as AstBinaryOp;
pub use ast::node::Expr as AstExpr;
pub use ast::node::Literal as AstLiteral;
pub use ast::node::Node as AstNode;
pub use ast::node::UnaryOp as AstUnaryOp;
pub use ast::node::UpdateOp as AstUpdateOp;
pub use ast::parser::Parser as AstParser;
pub use ast::{DepPath, ScopeIndex};
pub use error::{Error, InnerError, source_span};
pub use eval::builtin::{BUILTIN_FUNCTIONS, BUILTIN_METHODS};
pub use eval::error::EvalError;
pub use eval::{Accessor, Evaluator, NoAccessor, Options as EvalOptions};
pub use lexer::Options as LexerOptions;
pub use lexer::error::LexerError;
pub use lexer::token::{Token, TokenKind};
pub use number::Number;
pub use range::{Position, Range};
pub use translate::{Resolution, Resolver, TranslateError, Translation, translate};
pub use value::{Env, Function, Object, Value};

#[allow(clippy::result_large_err)]
pub fn tokenize(code: &str, options: LexerOptions) -> Result<Vec<Token>, Error> {
    Lexer::new(options)
        .tokenize(code)
        .map_err(|e| Error::from_error(code, InnerError::Lexer(e)))
}

#[allow(clippy::result_large_err)]
pub fn parse(code: &str) -> Result<Rc<AstNode>, Error> {
    parse_at(code, Position::default()).map_err(|e| Error::from_error(code, e))
}

/// Parses an expression embedded in a larger text starting at `base`. Node
/// and error ranges refer to the enclosing text.
pub fn parse_at(code: &str, base: Position) -> Result<Rc<AstNode>, InnerError> {
    let tokens = Lexer::new(LexerOptions { base }).tokenize(code)?;
    Ok(AstParser::new(&tokens).parse()?)
}

pub fn eval(node: &AstNode, accessor: &mut dyn Accessor) -> Result<Value, EvalError> {
    Evaluator::new(accessor).eval(node)
}
