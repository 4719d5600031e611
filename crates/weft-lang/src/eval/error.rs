use smol_str::SmolStr;
use thiserror::Error;

use crate::ast::DepPath;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum EvalError {
    #[error("\"{0}\" is not defined")]
    NotDefined(SmolStr),
    #[error("\"{0}\" is not a function")]
    NotCallable(SmolStr),
    #[error("Cannot read properties of {value} (reading \"{name}\")")]
    PropertyOfNullish { value: &'static str, name: SmolStr },
    #[error("Invalid assignment target")]
    InvalidAssignment,
    #[error("Maximum recursion depth exceeded \"{0}\"")]
    RecursionError(u32),
    #[error("Invalid number of arguments in \"{0}\", expected {1}, got {2}")]
    InvalidNumberOfArguments(SmolStr, u8, u8),
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("\"{0}\" cannot be resolved")]
    Unresolved(DepPath),
    #[error("Runtime error: {0}")]
    RuntimeError(String),
}
