use thiserror::Error;

use crate::{lexer::token::Token, range::Range};

fn describe(token: &Token) -> String {
    if token.is_eof() {
        "EOF".to_string()
    } else {
        token.to_string()
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ParseError {
    #[error("Unexpected token `{}`", describe(.0))]
    UnexpectedToken(Token),
    #[error("Unexpected EOF detected")]
    UnexpectedEOFDetected(Range),
    #[error("Invalid assignment target")]
    InvalidAssignmentTarget(Range),
    #[error("Expected a closing parenthesis `)` but got `{}`", describe(.0))]
    ExpectedClosingParen(Token),
    #[error("Expected a closing bracket `]` but got `{}`", describe(.0))]
    ExpectedClosingBracket(Token),
    #[error("Expected a closing brace `}}` but got `{}`", describe(.0))]
    ExpectedClosingBrace(Token),
}

impl ParseError {
    pub fn range(&self) -> Range {
        match self {
            ParseError::UnexpectedToken(token)
            | ParseError::ExpectedClosingParen(token)
            | ParseError::ExpectedClosingBracket(token)
            | ParseError::ExpectedClosingBrace(token) => token.range,
            ParseError::UnexpectedEOFDetected(range)
            | ParseError::InvalidAssignmentTarget(range) => *range,
        }
    }
}
