use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{
    ast::error::ParseError, eval::error::EvalError, lexer::error::LexerError, range::Range,
    translate::TranslateError,
};

#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum InnerError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl InnerError {
    pub fn range(&self) -> Option<Range> {
        match self {
            InnerError::Lexer(err) => Some(err.range()),
            InnerError::Parse(err) => Some(err.range()),
            InnerError::Translate(err) => Some(err.range()),
            InnerError::Eval(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            InnerError::Lexer(LexerError::UnexpectedCharacter(_, _)) => {
                "LexerError::UnexpectedCharacter"
            }
            InnerError::Lexer(LexerError::UnterminatedString(_)) => "LexerError::UnterminatedString",
            InnerError::Parse(ParseError::UnexpectedToken(_)) => "ParseError::UnexpectedToken",
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => {
                "ParseError::UnexpectedEOFDetected"
            }
            InnerError::Parse(ParseError::InvalidAssignmentTarget(_)) => {
                "ParseError::InvalidAssignmentTarget"
            }
            InnerError::Parse(ParseError::ExpectedClosingParen(_)) => {
                "ParseError::ExpectedClosingParen"
            }
            InnerError::Parse(ParseError::ExpectedClosingBracket(_)) => {
                "ParseError::ExpectedClosingBracket"
            }
            InnerError::Parse(ParseError::ExpectedClosingBrace(_)) => {
                "ParseError::ExpectedClosingBrace"
            }
            InnerError::Translate(TranslateError::BareAlias(_, _)) => "TranslateError::BareAlias",
            InnerError::Translate(TranslateError::UnknownMember { .. }) => {
                "TranslateError::UnknownMember"
            }
            InnerError::Eval(_) => "EvalError",
        }
    }

    pub fn help(&self) -> Option<String> {
        match self {
            InnerError::Lexer(LexerError::UnterminatedString(_)) => {
                Some("Close the string literal with a matching quote.".to_string())
            }
            InnerError::Parse(ParseError::UnexpectedEOFDetected(_)) => Some(
                "Input ended unexpectedly. Check for missing closing brackets or incomplete expressions."
                    .to_string(),
            ),
            InnerError::Parse(ParseError::UnexpectedToken(_)) => {
                Some("Check for syntax errors or misplaced tokens.".to_string())
            }
            InnerError::Parse(ParseError::InvalidAssignmentTarget(_)) => Some(
                "Only names, members and indexes can be assigned or incremented.".to_string(),
            ),
            InnerError::Translate(TranslateError::BareAlias(name, _)) => Some(format!(
                "'{name}' names a scope. Read one of its values instead, e.g. {name}.data"
            )),
            InnerError::Translate(TranslateError::UnknownMember { alias, .. }) => Some(format!(
                "Declare the value on the element aliased '{alias}'."
            )),
            InnerError::Eval(EvalError::NotDefined(name)) => {
                Some(format!("'{name}' is not defined. Did you forget to declare it?"))
            }
            _ => None,
        }
    }
}

/// Converts a line/column range into a span over `source`.
pub fn source_span(source: &str, range: &Range) -> SourceSpan {
    let start = SourceOffset::from_location(source, range.start.line as usize, range.start.column);
    let end = SourceOffset::from_location(source, range.end.line as usize, range.end.column);

    SourceSpan::new(start, std::cmp::max(end.offset().saturating_sub(start.offset()), 1))
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The expression source the error refers to.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: InnerError) -> Self {
        let source_code = source_code.into();
        let location = match cause.range() {
            Some(range) => source_span(&source_code, &range),
            None => SourceSpan::new(SourceOffset::from(0), source_code.len().max(1)),
        };

        Self {
            cause,
            source_code,
            location,
        }
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(self.cause.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.cause
            .help()
            .map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(
            miette::LabeledSpan::new_with_span(Some(format!("{}", self.cause)), self.location),
        )))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}
