use std::fmt::{self, Display, Formatter};

use miette::{Diagnostic, NamedSource, SourceSpan};
use smol_str::SmolStr;
use thiserror::Error;
use weft_lang::{InnerError, Position, Range};
use weft_markup::DocumentError;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum CompileErrorKind {
    #[error(transparent)]
    Expression(#[from] InnerError),
    #[error("Unterminated `[[` in `{0}`")]
    UnterminatedExpression(SmolStr),
    #[error("Attribute `{0}` declares an empty name")]
    EmptyName(SmolStr),
    #[error("Alias `{0}` is already used by a sibling scope")]
    DuplicateAlias(SmolStr),
    #[error("`{0}` watches `{1}`, which is not declared")]
    UnknownWatch(SmolStr, SmolStr),
    #[error("Event handler `{0}` must be a single [[expression]]")]
    InvalidHandler(SmolStr),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl CompileErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorKind::Expression(inner) => inner.code(),
            CompileErrorKind::UnterminatedExpression(_) => "CompileError::UnterminatedExpression",
            CompileErrorKind::EmptyName(_) => "CompileError::EmptyName",
            CompileErrorKind::DuplicateAlias(_) => "CompileError::DuplicateAlias",
            CompileErrorKind::UnknownWatch(..) => "CompileError::UnknownWatch",
            CompileErrorKind::InvalidHandler(_) => "CompileError::InvalidHandler",
            CompileErrorKind::Document(_) => "CompileError::Document",
        }
    }

    pub fn help(&self) -> Option<String> {
        match self {
            CompileErrorKind::Expression(inner) => inner.help(),
            CompileErrorKind::UnterminatedExpression(_) => {
                Some("Close the expression with `]]`".to_string())
            }
            CompileErrorKind::UnknownWatch(_, name) => {
                Some(format!("Declare `{name}` on this element or one of its ancestors"))
            }
            CompileErrorKind::InvalidHandler(_) => {
                Some("Write the handler as `[[expression]]` without surrounding text".to_string())
            }
            _ => None,
        }
    }

    fn range(&self) -> Option<Range> {
        match self {
            CompileErrorKind::Expression(inner) => inner.range(),
            _ => None,
        }
    }
}

/// A malformed declaration or expression on one element. The value it
/// belongs to is skipped; the rest of the document still compiles.
#[derive(Debug)]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub file: String,
    /// Where the failing expression (or its element) starts, when known.
    pub position: Option<Position>,
    source_code: Option<NamedSource<String>>,
    location: Option<SourceSpan>,
}

impl CompileError {
    pub(crate) fn new(
        kind: CompileErrorKind,
        file: &str,
        source: Option<&str>,
        fallback: Option<Position>,
    ) -> Self {
        let range = kind.range();
        let position = range.map(|r| r.start).or(fallback);
        let location = source.zip(range.or(fallback.map(|p| Range::new(p, p))));

        Self {
            location: location.map(|(source, range)| weft_lang::source_span(source, &range)),
            source_code: source.map(|s| NamedSource::new(file, s.to_string())),
            position,
            file: file.to_string(),
            kind,
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(p) => write!(f, "{}:{}:{}: {}", self.file, p.line, p.column, self.kind),
            None => write!(f, "{}: {}", self.file, self.kind),
        }
    }
}

impl std::error::Error for CompileError {}

impl Diagnostic for CompileError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new(self.kind.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.kind.help().map(|m| Box::new(m) as Box<dyn Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        self.location.map(|span| {
            Box::new(std::iter::once(miette::LabeledSpan::new_with_span(
                Some(self.kind.to_string()),
                span,
            ))) as Box<dyn Iterator<Item = miette::LabeledSpan>>
        })
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        self.source_code.as_ref().map(|s| s as &dyn miette::SourceCode)
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum Warning {
    #[error(
        "Unresolved identifier `{name}` is left for host lookup{}",
        if similar.is_empty() {
            String::new()
        } else {
            format!(", these names seem close though: `{}`", similar.join(", "))
        }
    )]
    Unresolved {
        name: SmolStr,
        position: Position,
        similar: Vec<SmolStr>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use weft_lang::ParseError;

    #[rstest]
    fn test_display_with_position() {
        let error = CompileError::new(
            CompileErrorKind::EmptyName(":".into()),
            "index.html",
            None,
            Some(Position::new(3, 5)),
        );

        assert_eq!(error.to_string(), "index.html:3:5: Attribute `:` declares an empty name");
        assert!(error.labels().is_none());
    }

    #[rstest]
    fn test_expression_error_span() {
        let source = "<p :x=\"[[1 +]]\"></p>";
        let range = Range::new(Position::new(1, 13), Position::new(1, 13));
        let error = CompileError::new(
            CompileErrorKind::Expression(InnerError::Parse(ParseError::UnexpectedEOFDetected(range))),
            "a.html",
            Some(source),
            Some(Position::new(1, 1)),
        );

        assert_eq!(error.position, Some(Position::new(1, 13)));
        assert_eq!(error.code().unwrap().to_string(), "ParseError::UnexpectedEOFDetected");
        assert!(error.source_code().is_some());
        assert_eq!(error.labels().unwrap().count(), 1);
    }

    #[rstest]
    fn test_document_error() {
        let mut document = weft_markup::Document::new();
        let p = document.create_element("p");

        let kind = CompileErrorKind::from(document.set_text(p, "x").unwrap_err());

        assert_eq!(kind.code(), "CompileError::Document");
        assert_eq!(kind, CompileErrorKind::Document(DocumentError::NotText(p)));
    }

    #[rstest]
    #[case(vec![], "Unresolved identifier `cont` is left for host lookup")]
    #[case(vec!["count".into()], "Unresolved identifier `cont` is left for host lookup, these names seem close though: `count`")]
    fn test_warning_display(#[case] similar: Vec<SmolStr>, #[case] expected: &str) {
        let warning = Warning::Unresolved {
            name: "cont".into(),
            position: Position::default(),
            similar,
        };

        assert_eq!(warning.to_string(), expected);
    }
}
