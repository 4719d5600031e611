pub mod error;
pub mod token;

use error::LexerError;
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped_transform, tag},
    character::complete::{alpha1, alphanumeric1, char, digit1, multispace0, none_of},
    combinator::{map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::position;
use smol_str::SmolStr;
use token::{Token, TokenKind};

use crate::number::Number;
use crate::range::{Position, Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Where the tokenized snippet starts inside its enclosing source. Token
    /// ranges are reported relative to this position.
    pub base: Position,
}

pub struct Lexer {
    options: Options,
}

impl Lexer {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    pub fn tokenize(&self, input: &str) -> Result<Vec<Token>, LexerError> {
        let base = self.options.base;

        match tokens(Span::new(input)) {
            Ok((rest, mut tokens)) => {
                let eof: Range = rest.into();

                if let Some(c) = rest.fragment().chars().next() {
                    let at = Range::new(
                        eof.start,
                        Position::new(eof.start.line, eof.start.column + 1),
                    )
                    .offset_by(base);

                    return Err(if c == '"' || c == '\'' {
                        LexerError::UnterminatedString(at)
                    } else {
                        LexerError::UnexpectedCharacter(c, at)
                    });
                }

                tokens.iter_mut().for_each(|token| {
                    token.range = token.range.offset_by(base);
                });
                tokens.push(Token {
                    range: Range::new(eof.start, eof.start).offset_by(base),
                    kind: TokenKind::Eof,
                });

                Ok(tokens)
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let at: Range = e.input.into();
                let c = e.input.fragment().chars().next().unwrap_or(' ');
                Err(LexerError::UnexpectedCharacter(c, at.offset_by(base)))
            }
            Err(nom::Err::Incomplete(_)) => Err(LexerError::UnexpectedCharacter(
                ' ',
                Range::default().offset_by(base),
            )),
        }
    }
}

define_token_parser!(eq_eq_eq, "===", TokenKind::EqEqEq);
define_token_parser!(ne_eq_eq, "!==", TokenKind::NeEqEq);

define_token_parser!(arrow, "=>", TokenKind::Arrow);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(and, "&&", TokenKind::And);
define_token_parser!(or, "||", TokenKind::Or);
define_token_parser!(question_question, "??", TokenKind::QuestionQuestion);
define_token_parser!(plus_plus, "++", TokenKind::PlusPlus);
define_token_parser!(minus_minus, "--", TokenKind::MinusMinus);
define_token_parser!(plus_equal, "+=", TokenKind::PlusEqual);
define_token_parser!(minus_equal, "-=", TokenKind::MinusEqual);
define_token_parser!(asterisk_equal, "*=", TokenKind::AsteriskEqual);
define_token_parser!(slash_equal, "/=", TokenKind::SlashEqual);
define_token_parser!(percent_equal, "%=", TokenKind::PercentEqual);

define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(semi_colon, ";", TokenKind::SemiColon);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(question, "?", TokenKind::Question);
define_token_parser!(equal, "=", TokenKind::Equal);
define_token_parser!(not, "!", TokenKind::Not);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(asterisk, "*", TokenKind::Asterisk);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        alt((eq_eq_eq, ne_eq_eq)),
        alt((
            arrow,
            eq_eq,
            ne_eq,
            lte,
            gte,
            and,
            or,
            question_question,
            plus_plus,
            minus_minus,
            plus_equal,
            minus_equal,
            asterisk_equal,
            slash_equal,
            percent_equal,
        )),
        alt((
            l_paren, r_paren, l_bracket, r_bracket, l_brace, r_brace, comma, dot, semi_colon,
            colon, question, equal, not, lt, gt, plus, minus, asterisk, slash, percent,
        )),
    ))
    .parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |span: Span| {
            str::parse::<f64>(span.fragment()).map(|n| Token {
                range: span.into(),
                kind: TokenKind::NumberLiteral(Number::new(n)),
            })
        },
    )
    .parse(input)
}

fn escape(input: Span) -> IResult<Span, char> {
    alt((
        value('\\', char('\\')),
        value('"', char('"')),
        value('\'', char('\'')),
        value('\r', char('r')),
        value('\n', char('n')),
        value('\t', char('t')),
    ))
    .parse(input)
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, s) = alt((
        value(String::new(), tag("\"\"")),
        value(String::new(), tag("''")),
        delimited(
            char('"'),
            escaped_transform(none_of("\"\\"), '\\', escape),
            char('"'),
        ),
        delimited(
            char('\''),
            escaped_transform(none_of("'\\"), '\\', escape),
            char('\''),
        ),
    ))
    .parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range {
                start: start.into(),
                end: end.into(),
            },
            kind: TokenKind::StringLiteral(s),
        },
    ))
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"), tag("$"))),
            many0(alt((alphanumeric1, tag("_"), tag("$")))),
        )),
        |span: Span| {
            let kind = match *span.fragment() {
                "true" => TokenKind::BoolLiteral(true),
                "false" => TokenKind::BoolLiteral(false),
                "null" => TokenKind::Null,
                "undefined" => TokenKind::Undefined,
                "let" => TokenKind::Let,
                "typeof" => TokenKind::Typeof,
                fragment => TokenKind::Ident(SmolStr::new(fragment)),
            };
            Token {
                range: span.into(),
                kind,
            }
        },
    )
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((number_literal, string_literal, ident, punctuations)).parse(input)
}

fn tokens(input: Span) -> IResult<Span, Vec<Token>> {
    terminated(many0(preceded(multispace0, token)), multispace0).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn kinds(code: &str) -> Vec<TokenKind> {
        Lexer::new(Options::default())
            .tokenize(code)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[rstest]
    #[case("a + 1", vec![TokenKind::Ident("a".into()), TokenKind::Plus, TokenKind::NumberLiteral(Number::new(1.0)), TokenKind::Eof])]
    #[case("x === null", vec![TokenKind::Ident("x".into()), TokenKind::EqEqEq, TokenKind::Null, TokenKind::Eof])]
    #[case("count++", vec![TokenKind::Ident("count".into()), TokenKind::PlusPlus, TokenKind::Eof])]
    #[case("x => x.done", vec![TokenKind::Ident("x".into()), TokenKind::Arrow, TokenKind::Ident("x".into()), TokenKind::Dot, TokenKind::Ident("done".into()), TokenKind::Eof])]
    #[case("'it\\'s'", vec![TokenKind::StringLiteral("it's".to_string()), TokenKind::Eof])]
    #[case("\"\"", vec![TokenKind::StringLiteral(String::new()), TokenKind::Eof])]
    #[case("a ?? b", vec![TokenKind::Ident("a".into()), TokenKind::QuestionQuestion, TokenKind::Ident("b".into()), TokenKind::Eof])]
    #[case("let $x = 1.5", vec![TokenKind::Let, TokenKind::Ident("$x".into()), TokenKind::Equal, TokenKind::NumberLiteral(Number::new(1.5)), TokenKind::Eof])]
    #[case("  ", vec![TokenKind::Eof])]
    fn test_tokenize(#[case] code: &str, #[case] expected: Vec<TokenKind>) {
        assert_eq!(kinds(code), expected);
    }

    #[test]
    fn test_token_ranges_are_offset() {
        let tokens = Lexer::new(Options {
            base: Position::new(4, 10),
        })
        .tokenize("a + bc")
        .unwrap();

        assert_eq!(tokens[0].range.start, Position::new(4, 10));
        assert_eq!(tokens[2].range.start, Position::new(4, 14));
        assert_eq!(tokens[2].range.end, Position::new(4, 16));
    }

    #[rstest]
    #[case("a # b", LexerError::UnexpectedCharacter('#', Range::new(Position::new(1, 3), Position::new(1, 4))))]
    #[case("'abc", LexerError::UnterminatedString(Range::new(Position::new(1, 1), Position::new(1, 2))))]
    fn test_tokenize_error(#[case] code: &str, #[case] expected: LexerError) {
        assert_eq!(Lexer::new(Options::default()).tokenize(code), Err(expected));
    }
}
