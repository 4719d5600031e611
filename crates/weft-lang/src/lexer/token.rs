use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::{number::Number, range::Range};

#[derive(PartialEq, Debug, Clone)]
pub struct Token {
    pub range: Range,
    pub kind: TokenKind,
}

impl Token {
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum TokenKind {
    And,
    Arrow,
    Asterisk,
    AsteriskEqual,
    BoolLiteral(bool),
    Colon,
    Comma,
    Dot,
    Eof,
    EqEq,
    EqEqEq,
    Equal,
    Gt,
    Gte,
    Ident(SmolStr),
    LBrace,
    LBracket,
    LParen,
    Let,
    Lt,
    Lte,
    Minus,
    MinusEqual,
    MinusMinus,
    NeEq,
    NeEqEq,
    Not,
    Null,
    NumberLiteral(Number),
    Or,
    Percent,
    PercentEqual,
    Plus,
    PlusEqual,
    PlusPlus,
    Question,
    QuestionQuestion,
    RBrace,
    RBracket,
    RParen,
    SemiColon,
    Slash,
    SlashEqual,
    StringLiteral(String),
    Typeof,
    Undefined,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::And => write!(f, "&&"),
            TokenKind::Arrow => write!(f, "=>"),
            TokenKind::Asterisk => write!(f, "*"),
            TokenKind::AsteriskEqual => write!(f, "*="),
            TokenKind::BoolLiteral(b) => write!(f, "{}", b),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::Eof => write!(f, ""),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::EqEqEq => write!(f, "==="),
            TokenKind::Equal => write!(f, "="),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Ident(ident) => write!(f, "{}", ident),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::LParen => write!(f, "("),
            TokenKind::Let => write!(f, "let"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::MinusEqual => write!(f, "-="),
            TokenKind::MinusMinus => write!(f, "--"),
            TokenKind::NeEq => write!(f, "!="),
            TokenKind::NeEqEq => write!(f, "!=="),
            TokenKind::Not => write!(f, "!"),
            TokenKind::Null => write!(f, "null"),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::Or => write!(f, "||"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::PercentEqual => write!(f, "%="),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::PlusEqual => write!(f, "+="),
            TokenKind::PlusPlus => write!(f, "++"),
            TokenKind::Question => write!(f, "?"),
            TokenKind::QuestionQuestion => write!(f, "??"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::SemiColon => write!(f, ";"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::SlashEqual => write!(f, "/="),
            TokenKind::StringLiteral(s) => write!(f, "{:?}", s),
            TokenKind::Typeof => write!(f, "typeof"),
            TokenKind::Undefined => write!(f, "undefined"),
        }
    }
}
