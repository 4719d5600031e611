use std::rc::Rc;

use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::lexer::token::{Token, TokenKind};
use crate::range::Range;

use super::error::ParseError;
use super::node::{Args, BinaryOp, Expr, Literal, Node, Params, UnaryOp, UpdateOp};

#[inline(always)]
fn node(range: Range, expr: Expr) -> Rc<Node> {
    Rc::new(Node::new(range, expr))
}

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Parses a `;`-separated statement list. A single statement is returned
    /// as-is, several are wrapped in a `Sequence`.
    pub fn parse(&mut self) -> Result<Rc<Node>, ParseError> {
        if self.tokens.is_empty() {
            return Err(ParseError::UnexpectedEOFDetected(Range::default()));
        }

        let mut statements: Args = SmallVec::new();

        loop {
            while self.eat(&TokenKind::SemiColon) {}

            if self.peek().is_eof() {
                break;
            }

            statements.push(self.parse_statement()?);

            match &self.peek().kind {
                TokenKind::SemiColon => continue,
                TokenKind::Eof => break,
                _ => return Err(ParseError::UnexpectedToken(self.peek().clone())),
            }
        }

        match statements.len() {
            0 => Err(ParseError::UnexpectedEOFDetected(self.peek().range)),
            1 => Ok(statements.remove(0)),
            _ => {
                let range = statements[0]
                    .range
                    .join(&statements[statements.len() - 1].range);
                Ok(node(range, Expr::Sequence(statements)))
            }
        }
    }

    #[inline(always)]
    fn peek(&self) -> &'a Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    #[inline(always)]
    fn peek_kind_at(&self, offset: usize) -> Option<&'a TokenKind> {
        self.tokens.get(self.pos + offset).map(|token| &token.kind)
    }

    fn next(&mut self) -> &'a Token {
        let token = self.peek();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.next();
            true
        } else {
            false
        }
    }

    fn parse_statement(&mut self) -> Result<Rc<Node>, ParseError> {
        if matches!(self.peek().kind, TokenKind::Let) {
            return self.parse_let();
        }

        self.parse_assignment()
    }

    fn parse_let(&mut self) -> Result<Rc<Node>, ParseError> {
        let let_token = self.next();
        let name_token = self.next();
        let name = match &name_token.kind {
            TokenKind::Ident(name) => name.clone(),
            TokenKind::Eof => return Err(ParseError::UnexpectedEOFDetected(name_token.range)),
            _ => return Err(ParseError::UnexpectedToken(name_token.clone())),
        };

        let equal = self.next();
        if !matches!(equal.kind, TokenKind::Equal) {
            return Err(ParseError::UnexpectedToken(equal.clone()));
        }

        let value = self.parse_assignment()?;
        Ok(node(
            let_token.range.join(&value.range),
            Expr::Let(name, value),
        ))
    }

    fn parse_assignment(&mut self) -> Result<Rc<Node>, ParseError> {
        if self.is_arrow_start() {
            return self.parse_arrow();
        }

        let lhs = self.parse_conditional()?;
        let op = match self.peek().kind {
            TokenKind::Equal => Some(None),
            TokenKind::PlusEqual => Some(Some(BinaryOp::Add)),
            TokenKind::MinusEqual => Some(Some(BinaryOp::Sub)),
            TokenKind::AsteriskEqual => Some(Some(BinaryOp::Mul)),
            TokenKind::SlashEqual => Some(Some(BinaryOp::Div)),
            TokenKind::PercentEqual => Some(Some(BinaryOp::Mod)),
            _ => None,
        };

        match op {
            Some(op) => {
                if !lhs.is_assignable() {
                    return Err(ParseError::InvalidAssignmentTarget(lhs.range));
                }
                self.next();
                let rhs = self.parse_assignment()?;
                Ok(node(
                    lhs.range.join(&rhs.range),
                    Expr::Assign(op, lhs, rhs),
                ))
            }
            None => Ok(lhs),
        }
    }

    fn is_arrow_start(&self) -> bool {
        match self.peek_kind_at(0) {
            Some(TokenKind::Ident(_)) => matches!(self.peek_kind_at(1), Some(TokenKind::Arrow)),
            Some(TokenKind::LParen) => {
                let mut offset = 1;
                if matches!(self.peek_kind_at(offset), Some(TokenKind::RParen)) {
                    return matches!(self.peek_kind_at(offset + 1), Some(TokenKind::Arrow));
                }

                loop {
                    if !matches!(self.peek_kind_at(offset), Some(TokenKind::Ident(_))) {
                        return false;
                    }
                    offset += 1;

                    match self.peek_kind_at(offset) {
                        Some(TokenKind::Comma) => offset += 1,
                        Some(TokenKind::RParen) => {
                            return matches!(
                                self.peek_kind_at(offset + 1),
                                Some(TokenKind::Arrow)
                            );
                        }
                        _ => return false,
                    }
                }
            }
            _ => false,
        }
    }

    fn parse_arrow(&mut self) -> Result<Rc<Node>, ParseError> {
        let start = self.next();
        let mut params: Params = SmallVec::new();

        match &start.kind {
            TokenKind::Ident(name) => params.push(name.clone()),
            TokenKind::LParen => loop {
                let token = self.next();
                match &token.kind {
                    TokenKind::Ident(name) => params.push(name.clone()),
                    TokenKind::Comma => continue,
                    TokenKind::RParen => break,
                    _ => return Err(ParseError::ExpectedClosingParen(token.clone())),
                }
            },
            _ => return Err(ParseError::UnexpectedToken(start.clone())),
        }

        let arrow = self.next();
        if !matches!(arrow.kind, TokenKind::Arrow) {
            return Err(ParseError::UnexpectedToken(arrow.clone()));
        }

        let body = self.parse_assignment()?;
        Ok(node(start.range.join(&body.range), Expr::Arrow(params, body)))
    }

    fn parse_conditional(&mut self) -> Result<Rc<Node>, ParseError> {
        let cond = self.parse_binary(1)?;

        if !self.eat(&TokenKind::Question) {
            return Ok(cond);
        }

        let then = self.parse_assignment()?;
        let colon = self.next();
        if !matches!(colon.kind, TokenKind::Colon) {
            return Err(ParseError::UnexpectedToken(colon.clone()));
        }
        let otherwise = self.parse_assignment()?;

        Ok(node(
            cond.range.join(&otherwise.range),
            Expr::Conditional(cond, then, otherwise),
        ))
    }

    #[inline(always)]
    fn binary_op(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
        match kind {
            TokenKind::QuestionQuestion => Some((BinaryOp::Coalesce, 1)),
            TokenKind::Or => Some((BinaryOp::Or, 2)),
            TokenKind::And => Some((BinaryOp::And, 3)),
            TokenKind::EqEq => Some((BinaryOp::Eq, 4)),
            TokenKind::NeEq => Some((BinaryOp::Ne, 4)),
            TokenKind::EqEqEq => Some((BinaryOp::StrictEq, 4)),
            TokenKind::NeEqEq => Some((BinaryOp::StrictNe, 4)),
            TokenKind::Lt => Some((BinaryOp::Lt, 5)),
            TokenKind::Lte => Some((BinaryOp::Lte, 5)),
            TokenKind::Gt => Some((BinaryOp::Gt, 5)),
            TokenKind::Gte => Some((BinaryOp::Gte, 5)),
            TokenKind::Plus => Some((BinaryOp::Add, 6)),
            TokenKind::Minus => Some((BinaryOp::Sub, 6)),
            TokenKind::Asterisk => Some((BinaryOp::Mul, 7)),
            TokenKind::Slash => Some((BinaryOp::Div, 7)),
            TokenKind::Percent => Some((BinaryOp::Mod, 7)),
            _ => None,
        }
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Rc<Node>, ParseError> {
        let mut lhs = self.parse_unary()?;

        while let Some((op, prec)) = Self::binary_op(&self.peek().kind) {
            if prec < min_prec {
                break;
            }

            self.next();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = node(lhs.range.join(&rhs.range), Expr::Binary(op, lhs, rhs));
        }

        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Rc<Node>, ParseError> {
        let op = match self.peek().kind {
            TokenKind::Not => UnaryOp::Not,
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Typeof => UnaryOp::Typeof,
            TokenKind::PlusPlus | TokenKind::MinusMinus => return self.parse_prefix_update(),
            _ => return self.parse_postfix(),
        };

        let op_token = self.next();
        let operand = self.parse_unary()?;
        Ok(node(
            op_token.range.join(&operand.range),
            Expr::Unary(op, operand),
        ))
    }

    fn parse_prefix_update(&mut self) -> Result<Rc<Node>, ParseError> {
        let op_token = self.next();
        let op = if matches!(op_token.kind, TokenKind::PlusPlus) {
            UpdateOp::Increment
        } else {
            UpdateOp::Decrement
        };

        let target = self.parse_unary()?;
        if !target.is_assignable() {
            return Err(ParseError::InvalidAssignmentTarget(target.range));
        }

        Ok(node(
            op_token.range.join(&target.range),
            Expr::Update {
                op,
                prefix: true,
                target,
            },
        ))
    }

    fn parse_postfix(&mut self) -> Result<Rc<Node>, ParseError> {
        let target = self.parse_call_member()?;
        let op = match self.peek().kind {
            TokenKind::PlusPlus => UpdateOp::Increment,
            TokenKind::MinusMinus => UpdateOp::Decrement,
            _ => return Ok(target),
        };

        if !target.is_assignable() {
            return Err(ParseError::InvalidAssignmentTarget(target.range));
        }

        let op_token = self.next();
        Ok(node(
            target.range.join(&op_token.range),
            Expr::Update {
                op,
                prefix: false,
                target,
            },
        ))
    }

    fn parse_call_member(&mut self) -> Result<Rc<Node>, ParseError> {
        let mut current = self.parse_primary()?;

        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.next();
                    let name_token = self.next();
                    let name = match &name_token.kind {
                        TokenKind::Ident(name) => name.clone(),
                        TokenKind::BoolLiteral(_)
                        | TokenKind::Null
                        | TokenKind::Undefined
                        | TokenKind::Let
                        | TokenKind::Typeof => SmolStr::new(name_token.kind.to_string()),
                        TokenKind::Eof => {
                            return Err(ParseError::UnexpectedEOFDetected(name_token.range));
                        }
                        _ => return Err(ParseError::UnexpectedToken(name_token.clone())),
                    };
                    current = node(
                        current.range.join(&name_token.range),
                        Expr::Member(current, name),
                    );
                }
                TokenKind::LBracket => {
                    self.next();
                    let index = self.parse_assignment()?;
                    let close = self.next();
                    if !matches!(close.kind, TokenKind::RBracket) {
                        return Err(ParseError::ExpectedClosingBracket(close.clone()));
                    }
                    current = node(
                        current.range.join(&close.range),
                        Expr::Index(current, index),
                    );
                }
                TokenKind::LParen => {
                    self.next();
                    let (args, close) = self.parse_list(
                        &TokenKind::RParen,
                        ParseError::ExpectedClosingParen,
                    )?;
                    current = node(current.range.join(&close.range), Expr::Call(current, args));
                }
                _ => return Ok(current),
            }
        }
    }

    /// Parses comma-separated expressions up to `close`, allowing a trailing comma.
    fn parse_list(
        &mut self,
        close: &TokenKind,
        unclosed: fn(Token) -> ParseError,
    ) -> Result<(Args, &'a Token), ParseError> {
        let mut items: Args = SmallVec::new();

        loop {
            if &self.peek().kind == close {
                return Ok((items, self.next()));
            }

            items.push(self.parse_assignment()?);

            let token = self.next();
            match &token.kind {
                TokenKind::Comma => continue,
                kind if kind == close => return Ok((items, token)),
                _ => return Err(unclosed(token.clone())),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Rc<Node>, ParseError> {
        let token = self.next();

        match &token.kind {
            TokenKind::NumberLiteral(n) => Ok(node(token.range, Expr::Literal(Literal::Number(*n)))),
            TokenKind::StringLiteral(s) => Ok(node(
                token.range,
                Expr::Literal(Literal::String(SmolStr::new(s))),
            )),
            TokenKind::BoolLiteral(b) => Ok(node(token.range, Expr::Literal(Literal::Bool(*b)))),
            TokenKind::Null => Ok(node(token.range, Expr::Literal(Literal::Null))),
            TokenKind::Undefined => Ok(node(token.range, Expr::Literal(Literal::Undefined))),
            TokenKind::Ident(name) => Ok(node(token.range, Expr::Ident(name.clone()))),
            TokenKind::LParen => {
                let inner = self.parse_assignment()?;
                let close = self.next();
                if !matches!(close.kind, TokenKind::RParen) {
                    return Err(ParseError::ExpectedClosingParen(close.clone()));
                }
                Ok(inner)
            }
            TokenKind::LBracket => {
                let (items, close) =
                    self.parse_list(&TokenKind::RBracket, ParseError::ExpectedClosingBracket)?;
                Ok(node(token.range.join(&close.range), Expr::Array(items)))
            }
            TokenKind::LBrace => self.parse_object(token),
            TokenKind::Eof => Err(ParseError::UnexpectedEOFDetected(token.range)),
            _ => Err(ParseError::UnexpectedToken(token.clone())),
        }
    }

    fn parse_object(&mut self, open: &'a Token) -> Result<Rc<Node>, ParseError> {
        let mut entries = Vec::new();

        loop {
            let key_token = self.next();
            let key = match &key_token.kind {
                TokenKind::RBrace => break,
                TokenKind::Ident(name) => name.clone(),
                TokenKind::StringLiteral(s) => SmolStr::new(s),
                TokenKind::NumberLiteral(n) => SmolStr::new(n.to_string()),
                TokenKind::Eof => return Err(ParseError::ExpectedClosingBrace(key_token.clone())),
                _ => return Err(ParseError::UnexpectedToken(key_token.clone())),
            };

            let value = if self.eat(&TokenKind::Colon) {
                self.parse_assignment()?
            } else if matches!(key_token.kind, TokenKind::Ident(_)) {
                node(key_token.range, Expr::Ident(key.clone()))
            } else {
                return Err(ParseError::UnexpectedToken(self.peek().clone()));
            };
            entries.push((key, value));

            let token = self.next();
            match &token.kind {
                TokenKind::Comma => continue,
                TokenKind::RBrace => {
                    return Ok(node(open.range.join(&token.range), Expr::Object(entries)));
                }
                _ => return Err(ParseError::ExpectedClosingBrace(token.clone())),
            }
        }

        let close = &self.tokens[self.pos - 1];
        Ok(node(open.range.join(&close.range), Expr::Object(entries)))
    }
}
