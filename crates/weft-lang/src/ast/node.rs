use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use itertools::Itertools;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::{number::Number, range::Range};

use super::path::DepPath;

pub type Args = SmallVec<[Rc<Node>; 4]>;
pub type Params = SmallVec<[SmolStr; 4]>;

#[derive(PartialEq, Debug, Clone)]
pub struct Node {
    pub range: Range,
    pub expr: Expr,
}

impl Node {
    pub fn new(range: Range, expr: Expr) -> Self {
        Self { range, expr }
    }

    pub fn is_assignable(&self) -> bool {
        matches!(
            self.expr,
            Expr::Ident(_) | Expr::Member(_, _) | Expr::Index(_, _)
        )
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(Number),
    String(SmolStr),
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Undefined => write!(f, "undefined"),
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) => write!(f, "{:?}", s.as_str()),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    Typeof,
}

impl Display for UnaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
            UnaryOp::Neg => write!(f, "-"),
            UnaryOp::Plus => write!(f, "+"),
            UnaryOp::Typeof => write!(f, "typeof "),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Lt,
    Lte,
    Gt,
    Gte,
    And,
    Or,
    Coalesce,
}

impl Display for BinaryOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let op = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNe => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        };
        write!(f, "{}", op)
    }
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl Display for UpdateOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            UpdateOp::Increment => write!(f, "++"),
            UpdateOp::Decrement => write!(f, "--"),
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Ident(SmolStr),
    /// Read of a declared value.
    Get(DepPath),
    /// Write of a declared value, evaluating to the written value.
    Set(DepPath, Rc<Node>),
    /// String interpolation: parts are concatenated, `null`/`undefined` render empty.
    Template(Args),
    Member(Rc<Node>, SmolStr),
    Index(Rc<Node>, Rc<Node>),
    Call(Rc<Node>, Args),
    Unary(UnaryOp, Rc<Node>),
    Binary(BinaryOp, Rc<Node>, Rc<Node>),
    Conditional(Rc<Node>, Rc<Node>, Rc<Node>),
    Assign(Option<BinaryOp>, Rc<Node>, Rc<Node>),
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Rc<Node>,
    },
    Array(Args),
    Object(Vec<(SmolStr, Rc<Node>)>),
    Arrow(Params, Rc<Node>),
    Let(SmolStr, Rc<Node>),
    Sequence(Args),
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(literal) => write!(f, "{}", literal),
            Expr::Ident(name) => write!(f, "{}", name),
            Expr::Get(path) => write!(f, "get({})", path),
            Expr::Set(path, value) => write!(f, "set({}, {})", path, value),
            Expr::Template(parts) => write!(f, "`{}`", parts.iter().join(", ")),
            Expr::Member(object, name) => write!(f, "{}.{}", object, name),
            Expr::Index(object, index) => write!(f, "{}[{}]", object, index),
            Expr::Call(callee, args) => write!(f, "{}({})", callee, args.iter().join(", ")),
            Expr::Unary(op, operand) => write!(f, "{}{}", op, operand),
            Expr::Binary(op, lhs, rhs) => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::Conditional(cond, then, otherwise) => {
                write!(f, "({} ? {} : {})", cond, then, otherwise)
            }
            Expr::Assign(None, target, value) => write!(f, "({} = {})", target, value),
            Expr::Assign(Some(op), target, value) => {
                write!(f, "({} {}= {})", target, op, value)
            }
            Expr::Update {
                op,
                prefix: true,
                target,
            } => write!(f, "{}{}", op, target),
            Expr::Update {
                op,
                prefix: false,
                target,
            } => write!(f, "{}{}", target, op),
            Expr::Array(items) => write!(f, "[{}]", items.iter().join(", ")),
            Expr::Object(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .join(", ")
            ),
            Expr::Arrow(params, body) => write!(f, "(({}) => {})", params.iter().join(", "), body),
            Expr::Let(name, value) => write!(f, "let {} = {}", name, value),
            Expr::Sequence(nodes) => write!(f, "{}", nodes.iter().join("; ")),
        }
    }
}
