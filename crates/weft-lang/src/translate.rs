//! Rewriting of free identifiers into scope-qualified reads and writes.
//!
//! Identifiers bound inside the expression (arrow parameters and `let`
//! declarations) and reserved names are left alone. Every other identifier is
//! looked up through a [`Resolver`]; reads become [`Expr::Get`], assignment
//! targets become [`Expr::Set`] and `++`/`--` are desugared into a
//! read-modify-write pair.
use std::rc::Rc;

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use smol_str::SmolStr;
use thiserror::Error;

use crate::ast::{
    BinaryOp, DepPath, Expr, Literal, Node, ScopeIndex, UpdateOp, constants, node::Args,
};
use crate::number::Number;
use crate::range::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The nearest scope declaring a value with the name.
    Value(ScopeIndex),
    /// The name is a scope alias. `anchor` is the scope the alias was found
    /// on, `target` the aliased scope. Both are equal when the alias names
    /// the anchor scope itself.
    Alias {
        anchor: ScopeIndex,
        target: ScopeIndex,
    },
    Unresolved,
}

pub trait Resolver {
    fn resolve(&self, name: &str) -> Resolution;
    /// The aliased child scope `name` exposed by `scope`, if any.
    fn alias_of(&self, scope: ScopeIndex, name: &str) -> Option<ScopeIndex>;
    fn declares(&self, scope: ScopeIndex, name: &str) -> bool;
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum TranslateError {
    #[error("`{0}` refers to a scope, not a value")]
    BareAlias(SmolStr, Range),
    #[error("Scope `{alias}` does not declare `{name}`")]
    UnknownMember {
        alias: SmolStr,
        name: SmolStr,
        range: Range,
    },
}

impl TranslateError {
    pub fn range(&self) -> Range {
        match self {
            TranslateError::BareAlias(_, range) => *range,
            TranslateError::UnknownMember { range, .. } => *range,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    pub node: Rc<Node>,
    /// Every declared value the expression touches, in first-seen order.
    pub dependencies: Vec<DepPath>,
    /// Identifiers left for host-global lookup.
    pub unresolved: Vec<(SmolStr, Range)>,
}

pub fn translate(node: &Rc<Node>, resolver: &dyn Resolver) -> Result<Translation, TranslateError> {
    let mut translator = Translator {
        resolver,
        locals: FxHashSet::default(),
        dependencies: Vec::new(),
        unresolved: Vec::new(),
    };

    translator.collect_locals(node);
    let node = translator.translate(node)?;

    Ok(Translation {
        node,
        dependencies: translator.dependencies,
        unresolved: translator.unresolved,
    })
}

struct AliasChain {
    anchor: ScopeIndex,
    aliases: SmallVec<[SmolStr; 2]>,
    target: ScopeIndex,
    label: SmolStr,
}

struct Translator<'a> {
    resolver: &'a dyn Resolver,
    locals: FxHashSet<SmolStr>,
    dependencies: Vec<DepPath>,
    unresolved: Vec<(SmolStr, Range)>,
}

impl Translator<'_> {
    fn collect_locals(&mut self, node: &Node) {
        match &node.expr {
            Expr::Arrow(params, body) => {
                self.locals.extend(params.iter().cloned());
                self.collect_locals(body);
            }
            Expr::Let(name, value) => {
                self.locals.insert(name.clone());
                self.collect_locals(value);
            }
            Expr::Literal(_) | Expr::Ident(_) | Expr::Get(_) => {}
            Expr::Set(_, value) | Expr::Member(value, _) | Expr::Unary(_, value) => {
                self.collect_locals(value)
            }
            Expr::Update { target, .. } => self.collect_locals(target),
            Expr::Index(lhs, rhs) | Expr::Binary(_, lhs, rhs) | Expr::Assign(_, lhs, rhs) => {
                self.collect_locals(lhs);
                self.collect_locals(rhs);
            }
            Expr::Call(callee, args) => {
                self.collect_locals(callee);
                args.iter().for_each(|arg| self.collect_locals(arg));
            }
            Expr::Conditional(cond, then, otherwise) => {
                self.collect_locals(cond);
                self.collect_locals(then);
                self.collect_locals(otherwise);
            }
            Expr::Template(nodes) | Expr::Array(nodes) | Expr::Sequence(nodes) => {
                nodes.iter().for_each(|node| self.collect_locals(node))
            }
            Expr::Object(entries) => entries
                .iter()
                .for_each(|(_, value)| self.collect_locals(value)),
        }
    }

    fn is_free(&self, name: &str) -> bool {
        !self.locals.contains(name) && !constants::is_reserved(name)
    }

    fn record(&mut self, path: &DepPath) {
        if !self.dependencies.contains(path) {
            self.dependencies.push(path.clone());
        }
    }

    fn record_unresolved(&mut self, name: &SmolStr, range: Range) {
        if !self.unresolved.iter().any(|(n, _)| n == name) {
            self.unresolved.push((name.clone(), range));
        }
    }

    fn alias_chain(&self, node: &Node) -> Option<AliasChain> {
        match &node.expr {
            Expr::Ident(name) if self.is_free(name) => match self.resolver.resolve(name) {
                Resolution::Alias { anchor, target } => Some(AliasChain {
                    anchor,
                    aliases: if anchor == target {
                        SmallVec::new()
                    } else {
                        smallvec::smallvec![name.clone()]
                    },
                    target,
                    label: name.clone(),
                }),
                _ => None,
            },
            Expr::Member(object, prop) => {
                let chain = self.alias_chain(object)?;
                let next = self.resolver.alias_of(chain.target, prop)?;
                let mut aliases = chain.aliases;
                aliases.push(prop.clone());

                Some(AliasChain {
                    anchor: chain.anchor,
                    aliases,
                    target: next,
                    label: prop.clone(),
                })
            }
            _ => None,
        }
    }

    /// The declared value `node` denotes, if it is a free identifier or a
    /// member of an alias chain.
    fn value_path(&self, node: &Node) -> Result<Option<DepPath>, TranslateError> {
        match &node.expr {
            Expr::Ident(name) if self.is_free(name) => match self.resolver.resolve(name) {
                Resolution::Value(scope) => Ok(Some(DepPath::new(scope, name.clone()))),
                Resolution::Alias { .. } => Err(TranslateError::BareAlias(name.clone(), node.range)),
                Resolution::Unresolved => Ok(None),
            },
            Expr::Member(object, prop) => match self.alias_chain(object) {
                Some(chain) if self.resolver.declares(chain.target, prop) => Ok(Some(
                    DepPath::with_aliases(chain.anchor, chain.aliases, prop.clone()),
                )),
                Some(chain) if self.resolver.alias_of(chain.target, prop).is_some() => {
                    Err(TranslateError::BareAlias(prop.clone(), node.range))
                }
                Some(chain) => Err(TranslateError::UnknownMember {
                    alias: chain.label,
                    name: prop.clone(),
                    range: node.range,
                }),
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    fn translate_all(&mut self, nodes: &Args) -> Result<Args, TranslateError> {
        nodes.iter().map(|node| self.translate(node)).collect()
    }

    fn translate(&mut self, node: &Rc<Node>) -> Result<Rc<Node>, TranslateError> {
        let range = node.range;
        let expr = match &node.expr {
            Expr::Literal(_) | Expr::Get(_) => return Ok(Rc::clone(node)),
            Expr::Ident(name) => match self.value_path(node)? {
                Some(path) => {
                    self.record(&path);
                    Expr::Get(path)
                }
                None => {
                    if self.is_free(name) {
                        self.record_unresolved(name, range);
                    }
                    return Ok(Rc::clone(node));
                }
            },
            Expr::Member(object, prop) => match self.value_path(node)? {
                Some(path) => {
                    self.record(&path);
                    Expr::Get(path)
                }
                None => Expr::Member(self.translate(object)?, prop.clone()),
            },
            Expr::Set(path, value) => {
                self.record(path);
                Expr::Set(path.clone(), self.translate(value)?)
            }
            Expr::Assign(op, target, value) => {
                let value = self.translate(value)?;

                match self.value_path(target)? {
                    Some(path) => {
                        self.record(&path);
                        let value = match op {
                            Some(op) => Rc::new(Node::new(
                                range,
                                Expr::Binary(
                                    *op,
                                    Rc::new(Node::new(target.range, Expr::Get(path.clone()))),
                                    value,
                                ),
                            )),
                            None => value,
                        };
                        Expr::Set(path, value)
                    }
                    None => Expr::Assign(*op, self.translate(target)?, value),
                }
            }
            Expr::Update { op, prefix, target } => match self.value_path(target)? {
                Some(path) => {
                    self.record(&path);
                    let (apply, undo) = match op {
                        UpdateOp::Increment => (BinaryOp::Add, BinaryOp::Sub),
                        UpdateOp::Decrement => (BinaryOp::Sub, BinaryOp::Add),
                    };
                    let one = || Rc::new(Node::new(range, Expr::Literal(Literal::Number(Number::new(1.0)))));
                    let updated = Rc::new(Node::new(
                        range,
                        Expr::Binary(
                            apply,
                            Rc::new(Node::new(target.range, Expr::Get(path.clone()))),
                            one(),
                        ),
                    ));
                    let set = Rc::new(Node::new(range, Expr::Set(path, updated)));

                    if *prefix {
                        return Ok(set);
                    }

                    Expr::Binary(undo, set, one())
                }
                None => Expr::Update {
                    op: *op,
                    prefix: *prefix,
                    target: self.translate(target)?,
                },
            },
            Expr::Template(parts) => Expr::Template(self.translate_all(parts)?),
            Expr::Index(object, index) => {
                Expr::Index(self.translate(object)?, self.translate(index)?)
            }
            Expr::Call(callee, args) => {
                Expr::Call(self.translate(callee)?, self.translate_all(args)?)
            }
            Expr::Unary(op, operand) => Expr::Unary(*op, self.translate(operand)?),
            Expr::Binary(op, lhs, rhs) => {
                Expr::Binary(*op, self.translate(lhs)?, self.translate(rhs)?)
            }
            Expr::Conditional(cond, then, otherwise) => Expr::Conditional(
                self.translate(cond)?,
                self.translate(then)?,
                self.translate(otherwise)?,
            ),
            Expr::Array(items) => Expr::Array(self.translate_all(items)?),
            Expr::Object(entries) => Expr::Object(
                entries
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), self.translate(value)?)))
                    .collect::<Result<Vec<_>, TranslateError>>()?,
            ),
            Expr::Arrow(params, body) => Expr::Arrow(params.clone(), self.translate(body)?),
            Expr::Let(name, value) => Expr::Let(name.clone(), self.translate(value)?),
            Expr::Sequence(nodes) => Expr::Sequence(self.translate_all(nodes)?),
        };

        Ok(Rc::new(Node::new(range, expr)))
    }
}
