//! The compiled form of a document: a tree of scope templates that a
//! [`Builder`] turns into live scopes.
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

use itertools::Itertools;
use smol_str::SmolStr;
use weft_lang::{AstNode, DepPath, ScopeIndex, Value};
use weft_markup::NodeId;

#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// No binding; the value only feeds other values.
    Plain,
    Class(SmolStr),
    Style(SmolStr),
    Attribute(SmolStr),
    /// Replaces the content of the element's child text node at this index.
    Text(usize),
    Data,
    Request,
    /// Runs its expression whenever the watched value changes.
    Handler(DepPath),
}

impl ValueKind {
    pub fn is_handler(&self) -> bool {
        matches!(self, ValueKind::Handler(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Init {
    Static(Value),
    Compute(Rc<AstNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueTemplate {
    pub name: SmolStr,
    pub kind: ValueKind,
    pub init: Init,
    /// Values this one observes, in first-use order.
    pub dependencies: Vec<DepPath>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EventTemplate {
    pub event: SmolStr,
    pub handler: Rc<AstNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeTemplate {
    pub index: ScopeIndex,
    pub alias: Option<SmolStr>,
    /// Non-handler values sorted by name, then handlers sorted by name.
    pub values: Vec<Rc<ValueTemplate>>,
    pub events: Vec<Rc<EventTemplate>>,
    pub children: Vec<Rc<ScopeTemplate>>,
}

impl ScopeTemplate {
    pub fn value(&self, name: &str) -> Option<&Rc<ValueTemplate>> {
        self.values.iter().find(|v| v.name == name)
    }

    /// Builds this scope on `node`, then its values, links and events, then
    /// each child scope located within `node`.
    pub fn instantiate<B: Builder>(
        self: &Rc<Self>,
        builder: &mut B,
        parent: Option<B::Scope>,
        node: NodeId,
    ) -> B::Scope {
        let scope = builder.scope(self, parent, node);

        for template in &self.values {
            let value = builder.value(scope, template);
            for dependency in &template.dependencies {
                builder.link(scope, value, dependency);
            }
        }

        for event in &self.events {
            builder.event(scope, event);
        }

        for child in &self.children {
            if let Some(child_node) = builder.locate(child.index, node) {
                child.instantiate(builder, Some(scope), child_node);
            }
        }

        scope
    }

    /// Pre-order walk over this template and its descendants.
    pub fn walk(self: &Rc<Self>) -> Vec<Rc<ScopeTemplate>> {
        let mut out = vec![Rc::clone(self)];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }
}

/// The runtime side of a program: the primitives a template tree needs to
/// come alive.
pub trait Builder {
    type Scope: Copy;
    type Value: Copy;

    /// Finds the element of scope `index` inside `within`, skipping clones.
    fn locate(&mut self, index: ScopeIndex, within: NodeId) -> Option<NodeId>;
    fn scope(
        &mut self,
        template: &Rc<ScopeTemplate>,
        parent: Option<Self::Scope>,
        node: NodeId,
    ) -> Self::Scope;
    fn value(&mut self, scope: Self::Scope, template: &Rc<ValueTemplate>) -> Self::Value;
    /// Queues an edge from the value at `dependency` to `observer`.
    fn link(&mut self, scope: Self::Scope, observer: Self::Value, dependency: &DepPath);
    fn event(&mut self, scope: Self::Scope, template: &Rc<EventTemplate>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub root: Option<Rc<ScopeTemplate>>,
    /// Attribute carrying the scope index on each scope element.
    pub scope_attribute: SmolStr,
}

impl Program {
    pub fn instantiate<B: Builder>(&self, builder: &mut B, node: NodeId) -> Option<B::Scope> {
        self.root
            .as_ref()
            .map(|root| root.instantiate(builder, None, node))
    }

    pub fn scope(&self, index: ScopeIndex) -> Option<Rc<ScopeTemplate>> {
        self.scopes().into_iter().find(|s| s.index == index)
    }

    pub fn scopes(&self) -> Vec<Rc<ScopeTemplate>> {
        self.root.as_ref().map(|root| root.walk()).unwrap_or_default()
    }
}

impl Display for ValueTemplate {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.init {
            Init::Static(value) => write!(f, "{} = {:?}", self.name, value.to_string()),
            Init::Compute(node) => write!(f, "{} = {}", self.name, node),
        }
    }
}

impl Display for Program {
    /// One line per scope and value; used in tests and debug logs.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for scope in self.scopes() {
            let alias = scope
                .alias
                .as_ref()
                .map(|a| format!(" as {a}"))
                .unwrap_or_default();
            let children = scope.children.iter().map(|c| c.index).join(", ");
            writeln!(f, "scope {}{alias} [{children}]", scope.index)?;

            for value in &scope.values {
                writeln!(f, "  {value}")?;
            }
            for event in &scope.events {
                writeln!(f, "  on {} = {}", event.event, event.handler)?;
            }
        }
        Ok(())
    }
}
