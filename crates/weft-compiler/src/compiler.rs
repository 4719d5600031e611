use std::rc::Rc;

use itertools::Itertools;
use smol_str::SmolStr;
use weft_lang::{
    AstExpr, AstLiteral, AstNode, DepPath, InnerError, Position, Resolution, Resolver, ScopeIndex,
    Translation, Value, constants,
};
use weft_markup::{Document, DocumentError, NodeId, NodeKind, markers};

use crate::error::{CompileError, CompileErrorKind, Warning};
use crate::options::Options;
use crate::program::{EventTemplate, Init, Program, ScopeTemplate, ValueKind, ValueTemplate};
use crate::property::{self, Declaration, PropertyKind};
use crate::scope::{Scope, ScopeTree};
use crate::source::SourceMap;

/// The result of compiling one document. Values that failed to compile are
/// missing from `program` and reported in `errors`.
#[derive(Debug)]
pub struct Compilation {
    pub program: Program,
    pub errors: Vec<CompileError>,
    pub warnings: Vec<Warning>,
}

impl Compilation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
enum PropertySource {
    Markup {
        raw: String,
        /// Byte offset of `raw` in the document source.
        origin: Option<usize>,
    },
    Default(Value),
}

#[derive(Debug, Clone)]
struct Property {
    name: SmolStr,
    source: PropertySource,
}

#[derive(Debug, Default)]
struct PendingScope {
    values: Vec<(Property, PropertyKind)>,
    events: Vec<Property>,
    /// Source offset of the element's start tag.
    element: Option<usize>,
}

#[derive(Debug)]
enum Part<'a> {
    Text(&'a str),
    Expr { code: &'a str, offset: usize },
}

/// Splits `text` into literal runs and `[[expr]]` bodies. Brackets and
/// quotes inside an expression are balanced before a closing `]]` counts.
fn split_expressions(text: &str) -> Option<Vec<Part<'_>>> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut rest = 0;

    while let Some(found) = text[rest..].find(markers::OPEN) {
        let open = rest + found;
        if open > rest {
            parts.push(Part::Text(&text[rest..open]));
        }

        let start = open + markers::OPEN.len();
        let mut depth = 0usize;
        let mut quote = None;
        let mut i = start;
        let close = loop {
            match (bytes.get(i).copied()?, quote) {
                (b'\\', Some(_)) => i += 1,
                (c, Some(q)) if c == q => quote = None,
                (_, Some(_)) => {}
                (c @ (b'\'' | b'"'), None) => quote = Some(c),
                (b'[', None) => depth += 1,
                (b']', None) if depth > 0 => depth -= 1,
                (b']', None) if bytes.get(i + 1) == Some(&b']') => break i,
                _ => {}
            }
            i += 1;
        };

        parts.push(Part::Expr {
            code: &text[start..close],
            offset: start,
        });
        rest = close + markers::CLOSE.len();
    }

    if rest < text.len() {
        parts.push(Part::Text(&text[rest..]));
    }

    Some(parts)
}

pub struct Compiler<'a> {
    options: &'a Options,
    source: Option<SourceMap<'a>>,
    tree: ScopeTree,
    pending: Vec<PendingScope>,
    errors: Vec<CompileError>,
    warnings: Vec<Warning>,
}

impl<'a> Compiler<'a> {
    pub fn new(options: &'a Options, source: Option<&'a str>) -> Self {
        Self {
            options,
            source: source.map(SourceMap::new),
            tree: ScopeTree::default(),
            pending: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Annotates `document` in place and builds its program.
    pub fn compile(mut self, document: &mut Document) -> Compilation {
        if let Some(root) = document.document_element() {
            self.collect(document, root, None, true);
        }

        let mut templates = (0..self.tree.len())
            .map(|i| Some(self.emit_scope(ScopeIndex(i as u32))))
            .collect::<Vec<_>>();
        let root = (!self.tree.is_empty()).then(|| self.assemble(ScopeIndex(0), &mut templates));

        tracing::debug!(
            scopes = self.tree.len(),
            errors = self.errors.len(),
            warnings = self.warnings.len(),
            "compiled {}",
            self.options.file_name
        );

        Compilation {
            program: Program {
                root,
                scope_attribute: self.options.scope_attribute.as_str().into(),
            },
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    fn position(&self, offset: Option<usize>) -> Option<Position> {
        Some(self.source.as_ref()?.position(offset?))
    }

    fn error(&mut self, kind: CompileErrorKind, fallback: Option<usize>) {
        let fallback = self.position(fallback);
        let source = self.source.as_ref().map(|s| s.source());
        self.errors.push(CompileError::new(
            kind,
            &self.options.file_name,
            source,
            fallback,
        ));
    }

    fn check(&mut self, result: Result<(), DocumentError>, fallback: Option<usize>) {
        if let Err(error) = result {
            self.error(CompileErrorKind::Document(error), fallback);
        }
    }

    fn implicit_alias(document: &Document, node: NodeId, is_root: bool) -> Option<SmolStr> {
        let tag = document.tag(node)?;
        if is_root {
            return match tag {
                "html" => Some("page".into()),
                "head" | "body" => Some(tag.into()),
                _ => None,
            };
        }

        let parent = document.parent(node)?;
        let under_root = document.document_element() == Some(parent) && document.tag(parent) == Some("html");
        (under_root && matches!(tag, "head" | "body")).then(|| tag.into())
    }

    fn has_expression_text(document: &Document, node: NodeId) -> bool {
        document
            .children(node)
            .iter()
            .any(|c| matches!(document.kind(*c), Some(NodeKind::Text(t)) if t.contains(markers::OPEN)))
    }

    /// First pass: builds the scope tree and strips dynamic markup.
    fn collect(&mut self, document: &mut Document, node: NodeId, parent: Option<ScopeIndex>, is_root: bool) {
        let element = match (&mut self.source, document.tag(node)) {
            (Some(source), Some(tag)) => source.element(tag),
            _ => None,
        };

        let implicit_alias = Self::implicit_alias(document, node, is_root);
        let annotated = is_root
            || implicit_alias.is_some()
            || document
                .attributes(node)
                .iter()
                .any(|(name, value)| property::is_dynamic(name, value))
            || Self::has_expression_text(document, node);

        let mut scope_index = parent;
        if annotated {
            let index = self.scope(document, node, parent, implicit_alias, element);
            scope_index = Some(index);
        }

        let children = document.element_children(node).collect::<Vec<_>>();
        for child in children {
            self.collect(document, child, scope_index, false);
        }
    }

    fn scope(
        &mut self,
        document: &mut Document,
        node: NodeId,
        parent: Option<ScopeIndex>,
        implicit_alias: Option<SmolStr>,
        element: Option<usize>,
    ) -> ScopeIndex {
        let index = self.tree.next_index();
        let mut scope = Scope::new(index, node, parent);
        let mut pending = PendingScope {
            element,
            ..Default::default()
        };
        let mut alias = implicit_alias;

        let origin = |compiler: &Self, raw: &str| {
            compiler.source.as_ref()?.find(element.unwrap_or_default(), raw)
        };

        for (name, raw) in document.attributes(node).to_vec() {
            let declaration = match property::classify(&name, &raw) {
                Ok(Some(declaration)) => declaration,
                Ok(None) => continue,
                Err(property::EmptyName(attribute)) => {
                    self.error(CompileErrorKind::EmptyName(attribute), element);
                    self.check(document.remove_attribute(node, &name).map(drop), element);
                    continue;
                }
            };
            self.check(document.remove_attribute(node, &name).map(drop), element);

            let source = PropertySource::Markup {
                origin: origin(self, &raw),
                raw: raw.clone(),
            };
            match declaration {
                Declaration::Alias => alias = Some(raw.trim().into()),
                Declaration::Event(event) => pending.events.push(Property { name: event, source }),
                Declaration::Value { name, kind } => {
                    scope.declared.insert(name.clone());
                    pending.values.push((Property { name, source }, kind));
                }
            }
        }

        let texts = document
            .children(node)
            .iter()
            .copied()
            .filter(|child| document.attribute(*child, markers::CLONE).is_none())
            .enumerate()
            .filter_map(|(i, child)| match document.kind(child) {
                Some(NodeKind::Text(text)) if text.contains(markers::OPEN) => Some((i, child, text.clone())),
                _ => None,
            })
            .collect::<Vec<_>>();
        for (i, child, raw) in texts {
            self.check(document.set_text(child, ""), element);
            let name = SmolStr::new(format!("{}t{i}", constants::PRIVATE_PREFIX));
            scope.declared.insert(name.clone());
            let source = PropertySource::Markup {
                origin: origin(self, &raw),
                raw,
            };
            pending
                .values
                .push((Property { name, source }, PropertyKind::Value(ValueKind::Text(i))));
        }

        if scope.declared.contains(property::DATA) || scope.declared.contains(property::REQUEST) {
            let defaults = [
                (property::DATA, Value::Undefined),
                (property::DATA_OFFSET, Value::from(0.0)),
                (property::DATA_LENGTH, Value::Undefined),
            ];
            for (name, value) in defaults {
                if scope.declared.insert(name.into()) {
                    let kind = if name == property::DATA { ValueKind::Data } else { ValueKind::Plain };
                    pending.values.push((
                        Property {
                            name: name.into(),
                            source: PropertySource::Default(value),
                        },
                        PropertyKind::Value(kind),
                    ));
                }
            }
        }

        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            let mut duplicate = false;
            if let Some(parent) = parent.and_then(|p| self.tree.get_mut(p)) {
                duplicate = parent.aliases.contains_key(&alias);
                parent.aliases.entry(alias.clone()).or_insert(index);
            }
            if duplicate {
                self.error(CompileErrorKind::DuplicateAlias(alias.clone()), element);
            }
            scope.alias = Some(alias);
        }

        let marked = document.set_attribute(node, &self.options.scope_attribute, index.to_string());
        self.check(marked, element);
        self.tree.push(scope);
        self.pending.push(pending);
        index
    }

    /// Second pass: translates the values and events of one scope.
    fn emit_scope(&mut self, index: ScopeIndex) -> (Vec<Rc<ValueTemplate>>, Vec<Rc<EventTemplate>>) {
        let pending = std::mem::take(&mut self.pending[index.0 as usize]);
        let mut values = Vec::with_capacity(pending.values.len());
        let mut events = Vec::with_capacity(pending.events.len());

        for (property, kind) in pending.values {
            match self.value(index, &property, kind) {
                Ok(value) => values.push(Rc::new(value)),
                Err((kind, at)) => self.error(kind, at.or(pending.element)),
            }
        }

        for property in pending.events {
            match self.event(index, &property) {
                Ok(event) => events.push(Rc::new(event)),
                Err((kind, at)) => self.error(kind, at.or(pending.element)),
            }
        }

        values.sort_by(|a, b| (a.kind.is_handler(), &a.name).cmp(&(b.kind.is_handler(), &b.name)));
        (values, events)
    }

    fn value(
        &mut self,
        index: ScopeIndex,
        property: &Property,
        kind: PropertyKind,
    ) -> Result<ValueTemplate, (CompileErrorKind, Option<usize>)> {
        let origin = match &property.source {
            PropertySource::Markup { origin, .. } => *origin,
            PropertySource::Default(_) => None,
        };

        let kind = match kind {
            PropertyKind::Value(kind) => kind,
            PropertyKind::Handler(watched) => {
                match self.tree.resolver(index, None).resolve(&watched) {
                    Resolution::Value(scope) => ValueKind::Handler(DepPath::new(scope, watched)),
                    _ => {
                        return Err((
                            CompileErrorKind::UnknownWatch(property.name.clone(), watched),
                            origin,
                        ));
                    }
                }
            }
        };

        let (init, mut dependencies) = match &property.source {
            PropertySource::Default(value) => (Init::Static(value.clone()), Vec::new()),
            PropertySource::Markup { raw, origin } => self
                .expression(index, Some(&property.name), raw, *origin)
                .map_err(|e| (e, *origin))?,
        };

        match &kind {
            ValueKind::Handler(watched) => dependencies = vec![watched.clone()],
            ValueKind::Data => {
                dependencies.push(DepPath::new(index, property::DATA_OFFSET));
                dependencies.push(DepPath::new(index, property::DATA_LENGTH));
            }
            _ => {}
        }

        Ok(ValueTemplate {
            name: property.name.clone(),
            kind,
            init,
            dependencies: dependencies.into_iter().unique().collect(),
        })
    }

    fn event(
        &mut self,
        index: ScopeIndex,
        property: &Property,
    ) -> Result<EventTemplate, (CompileErrorKind, Option<usize>)> {
        let invalid = || CompileErrorKind::InvalidHandler(property.name.clone());
        let PropertySource::Markup { raw, origin } = &property.source else {
            return Err((invalid(), None));
        };

        match self.expression(index, None, raw, *origin).map_err(|e| (e, *origin))? {
            (Init::Compute(handler), _) if matches!(split_expressions(raw).as_deref(), Some([Part::Expr { .. }])) => {
                Ok(EventTemplate {
                    event: property.name.clone(),
                    handler,
                })
            }
            _ => Err((invalid(), *origin)),
        }
    }

    /// Parses and translates the `[[...]]` parts of `raw`. Text without any
    /// expression is a static string.
    fn expression(
        &mut self,
        index: ScopeIndex,
        property: Option<&str>,
        raw: &str,
        origin: Option<usize>,
    ) -> Result<(Init, Vec<DepPath>), CompileErrorKind> {
        let parts = split_expressions(raw)
            .ok_or_else(|| CompileErrorKind::UnterminatedExpression(raw.into()))?;

        if !parts.iter().any(|p| matches!(p, Part::Expr { .. })) {
            return Ok((Init::Static(Value::from(raw)), Vec::new()));
        }

        let mut nodes = Vec::with_capacity(parts.len());
        let mut dependencies = Vec::new();

        for part in &parts {
            match part {
                Part::Text(text) => nodes.push(Rc::new(AstNode::new(
                    Default::default(),
                    AstExpr::Literal(AstLiteral::String((*text).into())),
                ))),
                Part::Expr { code, offset } => {
                    let base = match (&self.source, origin) {
                        (Some(source), Some(origin)) => source.position(origin + offset),
                        _ => Position::default(),
                    };
                    let node = weft_lang::parse_at(code, base)?;
                    let translation = self.translate(index, property, &node)?;
                    dependencies.extend(translation.dependencies);
                    nodes.push(translation.node);
                }
            }
        }

        if let ([Part::Expr { .. }], [node]) = (parts.as_slice(), nodes.as_slice()) {
            return Ok((Init::Compute(Rc::clone(node)), dependencies));
        }

        let range = nodes
            .iter()
            .map(|n| n.range)
            .reduce(|a, b| a.join(&b))
            .unwrap_or_default();
        let node = Rc::new(AstNode::new(range, AstExpr::Template(nodes.into_iter().collect())));

        Ok((Init::Compute(node), dependencies))
    }

    fn translate(
        &mut self,
        index: ScopeIndex,
        property: Option<&str>,
        node: &Rc<AstNode>,
    ) -> Result<Translation, CompileErrorKind> {
        let resolver = self.tree.resolver(index, property);
        let translation = weft_lang::translate(node, &resolver).map_err(InnerError::from)?;

        if self.options.warn_unresolved {
            let visible = self.tree.visible_names(index);
            for (name, range) in &translation.unresolved {
                let similar = visible
                    .iter()
                    .filter(|candidate| candidate.as_str() != name.as_str())
                    .filter(|candidate| !candidate.starts_with(constants::PRIVATE_PREFIX))
                    .filter(|candidate| strsim::jaro_winkler(name, candidate) > 0.85)
                    .map(|candidate| (*candidate).clone())
                    .sorted()
                    .collect();
                self.warnings.push(Warning::Unresolved {
                    name: name.clone(),
                    position: range.start,
                    similar,
                });
            }
        }

        Ok(translation)
    }

    fn assemble(
        &self,
        index: ScopeIndex,
        templates: &mut [Option<(Vec<Rc<ValueTemplate>>, Vec<Rc<EventTemplate>>)>],
    ) -> Rc<ScopeTemplate> {
        let (values, events) = templates
            .get_mut(index.0 as usize)
            .and_then(Option::take)
            .unwrap_or_default();
        let scope = self.tree.get(index);
        let children = scope
            .map(|s| s.children.clone())
            .unwrap_or_default()
            .into_iter()
            .map(|child| self.assemble(child, templates))
            .collect();

        Rc::new(ScopeTemplate {
            index,
            alias: scope.and_then(|s| s.alias.clone()),
            values,
            events,
            children,
        })
    }
}
