use std::rc::Rc;

use itertools::Itertools;
use rustc_hash::FxHashSet;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;
use smol_str::SmolStr;
use tracing::{debug, info, warn};
use weft_compiler::{Builder, EventTemplate, Init, Program, ScopeTemplate, ValueKind, ValueTemplate};
use weft_lang::{Accessor, AstNode, DepPath, EvalError, Evaluator, ScopeIndex, Value};
use weft_markup::{NodeId, markers};

use crate::binding;
use crate::error::{HostError, RuntimeError};
use crate::host::Host;
use crate::options::Options;
use crate::request::{PendingRequest, RequestId};
use crate::scope::{Cell, Listener, PendingLink, Replica, ScopeInstance};

new_key_type! {
    pub struct ScopeId;
    pub struct ValueId;
    pub struct ListenerId;
}

/// Counters for work done since the runtime was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Compute functions and handler bodies run.
    pub evaluations: u64,
    /// Bindings applied to the document, replication passes included.
    pub effects: u64,
}

/// The live value graph of one mounted [`Program`].
///
/// Everything runs on the caller's thread: [`Runtime::set`] and
/// [`Runtime::dispatch`] propagate synchronously and return once every
/// affected binding is up to date. Requests are the only deferred work.
pub struct Runtime<H> {
    pub(crate) host: H,
    program: Program,
    options: Options,
    cycle: u64,
    pub(crate) push_level: u32,
    depth: u32,
    pub(crate) scopes: SlotMap<ScopeId, ScopeInstance>,
    pub(crate) values: SlotMap<ValueId, Cell>,
    /// Live values in creation order.
    pub(crate) order: Vec<ValueId>,
    listeners: SlotMap<ListenerId, Listener>,
    pub(crate) requests: SlotMap<RequestId, PendingRequest>,
    pending_links: Vec<PendingLink>,
    pending_listeners: Vec<ListenerId>,
    /// Position and item for the next scope built as a clone.
    pub(crate) seed: Option<(usize, Value)>,
    root: Option<ScopeId>,
    diagnostics: Vec<RuntimeError>,
    pub(crate) stats: Stats,
    pub(crate) on_settle: Option<Box<dyn FnMut()>>,
}

impl<H: Host> Runtime<H> {
    pub fn new(program: Program, host: H) -> Self {
        Self {
            host,
            program,
            options: Options::default(),
            cycle: 0,
            push_level: 0,
            depth: 0,
            scopes: SlotMap::with_key(),
            values: SlotMap::with_key(),
            order: Vec::new(),
            listeners: SlotMap::with_key(),
            requests: SlotMap::with_key(),
            pending_links: Vec::new(),
            pending_listeners: Vec::new(),
            seed: None,
            root: None,
            diagnostics: Vec::new(),
            stats: Stats::default(),
            on_settle: None,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    /// Builds the scope graph on the host document and runs the first full
    /// evaluation pass. Returns `None` when the program is empty or its root
    /// element is missing.
    pub fn mount(&mut self) -> Option<ScopeId> {
        let template = self.program.root.clone()?;
        let Some(node) = self.find_scope_node(template.index, self.host.root()) else {
            warn!(index = %template.index, "Root scope element not found");
            return None;
        };

        let root = template.instantiate(self, None, node);
        self.root = Some(root);
        self.start();
        info!(values = self.values.len(), scopes = self.scopes.len(), "Runtime started");
        Some(root)
    }

    /// Resolves pending links, attaches pending listeners and evaluates every
    /// value once in a fresh cycle.
    pub fn start(&mut self) {
        self.resolve_links();
        self.attach_listeners();
        self.cycle += 1;

        self.push_level += 1;
        for id in self.order.clone() {
            self.get(id);
        }
        self.push_level -= 1;
    }

    /// Brings a freshly built subtree to life without starting a new cycle.
    pub(crate) fn activate(&mut self, from: usize) {
        self.resolve_links();
        self.attach_listeners();

        let fresh = self.order.get(from..).map(<[ValueId]>::to_vec).unwrap_or_default();
        self.push_level += 1;
        for id in fresh {
            self.get(id);
        }
        self.push_level -= 1;
    }

    /// Current output of `id`, recomputed at most once per cycle.
    pub fn get(&mut self, id: ValueId) -> Value {
        let cycle = self.cycle;
        let Some(cell) = self.values.get_mut(id) else {
            return Value::Undefined;
        };
        if cell.evaluated == Some(cycle) {
            return cell.output.clone();
        }
        let first = cell.evaluated.is_none();
        cell.evaluated = Some(cycle);

        if self.enter(id) {
            let changed = match self.recompute(id, first) {
                Some(next) => self.commit(id, next, first),
                None => {
                    if first {
                        self.apply(id, true);
                    }
                    false
                }
            };
            if changed {
                self.notify(id);
            }
            self.depth -= 1;
        }

        self.output(id).cloned().unwrap_or_default()
    }

    /// Assigns `value` to `id`, dropping its compute function. Observers are
    /// brought up to date before this returns.
    pub fn set(&mut self, id: ValueId, value: Value) {
        let Some(cell) = self.values.get_mut(id) else {
            return;
        };
        if !cell.template.kind.is_handler() {
            cell.compute = None;
        }
        let observed = !cell.observers.is_empty();

        if !self.enter(id) {
            return;
        }
        if self.commit(id, value, false) && observed {
            if self.push_level == 0 {
                self.cycle += 1;
            }
            if let Some(cell) = self.values.get_mut(id) {
                cell.evaluated = Some(self.cycle);
            }
            self.push_level += 1;
            self.notify(id);
            self.push_level -= 1;
        }
        self.depth -= 1;
    }

    fn enter(&mut self, id: ValueId) -> bool {
        if self.depth < self.options.max_depth {
            self.depth += 1;
            return true;
        }

        let name = self.name(id);
        self.report(RuntimeError::DepthExceeded {
            name,
            depth: self.options.max_depth,
        });
        false
    }

    /// The candidate next output, or `None` when nothing is recomputed.
    fn recompute(&mut self, id: ValueId, first: bool) -> Option<Value> {
        let cell = self.values.get(id)?;
        let scope = cell.scope;
        let compute = cell.compute.clone();

        if let ValueKind::Handler(watched) = &cell.template.kind {
            let watched = watched.clone();
            let last = cell.output.clone();
            let current = self
                .resolve(scope, &watched)
                .map(|w| self.get(w))
                .unwrap_or_default();
            if !first
                && !current.loose_eq(&last)
                && let Some(body) = compute
            {
                self.stats.evaluations += 1;
                if let Err(source) = self.evaluate(scope, &body, None) {
                    let name = self.name(id);
                    self.report(RuntimeError::Recompute { name, source });
                }
            }
            return Some(current);
        }

        match compute {
            Some(body) => {
                self.stats.evaluations += 1;
                match self.evaluate(scope, &body, None) {
                    Ok(value) => Some(value),
                    Err(source) => {
                        let name = self.name(id);
                        self.report(RuntimeError::Recompute { name, source });
                        None
                    }
                }
            }
            None => cell.replica.as_ref().map(|r| r.source.clone()),
        }
    }

    /// Stores `next` and fires bindings. Returns whether the propagated output
    /// changed.
    fn commit(&mut self, id: ValueId, next: Value, first: bool) -> bool {
        let Some(cell) = self.values.get_mut(id) else {
            return false;
        };
        if cell.replica.is_some() {
            return self.commit_data(id, next, first);
        }

        let changed = !cell.output.loose_eq(&next);
        if changed {
            cell.output = next;
        }
        if changed || first {
            self.apply(id, first);
        }
        changed
    }

    /// A replicating `data` value propagates the last item of its window, so
    /// the source and window are tracked apart from the output.
    fn commit_data(&mut self, id: ValueId, source: Value, first: bool) -> bool {
        let Some(scope) = self.values.get(id).map(|c| c.scope) else {
            return false;
        };
        let offset = self.companion(scope, weft_compiler::property::DATA_OFFSET);
        let length = self.companion(scope, weft_compiler::property::DATA_LENGTH);

        let Some(replica) = self.values.get_mut(id).and_then(|c| c.replica.as_mut()) else {
            return false;
        };
        let unchanged = replica.applied
            && replica.source.loose_eq(&source)
            && replica.offset.loose_eq(&offset)
            && replica.length.loose_eq(&length);
        if unchanged && !first {
            return false;
        }
        *replica = Replica {
            source: source.clone(),
            offset: offset.clone(),
            length: length.clone(),
            applied: true,
        };

        self.stats.effects += 1;
        let projected = self.replicate(id, scope, &source, &offset, &length);
        let Some(cell) = self.values.get_mut(id) else {
            return false;
        };
        let changed = !cell.output.loose_eq(&projected);
        if changed {
            cell.output = projected;
        }
        changed
    }

    /// Runs the binding for `id`'s kind. Failures are reported and do not
    /// stop propagation.
    fn apply(&mut self, id: ValueId, first: bool) {
        let Some(cell) = self.values.get(id) else {
            return;
        };
        if !binding::is_bound(&cell.template.kind) {
            return;
        }
        let template = Rc::clone(&cell.template);
        let output = cell.output.clone();
        let target = match template.kind {
            ValueKind::Text(_) => cell.text,
            _ => self.scopes.get(cell.scope).map(|s| s.node),
        };
        let Some(node) = target else {
            self.report(RuntimeError::SideEffect {
                name: template.name.clone(),
                source: HostError::Other("bound text node is missing".to_string()),
            });
            return;
        };

        self.stats.effects += 1;
        self.push_level += 1;
        if template.kind == ValueKind::Request {
            self.issue(id, first);
        } else if let Err(source) = binding::bind(&mut self.host, node, &template.kind, &output) {
            self.report(RuntimeError::SideEffect {
                name: template.name.clone(),
                source,
            });
        }
        self.push_level -= 1;
    }

    fn notify(&mut self, id: ValueId) {
        let Some(observers) = self.values.get(id).map(|c| c.observers.clone()) else {
            return;
        };
        debug!(value = %self.name(id), observers = observers.len(), "Propagating change");
        for observer in observers {
            self.get(observer);
        }
    }

    fn evaluate(&mut self, scope: ScopeId, body: &AstNode, event: Option<Value>) -> Result<Value, EvalError> {
        let options = self.options.eval_options();
        let mut access = Access { runtime: self, scope };
        let mut evaluator = Evaluator::new(&mut access).with_options(options);
        if let Some(event) = event {
            evaluator.define("event", event);
        }
        evaluator.eval(body)
    }

    /// Finds the value `path` names, as seen from `scope`.
    ///
    /// The anchor is the nearest enclosing instance of the anchor's template,
    /// so a path compiled once works from every clone of a scope.
    pub fn resolve(&self, scope: ScopeId, path: &DepPath) -> Option<ValueId> {
        let mut current = self
            .ancestors(scope)
            .find(|id| self.scopes.get(*id).is_some_and(|s| s.template.index == path.anchor))?;
        for alias in &path.aliases {
            current = *self.scopes.get(current)?.aliases.get(alias)?;
        }
        self.scopes.get(current)?.values.get(&path.name).copied()
    }

    fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), |id| self.scopes.get(*id).and_then(|s| s.parent))
    }

    fn resolve_links(&mut self) {
        for link in std::mem::take(&mut self.pending_links) {
            let Some(observed) = self.resolve(link.scope, &link.path) else {
                let observer = self.name(link.observer);
                self.report(RuntimeError::Unresolved {
                    observer,
                    path: link.path,
                });
                continue;
            };
            if self.options.detect_cycles && self.reaches(link.observer, observed) {
                let observer = self.name(link.observer);
                self.report(RuntimeError::Cycle {
                    observer,
                    path: link.path,
                });
                continue;
            }

            let Some(cell) = self.values.get_mut(observed) else {
                continue;
            };
            if !cell.observers.contains(&link.observer) {
                cell.observers.push(link.observer);
            }
            if let Some(cell) = self.values.get_mut(link.observer)
                && !cell.observing.contains(&observed)
            {
                cell.observing.push(observed);
            }
        }
    }

    /// Whether `to` is `from` or downstream of it.
    fn reaches(&self, from: ValueId, to: ValueId) -> bool {
        let mut stack = vec![from];
        let mut seen = FxHashSet::default();

        while let Some(id) = stack.pop() {
            if id == to {
                return true;
            }
            if seen.insert(id)
                && let Some(cell) = self.values.get(id)
            {
                stack.extend(cell.observers.iter().copied());
            }
        }
        false
    }

    fn attach_listeners(&mut self) {
        for id in std::mem::take(&mut self.pending_listeners) {
            if let Some(listener) = self.listeners.get_mut(id)
                && !listener.attached
            {
                listener.attached = true;
                self.host.listen(listener.node, &listener.template.event);
            }
        }
    }

    /// Runs the `event` handlers attached to `node` with `event` bound to
    /// `payload`. Returns how many ran.
    pub fn dispatch(&mut self, node: NodeId, event: &str, payload: Value) -> usize {
        let targets = self
            .listeners
            .values()
            .filter(|l| l.attached && l.node == node && l.template.event == event)
            .map(|l| (l.scope, Rc::clone(&l.template)))
            .collect_vec();

        for (scope, template) in &targets {
            self.stats.evaluations += 1;
            if let Err(source) = self.evaluate(*scope, &template.handler, Some(payload.clone())) {
                self.report(RuntimeError::Handler {
                    event: template.event.clone(),
                    source,
                });
            }
        }
        targets.len()
    }

    /// Drops a scope and everything built under it: values leave the graph,
    /// listeners are detached. The document is left alone.
    pub(crate) fn destroy(&mut self, scope: ScopeId) {
        let Some(instance) = self.scopes.remove(scope) else {
            return;
        };

        for child in instance.children.iter().chain(&instance.clones) {
            self.destroy(*child);
        }
        for id in instance.values.values() {
            self.unlink(*id);
        }
        for id in instance.listeners {
            if let Some(listener) = self.listeners.remove(id)
                && listener.attached
            {
                self.host.unlisten(listener.node, &listener.template.event);
            }
        }
    }

    fn unlink(&mut self, id: ValueId) {
        let Some(cell) = self.values.remove(id) else {
            return;
        };

        for observed in cell.observing {
            if let Some(other) = self.values.get_mut(observed) {
                other.observers.retain(|o| *o != id);
            }
        }
        for observer in cell.observers {
            if let Some(other) = self.values.get_mut(observer) {
                other.observing.retain(|o| *o != id);
            }
        }
    }

    /// Pre-order search below `within` for the element of scope `index`,
    /// not descending into clones.
    pub(crate) fn find_scope_node(&self, index: ScopeIndex, within: NodeId) -> Option<NodeId> {
        let marker = index.to_string();
        let mut stack = self.host.children(within);
        stack.reverse();

        while let Some(node) = stack.pop() {
            if self.host.attribute(node, markers::CLONE).is_some() {
                continue;
            }
            if self.host.attribute(node, &self.program.scope_attribute).as_deref() == Some(marker.as_str()) {
                return Some(node);
            }
            stack.extend(self.host.children(node).into_iter().rev());
        }
        None
    }

    /// The `index`th child of `node`, not counting clone elements inserted
    /// by replication.
    fn text_node(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.host
            .children(node)
            .into_iter()
            .filter(|child| self.host.attribute(*child, markers::CLONE).is_none())
            .nth(index)
    }

    pub(crate) fn scope_attribute(&self) -> &str {
        &self.program.scope_attribute
    }

    pub(crate) fn report(&mut self, error: RuntimeError) {
        warn!(%error, "Runtime diagnostic");
        self.diagnostics.push(error);
    }

    fn name(&self, id: ValueId) -> SmolStr {
        self.values
            .get(id)
            .map(|c| c.template.name.clone())
            .unwrap_or_default()
    }

    /// Current output of a sibling value, evaluating it if needed.
    fn companion(&mut self, scope: ScopeId, name: &str) -> Value {
        match self.scope_value(scope, name) {
            Some(id) => self.get(id),
            None => Value::Undefined,
        }
    }

    /// The value `name` declared directly on `scope`.
    pub fn scope_value(&self, scope: ScopeId, name: &str) -> Option<ValueId> {
        self.scopes.get(scope)?.values.get(name).copied()
    }

    /// The nearest value called `name` on `scope` or its ancestors.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<ValueId> {
        self.ancestors(scope)
            .find_map(|id| self.scope_value(id, name))
    }

    /// Reads `name` the way an expression on `scope` would.
    pub fn read(&mut self, scope: ScopeId, name: &str) -> Option<Value> {
        let id = self.lookup(scope, name)?;
        Some(self.get(id))
    }

    /// Assigns `name` as seen from `scope`. Returns false if nothing by that
    /// name is visible.
    pub fn write(&mut self, scope: ScopeId, name: &str, value: Value) -> bool {
        match self.lookup(scope, name) {
            Some(id) => {
                self.set(id, value);
                true
            }
            None => false,
        }
    }

    pub fn output(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id).map(|c| &c.output)
    }

    pub fn root(&self) -> Option<ScopeId> {
        self.root
    }

    pub fn scope_node(&self, scope: ScopeId) -> Option<NodeId> {
        self.scopes.get(scope).map(|s| s.node)
    }

    pub fn scope_index(&self, scope: ScopeId) -> Option<ScopeIndex> {
        self.scopes.get(scope).map(|s| s.template.index)
    }

    /// The scope built on `node`, if any.
    pub fn scope_at(&self, node: NodeId) -> Option<ScopeId> {
        self.scopes
            .iter()
            .find_map(|(id, s)| (s.node == node).then_some(id))
    }

    pub fn children(&self, scope: ScopeId) -> &[ScopeId] {
        self.scopes.get(scope).map(|s| s.children.as_slice()).unwrap_or_default()
    }

    /// Live clones of `scope`, in position order.
    pub fn clones(&self, scope: ScopeId) -> &[ScopeId] {
        self.scopes.get(scope).map(|s| s.clones.as_slice()).unwrap_or_default()
    }

    pub fn clone_index(&self, scope: ScopeId) -> Option<usize> {
        self.scopes.get(scope)?.clone_index
    }

    pub fn values_len(&self) -> usize {
        self.values.len()
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn diagnostics(&self) -> &[RuntimeError] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<RuntimeError> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }
}

/// Gives compute functions and handlers access to the graph, relative to the
/// scope they were declared on.
struct Access<'r, H> {
    runtime: &'r mut Runtime<H>,
    scope: ScopeId,
}

impl<H: Host> Accessor for Access<'_, H> {
    fn get(&mut self, path: &DepPath) -> Result<Value, EvalError> {
        let id = self
            .runtime
            .resolve(self.scope, path)
            .ok_or_else(|| EvalError::Unresolved(path.clone()))?;
        Ok(self.runtime.get(id))
    }

    fn set(&mut self, path: &DepPath, value: Value) -> Result<(), EvalError> {
        let id = self
            .runtime
            .resolve(self.scope, path)
            .ok_or_else(|| EvalError::Unresolved(path.clone()))?;
        self.runtime.set(id, value);
        Ok(())
    }
}

impl<H: Host> Builder for Runtime<H> {
    type Scope = ScopeId;
    type Value = ValueId;

    fn locate(&mut self, index: ScopeIndex, within: NodeId) -> Option<NodeId> {
        self.find_scope_node(index, within)
    }

    fn scope(&mut self, template: &Rc<ScopeTemplate>, parent: Option<ScopeId>, node: NodeId) -> ScopeId {
        let mut instance = ScopeInstance::new(Rc::clone(template), parent, node);
        let seed = self.seed.take();
        let is_clone = seed.is_some();
        if let Some((index, item)) = seed {
            instance.clone_index = Some(index);
            instance.seed = Some(item);
        }

        let id = self.scopes.insert(instance);
        if !is_clone && let Some(parent) = parent.and_then(|p| self.scopes.get_mut(p)) {
            parent.children.push(id);
            if let Some(alias) = &template.alias {
                parent.aliases.insert(alias.clone(), id);
            }
        }
        id
    }

    fn value(&mut self, scope: ScopeId, template: &Rc<ValueTemplate>) -> ValueId {
        let (output, compute) = match &template.init {
            Init::Static(value) => (value.clone(), None),
            Init::Compute(node) => (Value::Undefined, Some(Rc::clone(node))),
        };
        let mut cell = Cell {
            template: Rc::clone(template),
            scope,
            output,
            compute,
            evaluated: None,
            observers: SmallVec::new(),
            observing: SmallVec::new(),
            replica: None,
            text: None,
        };
        if let ValueKind::Text(index) = template.kind {
            cell.text = self
                .scopes
                .get(scope)
                .and_then(|s| self.text_node(s.node, index));
        }

        if template.kind == ValueKind::Data {
            match self.scopes.get_mut(scope).and_then(|s| s.seed.take()) {
                Some(item) => {
                    cell.output = item;
                    cell.compute = None;
                }
                None => {
                    cell.replica = Some(Replica {
                        source: std::mem::take(&mut cell.output),
                        ..Replica::default()
                    })
                }
            }
        }

        let id = self.values.insert(cell);
        self.order.push(id);
        if let Some(instance) = self.scopes.get_mut(scope) {
            instance.values.insert(template.name.clone(), id);
        }
        id
    }

    fn link(&mut self, scope: ScopeId, observer: ValueId, dependency: &DepPath) {
        self.pending_links.push(PendingLink {
            scope,
            observer,
            path: dependency.clone(),
        });
    }

    fn event(&mut self, scope: ScopeId, template: &Rc<EventTemplate>) {
        let Some(node) = self.scopes.get(scope).map(|s| s.node) else {
            return;
        };
        let id = self.listeners.insert(Listener {
            scope,
            node,
            template: Rc::clone(template),
            attached: false,
        });
        if let Some(instance) = self.scopes.get_mut(scope) {
            instance.listeners.push(id);
        }
        self.pending_listeners.push(id);
    }
}
