use std::rc::Rc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use smol_str::SmolStr;
use weft_compiler::{EventTemplate, ScopeTemplate, ValueTemplate};
use weft_lang::{AstNode, DepPath, Value};
use weft_markup::NodeId;

use crate::runtime::{ListenerId, ScopeId, ValueId};

/// A live scope bound to one element.
#[derive(Debug)]
pub(crate) struct ScopeInstance {
    pub template: Rc<ScopeTemplate>,
    pub parent: Option<ScopeId>,
    pub node: NodeId,
    pub values: FxHashMap<SmolStr, ValueId>,
    /// Aliased child scopes. Clones never register here.
    pub aliases: FxHashMap<SmolStr, ScopeId>,
    pub children: Vec<ScopeId>,
    /// Replicas of this scope, in position order.
    pub clones: Vec<ScopeId>,
    pub clone_index: Option<usize>,
    pub listeners: Vec<ListenerId>,
    /// Item a clone's `data` starts from.
    pub seed: Option<Value>,
}

impl ScopeInstance {
    pub fn new(template: Rc<ScopeTemplate>, parent: Option<ScopeId>, node: NodeId) -> Self {
        Self {
            template,
            parent,
            node,
            values: FxHashMap::default(),
            aliases: FxHashMap::default(),
            children: Vec::new(),
            clones: Vec::new(),
            clone_index: None,
            listeners: Vec::new(),
            seed: None,
        }
    }
}

/// A reactive cell.
#[derive(Debug)]
pub(crate) struct Cell {
    pub template: Rc<ValueTemplate>,
    pub scope: ScopeId,
    pub output: Value,
    pub compute: Option<Rc<AstNode>>,
    /// Cycle of the last evaluation; `None` until the first one.
    pub evaluated: Option<u64>,
    pub observers: SmallVec<[ValueId; 4]>,
    pub observing: SmallVec<[ValueId; 4]>,
    /// Present on `data` values that drive replication.
    pub replica: Option<Replica>,
    /// Text node a text binding writes to, found when the value is built.
    pub text: Option<NodeId>,
}

/// What a replicating `data` value last applied.
#[derive(Debug, Default)]
pub(crate) struct Replica {
    pub source: Value,
    pub offset: Value,
    pub length: Value,
    pub applied: bool,
}

#[derive(Debug)]
pub(crate) struct Listener {
    pub scope: ScopeId,
    pub node: NodeId,
    pub template: Rc<EventTemplate>,
    pub attached: bool,
}

#[derive(Debug)]
pub(crate) struct PendingLink {
    pub scope: ScopeId,
    pub observer: ValueId,
    pub path: DepPath,
}
