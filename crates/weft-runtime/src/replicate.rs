//! List replication: one clone per windowed item except the last, which the
//! original element keeps.
use std::rc::Rc;

use itertools::Itertools;
use rustc_hash::FxHashSet;
use tracing::debug;
use weft_compiler::property::DATA;
use weft_lang::Value;
use weft_markup::{NodeId, markers};

use crate::error::{HostError, RuntimeError};
use crate::host::Host;
use crate::runtime::{Runtime, ScopeId, ValueId};

/// Items of `items` inside the `offset`/`length` window. A missing length
/// means "to the end"; anything that is not a non-negative number counts as 0.
pub fn window<'a>(items: &'a [Value], offset: &Value, length: &Value) -> &'a [Value] {
    let start = offset.to_number().to_index().min(items.len());
    let end = if length.is_nullish() {
        items.len()
    } else {
        start.saturating_add(length.to_number().to_index()).min(items.len())
    };
    &items[start..end]
}

impl<H: Host> Runtime<H> {
    /// Syncs the clones of `scope` with `source` and returns what its `data`
    /// propagates: the last windowed item, `undefined` for an empty window,
    /// or `source` itself when it is not an array.
    pub(crate) fn replicate(
        &mut self,
        id: ValueId,
        scope: ScopeId,
        source: &Value,
        offset: &Value,
        length: &Value,
    ) -> Value {
        match source.as_array() {
            Some(items) => {
                let items = window(items, offset, length);
                match items.split_last() {
                    Some((last, rest)) => {
                        self.sync_clones(id, scope, rest);
                        last.clone()
                    }
                    None => {
                        self.sync_clones(id, scope, &[]);
                        Value::Undefined
                    }
                }
            }
            None => {
                self.sync_clones(id, scope, &[]);
                source.clone()
            }
        }
    }

    fn sync_clones(&mut self, id: ValueId, scope: ScopeId, items: &[Value]) {
        let existing = self.clones(scope).to_vec();
        debug!(have = existing.len(), want = items.len(), "Replicating");

        self.push_level += 1;
        for (clone, item) in existing.iter().zip(items) {
            if let Some(data) = self.scope_value(*clone, DATA) {
                self.set(data, item.clone());
            }
        }

        for (index, item) in items.iter().enumerate().skip(existing.len()) {
            if let Err(source) = self.spawn(scope, index, item.clone()) {
                let name = self
                    .values
                    .get(id)
                    .map(|c| c.template.name.clone())
                    .unwrap_or_default();
                self.report(RuntimeError::Replication { name, source });
                break;
            }
        }

        self.trim(scope, items.len());
        self.sweep(scope);
        self.push_level -= 1;
    }

    /// Builds clone `index` of `scope`, adopting a matching clone element
    /// left by an earlier render when there is one.
    fn spawn(&mut self, scope: ScopeId, index: usize, item: Value) -> Result<(), HostError> {
        let Some((original, template, parent)) = self
            .scopes
            .get(scope)
            .map(|s| (s.node, Rc::clone(&s.template), s.parent))
        else {
            return Ok(());
        };

        let node = match self.adoptable(scope, index) {
            Some(node) => {
                debug!(index, "Adopting existing clone");
                node
            }
            None => {
                let node = self.host.clone_fragment(original)?;
                self.host.set_attribute(node, markers::CLONE, &index.to_string())?;
                self.host.insert_before(original, node)?;
                node
            }
        };

        let from = self.order.len();
        self.seed = Some((index, item));
        let clone = template.instantiate(self, parent, node);
        self.seed = None;
        if let Some(instance) = self.scopes.get_mut(scope) {
            instance.clones.push(clone);
        }
        self.activate(from);
        Ok(())
    }

    /// Removes clones past the first `keep`, last first.
    fn trim(&mut self, scope: ScopeId, keep: usize) {
        let removed = self
            .scopes
            .get_mut(scope)
            .map(|s| s.clones.split_off(keep.min(s.clones.len())))
            .unwrap_or_default();
        if removed.is_empty() {
            return;
        }

        for clone in removed.into_iter().rev() {
            let node = self.scope_node(clone);
            self.destroy(clone);
            if let Some(node) = node
                && let Err(source) = self.host.remove_fragment(node)
            {
                self.report(RuntimeError::Replication {
                    name: DATA.into(),
                    source,
                });
            }
        }
        self.order.retain(|id| self.values.contains_key(*id));
    }

    /// Removes clone elements of `scope` that no live clone owns.
    fn sweep(&mut self, scope: ScopeId) {
        let owned = self.owned_nodes(scope);
        let stale = self
            .sibling_clones(scope)
            .into_iter()
            .filter(|node| !owned.contains(node))
            .collect_vec();

        for node in stale {
            debug!(?node, "Removing stale clone");
            if let Err(source) = self.host.remove_fragment(node) {
                self.report(RuntimeError::Replication {
                    name: DATA.into(),
                    source,
                });
            }
        }
    }

    fn adoptable(&self, scope: ScopeId, index: usize) -> Option<NodeId> {
        let owned = self.owned_nodes(scope);
        let index = index.to_string();

        self.sibling_clones(scope).into_iter().find(|node| {
            !owned.contains(node) && self.host.attribute(*node, markers::CLONE).as_deref() == Some(index.as_str())
        })
    }

    fn owned_nodes(&self, scope: ScopeId) -> FxHashSet<NodeId> {
        self.clones(scope)
            .iter()
            .filter_map(|clone| self.scope_node(*clone))
            .collect()
    }

    /// Preceding siblings of the original element that carry its scope
    /// index and a clone position.
    fn sibling_clones(&self, scope: ScopeId) -> Vec<NodeId> {
        let (Some(node), Some(index)) = (self.scope_node(scope), self.scope_index(scope)) else {
            return Vec::new();
        };
        let marker = index.to_string();
        let attribute = self.scope_attribute();

        std::iter::successors(self.host.previous_sibling(node), |n| self.host.previous_sibling(*n))
            .filter(|n| {
                self.host.attribute(*n, attribute).as_deref() == Some(marker.as_str())
                    && self.host.attribute(*n, markers::CLONE).is_some()
            })
            .collect()
    }
}
