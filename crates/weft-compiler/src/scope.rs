use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;
use weft_lang::{Resolution, Resolver, ScopeIndex};
use weft_markup::NodeId;

/// Compile-time scope: one per annotated element.
#[derive(Debug, Clone)]
pub struct Scope {
    pub index: ScopeIndex,
    pub node: NodeId,
    pub parent: Option<ScopeIndex>,
    pub children: Vec<ScopeIndex>,
    pub alias: Option<SmolStr>,
    /// Aliased child scopes, exposed to expressions by name.
    pub aliases: FxHashMap<SmolStr, ScopeIndex>,
    pub declared: FxHashSet<SmolStr>,
}

impl Scope {
    pub fn new(index: ScopeIndex, node: NodeId, parent: Option<ScopeIndex>) -> Self {
        Self {
            index,
            node,
            parent,
            children: Vec::new(),
            alias: None,
            aliases: FxHashMap::default(),
            declared: FxHashSet::default(),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn next_index(&self) -> ScopeIndex {
        ScopeIndex(self.scopes.len() as u32)
    }

    pub fn push(&mut self, scope: Scope) {
        if let Some(parent) = scope.parent.and_then(|p| self.scopes.get_mut(p.0 as usize)) {
            parent.children.push(scope.index);
        }
        self.scopes.push(scope);
    }

    pub fn get(&self, index: ScopeIndex) -> Option<&Scope> {
        self.scopes.get(index.0 as usize)
    }

    pub fn get_mut(&mut self, index: ScopeIndex) -> Option<&mut Scope> {
        self.scopes.get_mut(index.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    /// `index` and its ancestors, nearest first.
    pub fn ancestors(&self, index: Option<ScopeIndex>) -> impl Iterator<Item = &Scope> {
        std::iter::successors(index.and_then(|i| self.get(i)), |scope| {
            scope.parent.and_then(|p| self.get(p))
        })
    }

    /// Names declared by `index` or one of its ancestors.
    pub fn visible_names(&self, index: ScopeIndex) -> FxHashSet<&SmolStr> {
        self.ancestors(Some(index))
            .flat_map(|scope| scope.declared.iter().chain(scope.aliases.keys()))
            .collect()
    }

    pub fn resolver<'a>(&'a self, scope: ScopeIndex, property: Option<&'a str>) -> ScopeResolver<'a> {
        ScopeResolver {
            tree: self,
            scope,
            property,
        }
    }
}

/// Lexical lookup from one scope outward.
///
/// A reference to the property being compiled starts at the parent scope, so
/// `:data="[[data.items]]"` reads the enclosing `data`.
pub struct ScopeResolver<'a> {
    tree: &'a ScopeTree,
    scope: ScopeIndex,
    property: Option<&'a str>,
}

impl Resolver for ScopeResolver<'_> {
    fn resolve(&self, name: &str) -> Resolution {
        let start = if self.property == Some(name) {
            self.tree.get(self.scope).and_then(|s| s.parent)
        } else {
            Some(self.scope)
        };

        for scope in self.tree.ancestors(start) {
            if scope.declared.contains(name) {
                return Resolution::Value(scope.index);
            }
            if scope.alias.as_deref() == Some(name) {
                return Resolution::Alias {
                    anchor: scope.index,
                    target: scope.index,
                };
            }
            if let Some(target) = scope.aliases.get(name) {
                return Resolution::Alias {
                    anchor: scope.index,
                    target: *target,
                };
            }
        }

        Resolution::Unresolved
    }

    fn alias_of(&self, scope: ScopeIndex, name: &str) -> Option<ScopeIndex> {
        self.tree.get(scope)?.aliases.get(name).copied()
    }

    fn declares(&self, scope: ScopeIndex, name: &str) -> bool {
        self.tree
            .get(scope)
            .is_some_and(|s| s.declared.contains(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use weft_markup::Document;

    /// page(0) > body(1) > [list(2) declaring x, item(3) > inner(4) declaring x]
    #[fixture]
    fn tree() -> ScopeTree {
        let mut doc = Document::new();
        let mut node = |_: u32| doc.create_element("div");
        let mut tree = ScopeTree::default();
        let mut page = Scope::new(ScopeIndex(0), node(1), None);
        page.alias = Some("page".into());
        page.declared.insert("title".into());
        page.aliases.insert("body".into(), ScopeIndex(1));
        tree.push(page);

        let mut body = Scope::new(ScopeIndex(1), node(2), Some(ScopeIndex(0)));
        body.alias = Some("body".into());
        body.declared.insert("x".into());
        body.declared.insert("data".into());
        tree.push(body);

        let mut list = Scope::new(ScopeIndex(2), node(3), Some(ScopeIndex(1)));
        list.declared.insert("x".into());
        tree.push(list);

        let mut item = Scope::new(ScopeIndex(3), node(4), Some(ScopeIndex(1)));
        item.declared.insert("data".into());
        tree.push(item);

        let mut inner = Scope::new(ScopeIndex(4), node(5), Some(ScopeIndex(3)));
        inner.declared.insert("x".into());
        tree.push(inner);

        tree
    }

    #[rstest]
    #[case::nearest(4, None, "x", Resolution::Value(ScopeIndex(4)))]
    #[case::outer(3, None, "x", Resolution::Value(ScopeIndex(1)))]
    #[case::ancestor(3, None, "title", Resolution::Value(ScopeIndex(0)))]
    #[case::data_forwarding(4, None, "data", Resolution::Value(ScopeIndex(3)))]
    #[case::self_reference(3, Some("data"), "data", Resolution::Value(ScopeIndex(1)))]
    #[case::own_alias(2, None, "body", Resolution::Alias { anchor: ScopeIndex(1), target: ScopeIndex(1) })]
    #[case::root_alias(1, None, "page", Resolution::Alias { anchor: ScopeIndex(0), target: ScopeIndex(0) })]
    #[case::unresolved(4, None, "missing", Resolution::Unresolved)]
    fn test_resolve(
        tree: ScopeTree,
        #[case] scope: u32,
        #[case] property: Option<&str>,
        #[case] name: &str,
        #[case] expected: Resolution,
    ) {
        assert_eq!(tree.resolver(ScopeIndex(scope), property).resolve(name), expected);
    }

    #[rstest]
    fn test_child_alias_from_root(tree: ScopeTree) {
        let resolver = tree.resolver(ScopeIndex(0), None);

        assert_eq!(
            resolver.resolve("body"),
            Resolution::Alias { anchor: ScopeIndex(0), target: ScopeIndex(1) }
        );
        assert_eq!(resolver.alias_of(ScopeIndex(0), "body"), Some(ScopeIndex(1)));
        assert!(resolver.declares(ScopeIndex(1), "x"));
        assert!(!resolver.declares(ScopeIndex(1), "title"));
    }

    #[rstest]
    fn test_tree_links(tree: ScopeTree) {
        assert_eq!(tree.get(ScopeIndex(1)).unwrap().children, vec![ScopeIndex(2), ScopeIndex(3)]);
        assert_eq!(
            tree.ancestors(Some(ScopeIndex(4))).map(|s| s.index.0).collect::<Vec<_>>(),
            vec![4, 3, 1, 0]
        );
        assert!(tree.visible_names(ScopeIndex(2)).contains(&SmolStr::new("title")));
    }
}
