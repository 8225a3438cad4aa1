//! Type Graph
//!
//! A [`Hierarchy`] owns every declared [`TypeNode`]. Nodes are immutable
//! with respect to their parents once declared, so the graph only ever
//! grows downward: a new node can inherit from existing ones, never the
//! other way around. This keeps the graph acyclic by construction and
//! means a cached linearization never goes stale.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use string_interner::{DefaultStringInterner, DefaultSymbol};
use tracing::debug;

use crate::config::RuntimeConfig;
use crate::linearize::{Linearization, Linearizer};
use crate::runtime::{CallFrame, Invocation, Method, Value};
use crate::{MroError, MroResult};

/// Handle to a node declared in a [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    fn new(index: usize) -> Self {
        Self(index as u32)
    }

    /// Returns the declaration index of this node.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A declared type: a name, its ordered parents, and its local methods.
pub struct TypeNode {
    id: TypeId,
    name: String,
    parents: Vec<TypeId>,
    methods: FxHashMap<DefaultSymbol, Method>,
}

impl TypeNode {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct parents in declaration order.
    pub fn parents(&self) -> &[TypeId] {
        &self.parents
    }

    /// Returns true if this node has a local implementation of `method`.
    pub fn defines(&self, method: DefaultSymbol) -> bool {
        self.methods.contains_key(&method)
    }

    pub(crate) fn method(&self, method: DefaultSymbol) -> Option<&Method> {
        self.methods.get(&method)
    }
}

impl fmt::Display for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl fmt::Debug for TypeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parents", &self.parents)
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// A multiple-inheritance type graph rooted at a single universal type.
pub struct Hierarchy {
    config: RuntimeConfig,
    nodes: Vec<TypeNode>,
    by_name: FxHashMap<String, TypeId>,
    symbols: DefaultStringInterner,
    linearizer: Linearizer,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy {
    /// Creates a hierarchy containing only the default root type.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a hierarchy whose root is named by `config.root_name`.
    pub fn with_config(config: RuntimeConfig) -> Self {
        let root = TypeNode {
            id: TypeId::new(0),
            name: config.root_name.clone(),
            parents: Vec::new(),
            methods: FxHashMap::default(),
        };
        let mut by_name = FxHashMap::default();
        by_name.insert(root.name.clone(), root.id);

        Self {
            config,
            nodes: vec![root],
            by_name,
            symbols: DefaultStringInterner::default(),
            linearizer: Linearizer::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The universal root type.
    pub fn root(&self) -> TypeId {
        TypeId::new(0)
    }

    /// Declares a new type inheriting from `parents`, in order.
    ///
    /// An empty parent list inherits from the root.
    pub fn declare(&mut self, name: &str, parents: &[TypeId]) -> MroResult<TypeId> {
        if self.by_name.contains_key(name) {
            return Err(MroError::DuplicateName {
                name: name.to_string(),
            });
        }

        for (i, &parent) in parents.iter().enumerate() {
            if parent.index() >= self.nodes.len() {
                return Err(MroError::UnknownParent {
                    name: name.to_string(),
                    parent: format!("#{}", parent.index()),
                });
            }
            if parents[..i].contains(&parent) {
                return Err(MroError::DuplicateParent {
                    name: name.to_string(),
                    parent: self.name_of(parent).to_string(),
                });
            }
        }

        let parents = if parents.is_empty() {
            vec![self.root()]
        } else {
            parents.to_vec()
        };

        let id = TypeId::new(self.nodes.len());
        debug!(
            name,
            parents = ?parents.iter().map(|&p| self.name_of(p)).collect::<Vec<_>>(),
            "declared type"
        );
        self.nodes.push(TypeNode {
            id,
            name: name.to_string(),
            parents,
            methods: FxHashMap::default(),
        });
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    /// Declares a new type, naming its parents.
    pub fn declare_named<S: AsRef<str>>(&mut self, name: &str, parents: &[S]) -> MroResult<TypeId> {
        let mut ids = Vec::with_capacity(parents.len());
        for parent in parents {
            let parent = parent.as_ref();
            let id = self.get(parent).ok_or_else(|| MroError::UnknownParent {
                name: name.to_string(),
                parent: parent.to_string(),
            })?;
            ids.push(id);
        }
        self.declare(name, &ids)
    }

    /// Attaches (or replaces) the local implementation of `method` on `ty`.
    pub fn define<F>(&mut self, ty: TypeId, method: &str, body: F) -> MroResult<()>
    where
        F: Fn(&mut Invocation<'_>, &CallFrame, &[Value]) -> MroResult<Value>
            + Send
            + Sync
            + 'static,
    {
        self.define_method(ty, method, Arc::new(body))
    }

    /// Attaches an already shared method body to `ty`.
    pub fn define_method(&mut self, ty: TypeId, method: &str, body: Method) -> MroResult<()> {
        self.check(ty)?;
        let symbol = self.symbols.get_or_intern(method);
        let node = &mut self.nodes[ty.index()];
        debug!(ty = %node.name, method, "defined method");
        node.methods.insert(symbol, body);
        Ok(())
    }

    /// Looks up a type by name.
    pub fn get(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// Looks up a type by name, failing with [`MroError::UnknownType`].
    pub fn lookup(&self, name: &str) -> MroResult<TypeId> {
        self.get(name)
            .ok_or_else(|| MroError::UnknownType(name.to_string()))
    }

    pub fn node(&self, id: TypeId) -> Option<&TypeNode> {
        self.nodes.get(id.index())
    }

    /// Iterates over every node in declaration order, root first.
    pub fn nodes(&self) -> impl Iterator<Item = &TypeNode> {
        self.nodes.iter()
    }

    /// Number of declared types, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a hierarchy contains at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the interned symbol for a method name, if any type defines it.
    pub fn symbol(&self, method: &str) -> Option<DefaultSymbol> {
        self.symbols.get(method)
    }

    /// Resolves an interned method name back to its text.
    pub fn method_name(&self, symbol: DefaultSymbol) -> &str {
        self.symbols.resolve(symbol).unwrap_or("<unknown>")
    }

    /// Computes (or fetches the cached) C3 linearization of `ty`.
    pub fn linearize(&self, ty: TypeId) -> MroResult<Linearization> {
        self.check(ty)?;
        self.linearizer.linearize(self, ty)
    }

    /// The linearization of `ty` as type names, root included.
    pub fn mro_names(&self, ty: TypeId) -> MroResult<Vec<String>> {
        let linearization = self.linearize(ty)?;
        Ok(linearization
            .iter()
            .map(|id| self.name_of(id).to_string())
            .collect())
    }

    pub fn linearizer(&self) -> &Linearizer {
        &self.linearizer
    }

    fn check(&self, ty: TypeId) -> MroResult<()> {
        if ty.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(MroError::UnknownType(format!("#{}", ty.index())))
        }
    }

    /// Name of a node known to belong to this hierarchy.
    pub(crate) fn name_of(&self, id: TypeId) -> &str {
        &self.nodes[id.index()].name
    }

    pub(crate) fn node_unchecked(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.index()]
    }
}

impl fmt::Debug for Hierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hierarchy")
            .field("config", &self.config)
            .field("nodes", &self.nodes)
            .finish()
    }
}
