//! Dispatch resolution over a linearization.
//!
//! Given a method resolution order and a starting position, the resolver
//! finds the first type at or after that position whose local method table
//! defines the requested name. The same lookup serves initial dispatch
//! (start at 0) and next-implementation lookups (start one past the
//! current frame).

use string_interner::DefaultSymbol;
use tracing::trace;

use crate::graph::{Hierarchy, TypeId};
use crate::linearize::Linearization;

/// A successful lookup: the implementing type and its index in the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The type whose local table defines the method.
    pub node: TypeId,
    /// Position of `node` in the linearization that was searched.
    pub index: usize,
}

/// Dispatch resolution context.
#[derive(Debug, Clone, Copy)]
pub struct DispatchResolver<'h> {
    hierarchy: &'h Hierarchy,
}

impl<'h> DispatchResolver<'h> {
    /// Create a new dispatch resolver.
    pub fn new(hierarchy: &'h Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Finds the first implementation of `method` at or after `start`.
    ///
    /// Returns `None` when no type in the remaining order defines it,
    /// including when `start` is past the end.
    pub fn resolve_from(
        &self,
        linearization: &Linearization,
        start: usize,
        method: &str,
    ) -> Option<Resolution> {
        let symbol = self.hierarchy.symbol(method)?;
        self.resolve_symbol_from(linearization, start, symbol)
    }

    /// Like [`resolve_from`](Self::resolve_from) with an interned name.
    pub fn resolve_symbol_from(
        &self,
        linearization: &Linearization,
        start: usize,
        method: DefaultSymbol,
    ) -> Option<Resolution> {
        let found = linearization
            .as_slice()
            .iter()
            .enumerate()
            .skip(start)
            .find(|&(_, &ty)| {
                self.hierarchy
                    .node(ty)
                    .is_some_and(|node| node.defines(method))
            })
            .map(|(index, &node)| Resolution { node, index });

        trace!(
            method = self.hierarchy.method_name(method),
            start,
            found = ?found.map(|r| self.hierarchy.name_of(r.node)),
            "resolve"
        );
        found
    }

    /// Every implementation of `method` along the order, most specific first.
    pub fn implementors(&self, linearization: &Linearization, method: &str) -> Vec<Resolution> {
        let Some(symbol) = self.hierarchy.symbol(method) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut start = 0;
        while let Some(resolution) = self.resolve_symbol_from(linearization, start, symbol) {
            start = resolution.index + 1;
            found.push(resolution);
        }
        found
    }
}
