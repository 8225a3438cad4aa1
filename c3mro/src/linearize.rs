//! C3 Linearization
//!
//! Computes the method resolution order of a type:
//!
//! ```text
//! L[T] = T + merge(L[P1], L[P2], ..., L[Pn], [P1, P2, ..., Pn])
//! ```
//!
//! where `P1..Pn` are the direct parents of `T` in declaration order.
//!
//! ## Merge
//!
//! The merge repeatedly takes the first head, scanning the input sequences
//! left to right, that appears in no sequence's tail. The chosen head is
//! removed from the front of every sequence it leads. When every head is
//! blocked by some tail the hierarchy has no consistent order and the
//! merge fails.
//!
//! ## Caching
//!
//! Every successful linearization is cached per node and never modified
//! afterwards. Failures are not cached, so a request for an inconsistent
//! node fails again every time.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use crate::graph::{Hierarchy, TypeId};
use crate::{MroError, MroResult};

/// An immutable method resolution order, starting with the type itself and
/// ending with the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Linearization(Arc<[TypeId]>);

impl Linearization {
    fn new(order: Vec<TypeId>) -> Self {
        Self(order.into())
    }

    pub fn as_slice(&self) -> &[TypeId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<TypeId> {
        self.0.get(index).copied()
    }

    /// The type this linearization belongs to.
    pub fn head(&self) -> Option<TypeId> {
        self.get(0)
    }

    /// Position of `ty` in this order, if it is an ancestor (or the type itself).
    pub fn position(&self, ty: TypeId) -> Option<usize> {
        self.0.iter().position(|&t| t == ty)
    }

    pub fn contains(&self, ty: TypeId) -> bool {
        self.0.contains(&ty)
    }

    pub fn iter(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.0.iter().copied()
    }
}

/// Merges linearizations according to the C3 rule.
///
/// On failure returns the distinct heads that were all blocked, in the
/// order their sequences were given.
pub fn merge<T>(sequences: &[Vec<T>]) -> Result<Vec<T>, Vec<T>>
where
    T: Copy + Eq + fmt::Debug,
{
    let mut remaining: Vec<&[T]> = sequences
        .iter()
        .map(Vec::as_slice)
        .filter(|seq| !seq.is_empty())
        .collect();
    let mut merged = Vec::new();

    while !remaining.is_empty() {
        let candidate = remaining
            .iter()
            .map(|seq| seq[0])
            .find(|head| !remaining.iter().any(|seq| seq[1..].contains(head)));

        let Some(next) = candidate else {
            let mut conflicts = Vec::new();
            for seq in &remaining {
                if !conflicts.contains(&seq[0]) {
                    conflicts.push(seq[0]);
                }
            }
            return Err(conflicts);
        };

        trace!(?next, "merge selected head");
        merged.push(next);
        for seq in remaining.iter_mut() {
            let current: &[T] = *seq;
            if current[0] == next {
                *seq = &current[1..];
            }
        }
        remaining.retain(|seq| !seq.is_empty());
    }

    Ok(merged)
}

/// Compute-once cache of linearizations, keyed by node.
#[derive(Default)]
pub struct Linearizer {
    cache: RwLock<FxHashMap<TypeId, Linearization>>,
}

impl Linearizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached linearization of `ty` without computing it.
    pub fn cached(&self, ty: TypeId) -> Option<Linearization> {
        self.cache.read().get(&ty).cloned()
    }

    /// Number of cached linearizations.
    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }

    /// Linearizes `ty`, computing and caching any missing ancestor orders.
    ///
    /// `ty` must belong to `hierarchy`, the one that owns this cache.
    pub(crate) fn linearize(&self, hierarchy: &Hierarchy, ty: TypeId) -> MroResult<Linearization> {
        if let Some(cached) = self.cached(ty) {
            return Ok(cached);
        }

        let node = hierarchy.node_unchecked(ty);
        let mut sequences = Vec::with_capacity(node.parents().len() + 1);
        for &parent in node.parents() {
            sequences.push(self.linearize(hierarchy, parent)?.as_slice().to_vec());
        }
        sequences.push(node.parents().to_vec());

        let tail = merge(&sequences).map_err(|conflicts| MroError::InconsistentHierarchy {
            name: node.name().to_string(),
            conflicts: conflicts
                .into_iter()
                .map(|id| hierarchy.name_of(id).to_string())
                .collect(),
        })?;

        let mut order = Vec::with_capacity(tail.len() + 1);
        order.push(ty);
        order.extend(tail);
        let linearization = Linearization::new(order);
        debug!(
            ty = node.name(),
            mro = ?linearization.iter().map(|id| hierarchy.name_of(id)).collect::<Vec<_>>(),
            "linearized"
        );

        // Another reader may have raced us here; the first insert wins.
        let mut cache = self.cache.write();
        Ok(cache.entry(ty).or_insert(linearization).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_merge_empty() {
        let empty: Vec<Vec<u8>> = vec![vec![], vec![]];
        assert_eq!(merge(&empty), Ok(vec![]));
    }

    #[test]
    fn test_merge_prefers_earliest_sequence() {
        // Both 'x' and 'y' qualify; 'x' leads the first sequence.
        let seqs = vec![vec!['x', 'o'], vec!['y', 'o'], vec!['x', 'y']];
        assert_eq!(merge(&seqs), Ok(vec!['x', 'y', 'o']));
    }

    #[test]
    fn test_merge_skips_blocked_head() {
        // 'a' sits in the tail of the second sequence and must wait.
        let seqs = vec![vec!['a', 'o'], vec!['b', 'a', 'o'], vec!['b', 'a']];
        assert_eq!(merge(&seqs), Ok(vec!['b', 'a', 'o']));

        // Listing 'a' before its subtype blocks both heads.
        let seqs = vec![vec!['a', 'o'], vec!['b', 'a', 'o'], vec!['a', 'b']];
        assert_eq!(merge(&seqs), Err(vec!['a', 'b']));
    }

    #[test]
    fn test_merge_conflict_reports_distinct_heads() {
        let seqs = vec![vec![1, 2], vec![2, 1], vec![1, 2]];
        assert_eq!(merge(&seqs), Err(vec![1, 2]));
    }

    #[test]
    fn test_single_chain() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        let c = h.declare("C", &[b]).unwrap();
        assert_eq!(h.mro_names(c).unwrap(), ["C", "B", "A", "object"]);
    }

    #[test]
    fn test_diamond() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        let c = h.declare("C", &[a]).unwrap();
        let d = h.declare("D", &[b, c]).unwrap();
        let e = h.declare("E", &[c, b]).unwrap();
        assert_eq!(h.mro_names(d).unwrap(), ["D", "B", "C", "A", "object"]);
        assert_eq!(h.mro_names(e).unwrap(), ["E", "C", "B", "A", "object"]);
    }

    #[test]
    fn test_contradictory_orders_fail() {
        let mut h = Hierarchy::new();
        let x = h.declare("X", &[]).unwrap();
        let y = h.declare("Y", &[]).unwrap();
        let xy = h.declare("XY", &[x, y]).unwrap();
        let yx = h.declare("YX", &[y, x]).unwrap();
        let z = h.declare("Z", &[xy, yx]).unwrap();

        let err = h.linearize(z).unwrap_err();
        assert_eq!(
            err,
            MroError::InconsistentHierarchy {
                name: "Z".into(),
                conflicts: vec!["X".into(), "Y".into()],
            }
        );
    }

    #[test]
    fn test_failures_are_not_cached() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        let bad = h.declare("Bad", &[a, b]).unwrap();

        assert!(h.linearize(bad).is_err());
        assert!(h.linearizer().cached(bad).is_none());
        assert!(h.linearize(bad).is_err());
        // Ancestors computed along the way stay cached.
        assert!(h.linearizer().cached(b).is_some());
    }

    #[test]
    fn test_cache_is_reused() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let first = h.linearize(a).unwrap();
        let count = h.linearizer().cached_count();
        let second = h.linearize(a).unwrap();
        assert_eq!(first, second);
        assert!(Arc::ptr_eq(&first.0, &second.0));
        assert_eq!(h.linearizer().cached_count(), count);
    }

    #[test]
    fn test_foreign_type_is_unknown() {
        let h = Hierarchy::new();
        let mut other = Hierarchy::new();
        let x = other.declare("X", &[]).unwrap();

        assert_eq!(h.linearize(x), Err(MroError::UnknownType("#1".into())));
        assert_eq!(h.linearizer().cached_count(), 0);
    }

    #[test]
    fn test_declaring_more_types_keeps_cache_valid() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let before = h.linearize(a).unwrap();
        h.declare("B", &[a]).unwrap();
        assert_eq!(h.linearize(a).unwrap(), before);
    }

    #[test]
    fn test_position() {
        let mut h = Hierarchy::new();
        let a = h.declare("A", &[]).unwrap();
        let b = h.declare("B", &[a]).unwrap();
        let lin = h.linearize(b).unwrap();
        assert_eq!(lin.head(), Some(b));
        assert_eq!(lin.position(a), Some(1));
        assert_eq!(lin.position(h.root()), Some(2));
        assert!(!lin.is_empty());
    }
}
