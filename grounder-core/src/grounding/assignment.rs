//! Component B: perfect assignment hash and assignment sets
//!
//! The perfect assignment hash assigns a dense rank to every legal
//! `(slot, object)` pair over a fixed list of per-slot domains, plus a
//! sentinel rank 0 for "no assignment". The same hash shape serves two
//! distinct purposes in this engine, over two distinct domain spaces:
//!
//! - one [`PerfectAssignmentHash`] per **rule**, built from the rule's
//!   per-parameter domains ([`super::domains::Domains::rule_parameter`]),
//!   used by [`super::consistency_graph`] and [`super::kpkc`];
//! - one [`PerfectAssignmentHash`] per **predicate/function**, built
//!   from that symbol's own per-argument-position domains
//!   ([`super::domains::Domains::predicate_position`] /
//!   [`super::domains::Domains::function_position`]), used by the
//!   [`PredicateAssignmentSet`]/[`FunctionAssignmentSet`] below.
//!
//! These are easy to conflate (both are "assignments of objects to
//! integer slots") but must never be mixed: a rule's parameter-hash
//! rank has no relationship to a predicate's position-hash rank for
//! the same object.

use ahash::AHashMap;

use crate::bitset::Bitset;
use crate::error::{GrounderError, Result};
use crate::object::Object;

use super::formalism::StratumTag;

/// Dense rank assigned to a `(slot, object)` vertex, or to an ordered
/// pair of vertices (an edge). `0` is always the sentinel "empty
/// assignment" rank.
pub type Rank = u32;

/// Assigns dense, injective ranks to every legal `(slot, object)` pair
/// across a fixed list of per-slot domains.
#[derive(Debug, Clone)]
pub struct PerfectAssignmentHash {
    /// `offsets[slot]` is the rank of the first object in that slot's
    /// domain; `offsets[slot] + local_rank` is in `[1, vertex_count)`.
    offsets: Vec<Rank>,
    /// `remap[slot]` maps object -> 1-based local rank within that
    /// slot's sorted domain. Absence means the object is not legal at
    /// that slot (`remap(slot, o) = 0`, per the spec invariant).
    remap: Vec<AHashMap<Object, Rank>>,
    /// `domains[slot]` is the same sorted domain passed to
    /// [`PerfectAssignmentHash::build`]; kept so a vertex rank can be
    /// inverted back to its object (`domains[slot][rank - offsets[slot]]`).
    domains: Vec<Vec<Object>>,
    vertex_count: Rank,
}

impl PerfectAssignmentHash {
    /// Builds a hash from `domains[slot]`, each already canonically
    /// sorted (domain analysis guarantees this).
    pub fn build(domains: &[Vec<Object>]) -> Result<Self> {
        let mut offsets = Vec::with_capacity(domains.len());
        let mut remap = Vec::with_capacity(domains.len());
        let mut next: u64 = 1; // rank 0 reserved for the empty assignment

        for domain in domains {
            offsets.push(next as Rank);
            let mut slot_map = AHashMap::with_capacity_and_hasher(domain.len(), Default::default());
            for (local, obj) in domain.iter().enumerate() {
                slot_map.insert(*obj, (local + 1) as Rank);
            }
            remap.push(slot_map);
            next += domain.len() as u64;
            if next > u32::MAX as u64 {
                return Err(GrounderError::capacity(
                    "perfect assignment hash rank space overflowed u32",
                ));
            }
        }

        Ok(PerfectAssignmentHash {
            offsets,
            remap,
            domains: domains.to_vec(),
            vertex_count: next as Rank,
        })
    }

    /// Number of distinct legal vertex ranks, including the sentinel.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count as usize
    }

    /// Total addressable span for ordered-edge ranks (`vertex_count^2`).
    /// Callers should pre-check against this before building a bitset
    /// sized to it, per [`GrounderError::Capacity`].
    pub fn edge_space(&self) -> Result<usize> {
        (self.vertex_count as usize)
            .checked_mul(self.vertex_count as usize)
            .ok_or_else(|| GrounderError::capacity("edge rank space overflowed usize"))
    }

    /// The rank of `(slot, object)`, or `None` if `object` is not legal
    /// at `slot`.
    pub fn rank_vertex(&self, slot: usize, object: Object) -> Option<Rank> {
        self.remap[slot].get(&object).map(|&local| self.offsets[slot] + local - 1)
    }

    /// The rank of the ordered pair `(slot1, object1), (slot2, object2)`.
    /// Only meaningful when `slot1 < slot2`. Callers are responsible for
    /// that ordering (the static consistency graph and kpkc enumerator
    /// always present pairs in increasing slot order).
    pub fn rank_edge(&self, slot1: usize, object1: Object, slot2: usize, object2: Object) -> Option<Rank> {
        debug_assert!(slot1 < slot2);
        let r1 = self.rank_vertex(slot1, object1)?;
        let r2 = self.rank_vertex(slot2, object2)?;
        Some(r1 * self.vertex_count + r2)
    }

    pub fn num_slots(&self) -> usize {
        self.offsets.len()
    }

    /// Inverts a vertex rank back to the object it denotes at `slot`.
    /// Returns `None` if `rank` does not fall within that slot's
    /// reserved range (rank 0, or a rank belonging to another slot).
    pub fn invert_vertex(&self, slot: usize, rank: Rank) -> Option<Object> {
        let offset = self.offsets[slot];
        let domain = &self.domains[slot];
        if rank < offset {
            return None;
        }
        let local = (rank - offset) as usize;
        domain.get(local).copied()
    }
}

/// Whether at least one ground fact supports a given vertex/edge
/// assignment, for a single predicate, over one stratum.
#[derive(Debug, Clone)]
pub struct PredicateAssignmentSet<Tag> {
    hash: PerfectAssignmentHash,
    support: Bitset,
    _tag: std::marker::PhantomData<Tag>,
}

impl<Tag: StratumTag> PredicateAssignmentSet<Tag> {
    pub fn new(hash: PerfectAssignmentHash) -> Result<Self> {
        let space = hash.edge_space()?;
        Ok(PredicateAssignmentSet {
            hash,
            support: Bitset::new(space),
            _tag: std::marker::PhantomData,
        })
    }

    /// Records support for every position (vertex) and every ordered
    /// pair of positions (edge) of one ground atom's arguments.
    pub fn insert(&mut self, args: &[Object]) {
        for (pos, &obj) in args.iter().enumerate() {
            if let Some(r) = self.hash.rank_vertex(pos, obj) {
                self.support.set(r as usize);
            }
        }
        for i in 0..args.len() {
            for j in (i + 1)..args.len() {
                if let Some(r) = self.hash.rank_edge(i, args[i], j, args[j]) {
                    self.support.set(r as usize);
                }
            }
        }
    }

    pub fn supports_vertex(&self, position: usize, object: Object) -> bool {
        self.hash
            .rank_vertex(position, object)
            .map(|r| self.support.test(r as usize))
            .unwrap_or(false)
    }

    pub fn supports_edge(&self, pos1: usize, obj1: Object, pos2: usize, obj2: Object) -> bool {
        self.hash
            .rank_edge(pos1, obj1, pos2, obj2)
            .map(|r| self.support.test(r as usize))
            .unwrap_or(false)
    }

    pub fn hash(&self) -> &PerfectAssignmentHash {
        &self.hash
    }

    pub fn clear(&mut self) {
        self.support.reset();
    }
}

/// A closed interval `[min, max]` hull over observed numeric values,
/// used for interval-arithmetic pruning of numeric constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedInterval {
    pub min: f64,
    pub max: f64,
}

impl ClosedInterval {
    pub fn singleton(value: f64) -> Self {
        ClosedInterval { min: value, max: value }
    }

    pub fn hull(self, other: ClosedInterval) -> Self {
        ClosedInterval {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Analogue of [`PredicateAssignmentSet`] for numeric functions: cells
/// store the closed-interval hull of every value seen for that
/// vertex/edge assignment rather than a single support bit. Storage is
/// a sparse map (most assignments never see a function value) keyed by
/// rank rather than a dense bitset.
#[derive(Debug, Clone)]
pub struct FunctionAssignmentSet<Tag> {
    hash: PerfectAssignmentHash,
    vertex_intervals: AHashMap<Rank, ClosedInterval>,
    edge_intervals: AHashMap<Rank, ClosedInterval>,
    _tag: std::marker::PhantomData<Tag>,
}

impl<Tag: StratumTag> FunctionAssignmentSet<Tag> {
    pub fn new(hash: PerfectAssignmentHash) -> Self {
        FunctionAssignmentSet {
            hash,
            vertex_intervals: AHashMap::new(),
            edge_intervals: AHashMap::new(),
            _tag: std::marker::PhantomData,
        }
    }

    /// Folds `value` into the hull recorded for every position (vertex)
    /// and ordered pair of positions (edge) of one ground function
    /// term's arguments.
    pub fn insert(&mut self, args: &[Object], value: f64) {
        for (pos, &obj) in args.iter().enumerate() {
            if let Some(r) = self.hash.rank_vertex(pos, obj) {
                self.vertex_intervals
                    .entry(r)
                    .and_modify(|iv| *iv = iv.hull(ClosedInterval::singleton(value)))
                    .or_insert_with(|| ClosedInterval::singleton(value));
            }
        }
        for i in 0..args.len() {
            for j in (i + 1)..args.len() {
                if let Some(r) = self.hash.rank_edge(i, args[i], j, args[j]) {
                    self.edge_intervals
                        .entry(r)
                        .and_modify(|iv| *iv = iv.hull(ClosedInterval::singleton(value)))
                        .or_insert_with(|| ClosedInterval::singleton(value));
                }
            }
        }
    }

    pub fn vertex_interval(&self, position: usize, object: Object) -> Option<ClosedInterval> {
        let r = self.hash.rank_vertex(position, object)?;
        self.vertex_intervals.get(&r).copied()
    }

    pub fn edge_interval(&self, pos1: usize, obj1: Object, pos2: usize, obj2: Object) -> Option<ClosedInterval> {
        let r = self.hash.rank_edge(pos1, obj1, pos2, obj2)?;
        self.edge_intervals.get(&r).copied()
    }

    pub fn hash(&self) -> &PerfectAssignmentHash {
        &self.hash
    }

    pub fn clear(&mut self) {
        self.vertex_intervals.clear();
        self.edge_intervals.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectTable;
    use proptest::prelude::*;

    #[test]
    fn vertex_ranks_are_injective() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        let hash = PerfectAssignmentHash::build(&[vec![a, b], vec![a]]).unwrap();
        let r00 = hash.rank_vertex(0, a).unwrap();
        let r01 = hash.rank_vertex(0, b).unwrap();
        let r10 = hash.rank_vertex(1, a).unwrap();
        assert_ne!(r00, r01);
        assert_ne!(r00, r10);
        assert_ne!(r01, r10);
        assert!(hash.rank_vertex(1, b).is_none());
    }

    #[test]
    fn edge_rank_requires_ordering() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        let hash = PerfectAssignmentHash::build(&[vec![a, b], vec![a, b]]).unwrap();
        let e1 = hash.rank_edge(0, a, 1, b).unwrap();
        let e2 = hash.rank_edge(0, b, 1, a).unwrap();
        assert_ne!(e1, e2);
    }

    #[test]
    fn predicate_assignment_set_records_support() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        let hash = PerfectAssignmentHash::build(&[vec![a, b], vec![a, b]]).unwrap();
        let mut set: PredicateAssignmentSet<super::super::formalism::StaticTag> =
            PredicateAssignmentSet::new(hash).unwrap();
        set.insert(&[a, b]);
        assert!(set.supports_vertex(0, a));
        assert!(set.supports_vertex(1, b));
        assert!(set.supports_edge(0, a, 1, b));
        assert!(!set.supports_edge(0, b, 1, a));
    }

    #[test]
    fn function_assignment_set_hulls_values() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let hash = PerfectAssignmentHash::build(&[vec![a]]).unwrap();
        let mut set: FunctionAssignmentSet<super::super::formalism::StaticTag> =
            FunctionAssignmentSet::new(hash);
        set.insert(&[a], 3.0);
        set.insert(&[a], 7.0);
        let iv = set.vertex_interval(0, a).unwrap();
        assert_eq!(iv, ClosedInterval { min: 3.0, max: 7.0 });
    }

    proptest! {
        /// Perfect-hash injectivity (§8): distinct legal vertex assignments
        /// get distinct ranks, for arbitrary per-slot domain sizes.
        #[test]
        fn vertex_ranks_stay_injective_for_arbitrary_domains(
            slot_sizes in proptest::collection::vec(1usize..6, 1..5),
        ) {
            let mut table = ObjectTable::new();
            let domains: Vec<Vec<Object>> = slot_sizes
                .iter()
                .map(|&n| (0..n).map(|i| table.intern(&format!("o{i}"))).collect())
                .collect();
            let hash = PerfectAssignmentHash::build(&domains).unwrap();

            let mut ranks = std::collections::HashSet::new();
            for (slot, domain) in domains.iter().enumerate() {
                for &obj in domain {
                    let r = hash.rank_vertex(slot, obj).unwrap();
                    prop_assert_ne!(r, 0, "rank 0 is reserved for the empty assignment");
                    prop_assert!(ranks.insert(r), "rank {} reused across distinct (slot, object) pairs", r);
                }
            }
        }

        /// Same property for ordered edges over a single shared domain.
        #[test]
        fn edge_ranks_stay_injective_for_arbitrary_domain_size(size in 1usize..6) {
            let mut table = ObjectTable::new();
            let domain: Vec<Object> = (0..size).map(|i| table.intern(&format!("o{i}"))).collect();
            let hash = PerfectAssignmentHash::build(&[domain.clone(), domain.clone()]).unwrap();

            let mut ranks = std::collections::HashSet::new();
            for &o1 in &domain {
                for &o2 in &domain {
                    let r = hash.rank_edge(0, o1, 1, o2).unwrap();
                    prop_assert!(ranks.insert(r), "edge rank {} reused for distinct ordered pairs", r);
                }
            }
        }
    }
}
