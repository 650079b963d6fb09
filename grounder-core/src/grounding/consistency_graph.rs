//! Component D: static consistency graph
//!
//! One k-partite graph per rule, built once at setup from the rule's
//! per-parameter domains and the program's static facts, and never
//! rebuilt. Vertices are `(parameter, object)` pairs; an edge between
//! two vertices in different partitions exists iff every positive
//! static literal/constraint of the body that mentions both parameters
//! is satisfied by that pair of objects.
//!
//! Both vertices and edges are addressed through a
//! [`PerfectAssignmentHash`] built over the rule's own per-parameter
//! domains, not the per-predicate-position hash assignment sets use
//! (see the module docs on [`super::assignment`]). Adjacency is stored
//! as one dense [`Bitset`] row per vertex rank rather than a
//! sorted-vector adjacency list, favoring a flat, span-sliceable
//! representation: exactly the shape [`super::kpkc`]'s
//! candidate-intersection loop wants.

use crate::bitset::Bitset;
use crate::error::Result;
use crate::object::Object;

use super::assignment::{PerfectAssignmentHash, Rank};
use super::context::{evaluate_constraint_with, literal_holds_with};
use super::facts::FactSet;
use super::formalism::{ConjunctiveCondition, Literal, NumericConstraint};

/// A body literal/constraint bucketed by how many distinct rule
/// parameters it mentions. Only `Vertex` and `Edge` buckets feed the
/// static graph; `Nullary` is handled once per iteration by the
/// scheduler/worker outside the clique loop, and anything with 3+
/// distinct parameters is left for the worker's exact per-binding
/// check. Leaving it out is a sound omission: the graph only ever
/// *over*-approximates.
enum Bucket {
    Nullary,
    Vertex(usize),
    Edge(usize, usize),
    Skipped,
}

fn bucket_of_params(params: &[super::formalism::ParameterIndex]) -> Bucket {
    match params.len() {
        0 => Bucket::Nullary,
        1 => Bucket::Vertex(params[0].index()),
        2 => {
            let (a, b) = (params[0].index(), params[1].index());
            Bucket::Edge(a.min(b), a.max(b))
        }
        _ => Bucket::Skipped,
    }
}

/// The static k-partite consistency graph for one rule.
pub struct StaticConsistencyGraph {
    arity: usize,
    hash: PerfectAssignmentHash,
    /// `partitions[p]` = vertex ranks belonging to parameter `p`, in
    /// domain order.
    partitions: Vec<Vec<Rank>>,
    /// `adjacency[rank]` = neighbor bitset, sized to `hash.vertex_count()`.
    adjacency: Vec<Bitset>,
}

impl StaticConsistencyGraph {
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn hash(&self) -> &PerfectAssignmentHash {
        &self.hash
    }

    pub fn partition(&self, parameter: usize) -> &[Rank] {
        &self.partitions[parameter]
    }

    pub fn neighbors(&self, vertex: Rank) -> &Bitset {
        &self.adjacency[vertex as usize]
    }

    pub fn are_adjacent(&self, a: Rank, b: Rank) -> bool {
        self.adjacency[a as usize].test(b as usize)
    }
}

/// Builds the static consistency graph for one rule body, given its
/// per-parameter domains (already restricted/lifted by
/// [`super::domains::analyze`]) and the program's static facts.
///
/// Positive static literals and constraints with exactly one or two
/// distinct parameters are checked **exactly** against `static_facts`
/// (the static fact set is complete at build time, so there is no need
/// to approximate via an assignment-set projection here); negative
/// literals and anything with three or more distinct parameters never
/// prune at this stage, per the design's sound-over-approximation
/// contract.
pub fn build(
    body: &ConjunctiveCondition,
    parameter_domains: &[Vec<Object>],
    static_facts: &FactSet,
) -> Result<StaticConsistencyGraph> {
    let arity = body.arity();
    let hash = PerfectAssignmentHash::build(parameter_domains)?;
    let vertex_count = hash.vertex_count();

    let mut partitions = vec![Vec::new(); arity];
    for (p, domain) in parameter_domains.iter().enumerate() {
        for obj in domain {
            if let Some(r) = hash.rank_vertex(p, *obj) {
                partitions[p].push(r);
            }
        }
    }

    let vertex_literals: Vec<&Literal> = body
        .static_literals
        .iter()
        .filter(|l| l.positive)
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Vertex(_)))
        .collect();
    let edge_literals: Vec<&Literal> = body
        .static_literals
        .iter()
        .filter(|l| l.positive)
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Edge(_, _)))
        .collect();
    let vertex_constraints: Vec<&NumericConstraint> = body
        .numeric_constraints
        .iter()
        .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Vertex(_)))
        .collect();
    let edge_constraints: Vec<&NumericConstraint> = body
        .numeric_constraints
        .iter()
        .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Edge(_, _)))
        .collect();

    let mut adjacency: Vec<Bitset> = (0..vertex_count).map(|_| Bitset::new(vertex_count)).collect();

    for p1 in 0..arity {
        for p2 in (p1 + 1)..arity {
            for &o1 in &parameter_domains[p1] {
                let v1 = hash.rank_vertex(p1, o1).expect("domain object must hash");
                if !vertex_consistent(p1, o1, &vertex_literals, &vertex_constraints, static_facts) {
                    continue;
                }
                for &o2 in &parameter_domains[p2] {
                    let v2 = hash.rank_vertex(p2, o2).expect("domain object must hash");
                    if !vertex_consistent(p2, o2, &vertex_literals, &vertex_constraints, static_facts) {
                        continue;
                    }
                    if edge_consistent(p1, o1, p2, o2, &edge_literals, &edge_constraints, static_facts) {
                        adjacency[v1 as usize].set(v2 as usize);
                        adjacency[v2 as usize].set(v1 as usize);
                    }
                }
            }
        }
    }

    Ok(StaticConsistencyGraph {
        arity,
        hash,
        partitions,
        adjacency,
    })
}

fn get_single(param: usize, obj: Object) -> impl Fn(usize) -> Object {
    move |p| {
        debug_assert_eq!(p, param);
        obj
    }
}

fn get_pair(p1: usize, o1: Object, p2: usize, o2: Object) -> impl Fn(usize) -> Object {
    move |p| {
        if p == p1 {
            o1
        } else {
            debug_assert_eq!(p, p2);
            o2
        }
    }
}

fn vertex_consistent(
    param: usize,
    obj: Object,
    literals: &[&Literal],
    constraints: &[&NumericConstraint],
    facts: &FactSet,
) -> bool {
    let get = get_single(param, obj);
    literals
        .iter()
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Vertex(p) if p == param))
        .all(|l| literal_holds_with(l, &get, facts))
        && constraints
            .iter()
            .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Vertex(p) if p == param))
            .all(|c| evaluate_constraint_with(c, &get, facts))
}

fn edge_consistent(
    p1: usize,
    o1: Object,
    p2: usize,
    o2: Object,
    literals: &[&Literal],
    constraints: &[&NumericConstraint],
    facts: &FactSet,
) -> bool {
    let get = get_pair(p1, o1, p2, o2);
    literals
        .iter()
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Edge(a, b) if (a, b) == (p1, p2)))
        .all(|l| literal_holds_with(l, &get, facts))
        && constraints
            .iter()
            .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Edge(a, b) if (a, b) == (p1, p2)))
            .all(|c| evaluate_constraint_with(c, &get, facts))
}

/// Sweeps the static skeleton under the current fact set, producing the
/// runtime-consistent "full graph" F for one iteration: a vertex is
/// active iff it sits in its static partition *and* every positive
/// fluent vertex literal/constraint holds for it against `facts`; an
/// edge is active iff both endpoints are active, the static skeleton
/// already has the edge, and every positive fluent edge
/// literal/constraint holds for the pair. Called once per iteration by
/// [`super::scheduler`]; [`super::kpkc`] only ever sees the result, not
/// `facts` itself.
pub fn sweep_fluent(
    graph: &StaticConsistencyGraph,
    body: &ConjunctiveCondition,
    facts: &FactSet,
) -> (Bitset, Vec<Bitset>) {
    let vertex_count = graph.hash.vertex_count();

    let vertex_literals: Vec<&Literal> = body
        .fluent_literals
        .iter()
        .filter(|l| l.positive)
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Vertex(_)))
        .collect();
    let edge_literals: Vec<&Literal> = body
        .fluent_literals
        .iter()
        .filter(|l| l.positive)
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Edge(_, _)))
        .collect();
    let vertex_constraints: Vec<&NumericConstraint> = body
        .numeric_constraints
        .iter()
        .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Vertex(_)))
        .collect();
    let edge_constraints: Vec<&NumericConstraint> = body
        .numeric_constraints
        .iter()
        .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Edge(_, _)))
        .collect();

    let mut vertex_active = Bitset::new(vertex_count);
    for (p, domain_ranks) in graph.partitions.iter().enumerate() {
        for &v in domain_ranks {
            let obj = rank_to_object(graph, p, v);
            if vertex_consistent(p, obj, &vertex_literals, &vertex_constraints, facts) {
                vertex_active.set(v as usize);
            }
        }
    }

    let mut edge_active: Vec<Bitset> = (0..vertex_count).map(|_| Bitset::new(vertex_count)).collect();
    for p1 in 0..graph.arity {
        for p2 in (p1 + 1)..graph.arity {
            for &v1 in &graph.partitions[p1] {
                if !vertex_active.test(v1 as usize) {
                    continue;
                }
                let o1 = rank_to_object(graph, p1, v1);
                for &v2 in &graph.partitions[p2] {
                    if !vertex_active.test(v2 as usize) || !graph.are_adjacent(v1, v2) {
                        continue;
                    }
                    let o2 = rank_to_object(graph, p2, v2);
                    if edge_consistent(p1, o1, p2, o2, &edge_literals, &edge_constraints, facts) {
                        edge_active[v1 as usize].set(v2 as usize);
                        edge_active[v2 as usize].set(v1 as usize);
                    }
                }
            }
        }
    }

    (vertex_active, edge_active)
}

/// Recovers the object bound to vertex rank `v` in parameter `p`'s
/// domain, via the hash's reverse mapping.
fn rank_to_object(graph: &StaticConsistencyGraph, parameter: usize, rank: Rank) -> Object {
    graph
        .hash
        .invert_vertex(parameter, rank)
        .expect("rank must belong to this parameter's domain")
}

/// Tracks which vertices/edges of a rule's runtime-consistent graph still
/// need re-evaluation against the fluent fact set.
///
/// Per the design notes, deactivation is monotone: a positive fluent
/// literal/constraint that holds once holds forever (fact sets only
/// grow), so once a vertex or edge is found consistent it is permanently
/// consistent and [`sweep_fluent_incremental`] never re-checks it. This
/// turns each iteration's sweep cost from O(domain²) into O(still-unsettled).
#[derive(Debug, Clone)]
pub struct ActivityMask {
    /// `true` = still unsettled, needs checking.
    vertices: Bitset,
    /// `edges[v]` bit `w` = the pair `(v, w)` is still unsettled.
    edges: Vec<Bitset>,
}

impl ActivityMask {
    /// A mask with every vertex/edge unsettled, sized to `graph`.
    pub fn new(graph: &StaticConsistencyGraph) -> Self {
        let n = graph.hash.vertex_count();
        let mut vertices = Bitset::new(n);
        for p in 0..graph.arity {
            for &v in &graph.partitions[p] {
                vertices.set(v as usize);
            }
        }
        ActivityMask {
            vertices,
            edges: (0..n).map(|_| Bitset::new(n)).collect(),
        }
    }
}

/// Incremental counterpart to [`sweep_fluent`]: reuses `prev_vertices`/
/// `prev_edges` (the previous iteration's result) for every vertex/edge
/// `mask` already marked settled, and only re-evaluates the rest. Newly
/// consistent vertices/edges are marked settled in `mask` so the next
/// call skips them too.
pub fn sweep_fluent_incremental(
    graph: &StaticConsistencyGraph,
    body: &ConjunctiveCondition,
    facts: &FactSet,
    prev_vertices: &Bitset,
    prev_edges: &[Bitset],
    mask: &mut ActivityMask,
) -> (Bitset, Vec<Bitset>) {
    let vertex_count = graph.hash.vertex_count();

    let vertex_literals: Vec<&Literal> = body
        .fluent_literals
        .iter()
        .filter(|l| l.positive)
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Vertex(_)))
        .collect();
    let edge_literals: Vec<&Literal> = body
        .fluent_literals
        .iter()
        .filter(|l| l.positive)
        .filter(|l| matches!(bucket_of_params(&l.distinct_parameters()), Bucket::Edge(_, _)))
        .collect();
    let vertex_constraints: Vec<&NumericConstraint> = body
        .numeric_constraints
        .iter()
        .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Vertex(_)))
        .collect();
    let edge_constraints: Vec<&NumericConstraint> = body
        .numeric_constraints
        .iter()
        .filter(|c| matches!(bucket_of_params(&c.distinct_parameters()), Bucket::Edge(_, _)))
        .collect();

    let mut vertex_active = if prev_vertices.len() == vertex_count {
        prev_vertices.clone()
    } else {
        Bitset::new(vertex_count)
    };
    for (p, domain_ranks) in graph.partitions.iter().enumerate() {
        for &v in domain_ranks {
            if !mask.vertices.test(v as usize) {
                continue;
            }
            let obj = rank_to_object(graph, p, v);
            if vertex_consistent(p, obj, &vertex_literals, &vertex_constraints, facts) {
                vertex_active.set(v as usize);
                mask.vertices.clear_bit(v as usize);
            }
        }
    }

    let mut edge_active: Vec<Bitset> = if prev_edges.len() == vertex_count {
        prev_edges.to_vec()
    } else {
        (0..vertex_count).map(|_| Bitset::new(vertex_count)).collect()
    };
    for p1 in 0..graph.arity {
        for p2 in (p1 + 1)..graph.arity {
            for &v1 in &graph.partitions[p1] {
                if !vertex_active.test(v1 as usize) {
                    continue;
                }
                let o1 = rank_to_object(graph, p1, v1);
                for &v2 in &graph.partitions[p2] {
                    if !vertex_active.test(v2 as usize)
                        || !graph.are_adjacent(v1, v2)
                        || !mask.edges[v1 as usize].test(v2 as usize)
                    {
                        continue;
                    }
                    let o2 = rank_to_object(graph, p2, v2);
                    if edge_consistent(p1, o1, p2, o2, &edge_literals, &edge_constraints, facts) {
                        edge_active[v1 as usize].set(v2 as usize);
                        edge_active[v2 as usize].set(v1 as usize);
                        mask.edges[v1 as usize].clear_bit(v2 as usize);
                        mask.edges[v2 as usize].clear_bit(v1 as usize);
                    }
                }
            }
        }
    }

    (vertex_active, edge_active)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounding::formalism::{Atom, ParameterIndex, PredicateId, Term};
    use crate::object::ObjectTable;

    #[test]
    fn independent_parameters_are_fully_connected() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        let body = ConjunctiveCondition {
            variables: 2,
            static_literals: vec![],
            fluent_literals: vec![],
            numeric_constraints: vec![],
        };
        let domains = vec![vec![a, b], vec![a, b]];
        let facts = FactSet::new(1, 0);
        let graph = build(&body, &domains, &facts).unwrap();
        let v_a0 = graph.hash().rank_vertex(0, a).unwrap();
        let v_b1 = graph.hash().rank_vertex(1, b).unwrap();
        assert!(graph.are_adjacent(v_a0, v_b1));
    }

    #[test]
    fn static_literal_prunes_inconsistent_edges() {
        let mut table = ObjectTable::new();
        let a = table.intern("a");
        let b = table.intern("b");
        let mut facts = FactSet::new(1, 0);
        facts.insert_atom(PredicateId(0), vec![a, b]);

        let body = ConjunctiveCondition {
            variables: 2,
            static_literals: vec![Literal {
                positive: true,
                atom: Atom {
                    predicate: PredicateId(0),
                    terms: vec![
                        Term::Parameter(ParameterIndex(0)),
                        Term::Parameter(ParameterIndex(1)),
                    ],
                },
            }],
            fluent_literals: vec![],
            numeric_constraints: vec![],
        };
        let domains = vec![vec![a, b], vec![a, b]];
        let graph = build(&body, &domains, &facts).unwrap();

        let v_a0 = graph.hash().rank_vertex(0, a).unwrap();
        let v_b1 = graph.hash().rank_vertex(1, b).unwrap();
        let v_b0 = graph.hash().rank_vertex(0, b).unwrap();
        let v_a1 = graph.hash().rank_vertex(1, a).unwrap();

        assert!(graph.are_adjacent(v_a0, v_b1));
        assert!(!graph.are_adjacent(v_b0, v_a1));
    }
}
