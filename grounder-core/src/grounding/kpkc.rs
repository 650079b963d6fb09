//! Component E: delta-aware k-partite k-clique enumerator
//!
//! [`DeltaKpkc`] tracks two logical graphs over the vertex set of one
//! rule's [`super::consistency_graph::StaticConsistencyGraph`]: the
//! *full* graph F (every vertex/edge consistent as of the current
//! iteration) and the *delta* graph Δ (vertices/edges that became
//! consistent since the previous call to
//! [`DeltaKpkc::set_next_assignment_sets`]). `for_each_k_clique` walks
//! every k-clique of F. `for_each_new_k_clique` walks only the k-cliques
//! containing at least one Δ-vertex/edge, each exactly once across the
//! life of the run. The anchor/forbidden-vertex symmetry breaking below
//! is what makes that "exactly once" guarantee hold, carried over
//! verbatim from the grounder this crate generalizes.
//!
//! A rule's partitions are contiguous vertex-rank ranges (the perfect
//! hash assigns each parameter a contiguous block, per
//! [`super::assignment::PerfectAssignmentHash`]), so the k-partite
//! structure never needs an explicit partition label per vertex at
//! search time beyond the per-partition candidate bitsets computed here.

use crate::bitset::Bitset;

use super::assignment::Rank;
use super::consistency_graph::StaticConsistencyGraph;

/// A clique binding is a slice of vertex ranks, one per partition, in
/// increasing-partition order. Callers invert each rank back to an
/// object via the rule's [`super::assignment::PerfectAssignmentHash`].
pub type CliqueBinding<'a> = &'a [Rank];

/// Per-rule delta-tracking state plus the reusable search workspace.
/// One instance lives for the entire grounding run of its rule.
pub struct DeltaKpkc {
    arity: usize,
    vertex_count: usize,
    /// `partition_masks[p]` has a bit set for every vertex rank
    /// belonging to parameter `p`.
    partition_masks: Vec<Bitset>,
    /// `vertex_partition[rank]` = the parameter that vertex belongs to.
    vertex_partition: Vec<u32>,

    full_vertices: Bitset,
    full_adjacency: Vec<Bitset>,
    delta_vertices: Bitset,
    delta_adjacency: Vec<Bitset>,

    iteration: usize,
}

impl DeltaKpkc {
    /// Builds delta-tracking state for `graph`. Both graphs start empty;
    /// the first call to [`DeltaKpkc::set_next_assignment_sets`]
    /// populates them and is treated as iteration 1, at which point
    /// `for_each_new_k_clique` degenerates to `for_each_k_clique` (there
    /// is no "previous" graph to diff against).
    pub fn new(graph: &StaticConsistencyGraph) -> Self {
        let arity = graph.arity();
        let vertex_count = graph.hash().vertex_count();

        let mut partition_masks: Vec<Bitset> = (0..arity).map(|_| Bitset::new(vertex_count)).collect();
        let mut vertex_partition = vec![0u32; vertex_count];
        for p in 0..arity {
            for &v in graph.partition(p) {
                partition_masks[p].set(v as usize);
                vertex_partition[v as usize] = p as u32;
            }
        }

        DeltaKpkc {
            arity,
            vertex_count,
            partition_masks,
            vertex_partition,
            full_vertices: Bitset::new(vertex_count),
            full_adjacency: (0..vertex_count).map(|_| Bitset::new(vertex_count)).collect(),
            delta_vertices: Bitset::new(vertex_count),
            delta_adjacency: (0..vertex_count).map(|_| Bitset::new(vertex_count)).collect(),
            iteration: 0,
        }
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn full_vertices(&self) -> &Bitset {
        &self.full_vertices
    }

    /// Advances to the next iteration: `new_vertices`/`new_adjacency`
    /// (the result of sweeping the static graph under the latest
    /// assignment sets, e.g. [`super::consistency_graph::sweep_fluent_incremental`])
    /// become the new full graph F; Δ becomes `new − previous`.
    ///
    /// Monotonicity (fact sets never shrink) guarantees `new` is always
    /// a superset of the previous full graph, so the difference is
    /// exactly the newly-enabled vertices/edges.
    pub fn set_next_assignment_sets(&mut self, new_vertices: Bitset, new_adjacency: Vec<Bitset>) {
        self.iteration += 1;

        let mut delta_vertices = new_vertices.clone();
        delta_vertices.difference_with(&self.full_vertices);

        let mut delta_adjacency = new_adjacency.clone();
        for (row, prev_row) in delta_adjacency.iter_mut().zip(self.full_adjacency.iter()) {
            row.difference_with(prev_row);
        }

        self.full_vertices = new_vertices;
        self.full_adjacency = new_adjacency;
        self.delta_vertices = delta_vertices;
        self.delta_adjacency = delta_adjacency;
    }

    fn edge_rank(&self, src: Rank, dst: Rank) -> u64 {
        src as u64 * self.vertex_count as u64 + dst as u64
    }

    /// Every k-clique of the current full graph F, partition-ordered
    /// (clique element `i` belongs to partition `i`). For k ∈ {0,1,2}
    /// this short-circuits to direct vertex/edge iteration; for k ≥ 3 it
    /// runs the min-candidate-partition search with no anchor.
    pub fn for_each_k_clique(&self, mut callback: impl FnMut(CliqueBinding<'_>)) {
        match self.arity {
            0 => callback(&[]),
            1 => {
                for v in self.full_vertices.iter_ones() {
                    callback(&[v as Rank]);
                }
            }
            2 => {
                for src in self.full_vertices.iter_ones() {
                    for dst in self.full_adjacency[src].iter_ones() {
                        if dst > src {
                            callback(&[src as Rank, dst as Rank]);
                        }
                    }
                }
            }
            _ => {
                let mut ws = Workspace::new(self.arity, self.vertex_count);
                self.seed_without_anchor(&mut ws);
                self.complete_from_seed(&mut ws, 0, false, &mut callback);
            }
        }
    }

    /// Every k-clique of F containing at least one Δ-vertex or Δ-edge,
    /// each emitted exactly once across the entire run (see module
    /// docs). On the first iteration (no prior graph to diff against)
    /// this is identical to [`DeltaKpkc::for_each_k_clique`].
    pub fn for_each_new_k_clique(&self, mut callback: impl FnMut(CliqueBinding<'_>)) {
        if self.iteration <= 1 {
            self.for_each_k_clique(callback);
            return;
        }
        match self.arity {
            0 => {}
            1 => {
                for v in self.delta_vertices.iter_ones() {
                    callback(&[v as Rank]);
                }
            }
            2 => {
                for src in 0..self.vertex_count {
                    for dst in self.delta_adjacency[src].iter_ones() {
                        if dst > src {
                            callback(&[src as Rank, dst as Rank]);
                        }
                    }
                }
            }
            _ => {
                let mut ws = Workspace::new(self.arity, self.vertex_count);
                for src in 0..self.vertex_count {
                    let dsts: Vec<usize> = self.delta_adjacency[src].iter_ones().filter(|&d| d > src).collect();
                    for dst in dsts {
                        self.seed_from_anchor(src as Rank, dst as Rank, &mut ws);
                        self.complete_from_seed(&mut ws, 0, true, &mut callback);
                    }
                }
            }
        }
    }

    fn seed_without_anchor(&self, ws: &mut Workspace) {
        ws.partial.clear();
        ws.partition_used.iter_mut().for_each(|u| *u = false);
        for p in 0..self.arity {
            let mut cv = self.partition_masks[p].clone();
            cv.intersect_with(&self.full_vertices);
            ws.compatible[0][p] = cv;
        }
    }

    /// Seeds the search from a Δ-edge anchor `(src, dst)`: candidates in
    /// every other partition must be adjacent to *both* endpoints in F,
    /// and must not reach either endpoint via a lower-ranked Δ-edge (the
    /// symmetry-breaking invariant from §4.E).
    fn seed_from_anchor(&self, src: Rank, dst: Rank, ws: &mut Workspace) {
        ws.partial.clear();
        ws.partial.push(src);
        ws.partial.push(dst);

        let pi = self.vertex_partition[src as usize] as usize;
        let pj = self.vertex_partition[dst as usize] as usize;
        debug_assert_ne!(pi, pj);

        let anchor_rank = self.edge_rank(src, dst);
        ws.partition_used.iter_mut().for_each(|u| *u = false);
        ws.partition_used[pi] = true;
        ws.partition_used[pj] = true;

        // Forbidden[v] = the set of vertices `w` such that (v,w) is a
        // Δ-edge with rank < anchor_rank. Built freshly per anchor, but
        // only over Δ-edges (sparse relative to the full graph).
        ws.forbidden.clear();
        for v in 0..self.vertex_count {
            for w in self.delta_adjacency[v].iter_ones() {
                if w <= v {
                    continue;
                }
                if self.edge_rank(v as Rank, w as Rank) < anchor_rank {
                    ws.forbidden.entry(v as Rank).or_insert_with(|| Bitset::new(self.vertex_count)).set(w);
                    ws.forbidden.entry(w as Rank).or_insert_with(|| Bitset::new(self.vertex_count)).set(v);
                }
            }
        }

        for p in 0..self.arity {
            let cv = &mut ws.compatible[0][p];
            cv.reset();
            if p == pi || p == pj {
                continue;
            }
            cv.union_with(&self.partition_masks[p]);
            cv.intersect_with(&self.full_adjacency[src as usize]);
            cv.intersect_with(&self.full_adjacency[dst as usize]);
            if let Some(f) = ws.forbidden.get(&src) {
                cv.difference_with(f);
            }
            if let Some(f) = ws.forbidden.get(&dst) {
                cv.difference_with(f);
            }
        }
    }

    fn choose_best_partition(&self, ws: &Workspace, depth: usize) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for p in 0..self.arity {
            if ws.partition_used[p] {
                continue;
            }
            let count = ws.compatible[depth][p].count_ones();
            if best.map_or(true, |(_, bc)| count < bc) {
                best = Some((p, count));
            }
        }
        best.map(|(p, _)| p)
    }

    fn num_possible_additions(&self, ws: &Workspace, depth: usize) -> usize {
        (0..self.arity)
            .filter(|&p| !ws.partition_used[p] && ws.compatible[depth][p].any())
            .count()
    }

    fn complete_from_seed(
        &self,
        ws: &mut Workspace,
        depth: usize,
        is_delta: bool,
        callback: &mut dyn FnMut(CliqueBinding<'_>),
    ) {
        let Some(p) = self.choose_best_partition(ws, depth) else {
            return; // dead branch: no unused partition has candidates
        };

        let candidates: Vec<usize> = ws.compatible[depth][p].iter_ones().collect();
        for v in candidates {
            ws.partial.push(v as Rank);

            if ws.partial.len() == self.arity {
                callback(&ws.partial);
            } else {
                let (lo, hi) = ws.compatible.split_at_mut(depth + 1);
                let cv_curr = &lo[depth];
                let cv_next = &mut hi[0];
                for pp in 0..self.arity {
                    if ws.partition_used[pp] || pp == p {
                        continue;
                    }
                    let mut next = cv_curr[pp].clone();
                    next.intersect_with(&self.full_adjacency[v]);
                    if is_delta {
                        if let Some(f) = ws.forbidden.get(&(v as Rank)) {
                            next.difference_with(f);
                        }
                    }
                    cv_next[pp] = next;
                }

                ws.partition_used[p] = true;
                if ws.partial.len() + self.num_possible_additions(ws, depth + 1) == self.arity {
                    self.complete_from_seed(ws, depth + 1, is_delta, callback);
                }
                ws.partition_used[p] = false;
            }

            ws.partial.pop();
        }
    }
}

/// Reusable scratch space for one [`DeltaKpkc::for_each_k_clique`]/
/// [`DeltaKpkc::for_each_new_k_clique`] traversal: the nested
/// `compatible` buffer is `(arity + 1) x arity` bitsets of `vertex_count`
/// bits each (depth x partition), per the design note favoring a flat,
/// pre-allocated workspace over nested per-call allocation.
struct Workspace {
    compatible: Vec<Vec<Bitset>>,
    partition_used: Vec<bool>,
    partial: Vec<Rank>,
    forbidden: ahash::AHashMap<Rank, Bitset>,
}

impl Workspace {
    fn new(arity: usize, vertex_count: usize) -> Self {
        Workspace {
            compatible: (0..=arity)
                .map(|_| (0..arity).map(|_| Bitset::new(vertex_count)).collect())
                .collect(),
            partition_used: vec![false; arity],
            partial: Vec::with_capacity(arity),
            forbidden: ahash::AHashMap::new(),
        }
    }
}
