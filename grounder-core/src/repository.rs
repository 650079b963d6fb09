//! Content-addressed arenas for ground entities
//!
//! A [`Repository<T>`] is an append-only arena: `get_or_create` interns a
//! structurally-canonical value once and returns a dense, stable,
//! insertion-ordered index. Two entries with identical contents always
//! share an index; ground atoms, ground rules, and function terms are
//! deduplicated this way rather than by pointer identity.
//!
//! An [`OverlayRepository<T>`] layers scratch space over a shared parent:
//! lookups fall through to the parent first, and only a miss allocates a
//! fresh index continuing past the parent's current size. A worker
//! accumulates into its own overlay during an iteration; the coordinator
//! promotes the overlay's new entries into the parent under the merge
//! lock, or discards the overlay entirely on a failed/cancelled attempt.
//!
//! This is the repository/overlay interface §6 scopes as an external
//! collaborator, kept here so a caller gets a content-addressed arena
//! with the overlay-plus-merge discipline §9 asks for. The grounder's
//! own fixpoint loop does not route ground atoms through it: merging
//! newly emitted heads directly into [`super::grounding::facts::FactSet`]
//! (see [`super::grounding::scheduler`]) is the load-bearing merge
//! discipline this crate actually runs on. A caller that needs
//! content-addressed, cross-iteration-stable indices over ground
//! entities (an arena-backed downstream consumer, say) can build one
//! directly on top of `Repository`/`OverlayRepository`.

use std::hash::Hash;
use std::sync::Arc;

use ahash::AHashMap;
use arc_swap::ArcSwap;
use parking_lot::Mutex;

/// A dense, stable index into a [`Repository<T>`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RepositoryIndex(u32);

impl RepositoryIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    fn from_usize(i: usize) -> Self {
        RepositoryIndex(i as u32)
    }
}

/// An append-only, content-addressed arena.
///
/// Reads (`get`, `size`, `find`) never block a concurrent reader; they
/// go through a lock-free [`ArcSwap`] snapshot of the backing `Vec`.
/// Writes (`get_or_create`) take a short-lived mutex only around the
/// insert itself.
pub struct Repository<T> {
    snapshot: ArcSwap<Vec<Arc<T>>>,
    index: Mutex<AHashMap<Arc<T>, RepositoryIndex>>,
}

impl<T> Default for Repository<T>
where
    T: Eq + Hash,
{
    fn default() -> Self {
        Repository {
            snapshot: ArcSwap::from_pointee(Vec::new()),
            index: Mutex::new(AHashMap::new()),
        }
    }
}

impl<T> Repository<T>
where
    T: Eq + Hash,
{
    pub fn new() -> Self {
        Repository::default()
    }

    /// Looks up `value` without inserting it.
    pub fn find(&self, value: &T) -> Option<RepositoryIndex>
    where
        T: std::borrow::Borrow<T>,
    {
        self.index.lock().get(value).copied()
    }

    /// Interns `value`, returning its index and whether this call
    /// created a fresh entry.
    pub fn get_or_create(&self, value: T) -> (RepositoryIndex, bool) {
        let mut index = self.index.lock();
        if let Some(&idx) = index.get(&value) {
            return (idx, false);
        }
        let arc = Arc::new(value);
        let idx = RepositoryIndex::from_usize(index.len());
        index.insert(Arc::clone(&arc), idx);

        self.snapshot.rcu(|cur| {
            let mut next = (**cur).clone();
            next.push(Arc::clone(&arc));
            next
        });

        (idx, true)
    }

    /// A cloned handle to the entry at `index`. Panics if out of range.
    /// Callers only ever hold indices this repository produced.
    pub fn get(&self, index: RepositoryIndex) -> Arc<T> {
        Arc::clone(&self.snapshot.load()[index.index()])
    }

    /// Number of interned entries.
    pub fn size(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Every entry, in insertion order.
    pub fn iter(&self) -> Vec<Arc<T>> {
        self.snapshot.load().as_ref().clone()
    }

    /// Discards every entry. Only safe to call when no other thread
    /// holds an outstanding [`RepositoryIndex`] from this repository.
    pub fn clear(&self) {
        let mut index = self.index.lock();
        index.clear();
        self.snapshot.store(Arc::new(Vec::new()));
    }
}

/// Scratch space layered over a shared [`Repository<T>`].
///
/// Lookups check the parent first; a parent hit never allocates a local
/// index. A parent miss gets a fresh local index continuing past
/// `parent.size()`, so an index handed out by the overlay remains valid
/// (and means the same thing) after its entries are promoted into the
/// parent.
pub struct OverlayRepository<'a, T> {
    parent: &'a Repository<T>,
    parent_size_at_open: usize,
    local: Vec<T>,
}

impl<'a, T> OverlayRepository<'a, T>
where
    T: Eq + Hash,
{
    pub fn new(parent: &'a Repository<T>) -> Self {
        OverlayRepository {
            parent,
            parent_size_at_open: parent.size(),
            local: Vec::new(),
        }
    }

    /// Interns `value`: a parent hit returns the parent's index; a local
    /// hit returns the earlier local index; otherwise a new local slot
    /// is appended and given an index continuing past the parent's size
    /// as observed when this overlay was opened.
    ///
    /// Local lookup is a linear scan: an overlay's lifetime spans a
    /// single rule/iteration's worth of scratch, not the whole program,
    /// so this stays small in practice; see DESIGN.md for the tradeoff
    /// against a second local hash index.
    pub fn get_or_create(&mut self, value: T) -> (RepositoryIndex, bool) {
        if let Some(idx) = self.parent.find(&value) {
            return (idx, false);
        }
        if let Some(pos) = self.local.iter().position(|v| v == &value) {
            let idx = RepositoryIndex::from_usize(self.parent_size_at_open + pos);
            return (idx, false);
        }
        self.local.push(value);
        let pos = self.local.len() - 1;
        let idx = RepositoryIndex::from_usize(self.parent_size_at_open + pos);
        (idx, true)
    }

    /// The local-only entries accumulated by this overlay, in the order
    /// they were created. Does not include anything already present in
    /// the parent at the time the overlay was opened.
    pub fn local_entries(self) -> Vec<T> {
        self.local
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_shares_index_for_equal_values() {
        let repo: Repository<String> = Repository::new();
        let (a, created_a) = repo.get_or_create("x".to_string());
        let (b, created_b) = repo.get_or_create("x".to_string());
        assert_eq!(a, b);
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(repo.size(), 1);
    }

    #[test]
    fn distinct_values_get_distinct_ordered_indices() {
        let repo: Repository<u32> = Repository::new();
        let (a, _) = repo.get_or_create(10);
        let (b, _) = repo.get_or_create(20);
        assert!(a.index() < b.index());
        assert_eq!(repo.size(), 2);
    }

    #[test]
    fn overlay_falls_through_to_parent() {
        let repo: Repository<u32> = Repository::new();
        let (parent_idx, _) = repo.get_or_create(1);
        let mut overlay = OverlayRepository::new(&repo);
        let (idx, created) = overlay.get_or_create(1);
        assert_eq!(idx, parent_idx);
        assert!(!created);
    }

    #[test]
    fn overlay_local_entries_continue_parent_indexing() {
        let repo: Repository<u32> = Repository::new();
        repo.get_or_create(1);
        repo.get_or_create(2);
        let mut overlay = OverlayRepository::new(&repo);
        let (idx, created) = overlay.get_or_create(3);
        assert!(created);
        assert_eq!(idx.index(), 2);
        assert_eq!(overlay.local_entries(), vec![3]);
    }
}
