//! Node id ↔ alias directory.
//!
//! [`AliasDirectory`] is the seam the datagram service uses to map node ids
//! to bus aliases, once for the local nodes and once for the remote ones.
//! [`AliasCache`] is a fixed-capacity implementation that replaces the least
//! recently used entry when full.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::core::{is_valid_alias, Alias, NodeId};

/// Bidirectional node id ↔ alias map. Interior mutability: the runner task
/// updates it while client tasks read it.
pub trait AliasDirectory: Sync {
    /// Alias currently mapped to `node_id`.
    fn lookup(&self, node_id: NodeId) -> Option<Alias>;
    /// Node id currently owning `alias`.
    fn reverse_lookup(&self, alias: Alias) -> Option<NodeId>;
    /// Record a mapping, replacing any older mapping of the node id or the alias.
    fn add(&self, node_id: NodeId, alias: Alias);
    /// Forget the mapping of `node_id`.
    fn remove(&self, node_id: NodeId);
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    node_id: NodeId,
    alias: Alias,
    last_used: u32,
}

#[derive(Debug)]
struct CacheState<const N: usize> {
    entries: [Option<CacheEntry>; N],
    tick: u32,
}

impl<const N: usize> CacheState<N> {
    fn touch(&mut self, index: usize) {
        self.tick = self.tick.wrapping_add(1);
        if let Some(entry) = self.entries[index].as_mut() {
            entry.last_used = self.tick;
        }
    }

    fn position(&self, predicate: impl Fn(&CacheEntry) -> bool) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.as_ref().is_some_and(&predicate))
    }

    /// Empty slot, or the least recently used one.
    fn victim(&self) -> Option<usize> {
        self.entries.iter().position(Option::is_none).or_else(|| {
            self.entries
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| entry.map(|e| (index, e.last_used)))
                .max_by_key(|(_, last_used)| self.tick.wrapping_sub(*last_used))
                .map(|(index, _)| index)
        })
    }
}

/// Fixed-capacity alias directory with least-recently-used replacement.
pub struct AliasCache<const N: usize> {
    state: Mutex<CriticalSectionRawMutex, RefCell<CacheState<N>>>,
}

impl<const N: usize> Default for AliasCache<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AliasCache<N> {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(CacheState {
                entries: [None; N],
                tick: 0,
            })),
        }
    }

    /// Number of mappings stored.
    pub fn len(&self) -> usize {
        self.state
            .lock(|state| state.borrow().entries.iter().flatten().count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every mapping.
    pub fn clear(&self) {
        self.state
            .lock(|state| state.borrow_mut().entries = [None; N]);
    }
}

impl<const N: usize> AliasDirectory for AliasCache<N> {
    fn lookup(&self, node_id: NodeId) -> Option<Alias> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let index = state.position(|e| e.node_id == node_id)?;
            state.touch(index);
            state.entries[index].map(|e| e.alias)
        })
    }

    fn reverse_lookup(&self, alias: Alias) -> Option<NodeId> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            let index = state.position(|e| e.alias == alias)?;
            state.touch(index);
            state.entries[index].map(|e| e.node_id)
        })
    }

    fn add(&self, node_id: NodeId, alias: Alias) {
        if node_id == 0 || !is_valid_alias(alias) {
            return;
        }
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            // An alias belongs to one node at a time, and the other way round.
            for entry in state.entries.iter_mut() {
                if entry.is_some_and(|e| e.node_id == node_id || e.alias == alias) {
                    *entry = None;
                }
            }
            let Some(index) = state.victim() else {
                return;
            };
            state.entries[index] = Some(CacheEntry {
                node_id,
                alias,
                last_used: 0,
            });
            state.touch(index);
        });
    }

    fn remove(&self, node_id: NodeId) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if let Some(index) = state.position(|e| e.node_id == node_id) {
                state.entries[index] = None;
            }
        });
    }
}
