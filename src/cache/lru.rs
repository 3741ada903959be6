//! LRU List Module
//!
//! Recency-ordered storage for cache entries.
//!
//! Entries live in a slab of nodes threaded into a doubly linked list, with a
//! hash index from key to slot. Touching, inserting, removing and finding the
//! eviction victim are all O(1).

use std::collections::HashMap;

use crate::cache::CacheEntry;

struct Node<V> {
    key: String,
    entry: CacheEntry<V>,
    prev: Option<usize>,
    next: Option<usize>,
}

// == LRU List ==
/// Owns cache entries in access order.
///
/// - Head = Most recently used
/// - Tail = Least recently used
///
/// Slots are stable for as long as an entry stays in the list, so other
/// indexes may refer to an entry by slot.
pub struct LruList<V> {
    index: HashMap<String, usize>,
    nodes: Vec<Option<Node<V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free: Vec<usize>,
}

impl<V> Default for LruList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LruList<V> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            index: HashMap::new(),
            nodes: Vec::new(),
            head: None,
            tail: None,
            free: Vec::new(),
        }
    }

    // == Insert ==
    /// Stores `entry` under `key` as the most recently used entry.
    ///
    /// Returns the slot and, when the key was already present, the entry it
    /// replaced.
    pub fn insert(&mut self, key: String, entry: CacheEntry<V>) -> (usize, Option<CacheEntry<V>>) {
        if let Some(&slot) = self.index.get(&key) {
            if let Some(node) = self.node_mut(slot) {
                let old = std::mem::replace(&mut node.entry, entry);
                self.move_to_front(slot);
                return (slot, Some(old));
            }
            // Dangling index entry; reclaim the slot and insert afresh.
            self.index.remove(&key);
            self.free.push(slot);
        }

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.nodes.push(None);
                self.nodes.len() - 1
            }
        };
        self.nodes[slot] = Some(Node {
            key: key.clone(),
            entry,
            prev: None,
            next: None,
        });
        self.link_front(slot);
        self.index.insert(key, slot);
        (slot, None)
    }

    // == Lookup ==
    /// Returns the slot indexed for `key`, if any.
    pub fn slot_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Returns the entry held in `slot`.
    pub fn entry(&self, slot: usize) -> Option<&CacheEntry<V>> {
        self.node(slot).map(|node| &node.entry)
    }

    /// Returns the entry held in `slot` mutably.
    pub fn entry_mut(&mut self, slot: usize) -> Option<&mut CacheEntry<V>> {
        self.node_mut(slot).map(|node| &mut node.entry)
    }

    /// Returns the key held in `slot`.
    pub fn key(&self, slot: usize) -> Option<&str> {
        self.node(slot).map(|node| node.key.as_str())
    }

    // == Touch ==
    /// Marks the entry in `slot` as most recently used.
    pub fn move_to_front(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }

    // == Remove ==
    /// Removes the entry in `slot`, returning its key and entry.
    pub fn remove(&mut self, slot: usize) -> Option<(String, CacheEntry<V>)> {
        self.node(slot)?;
        self.unlink(slot);
        let node = self.nodes.get_mut(slot)?.take()?;
        self.index.remove(&node.key);
        self.free.push(slot);
        Some((node.key, node.entry))
    }

    /// Drops an index entry whose slot holds no node.
    ///
    /// Returns true if a dangling index entry was found and removed.
    pub fn forget(&mut self, key: &str) -> bool {
        match self.index.get(key).copied() {
            Some(slot) if self.node(slot).is_none() => {
                self.index.remove(key);
                if slot < self.nodes.len() {
                    self.free.push(slot);
                }
                true
            }
            _ => false,
        }
    }

    // == Eviction Victim ==
    /// Returns the slot of the least recently used entry.
    pub fn lru_slot(&self) -> Option<usize> {
        self.tail
    }

    // == Length ==
    /// Returns the number of indexed keys.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // == Clear ==
    /// Drops every entry and all recency information.
    pub fn clear(&mut self) {
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
    }

    // == Iteration ==
    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn node(&self, slot: usize) -> Option<&Node<V>> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut Node<V>> {
        self.nodes.get_mut(slot).and_then(Option::as_mut)
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.node(slot) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = None;
        }
    }

    fn link_front(&mut self, slot: usize) {
        let old_head = self.head;
        match self.node_mut(slot) {
            Some(node) => {
                node.prev = None;
                node.next = old_head;
            }
            None => return,
        }
        if let Some(h) = old_head {
            if let Some(node) = self.node_mut(h) {
                node.prev = Some(slot);
            }
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_slot(&mut self, key: &str) {
        if let Some(slot) = self.slot_of(key) {
            self.unlink(slot);
            self.nodes[slot] = None;
        }
    }
}

/// Iterator over `(slot, key, entry)` from most to least recently used.
pub struct Iter<'a, V> {
    list: &'a LruList<V>,
    cursor: Option<usize>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (usize, &'a str, &'a CacheEntry<V>);

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.cursor?;
        let node = self.list.node(slot)?;
        self.cursor = node.next;
        Some((slot, node.key.as_str(), &node.entry))
    }
}
