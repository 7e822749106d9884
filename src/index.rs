//! The hash-chained suffix index.
//!
//! The index answers "which loaded zone is the closest enclosing authority
//! for this query name" without scanning the set of loaded zones. Every
//! ancestor prefix of a loaded zone name, from the top-level label down to
//! the apex itself, is keyed by a chain hash: a SHA-256 over the label and
//! the hash of the remaining ancestor labels. Because the hash covers the
//! whole ordered label sequence, the index is a flat hash map that still
//! behaves like a trie: a lookup walks the query's labels from the most
//! general end, one map probe per label, remembering the deepest apex node
//! it passes.
//!
//! Nodes shared between zones (common ancestor prefixes) carry a reference
//! count so that deleting one zone leaves the other's chain intact. The
//! table is read concurrently by the query path and written only by the
//! zone manager's task.

use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::HashMap;
use std::mem;

use parking_lot::RwLock;
use ring::digest::{self, SHA256};
use tracing::warn;

use crate::name::ZoneName;

//------------ ChainHash -----------------------------------------------------

/// A chain hash: SHA-256 over a label and its ancestor chain's hash.
type ChainHash = [u8; 32];

/// Hashes one more label onto an ancestor chain.
///
/// The hash of the empty chain is the empty byte string, so the first
/// label hashes alone.
fn chain_hash(label: &str, ancestor: &[u8]) -> ChainHash {
    let mut buf = Vec::with_capacity(label.len() + ancestor.len());
    buf.extend_from_slice(label.as_bytes());
    buf.extend_from_slice(ancestor);
    let digest = digest::digest(&SHA256, &buf);
    let mut hash = ChainHash::default();
    hash.copy_from_slice(digest.as_ref());
    hash
}

//------------ IndexNode -----------------------------------------------------

/// One node of the index.
///
/// A node exists iff its refcount is positive; a node whose hash is the
/// full chain of some loaded zone's name carries that name as its apex.
#[derive(Clone, Debug)]
struct IndexNode {
    refcount: u32,
    apex: Option<ZoneName>,
}

//------------ SuffixIndex ---------------------------------------------------

/// The set of loaded zone names, indexed for closest-enclosing lookup.
#[derive(Debug, Default)]
pub struct SuffixIndex {
    nodes: RwLock<HashMap<ChainHash, IndexNode>>,
}

impl SuffixIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Default::default()
    }

    /// Computes the full ancestor-hash chain of a name, apex hash last.
    fn chain(name: &ZoneName) -> Vec<ChainHash> {
        let mut hashes = Vec::new();
        let mut current = Vec::new();
        for label in name.labels_suffix_first() {
            let next = chain_hash(label, &current);
            current.clear();
            current.extend_from_slice(&next);
            hashes.push(next);
        }
        hashes
    }

    /// Adds a zone name to the index.
    ///
    /// Ancestor nodes shared with already-present zones have their
    /// reference count bumped; missing ones are created. The root chain
    /// is never stored, so inserting the root name is a no-op.
    pub fn insert(&self, name: &ZoneName) {
        let hashes = Self::chain(name);
        let Some((apex, ancestors)) = hashes.split_last() else {
            return;
        };
        let mut nodes = self.nodes.write();
        for hash in ancestors {
            nodes
                .entry(*hash)
                .and_modify(|node| node.refcount += 1)
                .or_insert(IndexNode {
                    refcount: 1,
                    apex: None,
                });
        }
        match nodes.entry(*apex) {
            Vacant(entry) => {
                entry.insert(IndexNode {
                    refcount: 1,
                    apex: Some(name.clone()),
                });
            }
            Occupied(mut entry) => {
                // An apex hash is a function of the zone's own name, so
                // hitting an existing node here means either a genuine
                // SHA-256 collision or an insert the manager should have
                // rejected. Bump the count and take ownership, but attach
                // no further meaning to it.
                warn!(zone = %name, "apex chain hash already present in suffix index");
                let node = entry.get_mut();
                node.refcount += 1;
                node.apex = Some(name.clone());
            }
        }
    }

    /// Removes a zone name from the index.
    ///
    /// Reverses exactly one earlier insert of the same name: ancestor
    /// nodes are decremented and dropped at zero, the apex node is dropped
    /// or demoted to a plain ancestor node.
    pub fn remove(&self, name: &ZoneName) {
        let hashes = Self::chain(name);
        let Some((apex, ancestors)) = hashes.split_last() else {
            return;
        };
        let mut nodes = self.nodes.write();
        if let Some(node) = nodes.get_mut(apex) {
            if node.refcount > 1 {
                node.refcount -= 1;
                node.apex = None;
            } else {
                nodes.remove(apex);
            }
        }
        for hash in ancestors {
            if let Some(node) = nodes.get_mut(hash) {
                debug_assert!(node.refcount > 0);
                node.refcount -= 1;
                if node.refcount == 0 {
                    nodes.remove(hash);
                }
            }
        }
    }

    /// Returns the apex of the closest enclosing zone for a query name.
    ///
    /// Walks the query's labels from the most general end, following the
    /// chain hashes while nodes exist and remembering the deepest apex
    /// seen. A query strictly inside a delegated child zone therefore
    /// resolves to the child, not the parent; a query outside every loaded
    /// zone resolves to `None`. Never fails.
    pub fn lookup(&self, qname: &ZoneName) -> Option<ZoneName> {
        let nodes = self.nodes.read();
        let mut best = None;
        let mut current = Vec::new();
        for label in qname.labels_suffix_first() {
            let next = chain_hash(label, &current);
            let Some(node) = nodes.get(&next) else {
                break;
            };
            debug_assert!(node.refcount > 0);
            if let Some(apex) = &node.apex {
                best = Some(apex.clone());
            }
            current.clear();
            current.extend_from_slice(&next);
        }
        best
    }

    /// Returns the number of nodes in the index.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns whether the index holds no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Approximate heap usage of the node table in bytes.
    pub fn mem_usage(&self) -> usize {
        let nodes = self.nodes.read();
        let per_entry =
            mem::size_of::<ChainHash>() + mem::size_of::<IndexNode>();
        nodes
            .values()
            .map(|node| {
                per_entry
                    + node
                        .apex
                        .as_ref()
                        .map_or(0, |apex| apex.mem_usage())
            })
            .sum()
    }
}

//============ Tests =========================================================
