//! In-memory namespace nodes and the lock state machine's data.
//!
//! A node represents one open namespace entry backed by a local file or
//! directory. Its mutable state — the backing descriptor, lock holders, the
//! FIFO queue of pending lock requests, and the attached handles — lives
//! behind a per-node mutex. The node table maps absolute names to nodes;
//! nodes are created lazily on open and removed when an ephemeral node's
//! last handle closes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::handle::Handle;
use crate::types::{HandleId, LockMode};

/// A queued lock request awaiting grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    /// The requesting handle.
    pub handle: HandleId,
    /// The requested mode.
    pub mode: LockMode,
}

/// Mutable state of a node, guarded by the node's mutex.
pub struct NodeInner {
    /// Backing descriptor; `None` once the last handle detached.
    pub file: Option<File>,
    /// True when the backing inode is a directory.
    pub is_directory: bool,
    /// Ephemeral nodes are unlinked at creation and evicted on last close.
    pub ephemeral: bool,
    /// Monotonic per-node lock counter, persisted to the `lock.generation`
    /// attribute before any grant is answered.
    pub lock_generation: u64,
    /// Current lock mode; `None` when unlocked.
    pub current_lock_mode: Option<LockMode>,
    /// Holder of the exclusive lock, if any.
    pub exclusive_handle: Option<HandleId>,
    /// Holders of shared locks.
    pub shared_handles: HashSet<HandleId>,
    /// FIFO queue of waiters; later requests never overtake an earlier
    /// exclusive request.
    pub pending_lock_requests: VecDeque<LockRequest>,
    /// Handles currently attached to this node.
    pub handles: HashMap<HandleId, Arc<Handle>>,
}

impl NodeInner {
    fn new() -> Self {
        Self {
            file: None,
            is_directory: false,
            ephemeral: false,
            lock_generation: 0,
            current_lock_mode: None,
            exclusive_handle: None,
            shared_handles: HashSet::new(),
            pending_lock_requests: VecDeque::new(),
            handles: HashMap::new(),
        }
    }

    /// Number of attached handles.
    pub fn reference_count(&self) -> usize {
        self.handles.len()
    }

    /// Attaches a handle to the node.
    pub fn attach_handle(&mut self, handle: Arc<Handle>) {
        self.handles.insert(handle.id(), handle);
    }

    /// Detaches a handle; returns true if it was attached.
    pub fn detach_handle(&mut self, id: HandleId) -> bool {
        self.handles.remove(&id).is_some()
    }

    /// Records `id` as a lock holder in `mode`.
    pub fn attach_lock_holder(&mut self, id: HandleId, mode: LockMode) {
        match mode {
            LockMode::Shared => {
                self.shared_handles.insert(id);
            }
            LockMode::Exclusive => {
                self.exclusive_handle = Some(id);
            }
        }
    }

    /// Removes `id` from whichever holder set it is in; returns true if it
    /// held the lock.
    pub fn remove_lock_holder(&mut self, id: HandleId) -> bool {
        if self.exclusive_handle == Some(id) {
            self.exclusive_handle = None;
            true
        } else {
            self.shared_handles.remove(&id)
        }
    }

    /// True when neither holder set is occupied.
    pub fn is_unlocked(&self) -> bool {
        self.exclusive_handle.is_none() && self.shared_handles.is_empty()
    }

    /// Drops any queued lock requests from `id` (handle destroyed while
    /// waiting).
    pub fn purge_pending(&mut self, id: HandleId) {
        self.pending_lock_requests.retain(|req| req.handle != id);
    }

    /// Exactly one of unlocked / shared-held / exclusive-held must hold,
    /// consistent with `current_lock_mode`.
    pub fn holder_sets_consistent(&self) -> bool {
        match self.current_lock_mode {
            None => self.exclusive_handle.is_none() && self.shared_handles.is_empty(),
            Some(LockMode::Shared) => {
                self.exclusive_handle.is_none() && !self.shared_handles.is_empty()
            }
            Some(LockMode::Exclusive) => {
                self.exclusive_handle.is_some() && self.shared_handles.is_empty()
            }
        }
    }
}

/// One open namespace entry.
pub struct Node {
    name: String,
    inner: Mutex<NodeInner>,
}

impl Node {
    /// Creates a node for the normalized absolute name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(NodeInner::new()),
        }
    }

    /// The node's absolute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Locks the node's mutable state.
    pub fn lock(&self) -> MutexGuard<'_, NodeInner> {
        self.inner.lock().expect("lock poisoned")
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("name", &self.name).finish()
    }
}

/// The in-memory index of currently open nodes, keyed by absolute name.
pub struct NodeTable {
    map: Mutex<HashMap<String, Arc<Node>>>,
}

impl NodeTable {
    /// Creates an empty node table.
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Locks the table's membership map. Lock order: this is `node_map_mu`
    /// and must be taken before any per-node mutex.
    pub fn map(&self) -> MutexGuard<'_, HashMap<String, Arc<Node>>> {
        self.map.lock().expect("lock poisoned")
    }

    /// Looks up a node by name.
    pub fn get(&self, name: &str) -> Option<Arc<Node>> {
        self.map().get(name).cloned()
    }

    /// Finds the parent node of `name` in the table, returning it with the
    /// child's entry name. Entries directly under the root have no parent
    /// node. The caller passes the membership guard it already holds.
    pub fn find_parent_in<'a>(
        map: &HashMap<String, Arc<Node>>,
        name: &'a str,
    ) -> Option<(Arc<Node>, &'a str)> {
        let slash = name.rfind('/')?;
        if slash == 0 {
            return None;
        }
        let parent = map.get(&name[..slash])?.clone();
        Some((parent, &name[slash + 1..]))
    }

    /// Convenience wrapper over [`Self::find_parent_in`] taking the map
    /// lock itself.
    pub fn find_parent(&self, name: &str) -> Option<(Arc<Node>, String)> {
        let map = self.map();
        Self::find_parent_in(&map, name).map(|(node, child)| (node, child.to_string()))
    }

    /// Number of open nodes.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    /// True if no node is open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for NodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_is_unlocked_and_consistent() {
        let node = Node::new("/a");
        let inner = node.lock();
        assert!(inner.is_unlocked());
        assert!(inner.holder_sets_consistent());
        assert_eq!(inner.reference_count(), 0);
    }

    #[test]
    fn test_holder_sets_consistency() {
        let node = Node::new("/a");
        let mut inner = node.lock();

        inner.attach_lock_holder(HandleId::new(1), LockMode::Exclusive);
        inner.current_lock_mode = Some(LockMode::Exclusive);
        assert!(inner.holder_sets_consistent());
        assert!(!inner.is_unlocked());

        // A shared holder alongside an exclusive one is inconsistent.
        inner.shared_handles.insert(HandleId::new(2));
        assert!(!inner.holder_sets_consistent());
        inner.shared_handles.clear();

        assert!(inner.remove_lock_holder(HandleId::new(1)));
        inner.current_lock_mode = None;
        assert!(inner.holder_sets_consistent());
        assert!(inner.is_unlocked());
    }

    #[test]
    fn test_remove_lock_holder_unknown() {
        let node = Node::new("/a");
        let mut inner = node.lock();
        assert!(!inner.remove_lock_holder(HandleId::new(9)));
    }

    #[test]
    fn test_pending_queue_is_fifo_and_purgeable() {
        let node = Node::new("/a");
        let mut inner = node.lock();
        for i in 1..=4u64 {
            inner.pending_lock_requests.push_back(LockRequest {
                handle: HandleId::new(i),
                mode: if i % 2 == 0 {
                    LockMode::Shared
                } else {
                    LockMode::Exclusive
                },
            });
        }

        inner.purge_pending(HandleId::new(2));
        let handles: Vec<u64> = inner
            .pending_lock_requests
            .iter()
            .map(|r| r.handle.as_u64())
            .collect();
        assert_eq!(handles, vec![1, 3, 4]);
    }

    #[test]
    fn test_find_parent() {
        let table = NodeTable::new();
        let parent = Arc::new(Node::new("/a"));
        table.map().insert("/a".to_string(), parent);

        let (found, child) = table.find_parent("/a/b").unwrap();
        assert_eq!(found.name(), "/a");
        assert_eq!(child, "b");

        // No parent node open.
        assert!(table.find_parent("/x/y").is_none());
        // Entries directly under the root have no parent node.
        assert!(table.find_parent("/a").is_none());
    }
}
