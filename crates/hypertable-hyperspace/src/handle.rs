//! Open-handle registry.
//!
//! A handle is an opaque reference to an open namespace node, scoped to one
//! session. Handles hold the node's name and the session's id rather than
//! pointers; the tables resolve them, which keeps ownership acyclic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::types::{EventMask, HandleId, OpenFlags, SessionId};

/// An open handle on a namespace node.
#[derive(Debug)]
pub struct Handle {
    id: HandleId,
    node_name: String,
    session: SessionId,
    open_flags: OpenFlags,
    event_mask: EventMask,
    /// Set while the handle holds a shared or exclusive lock; only mutated
    /// under the owning node's mutex.
    locked: AtomicBool,
}

impl Handle {
    /// The handle's id.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Name of the node this handle is open on.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// The owning session.
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The flags the handle was opened with.
    pub fn open_flags(&self) -> OpenFlags {
        self.open_flags
    }

    /// The events this handle subscribed to.
    pub fn event_mask(&self) -> EventMask {
        self.event_mask
    }

    /// True while the handle holds a lock on its node.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Updates the lock flag; caller holds the node's mutex.
    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::Release);
    }
}

/// Registry of open handles, strictly id-keyed.
pub struct HandleTable {
    next_id: AtomicU64,
    handles: RwLock<HashMap<HandleId, Arc<Handle>>>,
}

impl HandleTable {
    /// Creates an empty handle table.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a handle for `session` on the node named `node_name`.
    pub fn create(
        &self,
        node_name: &str,
        session: SessionId,
        open_flags: OpenFlags,
        event_mask: EventMask,
    ) -> Arc<Handle> {
        let id = HandleId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let handle = Arc::new(Handle {
            id,
            node_name: node_name.to_string(),
            session,
            open_flags,
            event_mask,
            locked: AtomicBool::new(false),
        });
        self.handles
            .write()
            .expect("lock poisoned")
            .insert(id, handle.clone());
        handle
    }

    /// Looks up a handle by id.
    pub fn get(&self, id: HandleId) -> Option<Arc<Handle>> {
        self.handles.read().expect("lock poisoned").get(&id).cloned()
    }

    /// Removes a handle by id, returning it if it was present.
    pub fn remove(&self, id: HandleId) -> Option<Arc<Handle>> {
        self.handles.write().expect("lock poisoned").remove(&id)
    }

    /// Number of open handles.
    pub fn len(&self) -> usize {
        self.handles.read().expect("lock poisoned").len()
    }

    /// True if no handles are open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}
