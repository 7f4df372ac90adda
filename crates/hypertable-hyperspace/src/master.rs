//! The Hyperspace master: the public face of the coordination service.
//!
//! Every RPC-surface operation lives here. Operations validate the caller's
//! session, dispatch to the tables, and fan out events to interested
//! handles. Mutating operations deliver their events synchronously: the
//! call does not return until every recipient session has acknowledged,
//! which is what lets a client observe its own mutation's effects in
//! notification order.
//!
//! Lock order, strict: session table → handle table → node table
//! membership → per-node state. No operation holds two per-node mutexes at
//! once; per-session state is disjoint and taken last.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::config::HyperspaceConfig;
use crate::event::{Event, EventPayload, NamedEventKind, Notification};
use crate::handle::{Handle, HandleTable};
use crate::namespace::{normalize_name, NamespaceStore};
use crate::node::{LockRequest, Node, NodeInner, NodeTable};
use crate::session::{Session, SessionTable};
use crate::types::{
    EventId, EventMask, HandleId, HyperspaceError, HyperspaceResult, LockMode, LockStatus,
    OpenFlags, SessionId,
};

/// Reserved attribute carrying a node's lock generation.
const LOCK_GENERATION_ATTR: &str = "lock.generation";

/// Transport seam for pushing notifications to clients.
///
/// The keepalive shell implements this against the wire. `deliver` pushes a
/// session's drained notification batch and returns the event ids the
/// client has acknowledged so far; acknowledgements that arrive later go
/// through [`Master::acknowledge_delivery`]. Implementations must not call
/// back into the master synchronously.
pub trait NotificationSink: Send + Sync {
    /// Pushes `batch` to the client behind `session`; returns acknowledged
    /// event ids.
    fn deliver(&self, session: SessionId, batch: &[Notification]) -> Vec<EventId>;
}

macro_rules! op_log {
    ($self:expr, $($arg:tt)*) => {
        if $self.config.verbose {
            info!($($arg)*);
        } else {
            debug!($($arg)*);
        }
    };
}

/// The Hyperspace master.
pub struct Master {
    config: HyperspaceConfig,
    namespace: NamespaceStore,
    sessions: SessionTable,
    handles: HandleTable,
    nodes: NodeTable,
    next_event_id: AtomicU64,
    sink: Arc<dyn NotificationSink>,
}

impl Master {
    /// Opens the backing namespace (taking the single-master lock) and
    /// builds the service.
    pub fn new(
        config: HyperspaceConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> HyperspaceResult<Self> {
        let namespace = NamespaceStore::open(&config.base_dir)?;
        info!(
            lease_ms = config.lease_interval_ms,
            keepalive_ms = config.keepalive_interval_ms,
            dir = %config.base_dir.display(),
            generation = namespace.generation(),
            "hyperspace master started"
        );
        Ok(Self {
            sessions: SessionTable::new(config.lease_interval()),
            handles: HandleTable::new(),
            nodes: NodeTable::new(),
            next_event_id: AtomicU64::new(1),
            namespace,
            config,
            sink,
        })
    }

    /// The service configuration.
    pub fn config(&self) -> &HyperspaceConfig {
        &self.config
    }

    /// The backing namespace store.
    pub fn namespace(&self) -> &NamespaceStore {
        &self.namespace
    }

    /// The session table.
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// The handle table.
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// The node table.
    pub fn nodes(&self) -> &NodeTable {
        &self.nodes
    }

    /// Creates a session for `peer` and returns its id.
    pub fn create_session(&self, peer: SocketAddr) -> SessionId {
        let id = self.sessions.create(peer);
        op_log!(self, session = %id, peer = %peer, "create_session");
        id
    }

    /// Renews a session's lease.
    pub fn renew_lease(&self, session_id: SessionId) -> HyperspaceResult<()> {
        self.sessions.renew(session_id)
    }

    /// Creates a directory entry and notifies watchers of the parent node.
    pub fn mkdir(&self, session_id: SessionId, name: &str) -> HyperspaceResult<()> {
        self.checked_session(session_id)?;
        let name = normalize_name(name)?;
        op_log!(self, session = %session_id, name = %name, "mkdir");

        self.namespace.mkdir(&name)?;
        self.notify_parent(
            &name,
            NamedEventKind::ChildAdded,
            EventMask::CHILD_NODE_ADDED,
            true,
        );
        Ok(())
    }

    /// Removes a namespace entry and notifies watchers of the parent node.
    pub fn delete(&self, session_id: SessionId, name: &str) -> HyperspaceResult<()> {
        self.checked_session(session_id)?;
        let name = normalize_name(name)?;
        op_log!(self, session = %session_id, name = %name, "delete");

        self.namespace.delete(&name)?;
        self.notify_parent(
            &name,
            NamedEventKind::ChildRemoved,
            EventMask::CHILD_NODE_REMOVED,
            true,
        );
        Ok(())
    }

    /// Opens a handle on a node, creating the node lazily. Returns the
    /// handle id and whether the backing entry was created by this call.
    pub fn open(
        &self,
        session_id: SessionId,
        name: &str,
        flags: OpenFlags,
        event_mask: EventMask,
    ) -> HyperspaceResult<(HandleId, bool)> {
        let session = self.checked_session(session_id)?;
        let name = normalize_name(name)?;
        op_log!(
            self,
            session = %session_id,
            name = %name,
            flags = flags.bits(),
            event_mask = event_mask.bits(),
            "open"
        );

        let mut created = false;
        let mut parent_event: Option<(Arc<Node>, String)> = None;
        let node;
        let handle;
        {
            let mut map = self.nodes.map();

            let existing = map.get(&name).cloned();
            if existing.is_some()
                && flags.contains(OpenFlags::CREATE)
                && flags.contains(OpenFlags::EXCL)
            {
                return Err(HyperspaceError::FileExists(name));
            }
            let is_new_entry = existing.is_none();
            let existed = self.namespace.stat_is_dir(&name)?;

            node = existing.unwrap_or_else(|| Arc::new(Node::new(&name)));
            {
                let mut inner = node.lock();
                if inner.file.is_none() {
                    if !is_new_entry
                        && flags.contains(OpenFlags::TEMP)
                        && existed.is_some()
                        && !inner.ephemeral
                    {
                        return Err(HyperspaceError::FileExists(name));
                    }

                    let is_directory = existed == Some(true);
                    let file = self.namespace.open_node(&name, flags, is_directory)?;

                    if is_new_entry {
                        inner.is_directory = is_directory;
                        inner.lock_generation = Self::read_lock_generation(&file)?;
                        if flags.contains(OpenFlags::TEMP) {
                            inner.ephemeral = true;
                            self.namespace.unlink(&name)?;
                        }
                    }
                    inner.file = Some(file);
                    if existed.is_none() {
                        created = true;
                    }
                }
            }
            if is_new_entry {
                map.insert(name.clone(), node.clone());
            }

            handle = self.handles.create(&name, session_id, flags, event_mask);
            session.add_handle(handle.id());

            if created {
                parent_event = NodeTable::find_parent_in(&map, &name)
                    .map(|(parent, child)| (parent, child.to_string()));
            }
        }

        if let Some((parent, child)) = parent_event {
            // Allocate the id under the parent's mutex so per-session
            // delivery order matches event-id order.
            let inner = parent.lock();
            let event = self.alloc_event(
                EventMask::CHILD_NODE_ADDED,
                EventPayload::Named {
                    kind: NamedEventKind::ChildAdded,
                    name: child,
                },
            );
            self.deliver_event_notifications(&inner, &event, true);
        }

        node.lock().attach_handle(handle.clone());

        Ok((handle.id(), created))
    }

    /// Closes a handle. Close implies release: any lock held by the handle
    /// is released first, then the handle detaches from its node.
    pub fn close(&self, session_id: SessionId, handle_id: HandleId) -> HyperspaceResult<()> {
        let session = self.checked_session(session_id)?;
        op_log!(self, session = %session_id, handle = %handle_id, "close");

        let handle = self
            .handles
            .remove(handle_id)
            .ok_or(HyperspaceError::InvalidHandle(handle_id))?;
        session.remove_handle(handle_id);
        self.destroy_handle(&handle, true)
    }

    /// Whether a namespace entry exists. Does not touch the node table.
    pub fn exists(&self, session_id: SessionId, name: &str) -> HyperspaceResult<bool> {
        self.checked_session(session_id)?;
        let name = normalize_name(name)?;
        op_log!(self, session = %session_id, name = %name, "exists");
        Ok(self.namespace.exists(&name))
    }

    /// Sets an extended attribute on the handle's node and notifies
    /// watchers.
    pub fn attr_set(
        &self,
        session_id: SessionId,
        handle_id: HandleId,
        name: &str,
        value: &[u8],
    ) -> HyperspaceResult<()> {
        self.checked_session(session_id)?;
        let handle = self.checked_handle(handle_id)?;
        op_log!(
            self,
            session = %session_id,
            handle = %handle_id,
            attr = name,
            len = value.len(),
            "attr_set"
        );

        let node = self.node_of(&handle)?;
        let inner = node.lock();
        let file = Self::backing_file(&inner, handle.node_name())?;
        NamespaceStore::set_xattr(file, name, value)?;

        let event = self.alloc_event(
            EventMask::ATTR_SET,
            EventPayload::Named {
                kind: NamedEventKind::AttrSet,
                name: name.to_string(),
            },
        );
        self.deliver_event_notifications(&inner, &event, true);
        Ok(())
    }

    /// Reads an extended attribute from the handle's node.
    pub fn attr_get(
        &self,
        session_id: SessionId,
        handle_id: HandleId,
        name: &str,
    ) -> HyperspaceResult<Vec<u8>> {
        self.checked_session(session_id)?;
        let handle = self.checked_handle(handle_id)?;
        op_log!(self, session = %session_id, handle = %handle_id, attr = name, "attr_get");

        let node = self.node_of(&handle)?;
        let inner = node.lock();
        let file = Self::backing_file(&inner, handle.node_name())?;
        NamespaceStore::get_xattr(file, name)?
            .ok_or_else(|| HyperspaceError::AttrNotFound(name.to_string()))
    }

    /// Deletes an extended attribute from the handle's node and notifies
    /// watchers.
    pub fn attr_del(
        &self,
        session_id: SessionId,
        handle_id: HandleId,
        name: &str,
    ) -> HyperspaceResult<()> {
        self.checked_session(session_id)?;
        let handle = self.checked_handle(handle_id)?;
        op_log!(self, session = %session_id, handle = %handle_id, attr = name, "attr_del");

        let node = self.node_of(&handle)?;
        let inner = node.lock();
        let file = Self::backing_file(&inner, handle.node_name())?;
        NamespaceStore::remove_xattr(file, name)?;

        let event = self.alloc_event(
            EventMask::ATTR_DEL,
            EventPayload::Named {
                kind: NamedEventKind::AttrDel,
                name: name.to_string(),
            },
        );
        self.deliver_event_notifications(&inner, &event, true);
        Ok(())
    }

    /// Requests a lock on the handle's node. Never blocks: contended
    /// non-try requests are queued and answered `Pending`; the grant
    /// arrives later as a LockGranted event.
    pub fn lock(
        &self,
        session_id: SessionId,
        handle_id: HandleId,
        mode: LockMode,
        try_only: bool,
    ) -> HyperspaceResult<LockStatus> {
        self.checked_session(session_id)?;
        let handle = self.checked_handle(handle_id)?;
        op_log!(
            self,
            session = %session_id,
            handle = %handle_id,
            mode = %mode,
            try_only,
            "lock"
        );

        if !handle.open_flags().contains(OpenFlags::LOCK) {
            return Err(HyperspaceError::ModeRestriction("handle not open for locking"));
        }
        if !handle.open_flags().contains(OpenFlags::WRITE) {
            return Err(HyperspaceError::ModeRestriction("handle not open for writing"));
        }

        let node = self.node_of(&handle)?;
        let mut inner = node.lock();
        if inner.is_directory {
            return Err(HyperspaceError::ModeRestriction(
                "cannot lock a directory handle",
            ));
        }

        match inner.current_lock_mode {
            Some(LockMode::Exclusive) => {
                return if try_only {
                    Ok(LockStatus::Busy)
                } else {
                    inner.pending_lock_requests.push_back(LockRequest {
                        handle: handle_id,
                        mode,
                    });
                    Ok(LockStatus::Pending)
                };
            }
            Some(LockMode::Shared) => {
                if mode == LockMode::Exclusive {
                    return if try_only {
                        Ok(LockStatus::Busy)
                    } else {
                        inner.pending_lock_requests.push_back(LockRequest {
                            handle: handle_id,
                            mode,
                        });
                        Ok(LockStatus::Pending)
                    };
                }
                // A shared request behind queued waiters keeps FIFO
                // fairness: it must not overtake a blocked exclusive.
                if !inner.pending_lock_requests.is_empty() {
                    inner.pending_lock_requests.push_back(LockRequest {
                        handle: handle_id,
                        mode,
                    });
                    return Ok(LockStatus::Pending);
                }
            }
            None => {}
        }

        // Existing shared holders already know the node is shared-locked;
        // only a mode-changing grant is broadcast.
        let notify = !(mode == LockMode::Shared && !inner.shared_handles.is_empty());

        let generation = inner.lock_generation + 1;
        self.persist_lock_generation(&inner, handle.node_name(), generation)?;
        inner.lock_generation = generation;
        inner.current_lock_mode = Some(mode);
        inner.attach_lock_holder(handle_id, mode);
        handle.set_locked(true);
        debug_assert!(inner.holder_sets_consistent());

        if notify {
            let event = self.alloc_event(
                EventMask::LOCK_ACQUIRED,
                EventPayload::LockAcquired { mode },
            );
            self.deliver_event_notifications(&inner, &event, true);
        }

        Ok(LockStatus::Granted(generation))
    }

    /// Releases the lock held by a handle, promoting FIFO waiters.
    pub fn release(&self, session_id: SessionId, handle_id: HandleId) -> HyperspaceResult<()> {
        self.checked_session(session_id)?;
        let handle = self.checked_handle(handle_id)?;
        op_log!(self, session = %session_id, handle = %handle_id, "release");
        self.release_lock(&handle, true)
    }

    /// Applies client acknowledgements for previously delivered events.
    pub fn acknowledge_delivery(&self, session_id: SessionId, acked: &[EventId]) {
        if let Some(session) = self.sessions.get(session_id) {
            for (event, count) in session.acknowledge_events(acked) {
                for _ in 0..count {
                    event.acknowledge();
                }
            }
        }
    }

    /// One keepalive pass: expire overdue sessions (tearing down their
    /// handles, locks, and waiters), then flush pending notifications.
    pub fn keepalive_tick(&self) {
        loop {
            let session = match self.sessions.next_expired(Instant::now()) {
                Some(session) => session,
                None => break,
            };
            info!(session = %session.id(), "expiring session");

            for handle_id in session.take_handles() {
                match self.handles.remove(handle_id) {
                    Some(handle) => {
                        debug!(handle = %handle_id, "destroying handle of expired session");
                        if let Err(err) = self.destroy_handle(&handle, false) {
                            error!(
                                handle = %handle_id,
                                error = %err,
                                "problem destroying handle of expired session"
                            );
                        }
                    }
                    None => warn!(handle = %handle_id, "expired session handle invalid"),
                }
            }

            // The dead client will never acknowledge; release any waiters.
            for (event, count) in session.take_all_unacknowledged() {
                for _ in 0..count {
                    event.acknowledge();
                }
            }
        }

        for session in self.sessions.sessions_with_pending() {
            self.flush_session(&session);
        }
    }

    fn checked_session(&self, id: SessionId) -> HyperspaceResult<Arc<Session>> {
        self.sessions
            .get(id)
            .filter(|session| !session.is_expired())
            .ok_or(HyperspaceError::ExpiredSession(id))
    }

    fn checked_handle(&self, id: HandleId) -> HyperspaceResult<Arc<Handle>> {
        self.handles
            .get(id)
            .ok_or(HyperspaceError::InvalidHandle(id))
    }

    fn node_of(&self, handle: &Handle) -> HyperspaceResult<Arc<Node>> {
        self.nodes
            .get(handle.node_name())
            .ok_or(HyperspaceError::InvalidHandle(handle.id()))
    }

    fn alloc_event(&self, mask: EventMask, payload: EventPayload) -> Arc<Event> {
        let id = EventId::new(self.next_event_id.fetch_add(1, Ordering::Relaxed));
        Arc::new(Event::new(id, mask, payload))
    }

    fn read_lock_generation(file: &std::fs::File) -> HyperspaceResult<u64> {
        match NamespaceStore::get_xattr(file, LOCK_GENERATION_ATTR)? {
            Some(bytes) if bytes.len() == 8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes);
                Ok(u64::from_le_bytes(raw))
            }
            _ => {
                // Absent (or mangled): initialize to 1 and persist.
                NamespaceStore::set_xattr(file, LOCK_GENERATION_ATTR, &1u64.to_le_bytes())?;
                Ok(1)
            }
        }
    }

    /// Persists a new lock generation to the backing inode. Durability
    /// before response: every grant writes the attribute before the caller
    /// sees the new generation.
    fn persist_lock_generation(
        &self,
        inner: &NodeInner,
        name: &str,
        generation: u64,
    ) -> HyperspaceResult<()> {
        let file = Self::backing_file(inner, name)?;
        NamespaceStore::set_xattr(file, LOCK_GENERATION_ATTR, &generation.to_le_bytes())
    }

    fn backing_file<'a>(inner: &'a NodeInner, name: &str) -> HyperspaceResult<&'a std::fs::File> {
        inner.file.as_ref().ok_or_else(|| {
            HyperspaceError::ProtocolError(format!("node {name} has no backing descriptor"))
        })
    }

    /// Emits a named event to watchers of `name`'s parent node, if open.
    /// The event id is allocated under the parent's mutex so per-session
    /// delivery order matches event-id order.
    fn notify_parent(&self, name: &str, kind: NamedEventKind, mask: EventMask, wait: bool) {
        if let Some((parent, child)) = self.nodes.find_parent(name) {
            let inner = parent.lock();
            let event = self.alloc_event(mask, EventPayload::Named { kind, name: child });
            self.deliver_event_notifications(&inner, &event, wait);
        }
    }

    /// Broadcasts an event to every attached handle whose mask matches,
    /// queueing one notification per handle on its owning session. Called
    /// with the node's mutex held; the outstanding counter is incremented
    /// before each enqueue so acknowledgements cannot race the wait below.
    fn deliver_event_notifications(&self, inner: &NodeInner, event: &Arc<Event>, wait: bool) {
        let mut recipients: Vec<Arc<Session>> = Vec::new();
        let mut notifications = 0usize;

        for handle in inner.handles.values() {
            if !handle.event_mask().intersects(event.mask()) {
                continue;
            }
            let session = match self.sessions.get(handle.session()) {
                Some(session) => session,
                None => continue,
            };
            event.increment_outstanding();
            session.add_notification(Notification::new(handle.id(), event.clone()));
            notifications += 1;
            if !recipients.iter().any(|s| s.id() == session.id()) {
                recipients.push(session);
            }
        }

        for session in &recipients {
            self.flush_session(session);
        }
        if wait && notifications > 0 {
            event.wait_for_acknowledgements();
        }
    }

    /// Delivers an event to exactly one handle (directed grant
    /// notification), regardless of its event mask.
    fn deliver_event_notification(&self, handle: &Handle, event: &Arc<Event>, wait: bool) {
        let session = match self.sessions.get(handle.session()) {
            Some(session) => session,
            None => return,
        };
        event.increment_outstanding();
        session.add_notification(Notification::new(handle.id(), event.clone()));
        self.flush_session(&session);
        if wait {
            event.wait_for_acknowledgements();
        }
    }

    /// Pushes a session's queued notifications through the sink and applies
    /// any synchronously returned acknowledgements.
    fn flush_session(&self, session: &Arc<Session>) {
        let batch = session.take_notifications();
        if batch.is_empty() {
            return;
        }
        let acked = self.sink.deliver(session.id(), &batch);
        if acked.is_empty() {
            return;
        }
        for (event, count) in session.acknowledge_events(&acked) {
            for _ in 0..count {
                event.acknowledge();
            }
        }
    }

    /// Releases any lock held by `handle` and promotes FIFO waiters. The
    /// released event fires whenever both holder sets become empty; a
    /// promotion batch bumps the lock generation exactly once.
    fn release_lock(&self, handle: &Handle, wait: bool) -> HyperspaceResult<()> {
        let node = match self.nodes.get(handle.node_name()) {
            Some(node) => node,
            None => return Ok(()),
        };
        let mut inner = node.lock();

        if !handle.is_locked() {
            return Ok(());
        }
        inner.remove_lock_holder(handle.id());
        handle.set_locked(false);

        if !inner.is_unlocked() {
            // Other shared holders remain; the mode is unchanged.
            debug_assert!(inner.holder_sets_consistent());
            return Ok(());
        }
        inner.current_lock_mode = None;
        debug_assert!(inner.holder_sets_consistent());

        let released = self.alloc_event(EventMask::LOCK_RELEASED, EventPayload::LockReleased);
        self.deliver_event_notifications(&inner, &released, wait);

        // Promote waiters: one exclusive, or the contiguous shared prefix.
        let mut grants: Vec<Arc<Handle>> = Vec::new();
        let mut next_mode: Option<LockMode> = None;
        if let Some(front) = inner.pending_lock_requests.front().copied() {
            if front.mode == LockMode::Exclusive {
                inner.pending_lock_requests.pop_front();
                next_mode = Some(LockMode::Exclusive);
                if let Some(next) = self.handles.get(front.handle) {
                    grants.push(next);
                }
            } else {
                next_mode = Some(LockMode::Shared);
                while let Some(request) = inner.pending_lock_requests.front().copied() {
                    if request.mode != LockMode::Shared {
                        break;
                    }
                    inner.pending_lock_requests.pop_front();
                    if let Some(next) = self.handles.get(request.handle) {
                        grants.push(next);
                    }
                }
            }
        }

        if let Some(mode) = next_mode {
            if !grants.is_empty() {
                let generation = inner.lock_generation + 1;
                self.persist_lock_generation(&inner, handle.node_name(), generation)?;
                inner.lock_generation = generation;
                inner.current_lock_mode = Some(mode);

                for granted in &grants {
                    inner.attach_lock_holder(granted.id(), mode);
                    granted.set_locked(true);
                    let event = self.alloc_event(
                        EventMask::LOCK_GRANTED,
                        EventPayload::LockGranted { mode, generation },
                    );
                    self.deliver_event_notification(granted, &event, wait);
                }
                debug_assert!(inner.holder_sets_consistent());

                let event = self.alloc_event(
                    EventMask::LOCK_ACQUIRED,
                    EventPayload::LockAcquired { mode },
                );
                self.deliver_event_notifications(&inner, &event, wait);
            }
        }

        Ok(())
    }

    /// Detaches a handle from its node, releasing locks first. When the
    /// node's last handle detaches, its descriptor is closed; ephemeral
    /// nodes are additionally evicted and their parent notified.
    fn destroy_handle(&self, handle: &Handle, wait: bool) -> HyperspaceResult<()> {
        self.release_lock(handle, wait)?;

        let mut removal: Option<(Arc<Node>, String)> = None;
        {
            let mut map = self.nodes.map();
            if let Some(node) = map.get(handle.node_name()).cloned() {
                let mut evict = false;
                {
                    let mut inner = node.lock();
                    inner.detach_handle(handle.id());
                    inner.purge_pending(handle.id());
                    if inner.reference_count() == 0 {
                        // Dropping the descriptor closes it; an ephemeral
                        // node's unlinked inode goes with it.
                        inner.file = None;
                        evict = inner.ephemeral;
                    }
                }
                if evict {
                    map.remove(handle.node_name());
                    removal = NodeTable::find_parent_in(&map, handle.node_name())
                        .map(|(parent, child)| (parent, child.to_string()));
                }
            }
        }

        if let Some((parent, child)) = removal {
            let inner = parent.lock();
            let event = self.alloc_event(
                EventMask::CHILD_NODE_REMOVED,
                EventPayload::Named {
                    kind: NamedEventKind::ChildRemoved,
                    name: child,
                },
            );
            self.deliver_event_notifications(&inner, &event, wait);
        }

        Ok(())
    }
}

impl std::fmt::Debug for Master {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master")
            .field("namespace", &self.namespace)
            .field("sessions", &self.sessions.len())
            .field("handles", &self.handles.len())
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
