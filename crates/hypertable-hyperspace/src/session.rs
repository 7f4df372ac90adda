//! Client sessions and the lease-tracked session table.
//!
//! A session is a logical client connection kept alive by lease renewal.
//! It owns the client's open handles and the FIFO queue of notifications
//! awaiting delivery. The table hands out monotonically increasing ids and
//! surfaces expired sessions to the keepalive driver one at a time.

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::{Event, Notification};
use crate::types::{EventId, HandleId, HyperspaceError, HyperspaceResult, SessionId};

struct SessionState {
    lease_deadline: Instant,
    handles: HashSet<HandleId>,
    /// Notifications queued for delivery, FIFO in event-id order.
    notifications: VecDeque<Notification>,
    /// Sent but unacknowledged events, with the number of notifications of
    /// each that this session received.
    unacked: HashMap<EventId, (Arc<Event>, u32)>,
    expired: bool,
}

/// A client session maintained by lease renewal.
pub struct Session {
    id: SessionId,
    peer: SocketAddr,
    state: Mutex<SessionState>,
}

impl Session {
    fn new(id: SessionId, peer: SocketAddr, lease: Duration) -> Self {
        Self {
            id,
            peer,
            state: Mutex::new(SessionState {
                lease_deadline: Instant::now() + lease,
                handles: HashSet::new(),
                notifications: VecDeque::new(),
                unacked: HashMap::new(),
                expired: false,
            }),
        }
    }

    /// The session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The peer address the session was created for.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Moves the lease deadline forward. Returns false if the session has
    /// already expired; an expired session never becomes live again.
    pub fn renew_lease(&self, lease: Duration) -> bool {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.expired {
            return false;
        }
        state.lease_deadline = Instant::now() + lease;
        true
    }

    /// The current lease deadline.
    pub fn lease_deadline(&self) -> Instant {
        self.state.lock().expect("lock poisoned").lease_deadline
    }

    /// True once the session has been expired.
    pub fn is_expired(&self) -> bool {
        self.state.lock().expect("lock poisoned").expired
    }

    /// Marks the session expired. Idempotent; returns true on the first
    /// transition.
    pub fn expire(&self) -> bool {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.expired {
            return false;
        }
        state.expired = true;
        true
    }

    /// Records an open handle owned by this session.
    pub fn add_handle(&self, handle: HandleId) {
        self.state
            .lock()
            .expect("lock poisoned")
            .handles
            .insert(handle);
    }

    /// Forgets a handle (closed by the client).
    pub fn remove_handle(&self, handle: HandleId) {
        self.state
            .lock()
            .expect("lock poisoned")
            .handles
            .remove(&handle);
    }

    /// Drains and returns all handle ids, for the expiry cascade.
    pub fn take_handles(&self) -> Vec<HandleId> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.handles.drain().collect()
    }

    /// Enqueues a notification for delivery.
    pub fn add_notification(&self, notification: Notification) {
        self.state
            .lock()
            .expect("lock poisoned")
            .notifications
            .push_back(notification);
    }

    /// True if notifications are waiting for delivery.
    pub fn has_pending_notifications(&self) -> bool {
        !self
            .state
            .lock()
            .expect("lock poisoned")
            .notifications
            .is_empty()
    }

    /// Drains the delivery queue, moving every drained event into the
    /// unacknowledged set. The returned batch preserves FIFO order.
    pub fn take_notifications(&self) -> Vec<Notification> {
        let mut state = self.state.lock().expect("lock poisoned");
        let batch: Vec<Notification> = state.notifications.drain(..).collect();
        for notification in &batch {
            let entry = state
                .unacked
                .entry(notification.event.id())
                .or_insert_with(|| (notification.event.clone(), 0));
            entry.1 += 1;
        }
        batch
    }

    /// Applies client acknowledgements: removes the events from the
    /// unacknowledged set and returns each with its notification count.
    pub fn acknowledge_events(&self, acked: &[EventId]) -> Vec<(Arc<Event>, u32)> {
        let mut state = self.state.lock().expect("lock poisoned");
        acked
            .iter()
            .filter_map(|id| state.unacked.remove(id))
            .collect()
    }

    /// Drains everything still counting against event acknowledgement:
    /// undelivered notifications and unacknowledged deliveries. Used when
    /// the session is torn down so waiters do not block on a dead client.
    pub fn take_all_unacknowledged(&self) -> Vec<(Arc<Event>, u32)> {
        let mut state = self.state.lock().expect("lock poisoned");
        let mut counts: HashMap<EventId, (Arc<Event>, u32)> = state.unacked.drain().collect();
        for notification in state.notifications.drain(..) {
            let entry = counts
                .entry(notification.event.id())
                .or_insert_with(|| (notification.event.clone(), 0));
            entry.1 += 1;
        }
        counts.into_values().collect()
    }
}

struct SessionTableInner {
    map: HashMap<SessionId, Arc<Session>>,
}

/// Registry of live sessions with lease expiry.
pub struct SessionTable {
    lease_interval: Duration,
    next_id: AtomicU64,
    inner: Mutex<SessionTableInner>,
}

impl SessionTable {
    /// Creates a table granting leases of `lease_interval`.
    pub fn new(lease_interval: Duration) -> Self {
        Self {
            lease_interval,
            next_id: AtomicU64::new(1),
            inner: Mutex::new(SessionTableInner {
                map: HashMap::new(),
            }),
        }
    }

    /// Creates a session for `peer` and returns its id.
    pub fn create(&self, peer: SocketAddr) -> SessionId {
        let id = SessionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = Arc::new(Session::new(id, peer, self.lease_interval));
        self.inner
            .lock()
            .expect("lock poisoned")
            .map
            .insert(id, session);
        debug!(session = %id, peer = %peer, "created session");
        id
    }

    /// Looks up a live session.
    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.inner.lock().expect("lock poisoned").map.get(&id).cloned()
    }

    /// Renews a session's lease; unknown or expired sessions fail with
    /// `ExpiredSession`.
    pub fn renew(&self, id: SessionId) -> HyperspaceResult<()> {
        let session = self.get(id).ok_or(HyperspaceError::ExpiredSession(id))?;
        if session.renew_lease(self.lease_interval) {
            Ok(())
        } else {
            Err(HyperspaceError::ExpiredSession(id))
        }
    }

    /// Returns the session with the earliest lease deadline at or before
    /// `now`, removing it from the active set and marking it expired. The
    /// minimum is found by scanning, which tolerates renewals reordering
    /// deadlines arbitrarily between calls.
    pub fn next_expired(&self, now: Instant) -> Option<Arc<Session>> {
        let mut inner = self.inner.lock().expect("lock poisoned");
        let id = inner
            .map
            .values()
            .min_by_key(|session| session.lease_deadline())
            .filter(|session| session.lease_deadline() <= now)
            .map(|session| session.id())?;
        let session = inner.map.remove(&id)?;
        session.expire();
        Some(session)
    }

    /// Every live session with notifications awaiting delivery.
    pub fn sessions_with_pending(&self) -> Vec<Arc<Session>> {
        self.inner
            .lock()
            .expect("lock poisoned")
            .map
            .values()
            .filter(|session| session.has_pending_notifications())
            .cloned()
            .collect()
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock poisoned").map.len()
    }

    /// True if no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
