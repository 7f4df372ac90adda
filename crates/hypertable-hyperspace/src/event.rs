//! Events and per-session notifications.
//!
//! Events are allocated monotonically increasing ids and fanned out to every
//! interested handle as [`Notification`]s queued on the owning session. Each
//! event counts its outstanding (unacknowledged) notifications; a mutating
//! operation that requested synchronous delivery blocks on
//! [`Event::wait_for_acknowledgements`] until every recipient session has
//! acknowledged, which is what makes cross-session ordering observable.

use serde::{Deserialize, Serialize};
use std::sync::{Condvar, Mutex};

use crate::types::{EventId, EventMask, HandleId, LockMode};

/// Kind of a named (child/attribute) event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamedEventKind {
    /// A child entry appeared under the node.
    ChildAdded,
    /// A child entry disappeared from under the node.
    ChildRemoved,
    /// An extended attribute was set.
    AttrSet,
    /// An extended attribute was deleted.
    AttrDel,
}

/// Payload of an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A named change: child added/removed, attribute set/deleted.
    Named {
        /// What happened.
        kind: NamedEventKind,
        /// The child entry or attribute name.
        name: String,
    },
    /// A lock was acquired on the node.
    LockAcquired {
        /// The mode now held.
        mode: LockMode,
    },
    /// A queued lock request of the receiving handle was granted.
    LockGranted {
        /// The granted mode.
        mode: LockMode,
        /// The node's lock generation after the grant.
        generation: u64,
    },
    /// The node became unlocked.
    LockReleased,
}

/// An event emitted on a node, shared by all notifications delivering it.
#[derive(Debug)]
pub struct Event {
    id: EventId,
    mask: EventMask,
    payload: EventPayload,
    outstanding: Mutex<u64>,
    acked: Condvar,
}

impl Event {
    /// Creates a new event.
    pub fn new(id: EventId, mask: EventMask, payload: EventPayload) -> Self {
        Self {
            id,
            mask,
            payload,
            outstanding: Mutex::new(0),
            acked: Condvar::new(),
        }
    }

    /// The event's id.
    pub fn id(&self) -> EventId {
        self.id
    }

    /// The mask handles are matched against.
    pub fn mask(&self) -> EventMask {
        self.mask
    }

    /// The event payload.
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Counts one more undelivered notification. Called before the
    /// notification is enqueued, while the emitting node's mutex is held,
    /// so an acknowledgement can never race ahead of the increment.
    pub fn increment_outstanding(&self) {
        let mut outstanding = self.outstanding.lock().expect("lock poisoned");
        *outstanding += 1;
    }

    /// Records one acknowledgement; wakes waiters when the count reaches 0.
    pub fn acknowledge(&self) {
        let mut outstanding = self.outstanding.lock().expect("lock poisoned");
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.acked.notify_all();
        }
    }

    /// Current number of unacknowledged notifications.
    pub fn outstanding(&self) -> u64 {
        *self.outstanding.lock().expect("lock poisoned")
    }

    /// Blocks until every enqueued notification has been acknowledged.
    pub fn wait_for_acknowledgements(&self) {
        let mut outstanding = self.outstanding.lock().expect("lock poisoned");
        while *outstanding > 0 {
            outstanding = self.acked.wait(outstanding).expect("lock poisoned");
        }
    }
}

/// A single delivery of an event to one handle, queued on its session.
#[derive(Clone, Debug)]
pub struct Notification {
    /// The handle the event is addressed to.
    pub handle: HandleId,
    /// The shared event.
    pub event: std::sync::Arc<Event>,
}

impl Notification {
    /// Creates a notification addressed to `handle`.
    pub fn new(handle: HandleId, event: std::sync::Arc<Event>) -> Self {
        Self { handle, event }
    }
}
