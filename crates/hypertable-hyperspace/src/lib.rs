#![warn(missing_docs)]

//! Hyperspace coordination service: hierarchical namespace, session leases,
//! advisory locks, extended-attribute storage, and event notifications.
//!
//! Hyperspace is the lock and metadata service of the table store. Clients
//! hold a [`session::Session`] kept alive by lease renewal, open
//! [`handle::Handle`]s on namespace [`node::Node`]s backed by a local
//! directory tree, acquire shared/exclusive advisory locks with FIFO
//! fairness, and receive ordered change notifications. [`master::Master`]
//! is the public entry point; [`keepalive::KeepaliveService`] drives lease
//! expiry and notification delivery.

pub mod config;
pub mod event;
pub mod handle;
pub mod keepalive;
pub mod master;
pub mod namespace;
pub mod node;
pub mod session;
pub mod types;

pub use config::HyperspaceConfig;
pub use event::{Event, EventPayload, NamedEventKind, Notification};
pub use handle::{Handle, HandleTable};
pub use keepalive::KeepaliveService;
pub use master::{Master, NotificationSink};
pub use namespace::NamespaceStore;
pub use node::{Node, NodeTable};
pub use session::{Session, SessionTable};
pub use types::{
    EventId, EventMask, HandleId, HyperspaceError, HyperspaceResult, LockMode, LockStatus,
    OpenFlags, SessionId,
};
