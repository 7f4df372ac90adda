//! Core identifier, flag, and error types for the Hyperspace service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a client session maintained by lease renewal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a new SessionId from a raw u64 value.
    pub fn new(id: u64) -> Self {
        SessionId(id)
    }

    /// Returns the raw u64 value of this session ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies an open handle on a namespace node, scoped to a session.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    /// Creates a new HandleId from a raw u64 value.
    pub fn new(id: u64) -> Self {
        HandleId(id)
    }

    /// Returns the raw u64 value of this handle ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies an event; ids are allocated monotonically and order delivery.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// Creates a new EventId from a raw u64 value.
    pub fn new(id: u64) -> Self {
        EventId(id)
    }

    /// Returns the raw u64 value of this event ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Flags for opening a namespace node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Read access.
    pub const READ: OpenFlags = OpenFlags(0x01);
    /// Write access.
    pub const WRITE: OpenFlags = OpenFlags(0x02);
    /// The handle may be used to acquire locks.
    pub const LOCK: OpenFlags = OpenFlags(0x04);
    /// Create the backing file if it does not exist.
    pub const CREATE: OpenFlags = OpenFlags(0x08);
    /// With CREATE, fail if the node already exists.
    pub const EXCL: OpenFlags = OpenFlags(0x10);
    /// Ephemeral node: unlinked at creation, removed when the last handle
    /// closes.
    pub const TEMP: OpenFlags = OpenFlags(0x20);

    /// Builds flags from a raw bitmask.
    pub fn from_bits(bits: u32) -> Self {
        OpenFlags(bits)
    }

    /// Returns the raw bitmask.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Checks whether any bit of `other` is set in this flags value.
    pub fn contains(&self, other: OpenFlags) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for OpenFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        OpenFlags(self.0 | rhs.0)
    }
}

/// Event interest mask carried by a handle, matched against emitted events.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventMask(u32);

impl EventMask {
    /// An extended attribute was set on the node.
    pub const ATTR_SET: EventMask = EventMask(0x0001);
    /// An extended attribute was deleted from the node.
    pub const ATTR_DEL: EventMask = EventMask(0x0002);
    /// A child entry was added under the node.
    pub const CHILD_NODE_ADDED: EventMask = EventMask(0x0004);
    /// A child entry was removed under the node.
    pub const CHILD_NODE_REMOVED: EventMask = EventMask(0x0008);
    /// A lock was acquired on the node.
    pub const LOCK_ACQUIRED: EventMask = EventMask(0x0010);
    /// The node became unlocked.
    pub const LOCK_RELEASED: EventMask = EventMask(0x0020);
    /// A pending lock request of this handle was granted.
    pub const LOCK_GRANTED: EventMask = EventMask(0x0040);
    /// All event kinds.
    pub const ALL: EventMask = EventMask(0x007F);

    /// Builds a mask from a raw bitmask.
    pub fn from_bits(bits: u32) -> Self {
        EventMask(bits)
    }

    /// Returns the raw bitmask.
    pub fn bits(&self) -> u32 {
        self.0
    }

    /// Returns true if this mask and `other` share any bit.
    pub fn intersects(&self, other: EventMask) -> bool {
        (self.0 & other.0) != 0
    }
}

impl std::ops::BitOr for EventMask {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        EventMask(self.0 | rhs.0)
    }
}

/// Advisory lock mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum LockMode {
    /// Shared lock: any number of shared holders.
    Shared = 1,
    /// Exclusive lock: a single holder.
    Exclusive = 2,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "SHARED"),
            LockMode::Exclusive => write!(f, "EXCLUSIVE"),
        }
    }
}

/// Outcome of a lock request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    /// The lock was acquired; carries the node's new lock generation.
    Granted(u64),
    /// The request was queued; a LockGranted event will follow.
    Pending,
    /// The lock is held and the request was try-only.
    Busy,
}

/// Result type alias for Hyperspace operations.
pub type HyperspaceResult<T> = Result<T, HyperspaceError>;

/// Error variants for Hyperspace operations.
#[derive(Debug, thiserror::Error)]
pub enum HyperspaceError {
    /// The pathname is malformed or names a missing component.
    #[error("bad pathname '{0}'")]
    BadPathname(String),

    /// The node already exists.
    #[error("file exists: {0}")]
    FileExists(String),

    /// The node does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The operation was denied by the backing filesystem.
    #[error("permission denied")]
    PermissionDenied,

    /// The requested extended attribute does not exist.
    #[error("attribute '{0}' not found")]
    AttrNotFound(String),

    /// The session is unknown or its lease has expired.
    #[error("session {0} expired")]
    ExpiredSession(SessionId),

    /// The handle is unknown or already closed.
    #[error("invalid handle {0}")]
    InvalidHandle(HandleId),

    /// The handle's open flags do not permit the operation.
    #[error("mode restriction: {0}")]
    ModeRestriction(&'static str),

    /// The request violated the wire protocol.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration value for {key}: '{value}'")]
    InvalidConfig {
        /// The property key being parsed.
        key: String,
        /// The offending value.
        value: String,
    },

    /// The base directory is exclusively locked by another master.
    #[error("base directory '{0}' is locked by another process")]
    BaseDirLocked(String),

    /// An unrecoverable I/O error on the backing namespace.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HyperspaceError {
    /// Maps an OS error to the Hyperspace taxonomy, following the errno
    /// table of the wire protocol: `ENOTDIR|ENAMETOOLONG|ENOENT →
    /// BadPathname`, `EACCES|EPERM → PermissionDenied`, `EEXIST →
    /// FileExists`, `ENODATA → AttrNotFound`, everything else `Io`.
    pub fn from_io(err: std::io::Error, context: &str) -> Self {
        match err.raw_os_error() {
            Some(libc::ENOTDIR) | Some(libc::ENAMETOOLONG) | Some(libc::ENOENT) => {
                HyperspaceError::BadPathname(context.to_string())
            }
            Some(libc::EACCES) | Some(libc::EPERM) => HyperspaceError::PermissionDenied,
            Some(libc::EEXIST) => HyperspaceError::FileExists(context.to_string()),
            Some(libc::ENODATA) => HyperspaceError::AttrNotFound(context.to_string()),
            _ => HyperspaceError::Io(err),
        }
    }
}
