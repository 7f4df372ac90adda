//! End-to-end coordination scenarios: lock handoff, shared promotion,
//! lease expiry teardown, and ephemeral-node lifecycle, driven through the
//! public master API over a real tempdir-backed namespace.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hypertable_hyperspace::event::{EventPayload, NamedEventKind};
use hypertable_hyperspace::{
    EventId, EventMask, HandleId, HyperspaceConfig, HyperspaceError, KeepaliveService, LockMode,
    LockStatus, Master, Notification, NotificationSink, OpenFlags, SessionId,
};

#[derive(Clone, Debug)]
struct Delivery {
    session: SessionId,
    #[allow(dead_code)]
    handle: HandleId,
    event_id: EventId,
    payload: EventPayload,
}

/// Test transport: records every delivery and acknowledges immediately.
struct RecordingSink {
    deliveries: Mutex<Vec<Delivery>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
        }
    }

    fn for_session(&self, session: SessionId) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.session == session)
            .cloned()
            .collect()
    }

    fn clear(&self) {
        self.deliveries.lock().unwrap().clear();
    }
}

impl NotificationSink for RecordingSink {
    fn deliver(&self, session: SessionId, batch: &[Notification]) -> Vec<EventId> {
        let mut log = self.deliveries.lock().unwrap();
        for notification in batch {
            log.push(Delivery {
                session,
                handle: notification.handle,
                event_id: notification.event.id(),
                payload: notification.event.payload().clone(),
            });
        }
        batch.iter().map(|n| n.event.id()).collect()
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    master: Arc<Master>,
    sink: Arc<RecordingSink>,
}

fn fixture() -> Fixture {
    fixture_with_lease(60_000)
}

fn fixture_with_lease(lease_ms: u64) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = HyperspaceConfig {
        lease_interval_ms: lease_ms,
        keepalive_interval_ms: 10,
        base_dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    let sink = Arc::new(RecordingSink::new());
    let master = Arc::new(Master::new(config, sink.clone()).unwrap());
    Fixture {
        _dir: dir,
        master,
        sink,
    }
}

fn peer() -> SocketAddr {
    "127.0.0.1:38040".parse().unwrap()
}

fn lock_flags() -> OpenFlags {
    OpenFlags::READ | OpenFlags::WRITE | OpenFlags::LOCK | OpenFlags::CREATE
}

fn generation_attr(master: &Master, session: SessionId, handle: HandleId) -> u64 {
    let bytes = master
        .attr_get(session, handle, "lock.generation")
        .unwrap();
    u64::from_le_bytes(bytes.as_slice().try_into().unwrap())
}

#[test]
fn exclusive_handoff_grants_next_waiter_with_one_bump() {
    let fx = fixture();
    let s1 = fx.master.create_session(peer());
    let s2 = fx.master.create_session(peer());

    let (h1, created) = fx
        .master
        .open(s1, "/a", lock_flags(), EventMask::ALL)
        .unwrap();
    assert!(created);
    let (h2, created) = fx
        .master
        .open(s2, "/a", lock_flags(), EventMask::ALL)
        .unwrap();
    assert!(!created);

    let g0 = match fx.master.lock(s1, h1, LockMode::Exclusive, false).unwrap() {
        LockStatus::Granted(g) => g,
        other => panic!("expected Granted, got {:?}", other),
    };

    assert_eq!(
        fx.master.lock(s2, h2, LockMode::Exclusive, false).unwrap(),
        LockStatus::Pending
    );

    fx.sink.clear();
    fx.master.release(s1, h1).unwrap();

    let granted: Vec<Delivery> = fx
        .sink
        .for_session(s2)
        .into_iter()
        .filter(|d| matches!(d.payload, EventPayload::LockGranted { .. }))
        .collect();
    assert_eq!(granted.len(), 1);
    match granted[0].payload {
        EventPayload::LockGranted { mode, generation } => {
            assert_eq!(mode, LockMode::Exclusive);
            assert_eq!(generation, g0 + 1);
        }
        _ => unreachable!(),
    }

    // Durable on the backing inode before anyone observed the grant.
    assert_eq!(generation_attr(&fx.master, s2, h2), g0 + 1);
}

#[test]
fn queued_shared_waiters_promote_together_with_one_bump() {
    let fx = fixture();
    let s0 = fx.master.create_session(peer());
    let (h0, _) = fx
        .master
        .open(s0, "/b", lock_flags(), EventMask::ALL)
        .unwrap();
    let g0 = match fx.master.lock(s0, h0, LockMode::Exclusive, false).unwrap() {
        LockStatus::Granted(g) => g,
        other => panic!("expected Granted, got {:?}", other),
    };

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let s = fx.master.create_session(peer());
        let (h, _) = fx
            .master
            .open(s, "/b", lock_flags(), EventMask::ALL)
            .unwrap();
        assert_eq!(
            fx.master.lock(s, h, LockMode::Shared, false).unwrap(),
            LockStatus::Pending
        );
        waiters.push((s, h));
    }

    fx.sink.clear();
    fx.master.release(s0, h0).unwrap();

    // Every waiter was granted the same generation: one bump per handoff.
    for (s, _) in &waiters {
        let grants: Vec<Delivery> = fx
            .sink
            .for_session(*s)
            .into_iter()
            .filter(|d| matches!(d.payload, EventPayload::LockGranted { .. }))
            .collect();
        assert_eq!(grants.len(), 1);
        match grants[0].payload {
            EventPayload::LockGranted { mode, generation } => {
                assert_eq!(mode, LockMode::Shared);
                assert_eq!(generation, g0 + 1);
            }
            _ => unreachable!(),
        }
    }
    let (s, h) = waiters[0];
    assert_eq!(generation_attr(&fx.master, s, h), g0 + 1);

    // A single LockAcquired(SHARED) broadcast covered the batch.
    let acquired_ids: std::collections::HashSet<EventId> = fx
        .sink
        .deliveries
        .lock()
        .unwrap()
        .iter()
        .filter(|d| {
            matches!(
                d.payload,
                EventPayload::LockAcquired {
                    mode: LockMode::Shared
                }
            )
        })
        .map(|d| d.event_id)
        .collect();
    assert_eq!(acquired_ids.len(), 1);
}

#[test]
fn sequential_shared_grants_have_strictly_increasing_generations() {
    let fx = fixture();
    let mut generations = Vec::new();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let s = fx.master.create_session(peer());
        let (h, _) = fx
            .master
            .open(s, "/c", lock_flags(), EventMask::ALL)
            .unwrap();
        handles.push((s, h));
    }
    fx.sink.clear();
    for (s, h) in &handles {
        match fx.master.lock(*s, *h, LockMode::Shared, false).unwrap() {
            LockStatus::Granted(g) => generations.push(g),
            other => panic!("expected Granted, got {:?}", other),
        }
    }
    assert!(generations.windows(2).all(|w| w[0] < w[1]));

    // Only the None -> Shared transition was broadcast.
    let acquired_ids: std::collections::HashSet<EventId> = fx
        .sink
        .deliveries
        .lock()
        .unwrap()
        .iter()
        .filter(|d| matches!(d.payload, EventPayload::LockAcquired { .. }))
        .map(|d| d.event_id)
        .collect();
    assert_eq!(acquired_ids.len(), 1);
}

#[test]
fn expired_session_hands_lock_to_first_waiter() {
    let fx = fixture_with_lease(80);
    let s1 = fx.master.create_session(peer());
    let s2 = fx.master.create_session(peer());

    let (h1, _) = fx
        .master
        .open(s1, "/c", lock_flags(), EventMask::ALL)
        .unwrap();
    let (h2, _) = fx
        .master
        .open(s2, "/c", lock_flags(), EventMask::ALL)
        .unwrap();

    let g0 = match fx.master.lock(s1, h1, LockMode::Exclusive, false).unwrap() {
        LockStatus::Granted(g) => g,
        other => panic!("expected Granted, got {:?}", other),
    };
    assert_eq!(
        fx.master.lock(s2, h2, LockMode::Exclusive, false).unwrap(),
        LockStatus::Pending
    );

    fx.sink.clear();
    // Keep s2 alive while s1's lease lapses.
    for _ in 0..10 {
        std::thread::sleep(Duration::from_millis(10));
        fx.master.renew_lease(s2).unwrap();
    }
    fx.master.keepalive_tick();

    assert!(matches!(
        fx.master.renew_lease(s1),
        Err(HyperspaceError::ExpiredSession(_))
    ));

    let grants: Vec<Delivery> = fx
        .sink
        .for_session(s2)
        .into_iter()
        .filter(|d| matches!(d.payload, EventPayload::LockGranted { .. }))
        .collect();
    assert_eq!(grants.len(), 1);
    match grants[0].payload {
        EventPayload::LockGranted { mode, generation } => {
            assert_eq!(mode, LockMode::Exclusive);
            assert_eq!(generation, g0 + 1);
        }
        _ => unreachable!(),
    }
    assert_eq!(generation_attr(&fx.master, s2, h2), g0 + 1);
}

#[test]
fn ephemeral_node_lifecycle_notifies_parent_in_order() {
    let fx = fixture();
    let watcher = fx.master.create_session(peer());
    let owner = fx.master.create_session(peer());

    fx.master.mkdir(watcher, "/d").unwrap();
    let (_wh, _) = fx
        .master
        .open(
            watcher,
            "/d",
            OpenFlags::READ,
            EventMask::CHILD_NODE_ADDED | EventMask::CHILD_NODE_REMOVED,
        )
        .unwrap();

    let (eh, created) = fx
        .master
        .open(
            owner,
            "/d/e",
            OpenFlags::TEMP | OpenFlags::CREATE | OpenFlags::READ | OpenFlags::WRITE,
            EventMask::from_bits(0),
        )
        .unwrap();
    assert!(created);

    // Unlinked at creation: the inode lives only through the descriptor.
    assert!(!fx.master.exists(watcher, "/d/e").unwrap());
    assert!(fx.master.nodes().get("/d/e").is_some());

    fx.master.close(owner, eh).unwrap();

    assert!(fx.master.nodes().get("/d/e").is_none());
    assert!(!fx.master.exists(watcher, "/d/e").unwrap());

    let named: Vec<(NamedEventKind, String, EventId)> = fx
        .sink
        .for_session(watcher)
        .into_iter()
        .filter_map(|d| match d.payload {
            EventPayload::Named { kind, name } => Some((kind, name, d.event_id)),
            _ => None,
        })
        .collect();
    assert_eq!(named.len(), 2);
    assert_eq!(named[0].0, NamedEventKind::ChildAdded);
    assert_eq!(named[0].1, "e");
    assert_eq!(named[1].0, NamedEventKind::ChildRemoved);
    assert_eq!(named[1].1, "e");
    assert!(named[0].2 < named[1].2, "events must arrive in id order");
}

#[test]
fn mkdir_then_delete_restores_namespace_and_notifies() {
    let fx = fixture();
    let s = fx.master.create_session(peer());

    fx.master.mkdir(s, "/p").unwrap();
    let (_h, _) = fx
        .master
        .open(
            s,
            "/p",
            OpenFlags::READ,
            EventMask::CHILD_NODE_ADDED | EventMask::CHILD_NODE_REMOVED,
        )
        .unwrap();

    fx.master.mkdir(s, "/p/q").unwrap();
    assert!(fx.master.exists(s, "/p/q").unwrap());
    fx.master.delete(s, "/p/q").unwrap();
    assert!(!fx.master.exists(s, "/p/q").unwrap());

    let kinds: Vec<NamedEventKind> = fx
        .sink
        .for_session(s)
        .into_iter()
        .filter_map(|d| match d.payload {
            EventPayload::Named { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        kinds,
        vec![NamedEventKind::ChildAdded, NamedEventKind::ChildRemoved]
    );
}

#[test]
fn open_create_excl_fails_on_open_node() {
    let fx = fixture();
    let s1 = fx.master.create_session(peer());
    let s2 = fx.master.create_session(peer());

    fx.master
        .open(s1, "/x", OpenFlags::CREATE | OpenFlags::WRITE, EventMask::ALL)
        .unwrap();
    assert!(matches!(
        fx.master.open(
            s2,
            "/x",
            OpenFlags::CREATE | OpenFlags::EXCL | OpenFlags::WRITE,
            EventMask::ALL
        ),
        Err(HyperspaceError::FileExists(_))
    ));
}

#[test]
fn temp_open_of_permanent_entry_fails() {
    let fx = fixture();
    let s1 = fx.master.create_session(peer());
    let s2 = fx.master.create_session(peer());

    let (h, _) = fx
        .master
        .open(s1, "/perm", OpenFlags::CREATE | OpenFlags::WRITE, EventMask::ALL)
        .unwrap();
    // Close so the node keeps its table entry but drops the descriptor.
    fx.master.close(s1, h).unwrap();

    assert!(matches!(
        fx.master.open(
            s2,
            "/perm",
            OpenFlags::TEMP | OpenFlags::WRITE,
            EventMask::ALL
        ),
        Err(HyperspaceError::FileExists(_))
    ));
}

#[test]
fn lock_requires_lock_and_write_flags() {
    let fx = fixture();
    let s = fx.master.create_session(peer());

    let (no_lock, _) = fx
        .master
        .open(s, "/f1", OpenFlags::CREATE | OpenFlags::WRITE, EventMask::ALL)
        .unwrap();
    assert!(matches!(
        fx.master.lock(s, no_lock, LockMode::Exclusive, false),
        Err(HyperspaceError::ModeRestriction(_))
    ));

    let (no_write, _) = fx
        .master
        .open(
            s,
            "/f2",
            OpenFlags::CREATE | OpenFlags::READ | OpenFlags::LOCK,
            EventMask::ALL,
        )
        .unwrap();
    assert!(matches!(
        fx.master.lock(s, no_write, LockMode::Exclusive, false),
        Err(HyperspaceError::ModeRestriction(_))
    ));
}

#[test]
fn lock_on_directory_handle_is_restricted() {
    let fx = fixture();
    let s = fx.master.create_session(peer());
    fx.master.mkdir(s, "/dir").unwrap();

    let (h, _) = fx
        .master
        .open(
            s,
            "/dir",
            OpenFlags::READ | OpenFlags::WRITE | OpenFlags::LOCK,
            EventMask::ALL,
        )
        .unwrap();
    assert!(matches!(
        fx.master.lock(s, h, LockMode::Exclusive, false),
        Err(HyperspaceError::ModeRestriction(_))
    ));
}

#[test]
fn try_lock_reports_busy_without_queueing() {
    let fx = fixture();
    let s1 = fx.master.create_session(peer());
    let s2 = fx.master.create_session(peer());

    let (h1, _) = fx
        .master
        .open(s1, "/busy", lock_flags(), EventMask::ALL)
        .unwrap();
    let (h2, _) = fx
        .master
        .open(s2, "/busy", lock_flags(), EventMask::ALL)
        .unwrap();

    fx.master.lock(s1, h1, LockMode::Exclusive, false).unwrap();
    assert_eq!(
        fx.master.lock(s2, h2, LockMode::Exclusive, true).unwrap(),
        LockStatus::Busy
    );
    assert_eq!(
        fx.master.lock(s2, h2, LockMode::Shared, true).unwrap(),
        LockStatus::Busy
    );

    // Busy try-requests were not queued: release leaves the node free.
    fx.master.release(s1, h1).unwrap();
    match fx.master.lock(s2, h2, LockMode::Exclusive, true).unwrap() {
        LockStatus::Granted(g) => assert_eq!(g, generation_attr(&fx.master, s2, h2)),
        other => panic!("expected Granted, got {:?}", other),
    }
}

#[test]
fn shared_holders_admit_shared_try_lock() {
    let fx = fixture();
    let s1 = fx.master.create_session(peer());
    let s2 = fx.master.create_session(peer());

    let (h1, _) = fx
        .master
        .open(s1, "/shared", lock_flags(), EventMask::ALL)
        .unwrap();
    let (h2, _) = fx
        .master
        .open(s2, "/shared", lock_flags(), EventMask::ALL)
        .unwrap();

    fx.master.lock(s1, h1, LockMode::Shared, false).unwrap();
    assert!(matches!(
        fx.master.lock(s2, h2, LockMode::Shared, true).unwrap(),
        LockStatus::Granted(_)
    ));
}

#[test]
fn attr_operations_roundtrip_and_notify() {
    let fx = fixture();
    let s = fx.master.create_session(peer());
    let (h, _) = fx
        .master
        .open(
            s,
            "/attrs",
            OpenFlags::CREATE | OpenFlags::WRITE,
            EventMask::ATTR_SET | EventMask::ATTR_DEL,
        )
        .unwrap();

    fx.master.attr_set(s, h, "schema", b"v7").unwrap();
    assert_eq!(fx.master.attr_get(s, h, "schema").unwrap(), b"v7".to_vec());

    fx.master.attr_del(s, h, "schema").unwrap();
    assert!(matches!(
        fx.master.attr_get(s, h, "schema"),
        Err(HyperspaceError::AttrNotFound(_))
    ));
    assert!(matches!(
        fx.master.attr_del(s, h, "schema"),
        Err(HyperspaceError::AttrNotFound(_))
    ));

    let kinds: Vec<NamedEventKind> = fx
        .sink
        .for_session(s)
        .into_iter()
        .filter_map(|d| match d.payload {
            EventPayload::Named { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(kinds, vec![NamedEventKind::AttrSet, NamedEventKind::AttrDel]);
}

#[test]
fn operations_on_unknown_session_or_handle_fail() {
    let fx = fixture();
    let s = fx.master.create_session(peer());

    assert!(matches!(
        fx.master.mkdir(SessionId::new(999), "/nope"),
        Err(HyperspaceError::ExpiredSession(_))
    ));

    let (h, _) = fx
        .master
        .open(s, "/once", OpenFlags::CREATE | OpenFlags::WRITE, EventMask::ALL)
        .unwrap();
    fx.master.close(s, h).unwrap();
    assert!(matches!(
        fx.master.close(s, h),
        Err(HyperspaceError::InvalidHandle(_))
    ));
}

#[test]
fn keepalive_service_expires_sessions_in_background() {
    let fx = fixture_with_lease(30);
    let s = fx.master.create_session(peer());
    assert!(fx.master.sessions().get(s).is_some());

    let mut service = KeepaliveService::spawn(fx.master.clone()).unwrap();
    std::thread::sleep(Duration::from_millis(150));
    service.stop();

    assert!(fx.master.sessions().get(s).is_none());
    assert!(matches!(
        fx.master.renew_lease(s),
        Err(HyperspaceError::ExpiredSession(_))
    ));
}
