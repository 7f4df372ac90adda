//! The keepalive driver: periodic lease expiry and notification delivery.
//!
//! One dedicated thread ticks the master at the configured keepalive
//! interval. Each tick expires every session whose lease has lapsed
//! (cascading handle, lock, and waiter teardown) and pushes pending
//! notifications to the transport. Stopping the service joins the thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::master::Master;
use crate::types::HyperspaceResult;

/// Periodic driver for session expiry and notification flushing.
pub struct KeepaliveService {
    shutdown: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl KeepaliveService {
    /// Spawns the keepalive thread for `master`.
    pub fn spawn(master: Arc<Master>) -> HyperspaceResult<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let interval = master.config().keepalive_interval();

        let thread = std::thread::Builder::new()
            .name("hyperspace-keepalive".to_string())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "keepalive service started");
                while !flag.load(Ordering::Acquire) {
                    master.keepalive_tick();
                    sleep_interruptibly(&flag, interval);
                }
                info!("keepalive service stopped");
            })?;

        Ok(Self {
            shutdown,
            thread: Some(thread),
        })
    }

    /// Signals the thread to stop and joins it.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for KeepaliveService {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Sleeps up to `total`, waking promptly if `flag` is raised.
fn sleep_interruptibly(flag: &AtomicBool, total: Duration) {
    let slice = Duration::from_millis(20);
    let mut remaining = total;
    while !flag.load(Ordering::Acquire) && remaining > Duration::ZERO {
        let nap = remaining.min(slice);
        std::thread::sleep(nap);
        remaining -= nap;
    }
}
