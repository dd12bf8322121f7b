//! Bridge diagnostics: handle registry + counters.
//!
//! **Bridge registry**: every raw handle handed to the managed side is
//! recorded in a `HashSet<usize>`. [`crate::handle::take`] refuses handles the
//! registry does not know, so a stale or doubly-finalized handle cannot reach
//! `Box::from_raw`.
//!
//! **Counters**: bridges, thread attachments, dispatched/dropped callbacks,
//! managed faults and durable references. Exposed via [`snapshot`].
//!
//! Address-only tracking cannot tell a stale handle from a new bridge the
//! allocator placed at the same address. The slot is zeroed on finalize, which
//! covers the realistic case.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use parking_lot::Mutex;

static BRIDGE_REGISTRY: LazyLock<Mutex<HashSet<usize>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

/// Registers a bridge address. Returns `false` if already registered (bug).
pub fn register_bridge(addr: usize) -> bool {
    BRIDGE_REGISTRY.lock().insert(addr)
}

/// Unregisters a bridge address. Returns `false` if unknown.
pub fn unregister_bridge(addr: usize) -> bool {
    BRIDGE_REGISTRY.lock().remove(&addr)
}

pub fn is_registered(addr: usize) -> bool {
    BRIDGE_REGISTRY.lock().contains(&addr)
}

struct BridgeMetrics {
    bridges_created: AtomicU64,
    bridges_destroyed: AtomicU64,
    bridges_peak: AtomicU64,
    threads_attached: AtomicU64,
    threads_detached: AtomicU64,
    callbacks_dispatched: AtomicU64,
    callbacks_dropped: AtomicU64,
    managed_faults: AtomicU64,
    durable_created: AtomicU64,
    durable_released: AtomicU64,
    // Lock keeps live/peak consistent.
    bridges_live: Mutex<u64>,
}

static METRICS: LazyLock<BridgeMetrics> = LazyLock::new(|| BridgeMetrics {
    bridges_created: AtomicU64::new(0),
    bridges_destroyed: AtomicU64::new(0),
    bridges_peak: AtomicU64::new(0),
    threads_attached: AtomicU64::new(0),
    threads_detached: AtomicU64::new(0),
    callbacks_dispatched: AtomicU64::new(0),
    callbacks_dropped: AtomicU64::new(0),
    managed_faults: AtomicU64::new(0),
    durable_created: AtomicU64::new(0),
    durable_released: AtomicU64::new(0),
    bridges_live: Mutex::new(0),
});

pub fn record_bridge_created() {
    METRICS.bridges_created.fetch_add(1, Ordering::Relaxed);
    let mut live = METRICS.bridges_live.lock();
    *live += 1;
    let current = *live;
    if current > METRICS.bridges_peak.load(Ordering::Relaxed) {
        METRICS.bridges_peak.store(current, Ordering::Relaxed);
    }
}

pub fn record_bridge_destroyed() {
    METRICS.bridges_destroyed.fetch_add(1, Ordering::Relaxed);
    let mut live = METRICS.bridges_live.lock();
    *live = live.saturating_sub(1);
}

pub fn record_thread_attached() {
    METRICS.threads_attached.fetch_add(1, Ordering::Relaxed);
}

pub fn record_thread_detached() {
    METRICS.threads_detached.fetch_add(1, Ordering::Relaxed);
}

pub fn record_callback_dispatched() {
    METRICS.callbacks_dispatched.fetch_add(1, Ordering::Relaxed);
}

pub fn record_callback_dropped() {
    METRICS.callbacks_dropped.fetch_add(1, Ordering::Relaxed);
}

pub fn record_managed_fault() {
    METRICS.managed_faults.fetch_add(1, Ordering::Relaxed);
}

pub fn record_durable_created() {
    METRICS.durable_created.fetch_add(1, Ordering::Relaxed);
}

pub fn record_durable_released() {
    METRICS.durable_released.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time copy of the process-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeMetricsSnapshot {
    pub bridges_created: u64,
    pub bridges_destroyed: u64,
    pub bridges_peak: u64,
    pub bridges_live: u64,
    pub threads_attached: u64,
    pub threads_detached: u64,
    pub callbacks_dispatched: u64,
    pub callbacks_dropped: u64,
    pub managed_faults: u64,
    pub durable_created: u64,
    pub durable_released: u64,
}

pub fn snapshot() -> BridgeMetricsSnapshot {
    BridgeMetricsSnapshot {
        bridges_created: METRICS.bridges_created.load(Ordering::Relaxed),
        bridges_destroyed: METRICS.bridges_destroyed.load(Ordering::Relaxed),
        bridges_peak: METRICS.bridges_peak.load(Ordering::Relaxed),
        bridges_live: *METRICS.bridges_live.lock(),
        threads_attached: METRICS.threads_attached.load(Ordering::Relaxed),
        threads_detached: METRICS.threads_detached.load(Ordering::Relaxed),
        callbacks_dispatched: METRICS.callbacks_dispatched.load(Ordering::Relaxed),
        callbacks_dropped: METRICS.callbacks_dropped.load(Ordering::Relaxed),
        managed_faults: METRICS.managed_faults.load(Ordering::Relaxed),
        durable_created: METRICS.durable_created.load(Ordering::Relaxed),
        durable_released: METRICS.durable_released.load(Ordering::Relaxed),
    }
}
