//! Bounded ingestion queue.
//!
//! Hand-off buffer between the transport's delivery thread (producer) and the
//! poll-cycle applier (single consumer). This queue is the only
//! synchronization point between the two execution contexts; the producer side
//! never touches timeline or auxiliary state directly.
//!
//! Overflow policy is explicit. The default drops the oldest queued event and
//! bumps a counter: a stale sensor reading is worth less than a responsive
//! transport thread. `Block` parks the producer until the consumer drains.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::event::InboundEvent;

/// What to do when a push hits the capacity limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued event and count the loss.
    DropOldest,
    /// Park the producer thread until the consumer makes room.
    Block,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::DropOldest
    }
}

/// Shared ingestion-health counters.
///
/// Bumped from both execution contexts; read by the snapshot path. These are
/// the engine's only cross-context state besides the queue contents, and they
/// are plain atomics.
#[derive(Debug, Default)]
pub struct IngestStats {
    /// Payloads the gateway could not decode (bad UTF-8, bad number, unknown topic).
    pub decode_failures: AtomicU64,
    /// Events evicted by the drop-oldest overflow policy.
    pub overflow_dropped: AtomicU64,
    /// Sensor/ML/URL events dropped because no episode was open yet.
    pub no_episode_dropped: AtomicU64,
    /// Events successfully enqueued.
    pub enqueued: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`] for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestHealth {
    pub decode_failures: u64,
    pub overflow_dropped: u64,
    pub no_episode_dropped: u64,
    pub enqueued: u64,
}

impl IngestStats {
    pub fn sample(&self) -> IngestHealth {
        IngestHealth {
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            overflow_dropped: self.overflow_dropped.load(Ordering::Relaxed),
            no_episode_dropped: self.no_episode_dropped.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
        }
    }
}

/// Bounded FIFO of decoded events.
pub struct IngestQueue {
    inner: Mutex<VecDeque<InboundEvent>>,
    space_available: Condvar,
    capacity: usize,
    policy: OverflowPolicy,
    stats: IngestStats,
}

impl IngestQueue {
    /// Create a queue. Capacity is clamped to at least 1.
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            space_available: Condvar::new(),
            capacity: capacity.max(1),
            policy,
            stats: IngestStats::default(),
        }
    }

    /// Enqueue one event from the transport delivery context.
    ///
    /// Under `DropOldest` this never blocks; under `Block` it parks until the
    /// consumer drains. Saturation is never surfaced as an error.
    pub fn push(&self, event: InboundEvent) {
        let mut queue = self.inner.lock().unwrap();
        match self.policy {
            OverflowPolicy::DropOldest => {
                if queue.len() >= self.capacity {
                    let evicted = queue.pop_front();
                    self.stats.overflow_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        kind = evicted.as_ref().map(|e| e.kind.name()).unwrap_or("?"),
                        capacity = self.capacity,
                        "ingest queue saturated, dropped oldest event"
                    );
                }
            }
            OverflowPolicy::Block => {
                while queue.len() >= self.capacity {
                    queue = self.space_available.wait(queue).unwrap();
                }
            }
        }
        queue.push_back(event);
        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Remove and return all queued events in enqueue order.
    pub fn drain(&self) -> Vec<InboundEvent> {
        let mut queue = self.inner.lock().unwrap();
        let drained: Vec<InboundEvent> = queue.drain(..).collect();
        drop(queue);
        self.space_available.notify_all();
        drained
    }

    /// Number of events currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shared health counters.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }
}
