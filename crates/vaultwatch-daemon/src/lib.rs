//! vaultwatch daemon orchestration logic.
//!
//! The [`Daemon`] struct owns the engine and the poll loop: once per
//! configured interval it drains the ingestion queue, applies events, pulls
//! new inference-log entries, and logs a snapshot summary. The transport
//! binding is external; it gets a [`Gateway`] handle from
//! [`Daemon::gateway`] and calls `deliver` on its own delivery thread.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{debug, info};

use vaultwatch_core::config::VaultConfig;
use vaultwatch_core::gateway::CommandPublisher;
use vaultwatch_core::{Engine, Gateway, IngestQueue, Snapshot};

/// Publisher used when no transport binding is attached: commands are logged
/// and discarded. Matches the fire-and-forget contract.
pub struct LogPublisher;

impl CommandPublisher for LogPublisher {
    fn publish(&self, topic: &str, payload: &[u8]) {
        info!(
            topic,
            payload = %String::from_utf8_lossy(payload),
            "outbound command (no transport attached)"
        );
    }
}

/// The daemon: engine, gateway, and poll loop in one process.
pub struct Daemon {
    config: VaultConfig,
    engine: Engine,
    gateway: Arc<Gateway>,
}

impl Daemon {
    /// Wire up queue, gateway, and engine from the configuration.
    pub fn new(config: VaultConfig, publisher: Arc<dyn CommandPublisher>) -> Self {
        let queue = Arc::new(IngestQueue::new(
            config.ingest.queue_capacity,
            config.ingest.overflow,
        ));
        let gateway = Arc::new(Gateway::new(
            config.topics.clone(),
            Arc::clone(&queue),
            publisher,
        ));
        let engine = Engine::new(config.fusion.clone(), queue);
        Self {
            config,
            engine,
            gateway,
        }
    }

    /// Handle for the transport binding. `deliver` may be called from any
    /// thread; the queue is the only shared state underneath.
    pub fn gateway(&self) -> Arc<Gateway> {
        Arc::clone(&self.gateway)
    }

    /// Run one poll cycle: drain, apply, backfill. Returns the fresh snapshot.
    pub fn poll_once(&mut self) -> Snapshot {
        let drained = self.engine.drain_and_apply();
        let backfilled = self.engine.backfill(&self.config.backfill.results_path);

        if drained.applied > 0 || drained.dropped_no_episode > 0 {
            debug!(
                applied = drained.applied,
                dropped_no_episode = drained.dropped_no_episode,
                "poll cycle applied events"
            );
        }
        if backfilled.face_admitted > 0 || backfilled.voice_admitted > 0 {
            debug!(
                face = backfilled.face_admitted,
                voice = backfilled.voice_admitted,
                "backfilled inference results"
            );
        }

        self.engine.snapshot()
    }

    /// Run the poll loop until ctrl-c. Queued events at shutdown are discarded.
    pub async fn run(mut self) -> Result<()> {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.poll.interval_ms.max(1)));
        info!(
            interval_ms = self.config.poll.interval_ms,
            results = %self.config.backfill.results_path.display(),
            "vaultwatch poll loop started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.poll_once();
                    if let Some(latest) = snapshot.episodes.last() {
                        debug!(
                            episodes = snapshot.episodes.len(),
                            latest_status = %latest.status,
                            latest_label = %latest.fused_label,
                            "snapshot"
                        );
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    let snapshot = self.engine.snapshot();
                    info!(
                        episodes = snapshot.episodes.len(),
                        decode_failures = snapshot.health.decode_failures,
                        overflow_dropped = snapshot.health.overflow_dropped,
                        "shutting down"
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    /// Direct engine access for embedders and tests.
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }
}
