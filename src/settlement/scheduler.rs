use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::challenge::ChallengeStore;
use crate::settlement::payout::PayoutEngine;

/// Periodic settlement detector.
///
/// Scans all challenges on a fixed interval, dispatching the payout engine
/// for every challenge at capacity with no completion stamp. Also drains a
/// job queue so the join path can hand over a just-filled challenge without
/// waiting for the next tick. An in-flight set guarantees at most one active
/// settlement per challenge across both entry points.
pub struct SettlementScheduler {
    store: Arc<dyn ChallengeStore>,
    engine: Arc<PayoutEngine>,
    interval: Duration,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

/// Running scheduler: a queue entry point plus a shutdown switch
pub struct SchedulerHandle {
    queue: mpsc::Sender<Uuid>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Submit a challenge for settlement without awaiting it. Callers fire
    /// this right after the last challenger joins; the next scan picks the
    /// challenge up anyway if the queue is saturated.
    pub fn enqueue(&self, challenge_id: Uuid) {
        if self.queue.try_send(challenge_id).is_err() {
            warn!(
                "Settlement queue full, challenge {} deferred to next scan",
                challenge_id
            );
        }
    }

    /// Stop the scheduler and wait for the current cycle to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.join.await;
    }
}

impl SettlementScheduler {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        engine: Arc<PayoutEngine>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            engine,
            interval,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Start the scheduler in the background
    pub fn start(self) -> SchedulerHandle {
        let (queue_tx, mut queue_rx) = mpsc::channel::<Uuid>(64);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.scan_and_trigger().await;
                    }
                    Some(challenge_id) = queue_rx.recv() => {
                        self.settle_guarded(challenge_id).await;
                    }
                    _ = shutdown_rx.changed() => {
                        info!("Settlement scheduler stopping");
                        break;
                    }
                }
            }
        });

        SchedulerHandle {
            queue: queue_tx,
            shutdown: shutdown_tx,
            join,
        }
    }

    /// One detection pass: settle every challenge at capacity that has not
    /// completed. A failure on one challenge never aborts the rest of the
    /// scan. Returns how many settlements were dispatched.
    pub async fn scan_and_trigger(&self) -> usize {
        let challenges = match self.store.list_challenges().await {
            Ok(challenges) => challenges,
            Err(e) => {
                error!("Settlement scan failed to list challenges: {}", e);
                return 0;
            }
        };

        let mut dispatched = 0;
        for challenge in challenges {
            if challenge.completed_at.is_none() && challenge.is_full() {
                info!(
                    "Challenge {} is full ({} guesses), processing payouts",
                    challenge.id,
                    challenge.guess_count()
                );
                if self.settle_guarded(challenge.id).await {
                    dispatched += 1;
                }
            }
        }
        dispatched
    }

    /// Settle one challenge unless a settlement for it is already running.
    /// Returns whether the engine was actually invoked.
    async fn settle_guarded(&self, challenge_id: Uuid) -> bool {
        if !self.in_flight.lock().insert(challenge_id) {
            warn!(
                "Settlement for challenge {} already in flight, skipping",
                challenge_id
            );
            return false;
        }

        match self.engine.settle(challenge_id).await {
            Ok(report) => {
                if report.transfers_sent > 0 || report.transfers_skipped > 0 {
                    info!(
                        "✓ Challenge {} settled ({} sent, {} skipped)",
                        challenge_id, report.transfers_sent, report.transfers_skipped
                    );
                }
            }
            Err(e) => {
                // Challenge stays incomplete; the next scan retries it
                error!("Settlement of challenge {} failed: {}", challenge_id, e);
            }
        }

        self.in_flight.lock().remove(&challenge_id);
        true
    }
}
