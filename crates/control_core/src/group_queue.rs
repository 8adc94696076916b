use std::{collections::VecDeque, sync::Arc, time::Duration};

use interactive_integration::InteractiveSession;
use shared::domain::{Board, Participant};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{participants::ParticipantRegistry, session::SessionGuard};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// What a running queue assigns against.
#[derive(Clone)]
pub struct GroupQueueContext {
    pub session: Arc<dyn InteractiveSession>,
    pub board: Arc<Board>,
    pub participants: Arc<ParticipantRegistry>,
    pub guard: SessionGuard,
}

/// Buffers joining participants and assigns their viewer groups in batches on
/// a fixed tick, so group updates reach the remote service at a bounded rate.
pub struct ParticipantGroupQueue {
    pending: Arc<Mutex<VecDeque<Participant>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
    batch_size: usize,
}

impl ParticipantGroupQueue {
    pub fn new(tick_interval: Duration, batch_size: usize) -> Self {
        Self {
            pending: Arc::new(Mutex::new(VecDeque::new())),
            timer: Mutex::new(None),
            tick_interval,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn enqueue(&self, participant: Participant) {
        self.pending.lock().await.push_back(participant);
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_running(&self) -> bool {
        self.timer
            .lock()
            .await
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Starts the tick loop, replacing any loop already running.
    pub async fn start_queue(&self, ctx: GroupQueueContext) {
        let pending = Arc::clone(&self.pending);
        let batch_size = self.batch_size;
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let task = tokio::spawn(async move {
            loop {
                ticker.tick().await;
                if !ctx.guard.is_current() {
                    break;
                }
                drain_batch(&pending, &ctx, batch_size).await;
            }
        });

        if let Some(previous) = self.timer.lock().await.replace(task) {
            previous.abort();
        }
        info!(
            interval_ms = self.tick_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "groups: queue started"
        );
    }

    /// Halts the tick loop and discards anything still queued.
    pub async fn stop_queue(&self) {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.abort();
        }
        let discarded = {
            let mut pending = self.pending.lock().await;
            let discarded = pending.len();
            pending.clear();
            discarded
        };
        if discarded > 0 {
            debug!(discarded, "groups: queue stopped with pending participants");
        }
    }

    /// Runs one tick immediately. Returns how many participants were drained.
    pub async fn tick(&self, ctx: &GroupQueueContext) -> usize {
        drain_batch(&self.pending, ctx, self.batch_size).await
    }
}

async fn drain_batch(
    pending: &Mutex<VecDeque<Participant>>,
    ctx: &GroupQueueContext,
    batch_size: usize,
) -> usize {
    let batch: Vec<Participant> = {
        let mut pending = pending.lock().await;
        let take = batch_size.min(pending.len());
        pending.drain(..take).collect()
    };
    if batch.is_empty() {
        return 0;
    }
    let drained = batch.len();

    let mut updates = Vec::new();
    for participant in &batch {
        let Some(group_id) = ctx.board.viewer_group_for(&participant.username) else {
            continue;
        };
        if &participant.group_id == group_id {
            continue;
        }
        updates.push(ctx.participants.assign_group(participant, group_id).await);
    }
    if updates.is_empty() {
        return drained;
    }

    if !ctx.guard.is_current() {
        return drained;
    }
    let assigned = updates.len();
    // Participants that left before their turn are not filtered out; the
    // remote rejects them and the failure is only logged.
    match ctx.session.update_participants(updates).await {
        Ok(()) => info!(assigned, drained, "groups: assigned viewer groups"),
        Err(err) => warn!(assigned, "groups: participant update failed: {err:#}"),
    }
    drained
}

#[cfg(test)]
#[path = "tests/group_queue_tests.rs"]
mod tests;
