use super::*;
use crate::test_support::{arcade_board, participant, FakeSession};
use shared::domain::GroupId;
use std::sync::atomic::AtomicU64;

fn context(session: Arc<FakeSession>, participants: Arc<ParticipantRegistry>) -> GroupQueueContext {
    let session: Arc<dyn InteractiveSession> = session;
    GroupQueueContext {
        session,
        board: Arc::new(arcade_board()),
        participants,
        guard: SessionGuard::detached(),
    }
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn empty_tick_is_a_no_op() {
    let session = FakeSession::new();
    let queue = ParticipantGroupQueue::new(DEFAULT_TICK_INTERVAL, DEFAULT_BATCH_SIZE);
    let ctx = context(session.clone(), Arc::new(ParticipantRegistry::new()));

    assert_eq!(queue.tick(&ctx).await, 0);
    assert!(session.state().participant_updates.is_empty());
}

#[tokio::test]
async fn assigns_viewer_groups_in_one_update_per_batch() {
    let session = FakeSession::new();
    let registry = Arc::new(ParticipantRegistry::new());
    let queue = ParticipantGroupQueue::new(DEFAULT_TICK_INTERVAL, 2);
    let ctx = context(session.clone(), registry.clone());

    let alice = participant("p-1", "alice", "default");
    let bob = participant("p-2", "bob", "default");
    let shouting = participant("p-3", "ALICE", "default");
    for p in [&alice, &bob, &shouting] {
        registry.insert(p.clone()).await;
        queue.enqueue(p.clone()).await;
    }

    assert_eq!(queue.tick(&ctx).await, 2);
    assert_eq!(queue.pending_len().await, 1);
    {
        let state = session.state();
        assert_eq!(state.participant_updates.len(), 1);
        assert_eq!(
            state.participant_updates[0],
            vec![participant("p-1", "alice", "vip")]
        );
    }
    assert_eq!(
        registry.get(&alice.session_id).await.map(|p| p.group_id),
        Some(GroupId::from("vip"))
    );
    assert_eq!(
        registry.get(&bob.session_id).await.map(|p| p.group_id),
        Some(GroupId::default_group())
    );

    assert_eq!(queue.tick(&ctx).await, 1);
    assert_eq!(session.state().participant_updates.len(), 2);
    assert_eq!(queue.pending_len().await, 0);
}

#[tokio::test]
async fn batch_without_roster_matches_skips_the_remote_call() {
    let session = FakeSession::new();
    let queue = ParticipantGroupQueue::new(DEFAULT_TICK_INTERVAL, DEFAULT_BATCH_SIZE);
    let ctx = context(session.clone(), Arc::new(ParticipantRegistry::new()));

    queue.enqueue(participant("p-1", "bob", "default")).await;
    queue.enqueue(participant("p-2", "alice", "vip")).await;

    assert_eq!(queue.tick(&ctx).await, 2);
    assert!(session.state().participant_updates.is_empty());
}

#[tokio::test]
async fn departed_participant_is_drained_without_error() {
    let session = FakeSession::new();
    let registry = Arc::new(ParticipantRegistry::new());
    let queue = ParticipantGroupQueue::new(DEFAULT_TICK_INTERVAL, DEFAULT_BATCH_SIZE);
    let ctx = context(session.clone(), registry.clone());

    queue.enqueue(participant("p-1", "alice", "default")).await;

    assert_eq!(queue.tick(&ctx).await, 1);
    assert_eq!(
        session.state().participant_updates,
        vec![vec![participant("p-1", "alice", "vip")]]
    );
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn remote_failure_is_not_raised() {
    let session = FakeSession::failing(&["updateParticipants"]);
    let queue = ParticipantGroupQueue::new(DEFAULT_TICK_INTERVAL, DEFAULT_BATCH_SIZE);
    let ctx = context(session.clone(), Arc::new(ParticipantRegistry::new()));

    queue.enqueue(participant("p-1", "alice", "default")).await;

    assert_eq!(queue.tick(&ctx).await, 1);
    assert_eq!(queue.pending_len().await, 0);
    assert!(session.state().participant_updates.is_empty());
}

#[tokio::test]
async fn stale_session_sends_nothing() {
    let session = FakeSession::new();
    let queue = ParticipantGroupQueue::new(DEFAULT_TICK_INTERVAL, DEFAULT_BATCH_SIZE);
    let mut ctx = context(session.clone(), Arc::new(ParticipantRegistry::new()));
    ctx.guard = SessionGuard::new(1, Arc::new(AtomicU64::new(2)));

    queue.enqueue(participant("p-1", "alice", "default")).await;

    assert_eq!(queue.tick(&ctx).await, 1);
    assert!(session.state().participant_updates.is_empty());
}

#[tokio::test(start_paused = true)]
async fn timer_drains_one_batch_per_interval() {
    let session = FakeSession::new();
    let queue = ParticipantGroupQueue::new(Duration::from_secs(1), 1);
    let ctx = context(session.clone(), Arc::new(ParticipantRegistry::new()));

    queue.enqueue(participant("p-1", "alice", "default")).await;
    queue.enqueue(participant("p-2", "Alice", "default")).await;
    queue.enqueue(participant("p-3", "bob", "default")).await;

    queue.start_queue(ctx).await;
    settle().await;
    assert!(queue.is_running().await);
    assert_eq!(queue.pending_len().await, 2);
    assert_eq!(session.state().participant_updates.len(), 1);

    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(queue.pending_len().await, 2);

    tokio::time::advance(Duration::from_millis(500)).await;
    settle().await;
    assert_eq!(queue.pending_len().await, 1);
    assert_eq!(session.state().participant_updates.len(), 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(queue.pending_len().await, 0);
    assert_eq!(session.state().participant_updates.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn stop_discards_pending_and_restart_resumes() {
    let session = FakeSession::new();
    let queue = ParticipantGroupQueue::new(Duration::from_secs(1), 1);
    let ctx = context(session.clone(), Arc::new(ParticipantRegistry::new()));

    queue.start_queue(ctx.clone()).await;
    settle().await;
    queue.enqueue(participant("p-1", "alice", "default")).await;
    queue.enqueue(participant("p-2", "alice", "default")).await;

    queue.stop_queue().await;
    assert!(!queue.is_running().await);
    assert_eq!(queue.pending_len().await, 0);

    tokio::time::advance(Duration::from_secs(3)).await;
    settle().await;
    assert!(session.state().participant_updates.is_empty());

    queue.enqueue(participant("p-3", "alice", "default")).await;
    queue.start_queue(ctx).await;
    settle().await;
    assert!(queue.is_running().await);
    assert_eq!(queue.pending_len().await, 0);
    assert_eq!(
        session.state().participant_updates,
        vec![vec![participant("p-3", "alice", "vip")]]
    );
}

#[tokio::test(start_paused = true)]
async fn timer_exits_once_the_session_is_replaced() {
    let session = FakeSession::new();
    let queue = ParticipantGroupQueue::new(Duration::from_secs(1), DEFAULT_BATCH_SIZE);
    let current = Arc::new(AtomicU64::new(1));
    let mut ctx = context(session.clone(), Arc::new(ParticipantRegistry::new()));
    ctx.guard = SessionGuard::new(1, current.clone());

    queue.start_queue(ctx).await;
    settle().await;
    assert!(queue.is_running().await);

    current.store(2, std::sync::atomic::Ordering::SeqCst);
    queue.enqueue(participant("p-1", "alice", "default")).await;
    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;

    assert!(!queue.is_running().await);
    assert_eq!(queue.pending_len().await, 1);
    assert!(session.state().participant_updates.is_empty());
}
