use super::*;
use shared::domain::{CooldownConfig, ParticipantSessionId};

fn control(id: &str, cooldown: Option<(u64, CooldownScope)>) -> Control {
    Control {
        control_id: ControlId::from(id),
        kind: Default::default(),
        text: None,
        cost: None,
        cooldown: cooldown.map(|(duration_ms, scope)| CooldownConfig { duration_ms, scope }),
        effects: Vec::new(),
        remote_props: Default::default(),
    }
}

fn participant(session: &str, group: &str) -> Participant {
    Participant {
        session_id: ParticipantSessionId::from(session),
        username: session.to_string(),
        user_id: None,
        group_id: GroupId::from(group),
    }
}

#[tokio::test(start_paused = true)]
async fn control_without_cooldown_is_always_accepted() {
    let gate = CooldownGate::new();
    let btn = control("btn1", None);

    for _ in 0..3 {
        assert_eq!(
            gate.check(&btn, None).await,
            CooldownDecision::Accepted { until: None }
        );
    }
}

#[tokio::test(start_paused = true)]
async fn second_press_within_duration_is_rejected() {
    let gate = CooldownGate::new();
    let btn = control("btn1", Some((2000, CooldownScope::Control)));

    let first = gate.check(&btn, None).await;
    let CooldownDecision::Accepted { until: Some(until) } = first else {
        panic!("first press should start a cooldown: {first:?}");
    };
    assert_eq!(until - Instant::now(), Duration::from_millis(2000));

    tokio::time::advance(Duration::from_millis(500)).await;
    assert_eq!(
        gate.check(&btn, None).await,
        CooldownDecision::Rejected {
            remaining: Duration::from_millis(1500)
        }
    );

    tokio::time::advance(Duration::from_millis(1500)).await;
    assert!(gate.check(&btn, None).await.is_accepted());
}

#[tokio::test(start_paused = true)]
async fn group_cooldown_blocks_every_group_scoped_control() {
    let gate = CooldownGate::new();
    let left = control("left", Some((1000, CooldownScope::Group)));
    let right = control("right", Some((1000, CooldownScope::Group)));
    let vip = participant("s-1", "vip");
    let other_vip = participant("s-2", "vip");
    let regular = participant("s-3", "default");

    assert!(gate.check(&left, Some(&vip)).await.is_accepted());
    assert!(!gate.check(&right, Some(&other_vip)).await.is_accepted());
    assert!(gate.check(&right, Some(&regular)).await.is_accepted());
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_pruned_on_lookup() {
    let gate = CooldownGate::new();
    let btn = control("btn1", Some((100, CooldownScope::Control)));
    let key = CooldownKey::Control(ControlId::from("btn1"));

    assert!(gate.check(&btn, None).await.is_accepted());
    assert!(gate.expiry(&key).await.is_some());

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(gate.expiry(&key).await, None);
}

#[tokio::test(start_paused = true)]
async fn concurrent_presses_fire_once() {
    let gate = std::sync::Arc::new(CooldownGate::new());
    let btn = control("btn1", Some((1000, CooldownScope::Control)));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let gate = std::sync::Arc::clone(&gate);
        let btn = btn.clone();
        tasks.push(tokio::spawn(async move { gate.check(&btn, None).await }));
    }

    let mut accepted = 0;
    for task in tasks {
        if task.await.expect("join").is_accepted() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 1);
}
