use std::{collections::HashMap, time::Duration};

use shared::domain::{Control, ControlId, CooldownScope, GroupId, Participant};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CooldownKey {
    Control(ControlId),
    Group(GroupId),
}

impl CooldownKey {
    /// The key a press on `control` is gated by, or `None` when the control
    /// has no cooldown configured.
    pub fn for_press(control: &Control, participant: Option<&Participant>) -> Option<Self> {
        let cooldown = control.cooldown.as_ref()?;
        Some(match cooldown.scope {
            CooldownScope::Control => CooldownKey::Control(control.control_id.clone()),
            CooldownScope::Group => CooldownKey::Group(
                participant
                    .map(|participant| participant.group_id.clone())
                    .unwrap_or_else(GroupId::default_group),
            ),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    /// The press may fire. `until` is the new expiry, if a cooldown applies.
    Accepted { until: Option<Instant> },
    Rejected { remaining: Duration },
}

impl CooldownDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CooldownDecision::Accepted { .. })
    }
}

/// Per-control and per-group cooldown expiries. Absent keys are not cooling
/// down; expired entries are pruned on lookup.
#[derive(Default)]
pub struct CooldownGate {
    expiries: Mutex<HashMap<CooldownKey, Instant>>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides whether a press may fire and, when it may, starts the new
    /// cooldown under the same lock so concurrent presses on one key cannot
    /// both be accepted.
    pub async fn check(&self, control: &Control, participant: Option<&Participant>) -> CooldownDecision {
        let (Some(key), Some(cooldown)) = (
            CooldownKey::for_press(control, participant),
            control.cooldown.as_ref(),
        ) else {
            return CooldownDecision::Accepted { until: None };
        };

        let now = Instant::now();
        let mut expiries = self.expiries.lock().await;
        expiries.retain(|_, expiry| *expiry > now);

        if let Some(expiry) = expiries.get(&key) {
            let remaining = *expiry - now;
            debug!(
                control_id = %control.control_id,
                ?key,
                remaining_ms = remaining.as_millis() as u64,
                "cooldown: rejected press"
            );
            return CooldownDecision::Rejected { remaining };
        }

        let until = now + cooldown.duration();
        expiries.insert(key, until);
        CooldownDecision::Accepted { until: Some(until) }
    }

    pub async fn expiry(&self, key: &CooldownKey) -> Option<Instant> {
        let now = Instant::now();
        let mut expiries = self.expiries.lock().await;
        expiries.retain(|_, expiry| *expiry > now);
        expiries.get(key).copied()
    }

    pub async fn clear(&self) {
        self.expiries.lock().await.clear();
    }
}

#[cfg(test)]
#[path = "tests/cooldown_tests.rs"]
mod tests;
