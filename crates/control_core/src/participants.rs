use std::collections::HashMap;

use shared::domain::{GroupId, Participant, ParticipantSessionId};
use tokio::sync::RwLock;

/// Participants currently present in the session, keyed by remote session id.
/// Readers always receive a full snapshot, so a group change is never
/// observed half-applied.
#[derive(Default)]
pub struct ParticipantRegistry {
    participants: RwLock<HashMap<ParticipantSessionId, Participant>>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, participant: Participant) {
        self.participants
            .write()
            .await
            .insert(participant.session_id.clone(), participant);
    }

    pub async fn remove(&self, session_id: &ParticipantSessionId) -> Option<Participant> {
        self.participants.write().await.remove(session_id)
    }

    pub async fn get(&self, session_id: &ParticipantSessionId) -> Option<Participant> {
        self.participants.read().await.get(session_id).cloned()
    }

    /// Sets the participant's group and returns the updated copy. Departed
    /// participants are not re-added.
    pub async fn assign_group(&self, participant: &Participant, group_id: &GroupId) -> Participant {
        let mut guard = self.participants.write().await;
        let mut updated = guard
            .get(&participant.session_id)
            .cloned()
            .unwrap_or_else(|| participant.clone());
        updated.group_id = group_id.clone();
        if let Some(entry) = guard.get_mut(&participant.session_id) {
            *entry = updated.clone();
        }
        updated
    }

    pub async fn len(&self) -> usize {
        self.participants.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.participants.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.participants.write().await.clear();
    }
}
