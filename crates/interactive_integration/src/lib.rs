use std::sync::Arc;

use async_trait::async_trait;
use shared::domain::{
    ControlId, Group, InputPhase, Participant, ParticipantSessionId, Scene, SceneId,
};
use tokio::sync::mpsc;

pub mod ws;

pub use ws::{WsInteractiveConnector, WsInteractiveSession};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractiveConnectOptions {
    pub auth_token: String,
    pub version_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteScene {
    pub scene_id: SceneId,
    pub control_ids: Vec<ControlId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCooldown {
    pub scene_id: SceneId,
    pub control_id: ControlId,
    /// Unix epoch milliseconds at which the control becomes usable again.
    pub until_ms: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub control_id: ControlId,
    /// Set when the transport knows which scene the control belongs to.
    pub scene_id: Option<SceneId>,
    pub phase: InputPhase,
    pub participant_session_id: Option<ParticipantSessionId>,
    pub transaction_id: Option<String>,
    /// Raw input payload, forwarded to joystick handling untouched.
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InteractiveEvent {
    Error { message: String },
    ParticipantJoined(Participant),
    ParticipantLeft { session_id: ParticipantSessionId },
    Input(InputEvent),
    Closed { reason: Option<String> },
}

#[async_trait]
pub trait InteractiveSession: Send + Sync {
    /// Synchronizes and returns the scenes that exist remotely.
    async fn get_scenes(&self) -> anyhow::Result<Vec<RemoteScene>>;
    async fn create_scenes(&self, scenes: Vec<Scene>) -> anyhow::Result<()>;
    /// Synchronizes and returns the groups that exist remotely.
    async fn get_groups(&self) -> anyhow::Result<Vec<Group>>;
    async fn create_groups(&self, groups: Vec<Group>) -> anyhow::Result<()>;
    async fn update_groups(&self, groups: Vec<Group>) -> anyhow::Result<()>;
    async fn update_participants(&self, participants: Vec<Participant>) -> anyhow::Result<()>;
    async fn set_cooldowns(&self, cooldowns: Vec<ControlCooldown>) -> anyhow::Result<()>;
    async fn capture_transaction(&self, transaction_id: &str) -> anyhow::Result<()>;
    async fn ready(&self, is_ready: bool) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
    /// The inbound event stream. Events are buffered from the moment the
    /// session opens; only the first caller receives the stream.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<InteractiveEvent>>;
}

#[async_trait]
pub trait InteractiveConnector: Send + Sync {
    async fn connect(
        &self,
        options: InteractiveConnectOptions,
    ) -> anyhow::Result<Arc<dyn InteractiveSession>>;
}
