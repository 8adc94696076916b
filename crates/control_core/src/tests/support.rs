use std::{
    collections::{HashSet, VecDeque},
    sync::{Arc, Mutex as StdMutex, MutexGuard},
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use board_store::InMemoryConfigStore;
use interactive_integration::{
    ControlCooldown, InputEvent, InteractiveConnectOptions, InteractiveConnector,
    InteractiveEvent, InteractiveSession, RemoteScene,
};
use shared::domain::{
    Board, Control, ControlId, Effect, Group, GroupId, InputPhase, Participant,
    ParticipantSessionId, Scene, SceneId,
};
use tokio::sync::mpsc;

use crate::collaborators::{
    EffectDispatcher, EffectRequest, GameControlHandler, JoystickHandler,
};

#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub scenes: Vec<RemoteScene>,
    pub groups: Vec<Group>,
    pub created_scenes: Vec<Vec<SceneId>>,
    pub created_groups: Vec<Vec<Group>>,
    pub updated_groups: Vec<Group>,
    pub participant_updates: Vec<Vec<Participant>>,
    pub cooldowns: Vec<Vec<ControlCooldown>>,
    pub captured: Vec<String>,
    pub ready: Vec<bool>,
    pub closed: usize,
    pub failing: HashSet<&'static str>,
    /// Yield inside reads and the ready handshake so concurrent callers
    /// interleave.
    pub interleave: bool,
}

/// Remote session double. Records every call and fails the methods listed
/// in `failing`.
pub(crate) struct FakeSession {
    state: StdMutex<SessionState>,
    events_tx: mpsc::UnboundedSender<InteractiveEvent>,
    events_rx: StdMutex<Option<mpsc::UnboundedReceiver<InteractiveEvent>>>,
}

impl FakeSession {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            state: StdMutex::new(SessionState::default()),
            events_tx,
            events_rx: StdMutex::new(Some(events_rx)),
        })
    }

    pub fn failing(methods: &[&'static str]) -> Arc<Self> {
        let session = Self::new();
        session.state().failing.extend(methods.iter().copied());
        session
    }

    pub fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().expect("session state")
    }

    pub fn set_failing(&self, methods: &[&'static str]) {
        let mut state = self.state();
        state.failing.clear();
        state.failing.extend(methods.iter().copied());
    }

    /// Pushes an inbound event. Events for a session whose loop is gone are
    /// silently lost, like on a real socket.
    pub fn send(&self, event: InteractiveEvent) {
        let _ = self.events_tx.send(event);
    }

    async fn maybe_yield(&self) {
        let interleave = self.state().interleave;
        if interleave {
            tokio::task::yield_now().await;
        }
    }

    fn check(&self, method: &'static str) -> Result<()> {
        if self.state().failing.contains(method) {
            return Err(anyhow!("{method} rejected by fake session"));
        }
        Ok(())
    }
}

#[async_trait]
impl InteractiveSession for FakeSession {
    async fn get_scenes(&self) -> Result<Vec<RemoteScene>> {
        self.maybe_yield().await;
        self.check("getScenes")?;
        Ok(self.state().scenes.clone())
    }

    async fn create_scenes(&self, scenes: Vec<Scene>) -> Result<()> {
        self.check("createScenes")?;
        let mut state = self.state();
        state
            .created_scenes
            .push(scenes.iter().map(|scene| scene.scene_id.clone()).collect());
        state.scenes.extend(scenes.into_iter().map(|scene| RemoteScene {
            scene_id: scene.scene_id,
            control_ids: scene.controls.into_iter().map(|c| c.control_id).collect(),
        }));
        Ok(())
    }

    async fn get_groups(&self) -> Result<Vec<Group>> {
        self.maybe_yield().await;
        self.check("getGroups")?;
        Ok(self.state().groups.clone())
    }

    async fn create_groups(&self, groups: Vec<Group>) -> Result<()> {
        self.check("createGroups")?;
        let mut state = self.state();
        state.created_groups.push(groups.clone());
        state.groups.extend(groups);
        Ok(())
    }

    async fn update_groups(&self, groups: Vec<Group>) -> Result<()> {
        self.check("updateGroups")?;
        self.state().updated_groups.extend(groups);
        Ok(())
    }

    async fn update_participants(&self, participants: Vec<Participant>) -> Result<()> {
        self.check("updateParticipants")?;
        self.state().participant_updates.push(participants);
        Ok(())
    }

    async fn set_cooldowns(&self, cooldowns: Vec<ControlCooldown>) -> Result<()> {
        self.check("updateControls")?;
        self.state().cooldowns.push(cooldowns);
        Ok(())
    }

    async fn capture_transaction(&self, transaction_id: &str) -> Result<()> {
        self.check("capture")?;
        self.state().captured.push(transaction_id.to_string());
        Ok(())
    }

    async fn ready(&self, is_ready: bool) -> Result<()> {
        self.maybe_yield().await;
        self.check("ready")?;
        self.state().ready.push(is_ready);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state().closed += 1;
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<InteractiveEvent>> {
        self.events_rx.lock().expect("events").take()
    }
}

/// Hands out prepared sessions in order, then fresh ones.
#[derive(Default)]
pub(crate) struct FakeConnector {
    sessions: StdMutex<VecDeque<Arc<FakeSession>>>,
    pub connects: StdMutex<Vec<InteractiveConnectOptions>>,
    pub refuse: bool,
}

impl FakeConnector {
    pub fn with_sessions(sessions: Vec<Arc<FakeSession>>) -> Arc<Self> {
        Arc::new(Self {
            sessions: StdMutex::new(sessions.into()),
            ..Self::default()
        })
    }

    pub fn refusing() -> Arc<Self> {
        Arc::new(Self {
            refuse: true,
            ..Self::default()
        })
    }
}

#[async_trait]
impl InteractiveConnector for FakeConnector {
    async fn connect(&self, options: InteractiveConnectOptions) -> Result<Arc<dyn InteractiveSession>> {
        self.connects.lock().expect("connects").push(options);
        if self.refuse {
            return Err(anyhow!("connection refused"));
        }
        let session: Arc<dyn InteractiveSession> = self
            .sessions
            .lock()
            .expect("sessions")
            .pop_front()
            .unwrap_or_else(FakeSession::new);
        Ok(session)
    }
}

pub(crate) struct RecordingDispatcher {
    tx: mpsc::UnboundedSender<EffectRequest>,
}

impl RecordingDispatcher {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<EffectRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

#[async_trait]
impl EffectDispatcher for RecordingDispatcher {
    async fn process_effects(&self, request: EffectRequest) -> Result<()> {
        let _ = self.tx.send(request);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingGameControls {
    pub released: StdMutex<Vec<ControlId>>,
}

#[async_trait]
impl GameControlHandler for RecordingGameControls {
    async fn release(&self, _effect: &Effect, control: &Control) -> Result<()> {
        self.released
            .lock()
            .expect("released")
            .push(control.control_id.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingJoystick {
    pub moves: StdMutex<Vec<ControlId>>,
}

#[async_trait]
impl JoystickHandler for RecordingJoystick {
    async fn handle_move(&self, input: &InputEvent) -> Result<()> {
        self.moves
            .lock()
            .expect("moves")
            .push(input.control_id.clone());
        Ok(())
    }
}

/// Two scenes: `default` (btn1 with a 2s control cooldown and a key press,
/// stick) and `game1` (left/right sharing a group cooldown), with `vip` as
/// the default group of `game1`.
pub(crate) fn arcade_board() -> Board {
    serde_json::from_value(serde_json::json!({
        "name": "arcade",
        "versionId": 7,
        "scenes": [
            {
                "sceneId": "default",
                "controls": [
                    {
                        "controlId": "btn1",
                        "cooldown": { "durationMs": 2000 },
                        "effects": [
                            { "type": "Game Control", "press": "space" },
                            { "type": "Play Sound", "file": "boom.wav" }
                        ]
                    },
                    { "controlId": "stick", "kind": "joystick" }
                ]
            },
            {
                "sceneId": "game1",
                "defaultGroups": ["vip"],
                "controls": [
                    { "controlId": "left", "cooldown": { "durationMs": 1000, "scope": "group" } },
                    { "controlId": "right", "cooldown": { "durationMs": 1000, "scope": "group" } }
                ]
            }
        ],
        "viewerGroups": { "vip": ["Alice"] }
    }))
    .expect("arcade board")
}

pub(crate) async fn config_with(board: Board) -> Arc<InMemoryConfigStore> {
    let config = InMemoryConfigStore::new();
    let name = board.name.clone();
    config.insert_board(board).await.expect("valid board");
    config.set_active_board(Some(&name)).await;
    config.set_auth_token("token-1").await;
    Arc::new(config)
}

pub(crate) fn participant(session: &str, username: &str, group: &str) -> Participant {
    Participant {
        session_id: ParticipantSessionId::from(session),
        username: username.to_string(),
        user_id: None,
        group_id: GroupId::from(group),
    }
}

pub(crate) fn input(control: &str, phase: InputPhase, session: Option<&str>) -> InputEvent {
    InputEvent {
        control_id: ControlId::from(control),
        scene_id: None,
        phase,
        participant_session_id: session.map(ParticipantSessionId::from),
        transaction_id: None,
        payload: serde_json::Value::Null,
    }
}
