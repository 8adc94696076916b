//! JSON-RPC over websocket transport for the remote interactive service.
//!
//! Outbound calls are `method` packets correlated to `reply` packets by id.
//! Server-initiated `method` packets (participant joins/leaves, input) become
//! [`InteractiveEvent`]s on the session's unbounded event stream.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex as StdMutex,
    },
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use shared::domain::{
    Control, ControlId, ControlKind, Group, GroupId, InputPhase, Participant,
    ParticipantSessionId, Scene, SceneId,
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    ControlCooldown, InputEvent, InteractiveConnectOptions, InteractiveConnector,
    InteractiveEvent, InteractiveSession, RemoteScene,
};

const PROTOCOL_VERSION: &str = "2.0";

#[derive(Debug, Clone, Deserialize, Error)]
#[error("remote error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct MethodPacket<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
    discard: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum InboundPacket {
    Reply {
        id: u64,
        #[serde(default)]
        result: Value,
        #[serde(default)]
        error: Option<RpcError>,
    },
    Method {
        method: String,
        #[serde(default)]
        params: Value,
    },
}

#[derive(Debug, Deserialize)]
struct WireControlRef {
    #[serde(rename = "controlID")]
    control_id: String,
}

#[derive(Debug, Deserialize)]
struct WireScene {
    #[serde(rename = "sceneID")]
    scene_id: String,
    #[serde(default)]
    controls: Vec<WireControlRef>,
}

#[derive(Debug, Deserialize)]
struct WireScenes {
    #[serde(default)]
    scenes: Vec<WireScene>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireGroup {
    #[serde(rename = "groupID")]
    group_id: String,
    #[serde(rename = "sceneID", default = "default_scene")]
    scene_id: String,
}

#[derive(Debug, Deserialize)]
struct WireGroups {
    #[serde(default)]
    groups: Vec<WireGroup>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireParticipant {
    #[serde(rename = "sessionID")]
    session_id: String,
    #[serde(default)]
    username: String,
    #[serde(rename = "userID", default, skip_serializing_if = "Option::is_none")]
    user_id: Option<u64>,
    #[serde(rename = "groupID", default = "default_group")]
    group_id: String,
}

#[derive(Debug, Deserialize)]
struct WireParticipants {
    #[serde(default)]
    participants: Vec<WireParticipant>,
}

#[derive(Debug, Deserialize)]
struct WireGiveInput {
    #[serde(rename = "participantID", default)]
    participant_id: Option<String>,
    #[serde(rename = "transactionID", default)]
    transaction_id: Option<String>,
    #[serde(default)]
    input: Value,
}

fn default_scene() -> String {
    "default".to_string()
}

fn default_group() -> String {
    GroupId::default_group().0
}

impl From<WireParticipant> for Participant {
    fn from(value: WireParticipant) -> Self {
        Self {
            session_id: ParticipantSessionId(value.session_id),
            username: value.username,
            user_id: value.user_id,
            group_id: GroupId(value.group_id),
        }
    }
}

impl From<&Participant> for WireParticipant {
    fn from(value: &Participant) -> Self {
        Self {
            session_id: value.session_id.0.clone(),
            username: value.username.clone(),
            user_id: value.user_id,
            group_id: value.group_id.0.clone(),
        }
    }
}

fn wire_control(control: &Control) -> Value {
    let mut body: Map<String, Value> = control.remote_props.clone();
    body.insert("controlID".into(), json!(control.control_id.as_str()));
    let kind = match control.kind {
        ControlKind::Button => "button",
        ControlKind::Joystick => "joystick",
    };
    body.insert("kind".into(), json!(kind));
    if let Some(text) = &control.text {
        body.insert("text".into(), json!(text));
    }
    if let Some(cost) = control.cost {
        body.insert("cost".into(), json!(cost));
    }
    Value::Object(body)
}

fn wire_scene(scene: &Scene) -> Value {
    json!({
        "sceneID": scene.scene_id.as_str(),
        "controls": scene.controls.iter().map(wire_control).collect::<Vec<_>>(),
    })
}

fn wire_groups(groups: &[Group]) -> Vec<WireGroup> {
    groups
        .iter()
        .map(|group| WireGroup {
            group_id: group.group_id.0.clone(),
            scene_id: group.scene_id.0.clone(),
        })
        .collect()
}

fn parse_input(params: Value) -> Result<InputEvent> {
    let give: WireGiveInput = serde_json::from_value(params).context("malformed giveInput")?;
    let control_id = give
        .input
        .get("controlID")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("giveInput without controlID"))?;
    let event = give
        .input
        .get("event")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("giveInput without event"))?;
    let phase = InputPhase::from_event_name(event)
        .ok_or_else(|| anyhow!("unsupported input event '{event}'"))?;
    let scene_id = give
        .input
        .get("sceneID")
        .and_then(Value::as_str)
        .map(SceneId::from);

    Ok(InputEvent {
        control_id: ControlId::from(control_id),
        scene_id,
        phase,
        participant_session_id: give.participant_id.map(ParticipantSessionId),
        transaction_id: give.transaction_id,
        payload: give.input,
    })
}

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcError>>>>>;

pub struct WsInteractiveConnector {
    url: Url,
}

impl WsInteractiveConnector {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("invalid interactive url: {url}"))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self::new(url)),
            other => Err(anyhow!("interactive url must use ws:// or wss://, got {other}://")),
        }
    }
}

#[async_trait]
impl InteractiveConnector for WsInteractiveConnector {
    async fn connect(
        &self,
        options: InteractiveConnectOptions,
    ) -> Result<Arc<dyn InteractiveSession>> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .context("failed to build websocket request")?;
        let headers = request.headers_mut();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", options.auth_token))
                .context("auth token is not a valid header value")?,
        );
        headers.insert(
            "X-Interactive-Version",
            HeaderValue::from_str(&options.version_id.to_string())
                .context("version id is not a valid header value")?,
        );
        headers.insert(
            "X-Protocol-Version",
            HeaderValue::from_static(PROTOCOL_VERSION),
        );

        let (stream, _) = connect_async(request)
            .await
            .with_context(|| format!("failed to connect websocket: {}", self.url))?;
        info!(url = %self.url, version_id = options.version_id, "interactive: websocket open");

        Ok(Arc::new(WsInteractiveSession::spawn(stream)))
    }
}

pub struct WsInteractiveSession {
    outbound: mpsc::UnboundedSender<Message>,
    pending: PendingReplies,
    next_id: AtomicU64,
    events: StdMutex<Option<mpsc::UnboundedReceiver<InteractiveEvent>>>,
    reader_task: StdMutex<Option<JoinHandle<()>>>,
}

impl WsInteractiveSession {
    fn spawn<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Send
            + 'static,
    {
        let (mut writer, mut reader) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));

        // The writer ends on its own after a close frame or once the session is dropped.
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                let closing = matches!(message, Message::Close(_));
                if let Err(err) = writer.send(message).await {
                    warn!("interactive: websocket write failed: {err}");
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        let reader_pending = Arc::clone(&pending);
        let reader_task = tokio::spawn(async move {
            let mut reason = None;
            while let Some(message) = reader.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        handle_inbound(&text, &reader_pending, &events_tx).await;
                    }
                    Ok(Message::Close(frame)) => {
                        reason = frame.map(|frame| frame.reason.to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        let _ = events_tx.send(InteractiveEvent::Error {
                            message: err.to_string(),
                        });
                        reason = Some(err.to_string());
                        break;
                    }
                }
            }
            // Dropping the senders fails every call still waiting for a reply.
            reader_pending.lock().await.clear();
            let _ = events_tx.send(InteractiveEvent::Closed { reason });
        });

        Self {
            outbound,
            pending,
            next_id: AtomicU64::new(1),
            events: StdMutex::new(Some(events_rx)),
            reader_task: StdMutex::new(Some(reader_task)),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let packet = serde_json::to_string(&MethodPacket {
            kind: "method",
            id,
            method,
            params,
            discard: false,
        })?;
        if self.outbound.send(Message::Text(packet)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(anyhow!("interactive connection is closed"));
        }

        match rx.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(anyhow!(err).context(format!("{method} rejected"))),
            Err(_) => Err(anyhow!("connection closed before reply to {method}")),
        }
    }
}

async fn handle_inbound(
    text: &str,
    pending: &PendingReplies,
    events: &mpsc::UnboundedSender<InteractiveEvent>,
) {
    let packet = match serde_json::from_str::<InboundPacket>(text) {
        Ok(packet) => packet,
        Err(err) => {
            warn!("interactive: dropping malformed packet: {err}");
            return;
        }
    };

    match packet {
        InboundPacket::Reply { id, result, error } => {
            let Some(waiter) = pending.lock().await.remove(&id) else {
                debug!(id, "interactive: reply without pending call");
                return;
            };
            let _ = waiter.send(match error {
                Some(error) => Err(error),
                None => Ok(result),
            });
        }
        InboundPacket::Method { method, params } => match method.as_str() {
            "onParticipantJoin" => match serde_json::from_value::<WireParticipants>(params) {
                Ok(joined) => {
                    for participant in joined.participants {
                        let _ = events.send(InteractiveEvent::ParticipantJoined(
                            participant.into(),
                        ));
                    }
                }
                Err(err) => warn!("interactive: malformed onParticipantJoin: {err}"),
            },
            "onParticipantLeave" => match serde_json::from_value::<WireParticipants>(params) {
                Ok(left) => {
                    for participant in left.participants {
                        let _ = events.send(InteractiveEvent::ParticipantLeft {
                            session_id: ParticipantSessionId(participant.session_id),
                        });
                    }
                }
                Err(err) => warn!("interactive: malformed onParticipantLeave: {err}"),
            },
            "giveInput" => match parse_input(params) {
                Ok(input) => {
                    let _ = events.send(InteractiveEvent::Input(input));
                }
                Err(err) => warn!("interactive: {err:#}"),
            },
            "hello" | "issueMemoryWarning" => debug!(method, "interactive: ignoring"),
            other => debug!(method = other, "interactive: unhandled server method"),
        },
    }
}

#[async_trait]
impl InteractiveSession for WsInteractiveSession {
    async fn get_scenes(&self) -> Result<Vec<RemoteScene>> {
        let result = self.call("getScenes", json!({})).await?;
        let scenes: WireScenes = serde_json::from_value(result).context("malformed getScenes")?;
        Ok(scenes
            .scenes
            .into_iter()
            .map(|scene| RemoteScene {
                scene_id: SceneId(scene.scene_id),
                control_ids: scene
                    .controls
                    .into_iter()
                    .map(|control| ControlId(control.control_id))
                    .collect(),
            })
            .collect())
    }

    async fn create_scenes(&self, scenes: Vec<Scene>) -> Result<()> {
        let scenes: Vec<Value> = scenes.iter().map(wire_scene).collect();
        self.call("createScenes", json!({ "scenes": scenes })).await?;
        Ok(())
    }

    async fn get_groups(&self) -> Result<Vec<Group>> {
        let result = self.call("getGroups", json!({})).await?;
        let groups: WireGroups = serde_json::from_value(result).context("malformed getGroups")?;
        Ok(groups
            .groups
            .into_iter()
            .map(|group| Group {
                group_id: GroupId(group.group_id),
                scene_id: SceneId(group.scene_id),
            })
            .collect())
    }

    async fn create_groups(&self, groups: Vec<Group>) -> Result<()> {
        self.call("createGroups", json!({ "groups": wire_groups(&groups) }))
            .await?;
        Ok(())
    }

    async fn update_groups(&self, groups: Vec<Group>) -> Result<()> {
        self.call("updateGroups", json!({ "groups": wire_groups(&groups) }))
            .await?;
        Ok(())
    }

    async fn update_participants(&self, participants: Vec<Participant>) -> Result<()> {
        let participants: Vec<WireParticipant> =
            participants.iter().map(WireParticipant::from).collect();
        self.call(
            "updateParticipants",
            json!({ "participants": participants }),
        )
        .await?;
        Ok(())
    }

    async fn set_cooldowns(&self, cooldowns: Vec<ControlCooldown>) -> Result<()> {
        let mut by_scene: HashMap<SceneId, Vec<Value>> = HashMap::new();
        for cooldown in cooldowns {
            by_scene.entry(cooldown.scene_id).or_default().push(json!({
                "controlID": cooldown.control_id.as_str(),
                "cooldown": cooldown.until_ms,
            }));
        }
        for (scene_id, controls) in by_scene {
            self.call(
                "updateControls",
                json!({ "sceneID": scene_id.as_str(), "controls": controls }),
            )
            .await?;
        }
        Ok(())
    }

    async fn capture_transaction(&self, transaction_id: &str) -> Result<()> {
        self.call("capture", json!({ "transactionID": transaction_id }))
            .await?;
        Ok(())
    }

    async fn ready(&self, is_ready: bool) -> Result<()> {
        self.call("ready", json!({ "isReady": is_ready })).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let _ = self.outbound.send(Message::Close(None));
        let reader = match self.reader_task.lock() {
            Ok(mut task) => task.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(reader) = reader {
            reader.abort();
        }
        self.pending.lock().await.clear();
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<InteractiveEvent>> {
        match self.events.lock() {
            Ok(mut events) => events.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[cfg(test)]
#[path = "tests/ws_tests.rs"]
mod tests;
