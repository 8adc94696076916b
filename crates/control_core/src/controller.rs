use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use board_store::ConfigStore;
use interactive_integration::{
    InteractiveConnectOptions, InteractiveConnector, InteractiveEvent, InteractiveSession,
};
use shared::{
    domain::{Board, ControlId, Group, GroupId, Participant, SceneId},
    error::{ErrorKind, UiError},
    protocol::{ConnectionStatus, UiEvent},
};
use tokio::{
    sync::{broadcast, mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    collaborators::{
        ChatConnector, DisabledChat, EffectDispatcher, GameControlHandler, JoystickHandler,
        MissingEffectDispatcher, MissingGameControlHandler, MissingJoystickHandler,
    },
    cooldown::CooldownGate,
    error::{ConnectError, CreateSceneError, GroupError, ManualTriggerError},
    group_queue::{
        GroupQueueContext, ParticipantGroupQueue, DEFAULT_BATCH_SIZE, DEFAULT_TICK_INTERVAL,
    },
    participants::ParticipantRegistry,
    router::{ControlRouter, DispatchTable, RouteContext, RouteOutcome},
    session::{SessionGuard, SessionHandle},
    sync::SceneSynchronizer,
};

const CHAT_CONNECT_FAILED: &str = "Error connecting to chat and finalizing interactive board.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    pub group_queue_interval: Duration,
    pub group_queue_batch: usize,
    pub ui_channel_capacity: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            group_queue_interval: DEFAULT_TICK_INTERVAL,
            group_queue_batch: DEFAULT_BATCH_SIZE,
            ui_channel_capacity: 256,
        }
    }
}

/// The host-provided side effects a controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub effects: Arc<dyn EffectDispatcher>,
    pub game_controls: Arc<dyn GameControlHandler>,
    pub joystick: Arc<dyn JoystickHandler>,
    pub chat: Arc<dyn ChatConnector>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            effects: Arc::new(MissingEffectDispatcher),
            game_controls: Arc::new(MissingGameControlHandler),
            joystick: Arc::new(MissingJoystickHandler),
            chat: Arc::new(DisabledChat),
        }
    }
}

struct ActiveSession {
    handle: SessionHandle,
    route: RouteContext,
    ready: Arc<AtomicBool>,
    event_task: JoinHandle<()>,
}

impl ActiveSession {
    fn session(&self) -> &Arc<dyn InteractiveSession> {
        &self.route.session
    }

    fn board(&self) -> &Arc<Board> {
        self.route.table.board()
    }
}

/// Owns the single live interactive session of the process. Reconnecting
/// builds a fresh session and swaps it in; everything spawned for an older
/// session is fenced off by its [`SessionGuard`].
pub struct InteractiveController {
    config: Arc<dyn ConfigStore>,
    connector: Arc<dyn InteractiveConnector>,
    chat: Arc<dyn ChatConnector>,
    router: Arc<ControlRouter>,
    participants: Arc<ParticipantRegistry>,
    group_queue: Arc<ParticipantGroupQueue>,
    generation: Arc<AtomicU64>,
    active: Mutex<Option<ActiveSession>>,
    ui: broadcast::Sender<UiEvent>,
}

impl InteractiveController {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        connector: Arc<dyn InteractiveConnector>,
    ) -> Arc<Self> {
        Self::new_with_dependencies(
            config,
            connector,
            Collaborators::default(),
            ControllerSettings::default(),
        )
    }

    pub fn new_with_dependencies(
        config: Arc<dyn ConfigStore>,
        connector: Arc<dyn InteractiveConnector>,
        collaborators: Collaborators,
        settings: ControllerSettings,
    ) -> Arc<Self> {
        let (ui, _) = broadcast::channel(settings.ui_channel_capacity.max(1));
        let router = ControlRouter::new(
            Arc::new(CooldownGate::new()),
            collaborators.effects,
            collaborators.game_controls,
            collaborators.joystick,
            ui.clone(),
        );
        Arc::new(Self {
            config,
            connector,
            chat: collaborators.chat,
            router: Arc::new(router),
            participants: Arc::new(ParticipantRegistry::new()),
            group_queue: Arc::new(ParticipantGroupQueue::new(
                settings.group_queue_interval,
                settings.group_queue_batch,
            )),
            generation: Arc::new(AtomicU64::new(0)),
            active: Mutex::new(None),
            ui,
        })
    }

    pub fn subscribe_ui(&self) -> broadcast::Receiver<UiEvent> {
        self.ui.subscribe()
    }

    pub fn participants(&self) -> &Arc<ParticipantRegistry> {
        &self.participants
    }

    pub fn cooldowns(&self) -> &Arc<CooldownGate> {
        self.router.cooldowns()
    }

    pub fn group_queue(&self) -> &Arc<ParticipantGroupQueue> {
        &self.group_queue
    }

    pub async fn session_handle(&self) -> Option<SessionHandle> {
        self.active.lock().await.as_ref().map(|active| active.handle.clone())
    }

    /// Whether control traffic is currently being routed.
    pub async fn is_ready(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| active.ready.load(Ordering::Acquire))
    }

    /// Tears down any previous session, opens a new one against the active
    /// board and synchronizes it. The readiness gate opens only when every
    /// synchronization stage succeeded.
    pub async fn connect(self: &Arc<Self>) -> Result<SessionHandle, ConnectError> {
        if self.teardown().await {
            self.emit(UiEvent::Connection(ConnectionStatus::Offline));
        }

        match self.open_session().await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                warn!("interactive: connect failed: {err}");
                if !matches!(err, ConnectError::Superseded) {
                    self.report(err.to_ui_error());
                }
                Err(err)
            }
        }
    }

    async fn open_session(self: &Arc<Self>) -> Result<SessionHandle, ConnectError> {
        let board = self.config.active_board().await.map_err(ConnectError::Board)?;
        let auth_token = self
            .config
            .auth_token()
            .await
            .map_err(ConnectError::AuthToken)?;

        info!(board = %board.name, version_id = board.version_id, "interactive: connecting");
        let session = self
            .connector
            .connect(InteractiveConnectOptions {
                auth_token,
                version_id: board.version_id,
            })
            .await
            .map_err(ConnectError::Transport)?;

        let Some(events) = session.take_events() else {
            let _ = session.close().await;
            return Err(ConnectError::EventStreamUnavailable);
        };

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let guard = SessionGuard::new(generation, Arc::clone(&self.generation));
        let route = RouteContext {
            table: Arc::new(DispatchTable::new(Arc::clone(&board))),
            session: Arc::clone(&session),
            guard: guard.clone(),
        };
        let ready = Arc::new(AtomicBool::new(false));
        let handle = SessionHandle {
            generation,
            board_name: board.name.clone(),
            version_id: board.version_id,
            synchronized: false,
        };

        let event_task = self.spawn_event_task(route.clone(), Arc::clone(&ready), events);

        {
            let mut active = self.active.lock().await;
            if !guard.is_current() {
                drop(active);
                event_task.abort();
                let _ = session.close().await;
                return Err(ConnectError::Superseded);
            }
            if let Some(previous) = active.replace(ActiveSession {
                handle: handle.clone(),
                route: route.clone(),
                ready: Arc::clone(&ready),
                event_task,
            }) {
                previous.event_task.abort();
                let _ = previous.session().close().await;
            }
        }
        info!(generation, board = %board.name, "interactive: session opened");

        self.synchronize_session(&route, &ready).await
    }

    /// Re-runs synchronization against the live session, opening the
    /// readiness gate if it was left closed by a partial sync.
    pub async fn resynchronize(&self) -> Result<SessionHandle, ConnectError> {
        let snapshot = {
            let active = self.active.lock().await;
            active
                .as_ref()
                .map(|active| (active.route.clone(), Arc::clone(&active.ready)))
        };
        let Some((route, ready)) = snapshot else {
            let err = ConnectError::NotConnected;
            self.report(err.to_ui_error());
            return Err(err);
        };
        self.synchronize_session(&route, &ready).await
    }

    async fn synchronize_session(
        &self,
        route: &RouteContext,
        ready: &Arc<AtomicBool>,
    ) -> Result<SessionHandle, ConnectError> {
        let board = Arc::clone(route.table.board());
        let report = SceneSynchronizer::new(route.session.as_ref())
            .synchronize(&board)
            .await;
        for err in &report.errors {
            self.report(err.to_ui_error());
        }

        if !route.guard.is_current() {
            return Err(ConnectError::Superseded);
        }

        let synchronized = report.is_complete();
        // Only the caller that flips the flag runs the handshake, so
        // overlapping resyncs open the gate once.
        if synchronized
            && ready
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            self.open_gate(route).await;
        }

        let mut active = self.active.lock().await;
        match active.as_mut() {
            Some(active) if active.handle.generation == route.guard.generation() => {
                active.handle.synchronized = synchronized;
                Ok(active.handle.clone())
            }
            _ => Err(ConnectError::Superseded),
        }
    }

    async fn open_gate(&self, route: &RouteContext) {
        if let Err(err) = self.chat.connect().await {
            warn!("interactive: chat connect failed: {err:#}");
            self.report(UiError::new(ErrorKind::Transport, CHAT_CONNECT_FAILED));
        }
        if let Err(err) = route.session.ready(true).await {
            warn!("interactive: ready handshake failed: {err:#}");
            self.report(UiError::new(ErrorKind::Transport, CHAT_CONNECT_FAILED));
        }
        if !route.guard.is_current() {
            return;
        }

        self.group_queue
            .start_queue(GroupQueueContext {
                session: Arc::clone(&route.session),
                board: Arc::clone(route.table.board()),
                participants: Arc::clone(&self.participants),
                guard: route.guard.clone(),
            })
            .await;
        info!(generation = route.guard.generation(), "interactive: online");
        self.emit(UiEvent::Connection(ConnectionStatus::Online));
    }

    /// Closes the live session if any. Safe to call repeatedly or before the
    /// first connect.
    pub async fn disconnect(&self) {
        self.teardown().await;
        self.emit(UiEvent::Connection(ConnectionStatus::Offline));
    }

    /// Returns whether a session was actually torn down.
    async fn teardown(&self) -> bool {
        // Fences off in-flight continuations and any connect still in progress.
        self.generation.fetch_add(1, Ordering::AcqRel);
        let previous = self.active.lock().await.take();

        self.group_queue.stop_queue().await;
        let Some(previous) = previous else {
            return false;
        };

        previous.event_task.abort();
        if let Err(err) = previous.session().close().await {
            debug!("interactive: close failed: {err:#}");
        }
        if let Err(err) = self.chat.disconnect().await {
            warn!("interactive: chat disconnect failed: {err:#}");
        }
        self.participants.clear().await;
        self.router.cooldowns().clear().await;
        info!(
            generation = previous.handle.generation,
            board = %previous.handle.board_name,
            "interactive: session closed"
        );
        true
    }

    /// Moves a participant into `group_id`. The sentinel group "None" is a
    /// no-op.
    pub async fn change_participant_group(
        &self,
        participant: &Participant,
        group_id: &GroupId,
    ) -> Result<(), GroupError> {
        if group_id.is_none() {
            debug!(username = %participant.username, "groups: ignoring change to None");
            return Ok(());
        }
        let result = self.apply_participant_group(participant, group_id).await;
        if let Err(err) = &result {
            warn!(username = %participant.username, %group_id, "groups: {err}");
            self.report(err.to_ui_error());
        }
        result
    }

    async fn apply_participant_group(
        &self,
        participant: &Participant,
        group_id: &GroupId,
    ) -> Result<(), GroupError> {
        let (session, guard) = self.live_session().await.ok_or(GroupError::NotConnected)?;

        let groups = session.get_groups().await.map_err(GroupError::Remote)?;
        if !groups.iter().any(|group| &group.group_id == group_id) {
            return Err(GroupError::GroupResolution {
                group_id: group_id.clone(),
            });
        }
        if !guard.is_current() {
            return Err(GroupError::NotConnected);
        }

        let updated = self.participants.assign_group(participant, group_id).await;
        session
            .update_participants(vec![updated])
            .await
            .map_err(GroupError::Remote)?;
        info!(username = %participant.username, %group_id, "groups: participant moved");
        Ok(())
    }

    /// Points `group_id` at `scene_id` remotely. The sentinel group "None" is
    /// a no-op.
    pub async fn change_group_default_scene(
        &self,
        group_id: &GroupId,
        scene_id: &SceneId,
    ) -> Result<(), GroupError> {
        if group_id.is_none() {
            return Ok(());
        }
        let result = match self.live_session().await {
            Some((session, _)) => session
                .update_groups(vec![Group {
                    group_id: group_id.clone(),
                    scene_id: scene_id.clone(),
                }])
                .await
                .map_err(GroupError::Remote),
            None => Err(GroupError::NotConnected),
        };
        match &result {
            Ok(()) => info!(%group_id, %scene_id, "groups: default scene changed"),
            Err(err) => {
                warn!(%group_id, %scene_id, "groups: {err}");
                self.report(err.to_ui_error());
            }
        }
        result
    }

    /// Fires a control on behalf of the operator. Works without a live
    /// session and bypasses cooldowns.
    pub async fn manual_trigger(&self, control_id: &ControlId) -> Result<(), ManualTriggerError> {
        let result = match self.config.active_board().await {
            Ok(board) => self.router.route_manual(&board, control_id),
            Err(err) => Err(ManualTriggerError::NoActiveBoard(err)),
        };
        if let Err(err) = &result {
            warn!(%control_id, "router: manual trigger failed: {err}");
            self.report(err.to_ui_error());
        }
        result
    }

    pub async fn create_scene(&self, scene_id: &SceneId) -> Result<(), CreateSceneError> {
        let snapshot = {
            let active = self.active.lock().await;
            active
                .as_ref()
                .map(|active| (Arc::clone(active.session()), Arc::clone(active.board())))
        };
        let result = match snapshot {
            Some((session, board)) => {
                SceneSynchronizer::new(session.as_ref())
                    .create_scene(&board, scene_id)
                    .await
            }
            None => Err(CreateSceneError::NotConnected),
        };
        if let Err(err) = &result {
            warn!(%scene_id, "sync: {err}");
            self.report(err.to_ui_error());
        }
        result
    }

    async fn live_session(&self) -> Option<(Arc<dyn InteractiveSession>, SessionGuard)> {
        let active = self.active.lock().await;
        active
            .as_ref()
            .map(|active| (Arc::clone(active.session()), active.route.guard.clone()))
    }

    fn spawn_event_task(
        &self,
        route: RouteContext,
        ready: Arc<AtomicBool>,
        events: mpsc::UnboundedReceiver<InteractiveEvent>,
    ) -> JoinHandle<()> {
        let ctx = EventLoopContext {
            route,
            ready,
            router: Arc::clone(&self.router),
            participants: Arc::clone(&self.participants),
            group_queue: Arc::clone(&self.group_queue),
            ui: self.ui.clone(),
        };
        tokio::spawn(run_event_loop(ctx, events))
    }

    fn report(&self, error: UiError) {
        self.emit(UiEvent::Error(error));
    }

    fn emit(&self, event: UiEvent) {
        let _ = self.ui.send(event);
    }
}

struct EventLoopContext {
    route: RouteContext,
    ready: Arc<AtomicBool>,
    router: Arc<ControlRouter>,
    participants: Arc<ParticipantRegistry>,
    group_queue: Arc<ParticipantGroupQueue>,
    ui: broadcast::Sender<UiEvent>,
}

async fn run_event_loop(
    ctx: EventLoopContext,
    mut events: mpsc::UnboundedReceiver<InteractiveEvent>,
) {
    while let Some(event) = events.recv().await {
        if !ctx.route.guard.is_current() {
            break;
        }
        match event {
            InteractiveEvent::Error { message } => {
                if message.trim().is_empty() {
                    continue;
                }
                warn!(%message, "interactive: session error");
                let _ = ctx
                    .ui
                    .send(UiEvent::Error(UiError::new(ErrorKind::Transport, message)));
            }
            InteractiveEvent::ParticipantJoined(participant) => {
                debug!(username = %participant.username, "interactive: participant joined");
                ctx.participants.insert(participant.clone()).await;
                ctx.group_queue.enqueue(participant).await;
            }
            InteractiveEvent::ParticipantLeft { session_id } => {
                if let Some(participant) = ctx.participants.remove(&session_id).await {
                    debug!(username = %participant.username, "interactive: participant left");
                }
            }
            InteractiveEvent::Input(input) => {
                if !ctx.ready.load(Ordering::Acquire) {
                    debug!(control_id = %input.control_id, "interactive: input before ready, dropped");
                    continue;
                }
                let participant = match &input.participant_session_id {
                    Some(session_id) => ctx.participants.get(session_id).await,
                    None => None,
                };
                match ctx.router.route(&ctx.route, &input, participant).await {
                    Ok(RouteOutcome::CoolingDown { remaining }) => debug!(
                        control_id = %input.control_id,
                        remaining_ms = remaining.as_millis() as u64,
                        "interactive: press ignored, cooling down"
                    ),
                    Ok(_) => {}
                    Err(err) => {
                        warn!("interactive: {err}");
                        let _ = ctx.ui.send(UiEvent::Error(err.to_ui_error()));
                    }
                }
            }
            InteractiveEvent::Closed { reason } => {
                info!(reason = reason.as_deref().unwrap_or(""), "interactive: session closed remotely");
                ctx.ready.store(false, Ordering::Release);
                ctx.group_queue.stop_queue().await;
                let _ = ctx.ui.send(UiEvent::Connection(ConnectionStatus::Offline));
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
