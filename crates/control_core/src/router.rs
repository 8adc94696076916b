use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;
use interactive_integration::{ControlCooldown, InputEvent, InteractiveSession};
use shared::{
    domain::{Board, Control, ControlId, CooldownScope, InputPhase, Participant, Scene, SceneId},
    protocol::{EventLogEntry, UiEvent},
};
use tokio::{sync::broadcast, time::Instant};
use tracing::{debug, info, warn};

use crate::{
    collaborators::{EffectDispatcher, EffectRequest, GameControlHandler, JoystickHandler},
    cooldown::{CooldownDecision, CooldownGate},
    error::{ManualTriggerError, RouteError},
    session::SessionGuard,
};

const UNKNOWN_USERNAME: &str = "Unknown";

/// Board controls indexed for lookup at event arrival. Built once per
/// connection from the board the session was synchronized with.
pub struct DispatchTable {
    board: Arc<Board>,
    by_scene: HashMap<(SceneId, ControlId), (usize, usize)>,
    by_control: HashMap<ControlId, (usize, usize)>,
}

impl DispatchTable {
    pub fn new(board: Arc<Board>) -> Self {
        let mut by_scene = HashMap::new();
        let mut by_control = HashMap::new();
        for (scene_index, scene) in board.scenes.iter().enumerate() {
            for (control_index, control) in scene.controls.iter().enumerate() {
                by_scene.insert(
                    (scene.scene_id.clone(), control.control_id.clone()),
                    (scene_index, control_index),
                );
                by_control
                    .entry(control.control_id.clone())
                    .or_insert((scene_index, control_index));
            }
        }
        Self {
            board,
            by_scene,
            by_control,
        }
    }

    pub fn board(&self) -> &Arc<Board> {
        &self.board
    }

    pub fn resolve(
        &self,
        scene_id: Option<&SceneId>,
        control_id: &ControlId,
    ) -> Option<(&Scene, &Control)> {
        let (scene_index, control_index) = match scene_id {
            Some(scene_id) => *self.by_scene.get(&(scene_id.clone(), control_id.clone()))?,
            None => *self.by_control.get(control_id)?,
        };
        let scene = self.board.scenes.get(scene_index)?;
        let control = scene.controls.get(control_index)?;
        Some((scene, control))
    }
}

/// Per-connection inputs to [`ControlRouter::route`].
#[derive(Clone)]
pub struct RouteContext {
    pub table: Arc<DispatchTable>,
    pub session: Arc<dyn InteractiveSession>,
    pub guard: SessionGuard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched,
    CoolingDown { remaining: Duration },
    Released { key_ups: usize },
    Moved,
    /// The connection this event belonged to was torn down meanwhile.
    Stale,
}

pub struct ControlRouter {
    cooldowns: Arc<CooldownGate>,
    effects: Arc<dyn EffectDispatcher>,
    game_controls: Arc<dyn GameControlHandler>,
    joystick: Arc<dyn JoystickHandler>,
    ui: broadcast::Sender<UiEvent>,
}

impl ControlRouter {
    pub fn new(
        cooldowns: Arc<CooldownGate>,
        effects: Arc<dyn EffectDispatcher>,
        game_controls: Arc<dyn GameControlHandler>,
        joystick: Arc<dyn JoystickHandler>,
        ui: broadcast::Sender<UiEvent>,
    ) -> Self {
        Self {
            cooldowns,
            effects,
            game_controls,
            joystick,
            ui,
        }
    }

    pub fn cooldowns(&self) -> &Arc<CooldownGate> {
        &self.cooldowns
    }

    pub async fn route(
        &self,
        ctx: &RouteContext,
        input: &InputEvent,
        participant: Option<Participant>,
    ) -> Result<RouteOutcome, RouteError> {
        if !ctx.guard.is_current() {
            return Ok(RouteOutcome::Stale);
        }

        if input.phase == InputPhase::Move {
            if let Err(err) = self.joystick.handle_move(input).await {
                debug!(control_id = %input.control_id, "router: joystick move not handled: {err:#}");
            }
            return Ok(RouteOutcome::Moved);
        }

        let (scene, control) = ctx
            .table
            .resolve(input.scene_id.as_ref(), &input.control_id)
            .ok_or_else(|| RouteError::UnknownControl {
                scene_id: input.scene_id.clone(),
                control_id: input.control_id.clone(),
            })?;

        match input.phase {
            InputPhase::Press => Ok(self.press(ctx, input, scene, control, participant).await),
            _ => Ok(self.release(control)),
        }
    }

    async fn press(
        &self,
        ctx: &RouteContext,
        input: &InputEvent,
        scene: &Scene,
        control: &Control,
        participant: Option<Participant>,
    ) -> RouteOutcome {
        let until = match self.cooldowns.check(control, participant.as_ref()).await {
            CooldownDecision::Rejected { remaining } => {
                return RouteOutcome::CoolingDown { remaining };
            }
            CooldownDecision::Accepted { until } => until,
        };

        if !ctx.guard.is_current() {
            return RouteOutcome::Stale;
        }

        let username = participant
            .as_ref()
            .map(|participant| participant.username.clone())
            .unwrap_or_else(|| UNKNOWN_USERNAME.to_string());

        self.spawn_dispatch(EffectRequest::for_control(control, participant, false));

        if let Some(transaction_id) = input.transaction_id.clone() {
            let session = Arc::clone(&ctx.session);
            let guard = ctx.guard.clone();
            let control_id = control.control_id.clone();
            tokio::spawn(async move {
                if !guard.is_current() {
                    return;
                }
                if let Err(err) = session.capture_transaction(&transaction_id).await {
                    warn!(%control_id, %transaction_id, "router: transaction capture failed: {err:#}");
                }
            });
        }

        if let Some(until) = until {
            self.spawn_remote_cooldown(ctx, scene, control, until);
        }

        info!(control_id = %control.control_id, %username, "router: control pressed");
        let _ = self.ui.send(UiEvent::EventLog(EventLogEntry::pressed(
            username,
            control.control_id.as_str(),
        )));
        RouteOutcome::Dispatched
    }

    /// Key-ups for one release run on their own task, in declaration order,
    /// so a slow handler never holds up the event stream.
    fn release(&self, control: &Control) -> RouteOutcome {
        let key_ups = control.game_control_effects().count();
        if key_ups == 0 {
            return RouteOutcome::Released { key_ups };
        }

        let game_controls = Arc::clone(&self.game_controls);
        let control = control.clone();
        tokio::spawn(async move {
            for effect in control.game_control_effects() {
                if let Err(err) = game_controls.release(effect, &control).await {
                    warn!(control_id = %control.control_id, "router: key-up failed: {err:#}");
                }
            }
        });
        RouteOutcome::Released { key_ups }
    }

    /// Operator-initiated activation: no live session, no cooldown gate.
    pub fn route_manual(&self, board: &Board, control_id: &ControlId) -> Result<(), ManualTriggerError> {
        let (_, control) = board
            .control(control_id)
            .ok_or_else(|| ManualTriggerError::UnknownControl(control_id.clone()))?;

        self.spawn_dispatch(EffectRequest::for_control(control, None, true));

        info!(%control_id, "router: control manually pressed");
        let _ = self.ui.send(UiEvent::EventLog(EventLogEntry::manually_pressed(
            control_id.as_str(),
        )));
        Ok(())
    }

    fn spawn_dispatch(&self, request: EffectRequest) {
        let effects = Arc::clone(&self.effects);
        tokio::spawn(async move {
            let control_id = request.control.control_id.clone();
            if let Err(err) = effects.process_effects(request).await {
                warn!(%control_id, "router: effects failed: {err:#}");
            }
        });
    }

    fn spawn_remote_cooldown(&self, ctx: &RouteContext, scene: &Scene, control: &Control, until: Instant) {
        let Some(scope) = control.cooldown.as_ref().map(|cooldown| cooldown.scope) else {
            return;
        };
        let until_ms = Utc::now().timestamp_millis()
            + until.saturating_duration_since(Instant::now()).as_millis() as i64;
        let targets: Vec<&Control> = match scope {
            CooldownScope::Control => vec![control],
            CooldownScope::Group => scene
                .controls
                .iter()
                .filter(|other| {
                    other
                        .cooldown
                        .as_ref()
                        .is_some_and(|cooldown| cooldown.scope == CooldownScope::Group)
                })
                .collect(),
        };
        let cooldowns: Vec<ControlCooldown> = targets
            .into_iter()
            .map(|target| ControlCooldown {
                scene_id: scene.scene_id.clone(),
                control_id: target.control_id.clone(),
                until_ms,
            })
            .collect();

        let session = Arc::clone(&ctx.session);
        let guard = ctx.guard.clone();
        tokio::spawn(async move {
            if !guard.is_current() {
                return;
            }
            if let Err(err) = session.set_cooldowns(cooldowns).await {
                debug!("router: remote cooldown update failed: {err:#}");
            }
        });
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
