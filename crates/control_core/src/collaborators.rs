use anyhow::{anyhow, Result};
use async_trait::async_trait;
use interactive_integration::InputEvent;
use shared::domain::{Control, Effect, Participant};
use tracing::debug;

/// Everything an effect runner needs to execute one control activation.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectRequest {
    pub effects: Vec<Effect>,
    pub control: Control,
    pub participant: Option<Participant>,
    pub is_manual: bool,
}

impl EffectRequest {
    pub fn for_control(control: &Control, participant: Option<Participant>, is_manual: bool) -> Self {
        Self {
            effects: control.effects.clone(),
            control: control.clone(),
            participant,
            is_manual,
        }
    }
}

/// Runs a control's effects in order and resolves once all have completed.
#[async_trait]
pub trait EffectDispatcher: Send + Sync {
    async fn process_effects(&self, request: EffectRequest) -> Result<()>;
}

/// Key-up delivery for "Game Control" effects.
#[async_trait]
pub trait GameControlHandler: Send + Sync {
    async fn release(&self, effect: &Effect, control: &Control) -> Result<()>;
}

#[async_trait]
pub trait JoystickHandler: Send + Sync {
    async fn handle_move(&self, input: &InputEvent) -> Result<()>;
}

#[async_trait]
pub trait ChatConnector: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
}

pub struct MissingEffectDispatcher;

#[async_trait]
impl EffectDispatcher for MissingEffectDispatcher {
    async fn process_effects(&self, request: EffectRequest) -> Result<()> {
        Err(anyhow!(
            "no effect runner available for control {}",
            request.control.control_id
        ))
    }
}

pub struct MissingGameControlHandler;

#[async_trait]
impl GameControlHandler for MissingGameControlHandler {
    async fn release(&self, _effect: &Effect, control: &Control) -> Result<()> {
        Err(anyhow!(
            "game control input is unavailable for control {}",
            control.control_id
        ))
    }
}

pub struct MissingJoystickHandler;

#[async_trait]
impl JoystickHandler for MissingJoystickHandler {
    async fn handle_move(&self, input: &InputEvent) -> Result<()> {
        Err(anyhow!(
            "joystick input is unavailable for control {}",
            input.control_id
        ))
    }
}

/// Chat integration is optional; this connector does nothing.
pub struct DisabledChat;

#[async_trait]
impl ChatConnector for DisabledChat {
    async fn connect(&self) -> Result<()> {
        debug!("chat: disabled, skipping connect");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
