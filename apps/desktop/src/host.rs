use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use control_core::{EffectDispatcher, EffectRequest, GameControlHandler, JoystickHandler};
use interactive_integration::InputEvent;
use shared::domain::{Control, Effect};
use tracing::{debug, info};

/// Runs effects by logging them. Delays are honoured so ordering matches a
/// real effect runner.
pub struct LoggingEffects;

#[async_trait]
impl EffectDispatcher for LoggingEffects {
    async fn process_effects(&self, request: EffectRequest) -> Result<()> {
        let username = request
            .participant
            .as_ref()
            .map(|participant| participant.username.as_str())
            .unwrap_or("You");
        for effect in &request.effects {
            match effect {
                Effect::Delay { duration_ms } => {
                    tokio::time::sleep(Duration::from_millis(*duration_ms)).await;
                }
                other => info!(
                    control_id = %request.control.control_id,
                    %username,
                    manual = request.is_manual,
                    effect = other.type_name(),
                    "effects: run"
                ),
            }
        }
        Ok(())
    }
}

pub struct LoggingGameControls;

#[async_trait]
impl GameControlHandler for LoggingGameControls {
    async fn release(&self, effect: &Effect, control: &Control) -> Result<()> {
        if let Effect::GameControl { press, .. } = effect {
            debug!(control_id = %control.control_id, key = %press, "game control: key up");
        }
        Ok(())
    }
}

pub struct LoggingJoystick;

#[async_trait]
impl JoystickHandler for LoggingJoystick {
    async fn handle_move(&self, input: &InputEvent) -> Result<()> {
        debug!(control_id = %input.control_id, payload = %input.payload, "joystick: move");
        Ok(())
    }
}
