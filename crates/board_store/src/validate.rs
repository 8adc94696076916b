use std::collections::HashMap;

use shared::domain::{Board, ControlId, Effect, SceneId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardValidationError {
    #[error("scene id must not be empty")]
    EmptySceneId,
    #[error("duplicate scene '{0}'")]
    DuplicateScene(SceneId),
    #[error("control id in scene '{0}' must not be empty")]
    EmptyControlId(SceneId),
    #[error("control '{control_id}' is declared in both '{first}' and '{second}'")]
    DuplicateControl {
        control_id: ControlId,
        first: SceneId,
        second: SceneId,
    },
    #[error("reserved scene 'banned' must not declare controls")]
    BannedSceneHasControls,
    #[error("control '{0}' has a zero cooldown duration")]
    ZeroCooldown(ControlId),
    #[error("control '{control_id}' has a malformed '{type_name}' effect")]
    MalformedEffect {
        control_id: ControlId,
        type_name: String,
    },
}

/// Structural checks run once when a board is loaded. After this passes every
/// control id resolves to exactly one scene.
pub fn validate_board(board: &Board) -> Result<(), BoardValidationError> {
    let mut scenes: Vec<&SceneId> = Vec::with_capacity(board.scenes.len());
    let mut owners: HashMap<&ControlId, &SceneId> = HashMap::new();

    for scene in &board.scenes {
        if scene.scene_id.as_str().trim().is_empty() {
            return Err(BoardValidationError::EmptySceneId);
        }
        if scenes.contains(&&scene.scene_id) {
            return Err(BoardValidationError::DuplicateScene(scene.scene_id.clone()));
        }
        scenes.push(&scene.scene_id);

        if scene.scene_id.is_banned() && !scene.controls.is_empty() {
            return Err(BoardValidationError::BannedSceneHasControls);
        }

        for control in &scene.controls {
            if control.control_id.as_str().trim().is_empty() {
                return Err(BoardValidationError::EmptyControlId(scene.scene_id.clone()));
            }
            if let Some(first) = owners.insert(&control.control_id, &scene.scene_id) {
                return Err(BoardValidationError::DuplicateControl {
                    control_id: control.control_id.clone(),
                    first: first.clone(),
                    second: scene.scene_id.clone(),
                });
            }
            if control
                .cooldown
                .as_ref()
                .is_some_and(|cooldown| cooldown.duration_ms == 0)
            {
                return Err(BoardValidationError::ZeroCooldown(control.control_id.clone()));
            }
            // A known type that failed its own shape lands in `Other`.
            for effect in &control.effects {
                if let Effect::Other { type_name, .. } = effect {
                    if Effect::KNOWN_TYPES.contains(&type_name.as_str()) {
                        return Err(BoardValidationError::MalformedEffect {
                            control_id: control.control_id.clone(),
                            type_name: type_name.clone(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}
