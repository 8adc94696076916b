use board_store::ConfigError;
use shared::{
    domain::{ControlId, GroupId, SceneId},
    error::{ErrorKind, UiError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("no usable board: {0}")]
    Board(#[source] ConfigError),
    #[error("no auth token: {0}")]
    AuthToken(#[source] ConfigError),
    #[error("failed to open interactive connection: {0:#}")]
    Transport(anyhow::Error),
    #[error("interactive session event stream already taken")]
    EventStreamUnavailable,
    #[error("connection attempt superseded by a disconnect or reconnect")]
    Superseded,
    #[error("not connected to the interactive service")]
    NotConnected,
}

impl ConnectError {
    pub fn to_ui_error(&self) -> UiError {
        match self {
            ConnectError::Board(_) => UiError::new(
                ErrorKind::ConfigResolution,
                "You need to import an interactive board before trying to connect.",
            ),
            ConnectError::AuthToken(_) => UiError::new(
                ErrorKind::ConfigResolution,
                "You need to log in before connecting to the interactive service.",
            ),
            ConnectError::Transport(_) | ConnectError::EventStreamUnavailable => UiError::new(
                ErrorKind::Transport,
                "Error opening connection to the interactive service.",
            ),
            ConnectError::Superseded => {
                UiError::new(ErrorKind::Transport, "The connection attempt was cancelled.")
            }
            ConnectError::NotConnected => UiError::new(
                ErrorKind::Transport,
                "Connect to the interactive service before synchronizing the board.",
            ),
        }
    }
}

/// One variant per synchronization stage; stages fail independently.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("scene creation failed: {0:#}")]
    SceneCreation(anyhow::Error),
    #[error("banned scene creation failed: {0:#}")]
    BannedScene(anyhow::Error),
    #[error("group creation failed: {0:#}")]
    GroupCreation(anyhow::Error),
}

impl SyncError {
    pub fn to_ui_error(&self) -> UiError {
        let message = match self {
            SyncError::SceneCreation(_) => "Error creating scenes on the interactive service.",
            SyncError::BannedScene(_) => "Error creating the banned usergroup scene.",
            SyncError::GroupCreation(_) => "Error creating groups on the interactive service.",
        };
        UiError::new(ErrorKind::RemoteSync, message)
    }
}

#[derive(Debug, Error)]
pub enum CreateSceneError {
    #[error("not connected to the interactive service")]
    NotConnected,
    #[error("scene '{0}' is not declared on the active board")]
    UnknownScene(SceneId),
    #[error("failed to create scene '{scene_id}': {source:#}")]
    Remote {
        scene_id: SceneId,
        source: anyhow::Error,
    },
}

impl CreateSceneError {
    pub fn to_ui_error(&self) -> UiError {
        match self {
            CreateSceneError::NotConnected => UiError::new(
                ErrorKind::Transport,
                "Connect to the interactive service before creating scenes.",
            ),
            CreateSceneError::UnknownScene(scene_id) => UiError::new(
                ErrorKind::ConfigResolution,
                format!("There was an error creating your controls for scene {scene_id}."),
            ),
            CreateSceneError::Remote { scene_id, .. } => UiError::new(
                ErrorKind::RemoteSync,
                format!("Error creating scene {scene_id} on the interactive service."),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("control '{control_id}' is not on the active board")]
    UnknownControl {
        scene_id: Option<SceneId>,
        control_id: ControlId,
    },
}

impl RouteError {
    pub fn to_ui_error(&self) -> UiError {
        match self {
            RouteError::UnknownControl { control_id, .. } => UiError::new(
                ErrorKind::ConfigResolution,
                format!("Received input for {control_id}, which is not on the active board."),
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum ManualTriggerError {
    #[error("no active board: {0}")]
    NoActiveBoard(#[source] ConfigError),
    #[error("control '{0}' is not on the active board")]
    UnknownControl(ControlId),
}

impl ManualTriggerError {
    pub fn to_ui_error(&self) -> UiError {
        UiError::new(
            ErrorKind::ConfigResolution,
            "There was an error trying to manually activate this button.",
        )
    }
}

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("not connected to the interactive service")]
    NotConnected,
    #[error("group '{group_id}' does not exist on the interactive service")]
    GroupResolution { group_id: GroupId },
    #[error("interactive service rejected the group update: {0:#}")]
    Remote(anyhow::Error),
}

impl GroupError {
    pub fn to_ui_error(&self) -> UiError {
        match self {
            GroupError::NotConnected => UiError::new(
                ErrorKind::Transport,
                "Connect to the interactive service before changing groups.",
            ),
            GroupError::GroupResolution { group_id } => UiError::new(
                ErrorKind::GroupResolution,
                format!(
                    "A button tried to change someone to the group {group_id}, but that group \
                     could not be found on the interactive service. Make sure it has a default \
                     scene set."
                ),
            ),
            GroupError::Remote(_) => UiError::new(
                ErrorKind::RemoteSync,
                "Error updating groups on the interactive service.",
            ),
        }
    }
}
