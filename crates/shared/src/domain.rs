use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

pub const BANNED_SCENE: &str = "banned";
pub const BANNED_GROUP: &str = "banned";
pub const DEFAULT_GROUP: &str = "default";
/// Placeholder group name used by board editors for "no group".
pub const NONE_GROUP: &str = "None";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(SceneId);
id_newtype!(ControlId);
id_newtype!(GroupId);
id_newtype!(ParticipantSessionId);

impl SceneId {
    pub fn banned() -> Self {
        Self::new(BANNED_SCENE)
    }

    pub fn is_banned(&self) -> bool {
        self.0 == BANNED_SCENE
    }
}

impl GroupId {
    pub fn banned() -> Self {
        Self::new(BANNED_GROUP)
    }

    pub fn default_group() -> Self {
        Self::new(DEFAULT_GROUP)
    }

    pub fn is_none(&self) -> bool {
        self.0 == NONE_GROUP
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownScope {
    #[default]
    Control,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownConfig {
    pub duration_ms: u64,
    #[serde(default)]
    pub scope: CooldownScope,
}

impl CooldownConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    #[default]
    Button,
    Joystick,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Effect {
    #[serde(rename = "Game Control", rename_all = "camelCase")]
    GameControl {
        press: String,
        #[serde(default)]
        modifiers: Vec<String>,
        #[serde(default)]
        hold: bool,
    },
    #[serde(rename = "Play Sound", rename_all = "camelCase")]
    PlaySound {
        file: String,
        #[serde(default)]
        volume: Option<u8>,
    },
    #[serde(rename = "Show Image", rename_all = "camelCase")]
    ShowImage {
        file: String,
        #[serde(default)]
        duration_ms: Option<u64>,
    },
    #[serde(rename = "Change Group", rename_all = "camelCase")]
    ChangeGroup { group_id: GroupId },
    #[serde(rename = "Change Scene", rename_all = "camelCase")]
    ChangeScene { group_id: GroupId, scene_id: SceneId },
    #[serde(rename = "Delay", rename_all = "camelCase")]
    Delay { duration_ms: u64 },
    #[serde(rename = "Custom", rename_all = "camelCase")]
    Custom {
        name: String,
        #[serde(default)]
        params: serde_json::Value,
    },
    /// Any other effect type. The board still loads and the entry is handed
    /// to the effect dispatcher untouched.
    #[serde(untagged)]
    Other {
        #[serde(rename = "type")]
        type_name: String,
        #[serde(flatten)]
        params: serde_json::Map<String, serde_json::Value>,
    },
}

impl Effect {
    /// Type names with a dedicated variant.
    pub const KNOWN_TYPES: [&'static str; 7] = [
        "Game Control",
        "Play Sound",
        "Show Image",
        "Change Group",
        "Change Scene",
        "Delay",
        "Custom",
    ];

    pub fn type_name(&self) -> &str {
        match self {
            Effect::GameControl { .. } => "Game Control",
            Effect::PlaySound { .. } => "Play Sound",
            Effect::ShowImage { .. } => "Show Image",
            Effect::ChangeGroup { .. } => "Change Group",
            Effect::ChangeScene { .. } => "Change Scene",
            Effect::Delay { .. } => "Delay",
            Effect::Custom { .. } => "Custom",
            Effect::Other { type_name, .. } => type_name,
        }
    }

    pub fn is_game_control(&self) -> bool {
        matches!(self, Effect::GameControl { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Control {
    pub control_id: ControlId,
    #[serde(default)]
    pub kind: ControlKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown: Option<CooldownConfig>,
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Layout and other properties forwarded verbatim to the remote service.
    #[serde(default, flatten)]
    pub remote_props: serde_json::Map<String, serde_json::Value>,
}

impl Control {
    pub fn game_control_effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter().filter(|effect| effect.is_game_control())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub scene_id: SceneId,
    #[serde(default)]
    pub default_groups: Vec<GroupId>,
    #[serde(default)]
    pub controls: Vec<Control>,
}

impl Scene {
    pub fn banned() -> Self {
        Self {
            scene_id: SceneId::banned(),
            default_groups: Vec::new(),
            controls: Vec::new(),
        }
    }

    pub fn control(&self, control_id: &ControlId) -> Option<&Control> {
        self.controls
            .iter()
            .find(|control| &control.control_id == control_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: GroupId,
    pub scene_id: SceneId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    #[serde(default)]
    pub name: String,
    pub version_id: u64,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    /// Usernames per interactive group, used by the participant group queue.
    #[serde(default)]
    pub viewer_groups: BTreeMap<GroupId, Vec<String>>,
}

impl Board {
    pub fn scene(&self, scene_id: &SceneId) -> Option<&Scene> {
        self.scenes.iter().find(|scene| &scene.scene_id == scene_id)
    }

    /// Finds a control anywhere on the board together with its owning scene.
    pub fn control(&self, control_id: &ControlId) -> Option<(&Scene, &Control)> {
        self.scenes.iter().find_map(|scene| {
            scene
                .control(control_id)
                .map(|control| (scene, control))
        })
    }

    /// Every group declared as a scene default, first declaration wins, plus
    /// the reserved banned group bound to the banned scene.
    pub fn groups(&self) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        for scene in &self.scenes {
            for group_id in &scene.default_groups {
                if group_id.is_none() || group_id.as_str() == BANNED_GROUP {
                    continue;
                }
                if groups.iter().any(|group| &group.group_id == group_id) {
                    continue;
                }
                groups.push(Group {
                    group_id: group_id.clone(),
                    scene_id: scene.scene_id.clone(),
                });
            }
        }
        groups.push(Group {
            group_id: GroupId::banned(),
            scene_id: SceneId::banned(),
        });
        groups
    }

    pub fn viewer_group_for(&self, username: &str) -> Option<&GroupId> {
        self.viewer_groups.iter().find_map(|(group_id, usernames)| {
            usernames
                .iter()
                .any(|name| name.eq_ignore_ascii_case(username))
                .then_some(group_id)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub session_id: ParticipantSessionId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    pub group_id: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputPhase {
    Press,
    Release,
    Move,
}

impl InputPhase {
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "mousedown" => Some(Self::Press),
            "mouseup" => Some(Self::Release),
            "move" => Some(Self::Move),
            _ => None,
        }
    }

    pub fn event_name(self) -> &'static str {
        match self {
            Self::Press => "mousedown",
            Self::Release => "mouseup",
            Self::Move => "move",
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
