pub mod collaborators;
pub mod controller;
pub mod cooldown;
pub mod error;
pub mod group_queue;
pub mod participants;
pub mod router;
pub mod session;
pub mod sync;

pub use collaborators::{
    ChatConnector, DisabledChat, EffectDispatcher, EffectRequest, GameControlHandler,
    JoystickHandler, MissingEffectDispatcher, MissingGameControlHandler, MissingJoystickHandler,
};
pub use controller::{Collaborators, ControllerSettings, InteractiveController};
pub use cooldown::{CooldownDecision, CooldownGate, CooldownKey};
pub use error::{
    ConnectError, CreateSceneError, GroupError, ManualTriggerError, RouteError, SyncError,
};
pub use group_queue::{GroupQueueContext, ParticipantGroupQueue};
pub use participants::ParticipantRegistry;
pub use router::{ControlRouter, DispatchTable, RouteContext, RouteOutcome};
pub use session::{SessionGuard, SessionHandle};
pub use sync::{SceneSynchronizer, SyncReport};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
