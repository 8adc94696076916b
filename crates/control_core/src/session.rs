use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Identity of one live connection. Continuations spawned on behalf of a
/// session check the guard before applying side effects, so work belonging
/// to a torn-down connection is dropped instead of applied.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SessionGuard {
    pub(crate) fn new(generation: u64, current: Arc<AtomicU64>) -> Self {
        Self {
            generation,
            current,
        }
    }

    /// A guard that stays current forever, for driving components directly.
    pub fn detached() -> Self {
        Self::new(0, Arc::new(AtomicU64::new(0)))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub generation: u64,
    pub board_name: String,
    pub version_id: u64,
    /// False when a synchronization stage failed; control traffic stays gated
    /// until a later resynchronize succeeds.
    pub synchronized: bool,
}
