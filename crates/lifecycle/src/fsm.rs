use folder_mcp_protocol::{EngineError, FolderStatus, Result};

/// Whether `from -> to` is a legal transition.
#[must_use]
pub fn can_transition(from: FolderStatus, to: FolderStatus) -> bool {
    use FolderStatus::{Active, Error, Indexing, Pending, Ready, Scanning};
    matches!(
        (from, to),
        (Pending, Scanning)
            | (Pending, Error)
            | (Scanning, Ready)
            | (Scanning, Active)
            | (Scanning, Error)
            | (Ready, Indexing)
            | (Ready, Error)
            | (Indexing, Active)
            | (Indexing, Error)
            | (Active, Scanning)
            | (Active, Error)
    )
}

/// The folder status FSM, standalone and side-effect-free: callers own where
/// the current status is actually stored (the manager keeps it inside
/// `FolderLifecycleState` so there is one source of truth).
#[derive(Debug, Clone, Copy)]
pub struct LifecycleStateMachine {
    state: FolderStatus,
}

impl Default for LifecycleStateMachine {
    fn default() -> Self {
        Self { state: FolderStatus::Pending }
    }
}

impl LifecycleStateMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> FolderStatus {
        self.state
    }

    #[must_use]
    pub fn can_transition_to(&self, to: FolderStatus) -> bool {
        can_transition(self.state, to)
    }

    /// Fails on an illegal transition; callers treat this as a programmer
    /// error, not a recoverable condition.
    pub fn transition_to(&mut self, to: FolderStatus) -> Result<()> {
        if !self.can_transition_to(to) {
            return Err(EngineError::IllegalTransition {
                from: self.state.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.state = to;
        Ok(())
    }

    /// Returns to `pending`. Legal from any state, including `error`.
    pub fn reset(&mut self) {
        self.state = FolderStatus::Pending;
    }
}
