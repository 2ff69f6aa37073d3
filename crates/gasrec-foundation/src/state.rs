use crate::error::CaptureError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Lifecycle of the external capture process, as seen by the supervisor.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    /// Spawn issued, no export seen yet.
    Starting,
    /// Export artifact is fresh.
    Running,
    /// Stale export or external kill; eligible for restart.
    Dead,
    /// Hardware absent at a restart point. Terminal.
    Fatal { reason: String },
}

impl CaptureState {
    fn name(&self) -> &'static str {
        match self {
            CaptureState::Starting => "Starting",
            CaptureState::Running => "Running",
            CaptureState::Dead => "Dead",
            CaptureState::Fatal { .. } => "Fatal",
        }
    }
}

/// Validated-transition wrapper around [`CaptureState`]. The supervisor holds
/// one of these; observers subscribe for transitions.
pub struct StateManager {
    state: Arc<RwLock<CaptureState>>,
    state_tx: Sender<CaptureState>,
    state_rx: Receiver<CaptureState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(CaptureState::Starting)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: CaptureState) -> Result<(), CaptureError> {
        let mut current = self.state.write();

        let valid = matches!(
            (&*current, &new_state),
            (CaptureState::Starting, CaptureState::Running)
                | (CaptureState::Starting, CaptureState::Dead)
                | (CaptureState::Running, CaptureState::Dead)
                | (CaptureState::Dead, CaptureState::Starting)
                | (CaptureState::Dead, CaptureState::Fatal { .. })
        );

        if !valid {
            return Err(CaptureError::InvalidTransition {
                from: current.name(),
                to: new_state.name(),
            });
        }

        tracing::info!("Capture state: {:?} -> {:?}", *current, new_state);
        *current = new_state.clone();
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> CaptureState {
        self.state.read().clone()
    }

    pub fn subscribe(&self) -> Receiver<CaptureState> {
        self.state_rx.clone()
    }
}
