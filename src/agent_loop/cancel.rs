//! Cancellation controller for one run.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Aborted,
    Finished,
}

/// Owns the abort signal of a run.
///
/// The transport observes [`CancellationController::token`]; the CLI
/// adapters kill their child process and the hosted adapter drops the
/// response body when it fires.
#[derive(Debug, Clone)]
pub struct CancellationController {
    token: CancellationToken,
    phase: Arc<Mutex<Phase>>,
}

impl Default for CancellationController {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationController {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            phase: Arc::new(Mutex::new(Phase::Active)),
        }
    }

    fn phase(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Request termination. Returns `false` (and does nothing) when the run
    /// already finished or was already aborted.
    pub fn abort(&self) -> bool {
        let mut phase = self.phase();
        if *phase != Phase::Active {
            return false;
        }
        *phase = Phase::Aborted;
        drop(phase);
        self.token.cancel();
        tracing::debug!("run abort requested");
        true
    }

    pub fn is_aborted(&self) -> bool {
        *self.phase() == Phase::Aborted
    }

    /// Token handed to the transport.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Close the run. Returns whether it ended aborted, so a natural
    /// completion racing an abort is still reported as aborted.
    pub fn finish(&self) -> bool {
        let mut phase = self.phase();
        match *phase {
            Phase::Active => {
                *phase = Phase::Finished;
                false
            }
            Phase::Aborted => true,
            Phase::Finished => false,
        }
    }
}
