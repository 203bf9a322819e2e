//! Shutdown/reload protocol
//!
//! ```text
//! Starting -> Running -> ShutdownRequested -> Closing -> Terminated
//!                 \_____________________________/
//!                    (thread exits without a request)
//! ```
//!
//! Only the first shutdown request made while `Running` is honoured. Once the
//! BA's `run` has returned the result is fixed in `Closing`, so what
//! `on_shutdown` is told is what the caller gets. The
//! transition to `Terminated` happens once, finalizes the [`ShutdownResult`]
//! and writes the terminal trace line under the same lock, so whoever
//! observes `Terminated` also observes the line.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use mba_host_sdk::{ShutdownAction, ShutdownResult};

use crate::trace::{RunId, Trace};

/// Observable phase of the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolPhase {
    Starting,
    Running,
    ShutdownRequested,
    Closing,
    Terminated,
}

/// Shutdown requests that were not honoured
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Shutdown requested before the BA thread started")]
    Premature,

    #[error("Shutdown already requested with {action},{exit_code}")]
    Duplicate { action: ShutdownAction, exit_code: i32 },

    #[error("Shutdown requested after the BA finished running")]
    Closing,

    #[error("Shutdown requested after the run terminated")]
    AfterTermination,
}

/// How the BA thread (or the waiter) ended the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadExit {
    /// `run` returned successfully
    Returned,
    /// `run` returned an error or panicked
    Faulted(String),
    /// The waiter stopped waiting
    TimedOut,
}

#[derive(Debug)]
enum State {
    Starting,
    Running,
    ShutdownRequested { action: ShutdownAction, exit_code: i32 },
    Closing(ShutdownResult),
    Terminated(ShutdownResult),
}

/// Shared state machine for one run
#[derive(Clone)]
pub struct ShutdownProtocol {
    run_id: RunId,
    state: Arc<Mutex<State>>,
    trace: Trace,
}

impl ShutdownProtocol {
    pub fn new(run_id: RunId, trace: Trace) -> Self {
        Self {
            run_id,
            state: Arc::new(Mutex::new(State::Starting)),
            trace,
        }
    }

    pub fn phase(&self) -> ProtocolPhase {
        match *self.state.lock() {
            State::Starting => ProtocolPhase::Starting,
            State::Running => ProtocolPhase::Running,
            State::ShutdownRequested { .. } => ProtocolPhase::ShutdownRequested,
            State::Closing(_) => ProtocolPhase::Closing,
            State::Terminated(_) => ProtocolPhase::Terminated,
        }
    }

    /// Enter `Running`. Called once the BA thread is committed to start.
    pub(crate) fn mark_running(&self) {
        let mut state = self.state.lock();
        if matches!(*state, State::Starting) {
            *state = State::Running;
        }
    }

    /// Record a shutdown request
    pub fn request(&self, action: ShutdownAction, exit_code: i32) -> Result<(), ProtocolViolation> {
        let mut state = self.state.lock();
        let violation = match &*state {
            State::Running => None,
            State::Starting => Some(ProtocolViolation::Premature),
            State::ShutdownRequested { action, exit_code } => Some(ProtocolViolation::Duplicate {
                action: *action,
                exit_code: *exit_code,
            }),
            State::Closing(_) => Some(ProtocolViolation::Closing),
            State::Terminated(_) => Some(ProtocolViolation::AfterTermination),
        };

        let Some(violation) = violation else {
            *state = State::ShutdownRequested { action, exit_code };
            tracing::debug!(run_id = %self.run_id, %action, exit_code, "Shutdown requested");
            return Ok(());
        };

        tracing::warn!(
            run_id = %self.run_id,
            %action,
            exit_code,
            error = %violation,
            "Ignoring shutdown request"
        );
        Err(violation)
    }

    /// Fix the result for this exit and stop accepting requests
    ///
    /// Returns the result `terminate` will finalize. A run that already
    /// terminated (the waiter timed out) keeps its result.
    pub(crate) fn close(&self, exit: &ThreadExit) -> ShutdownResult {
        let mut state = self.state.lock();
        let result = Self::resolve(&state, exit);
        if !matches!(*state, State::Terminated(_)) {
            *state = State::Closing(result.clone());
        }
        result
    }

    /// Enter `Terminated` and emit the terminal trace line
    ///
    /// The first call wins; later calls return the already finalized result.
    pub fn terminate(&self, exit: ThreadExit) -> ShutdownResult {
        let mut state = self.state.lock();
        if let State::Terminated(result) = &*state {
            return result.clone();
        }

        let result = Self::resolve(&state, &exit);
        self.trace.emit_terminal(result.trace_line());
        *state = State::Terminated(result.clone());

        if result.is_synthesized() {
            tracing::warn!(
                run_id = %self.run_id,
                cause = ?result.cause,
                exit_code = result.exit_code,
                "Run terminated without a shutdown request"
            );
        } else {
            tracing::info!(
                run_id = %self.run_id,
                action = %result.action,
                exit_code = result.exit_code,
                "Run terminated"
            );
        }

        result
    }

    /// Final result, once terminated
    pub fn result(&self) -> Option<ShutdownResult> {
        match &*self.state.lock() {
            State::Terminated(result) => Some(result.clone()),
            _ => None,
        }
    }

    fn resolve(state: &State, exit: &ThreadExit) -> ShutdownResult {
        match (state, exit) {
            (State::Terminated(result) | State::Closing(result), _) => result.clone(),
            (State::ShutdownRequested { action, exit_code }, _) => {
                ShutdownResult::requested(*action, *exit_code)
            }
            (_, ThreadExit::Returned) => ShutdownResult::no_shutdown_request(),
            (_, ThreadExit::Faulted(reason)) => ShutdownResult::faulted(reason.clone()),
            (_, ThreadExit::TimedOut) => ShutdownResult::timed_out(),
        }
    }
}

impl std::fmt::Debug for ShutdownProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownProtocol")
            .field("run_id", &self.run_id)
            .field("phase", &self.phase())
            .finish()
    }
}
