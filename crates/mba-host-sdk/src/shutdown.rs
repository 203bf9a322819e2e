//! Shutdown/reload handshake values
//!
//! A run ends with exactly one [`ShutdownResult`]. When the bootstrapper
//! application asked for shutdown, the result echoes the action and exit
//! code it supplied. Otherwise the host synthesizes one whose exit code is
//! one of the `EXIT_*` constants below and whose [`TerminationCause`] says why.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exit code when the BA thread ended without requesting shutdown (`ERROR_CANCELLED`)
pub const EXIT_NO_SHUTDOWN: i32 = 0x8007_04C7_u32 as i32;

/// Exit code when the BA failed or panicked before requesting shutdown (`E_UNEXPECTED`)
pub const EXIT_FAULTED: i32 = 0x8000_FFFF_u32 as i32;

/// Exit code when the BA thread did not finish within the host's wait (`ERROR_TIMEOUT`)
pub const EXIT_TIMED_OUT: i32 = 0x8007_05B4_u32 as i32;

/// What the engine should do once the host returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ShutdownAction {
    #[default]
    None,
    Restart,
    ReloadBootstrapper,
}

impl fmt::Display for ShutdownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownAction::None => "None",
            ShutdownAction::Restart => "Restart",
            ShutdownAction::ReloadBootstrapper => "ReloadBootstrapper",
        };
        f.write_str(name)
    }
}

/// How the run reached its terminal state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationCause {
    /// The BA (or the engine on its behalf) requested shutdown
    Requested,
    /// The BA thread returned without requesting shutdown
    NoShutdownRequest,
    /// The BA returned an error or panicked
    Faulted(String),
    /// The host stopped waiting for the BA thread
    TimedOut,
}

/// Final outcome of one host invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownResult {
    pub action: ShutdownAction,
    pub exit_code: i32,
    pub cause: TerminationCause,
}

impl ShutdownResult {
    /// Result for an honoured shutdown request
    pub fn requested(action: ShutdownAction, exit_code: i32) -> Self {
        Self {
            action,
            exit_code,
            cause: TerminationCause::Requested,
        }
    }

    /// Result synthesized when the BA thread returned without requesting shutdown
    pub fn no_shutdown_request() -> Self {
        Self {
            action: ShutdownAction::None,
            exit_code: EXIT_NO_SHUTDOWN,
            cause: TerminationCause::NoShutdownRequest,
        }
    }

    /// Result synthesized for a failed or panicked BA
    pub fn faulted(reason: impl Into<String>) -> Self {
        Self {
            action: ShutdownAction::None,
            exit_code: EXIT_FAULTED,
            cause: TerminationCause::Faulted(reason.into()),
        }
    }

    /// Result synthesized when the host gave up waiting
    pub fn timed_out() -> Self {
        Self {
            action: ShutdownAction::None,
            exit_code: EXIT_TIMED_OUT,
            cause: TerminationCause::TimedOut,
        }
    }

    /// Whether this result was synthesized by the host rather than requested
    pub fn is_synthesized(&self) -> bool {
        self.cause != TerminationCause::Requested
    }

    /// The terminal trace line, `Shutdown,<Action>,<ExitCode>`
    pub fn trace_line(&self) -> String {
        format!("Shutdown,{},{}", self.action, self.exit_code)
    }
}
