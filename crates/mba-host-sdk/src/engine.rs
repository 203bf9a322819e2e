//! Engine capability handle
//!
//! The engine is owned by the native side. The host and the bootstrapper
//! application only borrow it through an [`EngineHandle`] for the duration of
//! a run, and use it to log, read and write variables, and request shutdown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shutdown::ShutdownAction;

/// Log levels understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    None,
    Standard,
    Verbose,
    Debug,
    Error,
}

/// Operations the engine exposes to the host and the bootstrapper application
pub trait Engine: Send + Sync {
    /// Write a message to the engine log
    fn log(&self, level: LogLevel, message: &str);

    /// Read a variable, `None` if it is not set
    fn get_variable(&self, name: &str) -> Option<String>;

    /// Set a variable
    fn set_variable(&self, name: &str, value: &str);

    /// Ask the engine to end the run with the given action and exit code
    fn shutdown(&self, action: ShutdownAction, exit_code: i32);
}

/// Shared handle to an engine
pub type EngineHandle = Arc<dyn Engine>;
