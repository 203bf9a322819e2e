//! Engine wrappers
//!
//! [`HostedEngine`] is what the bootstrapper application actually receives:
//! it records log lines in the run's trace and routes shutdown requests
//! through the protocol before forwarding both to the native engine.
//!
//! [`StandaloneEngine`] is an in-process engine used by the `mbahost`
//! binary and by tests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use mba_host_sdk::{Engine, EngineHandle, LogLevel, ShutdownAction};

use crate::shutdown::ShutdownProtocol;
use crate::trace::Trace;

/// Engine handle given to the bootstrapper application for one run
pub struct HostedEngine {
    native: EngineHandle,
    trace: Trace,
    protocol: ShutdownProtocol,
}

impl HostedEngine {
    pub fn new(native: EngineHandle, trace: Trace, protocol: ShutdownProtocol) -> Self {
        Self {
            native,
            trace,
            protocol,
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn protocol(&self) -> &ShutdownProtocol {
        &self.protocol
    }
}

impl Engine for HostedEngine {
    fn log(&self, level: LogLevel, message: &str) {
        if level != LogLevel::None {
            self.trace.emit(message);
        }
        self.native.log(level, message);
    }

    fn get_variable(&self, name: &str) -> Option<String> {
        self.native.get_variable(name)
    }

    fn set_variable(&self, name: &str, value: &str) {
        self.native.set_variable(name, value);
    }

    fn shutdown(&self, action: ShutdownAction, exit_code: i32) {
        // Violations are logged by the protocol and never reach the native engine.
        if self.protocol.request(action, exit_code).is_ok() {
            self.native.shutdown(action, exit_code);
        }
    }
}

/// In-process engine that keeps variables in memory and logs through `tracing`
#[derive(Default)]
pub struct StandaloneEngine {
    variables: RwLock<HashMap<String, String>>,
    messages: Mutex<Vec<String>>,
    shutdown: Mutex<Option<(ShutdownAction, i32)>>,
}

impl StandaloneEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variable(self, name: &str, value: &str) -> Self {
        self.variables.write().insert(name.to_string(), value.to_string());
        self
    }

    pub fn into_handle(self) -> EngineHandle {
        Arc::new(self)
    }

    /// Every message logged through this engine
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// The last shutdown request forwarded to this engine
    pub fn shutdown_request(&self) -> Option<(ShutdownAction, i32)> {
        *self.shutdown.lock()
    }
}

impl Engine for StandaloneEngine {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::None => return,
            LogLevel::Error => tracing::error!(target: "mba_host::engine", "{}", message),
            LogLevel::Standard => tracing::info!(target: "mba_host::engine", "{}", message),
            LogLevel::Verbose | LogLevel::Debug => {
                tracing::debug!(target: "mba_host::engine", "{}", message)
            }
        }
        self.messages.lock().push(message.to_string());
    }

    fn get_variable(&self, name: &str) -> Option<String> {
        self.variables.read().get(name).cloned()
    }

    fn set_variable(&self, name: &str, value: &str) {
        self.variables.write().insert(name.to_string(), value.to_string());
    }

    fn shutdown(&self, action: ShutdownAction, exit_code: i32) {
        tracing::info!(%action, exit_code, "Engine received shutdown request");
        *self.shutdown.lock() = Some((action, exit_code));
    }
}
