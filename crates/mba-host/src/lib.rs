//! MBA Host - hosting bridge between a native bootstrapper engine and a
//! bootstrapper application (BA)
//!
//! One invocation:
//! - selects the runtime generation for this host module variant
//! - loads the BA module and resolves its single registered factory
//! - creates the BA and runs it on a dedicated thread
//! - waits for the shutdown/reload handshake and returns a result code
//!
//! Every step writes to an ordered [`Trace`] that tests and diagnostics read
//! once the run has terminated.

pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod host;
pub mod loader;
pub mod manifest;
pub mod runtime;
pub mod shutdown;
pub mod trace;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::HostConfig;
pub use coordinator::{ExecutionCoordinator, RunHandle};
pub use engine::{HostedEngine, StandaloneEngine};
pub use error::HostError;
pub use host::{bootstrapper_application_run, BootstrapperHost, HostRun};
pub use loader::{BaFactoryHandle, FactoryLoader, ModuleRef, ModuleRegistry};
pub use manifest::HostManifest;
pub use runtime::{HostDescriptor, HostModule, RuntimeSelector};
pub use shutdown::{ProtocolPhase, ProtocolViolation, ShutdownProtocol};
pub use trace::{RunId, Trace};
