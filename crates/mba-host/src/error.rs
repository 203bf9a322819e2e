//! Host error types

use thiserror::Error;

/// Errors that stop a host invocation before or while the BA thread starts
///
/// Each variant maps to a distinct negative result code returned to the
/// native caller.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to activate runtime: {0}")]
    RuntimeActivation(String),

    #[error("Failed to load module {module}: {reason}")]
    ModuleLoad { module: String, reason: String },

    #[error("Failed to resolve the bootstrapper application factory in {module}: {reason}")]
    FactoryResolution { module: String, reason: String },

    #[error("Failed to create the bootstrapper application from {module}: {reason}")]
    BaInstantiation { module: String, reason: String },

    #[error("Invalid host manifest: {0:#}")]
    Manifest(anyhow::Error),

    #[error("Failed to spawn the BA thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("Failed to build the wait runtime: {0}")]
    WaitRuntime(#[source] std::io::Error),
}

impl HostError {
    /// Result code reported to the native caller
    pub fn code(&self) -> i32 {
        let hresult: u32 = match self {
            // CLR_E_SHIM_RUNTIMELOAD
            HostError::RuntimeActivation(_) => 0x8013_1700,
            // HRESULT_FROM_WIN32(ERROR_MOD_NOT_FOUND)
            HostError::ModuleLoad { .. } => 0x8007_007E,
            // E_NOTFOUND
            HostError::FactoryResolution { .. } => 0x8007_0490,
            // E_FAIL
            HostError::BaInstantiation { .. } => 0x8000_4005,
            // HRESULT_FROM_WIN32(ERROR_INVALID_DATA)
            HostError::Manifest(_) => 0x8007_000D,
            // E_OUTOFMEMORY
            HostError::ThreadSpawn(_) => 0x8007_000E,
            // HRESULT_FROM_WIN32(ERROR_INTERNAL_ERROR)
            HostError::WaitRuntime(_) => 0x8007_054F,
        };
        hresult as i32
    }
}
