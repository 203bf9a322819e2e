//! Host entry point
//!
//! A [`BootstrapperHost`] is what the native engine drives. One invocation
//! selects the runtime, loads the BA module, creates the BA through its
//! factory, starts it on its own thread and, for [`BootstrapperHost::run`],
//! waits for the shutdown handshake and returns the result code.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use mba_host_sdk::{BootstrapperCommand, EngineHandle, ShutdownResult};

use crate::config::HostConfig;
use crate::coordinator::{ExecutionCoordinator, RunHandle};
use crate::engine::HostedEngine;
use crate::error::HostError;
use crate::loader::{FactoryLoader, LoadedModule, ModuleRef, ModuleRegistry};
use crate::manifest::HostManifest;
use crate::runtime::{HostDescriptor, HostModule, RuntimeSelector};
use crate::shutdown::ShutdownProtocol;
use crate::trace::{RunId, Trace};

/// Outcome of a completed invocation
#[derive(Debug, Clone)]
pub struct HostRun {
    pub result: ShutdownResult,
    pub trace: Vec<String>,
}

/// Hosting bridge between a native engine and a bootstrapper application
pub struct BootstrapperHost {
    config: HostConfig,
    selector: RuntimeSelector,
    loader: FactoryLoader,
    /// Module of the most recent run, released by `destroy`
    module: Mutex<Option<Arc<LoadedModule>>>,
}

impl BootstrapperHost {
    pub fn new(config: HostConfig) -> Self {
        Self::with_registry(config, Arc::new(ModuleRegistry::new()))
    }

    /// Host that resolves registered modules from `registry`
    pub fn with_registry(config: HostConfig, registry: Arc<ModuleRegistry>) -> Self {
        Self {
            selector: RuntimeSelector::new(config.installed_runtimes.clone()),
            loader: FactoryLoader::new(registry),
            module: Mutex::new(None),
            config,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        self.loader.registry()
    }

    /// The runtime this host activated, if any run got that far
    pub fn descriptor(&self) -> Option<HostDescriptor> {
        self.selector.active()
    }

    /// Start the module named by the host manifest
    pub fn start(&self, engine: EngineHandle, command: BootstrapperCommand) -> Result<RunHandle, HostError> {
        let descriptor = self.activate()?;
        let module = self.manifest_module(&self.config.app_base)?;
        self.launch(descriptor, &module, engine, command)
    }

    /// Start a specific module, bypassing the host manifest
    pub fn start_module(
        &self,
        module: &ModuleRef,
        engine: EngineHandle,
        command: BootstrapperCommand,
    ) -> Result<RunHandle, HostError> {
        let descriptor = self.activate()?;
        self.launch(descriptor, module, engine, command)
    }

    /// Start the manifest's module and wait for the run to terminate
    pub fn run_to_completion(
        &self,
        engine: EngineHandle,
        command: BootstrapperCommand,
    ) -> Result<HostRun, HostError> {
        let handle = self.start(engine, command)?;
        self.finish(handle)
    }

    /// Start `module` and wait for the run to terminate
    pub fn run_module_to_completion(
        &self,
        module: &ModuleRef,
        engine: EngineHandle,
        command: BootstrapperCommand,
    ) -> Result<HostRun, HostError> {
        let handle = self.start_module(module, engine, command)?;
        self.finish(handle)
    }

    /// Run the manifest's module and return the result code for the native caller
    pub fn run(&self, engine: EngineHandle, command: BootstrapperCommand) -> i32 {
        match self.run_to_completion(engine, command) {
            Ok(run) => run.result.exit_code,
            Err(e) => {
                tracing::error!(error = %e, code = e.code(), "Bootstrapper host failed");
                e.code()
            }
        }
    }

    /// Release the module loaded by the last run
    ///
    /// A BA thread that is still running keeps its own reference.
    pub fn destroy(&self) {
        if let Some(module) = self.module.lock().take() {
            tracing::info!(module = %module.name, "Releasing bootstrapper application module");
        }
    }

    fn activate(&self) -> Result<HostDescriptor, HostError> {
        let module: HostModule = self.config.host_module.parse()?;
        self.selector.activate(module)
    }

    fn manifest_module(&self, app_base: &Path) -> Result<ModuleRef, HostError> {
        let manifest = HostManifest::load(app_base).map_err(HostError::Manifest)?;
        Ok(manifest.module_ref(app_base))
    }

    fn launch(
        &self,
        descriptor: HostDescriptor,
        module: &ModuleRef,
        engine: EngineHandle,
        command: BootstrapperCommand,
    ) -> Result<RunHandle, HostError> {
        let run_id = RunId::new();
        let span = tracing::info_span!("mba_run", run_id = %run_id, module = %module);
        let _entered = span.enter();

        let factory = self.loader.load(module, &descriptor)?;

        let trace = Trace::new();
        let protocol = ShutdownProtocol::new(run_id, trace.clone());
        let hosted = Arc::new(HostedEngine::new(engine, trace, protocol));

        let ba = factory.create(&hosted, &command)?;

        let loaded = Arc::clone(factory.module());
        *self.module.lock() = Some(Arc::clone(&loaded));
        drop(factory);

        ExecutionCoordinator::new(run_id, hosted).start(ba, Some(loaded))
    }

    fn finish(&self, handle: RunHandle) -> Result<HostRun, HostError> {
        let trace = handle.trace().clone();
        let result = handle.wait(self.config.wait_timeout())?;
        Ok(HostRun {
            result,
            trace: trace.snapshot(),
        })
    }
}

impl Drop for BootstrapperHost {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Single entry point for a native engine
///
/// Builds a host from `config`, runs the module named by its manifest and
/// blocks until the run terminates. Always returns a result code.
pub fn bootstrapper_application_run(
    config: &HostConfig,
    engine: EngineHandle,
    command: BootstrapperCommand,
) -> i32 {
    BootstrapperHost::new(config.clone()).run(engine, command)
}
