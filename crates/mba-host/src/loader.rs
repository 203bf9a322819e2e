//! Module and factory loading
//!
//! Loads a bootstrapper application module and resolves the single factory
//! it registers. Two module sources are supported:
//!
//! - dynamic libraries (.so/.dll/.dylib) exporting the registration table
//!   under [`REGISTRATION_SYMBOL`]
//! - modules registered in-process with a [`ModuleRegistry`]
//!
//! A module must register exactly one factory, built for the generation the
//! host activated.
//!
//! # Safety
//!
//! Factories, BAs and the registration table itself are code inside the
//! loaded library. Every [`BaFactoryHandle`] and every BA thread keeps the
//! [`LoadedModule`] alive, so the library is unloaded only after the last of
//! them is gone.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use libloading::{Library, Symbol};
use parking_lot::RwLock;

use mba_host_sdk::{
    BootstrapperApplication, BootstrapperCommand, Engine, EngineHandle, FactoryRegistration,
    LogLevel, RegistrationTableFn, REGISTRATION_SYMBOL,
};

use crate::engine::HostedEngine;
use crate::error::HostError;
use crate::runtime::HostDescriptor;
use crate::trace::LOADING_MESSAGE;

/// Where a bootstrapper application module comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// A dynamic library on disk
    Library(PathBuf),
    /// A module registered in the host's [`ModuleRegistry`]
    Registered(String),
}

impl fmt::Display for ModuleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleRef::Library(path) => write!(f, "{}", path.display()),
            ModuleRef::Registered(name) => f.write_str(name),
        }
    }
}

/// In-process registration table for statically linked modules
#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<HashMap<String, Vec<FactoryRegistration>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a factory registration to a module
    ///
    /// Registering twice under the same module name is allowed here and is
    /// rejected when the module is loaded.
    pub fn register(&self, module: &str, registration: FactoryRegistration) {
        self.modules
            .write()
            .entry(module.to_string())
            .or_default()
            .push(registration);
        tracing::debug!(module, factory = registration.type_name, "Registered factory");
    }

    /// Declare a module with no registrations yet
    pub fn declare(&self, module: &str) {
        self.modules.write().entry(module.to_string()).or_default();
    }

    pub fn registrations(&self, module: &str) -> Option<Vec<FactoryRegistration>> {
        self.modules.read().get(module).cloned()
    }

    pub fn contains(&self, module: &str) -> bool {
        self.modules.read().contains_key(module)
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A loaded module, kept alive while anything created from it exists
pub struct LoadedModule {
    /// The library, if the module came from disk (must outlive all BA code)
    _library: Option<Library>,

    /// Module name for diagnostics
    pub name: String,

    /// When the module was loaded
    pub loaded_at: Instant,
}

impl Drop for LoadedModule {
    fn drop(&mut self) {
        tracing::debug!(module = %self.name, "Released module");
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("dynamic", &self._library.is_some())
            .finish()
    }
}

/// The factory registration resolved from a loaded module
pub struct BaFactoryHandle {
    registration: FactoryRegistration,
    module: Arc<LoadedModule>,
}

impl BaFactoryHandle {
    pub fn type_name(&self) -> &'static str {
        self.registration.type_name
    }

    pub fn module(&self) -> &Arc<LoadedModule> {
        &self.module
    }

    /// Instantiate the factory and create the bootstrapper application
    ///
    /// Emits the loading line right before handing control to `create`.
    pub fn create(
        &self,
        engine: &Arc<HostedEngine>,
        command: &BootstrapperCommand,
    ) -> Result<Box<dyn BootstrapperApplication>, HostError> {
        let instantiation_error = |reason: String| HostError::BaInstantiation {
            module: self.module.name.clone(),
            reason,
        };

        let registration = self.registration;
        let factory = panic::catch_unwind(move || registration.instantiate())
            .map_err(|payload| instantiation_error(panic_message(payload.as_ref())))?;

        engine.log(LogLevel::Standard, LOADING_MESSAGE);

        let handle: EngineHandle = engine.clone();
        let created = panic::catch_unwind(AssertUnwindSafe(|| factory.create(handle, command)))
            .map_err(|payload| instantiation_error(panic_message(payload.as_ref())))?;

        created.map_err(|e| instantiation_error(e.to_string()))
    }
}

impl fmt::Debug for BaFactoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaFactoryHandle")
            .field("factory", &self.registration.type_name)
            .field("generation", &self.registration.generation)
            .field("module", &self.module.name)
            .finish()
    }
}

/// Resolves factories from module references
#[derive(Debug, Clone)]
pub struct FactoryLoader {
    registry: Arc<ModuleRegistry>,
}

impl FactoryLoader {
    pub fn new(registry: Arc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    /// Load a module and resolve its factory for the active runtime
    pub fn load(&self, module: &ModuleRef, host: &HostDescriptor) -> Result<BaFactoryHandle, HostError> {
        let (loaded, registrations) = match module {
            ModuleRef::Library(path) => {
                // Safety: the registration table contract is documented on
                // `RegistrationTableFn`; the library is kept in `LoadedModule`.
                unsafe { Self::open_library(path)? }
            }
            ModuleRef::Registered(name) => {
                let registrations = self.registry.registrations(name).ok_or_else(|| {
                    HostError::ModuleLoad {
                        module: name.clone(),
                        reason: "module is not registered".to_string(),
                    }
                })?;
                let loaded = LoadedModule {
                    _library: None,
                    name: name.clone(),
                    loaded_at: Instant::now(),
                };
                (loaded, registrations)
            }
        };

        let registration = resolve(&loaded.name, &registrations, host)?;

        tracing::info!(
            module = %loaded.name,
            factory = registration.type_name,
            generation = %registration.generation,
            "Resolved bootstrapper application factory"
        );

        Ok(BaFactoryHandle {
            registration,
            module: Arc::new(loaded),
        })
    }

    /// Open a dynamic library and read its registration table
    ///
    /// # Safety
    /// Runs the library's initialisers and its exported table function.
    unsafe fn open_library(path: &Path) -> Result<(LoadedModule, Vec<FactoryRegistration>), HostError> {
        let name = path.display().to_string();

        if !path.exists() {
            return Err(HostError::ModuleLoad {
                module: name,
                reason: "library not found".to_string(),
            });
        }

        let library = Library::new(path).map_err(|e| HostError::ModuleLoad {
            module: name.clone(),
            reason: e.to_string(),
        })?;

        // No exported table means no factory registration at all.
        let registrations = match library.get::<RegistrationTableFn>(REGISTRATION_SYMBOL) {
            Ok(table) => {
                let table: Symbol<RegistrationTableFn> = table;
                let table_fn: RegistrationTableFn = *table;
                table_fn().to_vec()
            }
            Err(e) => {
                tracing::debug!(module = %name, error = %e, "Registration table not exported");
                Vec::new()
            }
        };

        tracing::info!("Loaded module: {}", name);

        let loaded = LoadedModule {
            _library: Some(library),
            name,
            loaded_at: Instant::now(),
        };
        Ok((loaded, registrations))
    }
}

/// Pick the one registration a module must declare
fn resolve(
    module: &str,
    registrations: &[FactoryRegistration],
    host: &HostDescriptor,
) -> Result<FactoryRegistration, HostError> {
    let resolution_error = |reason: String| HostError::FactoryResolution {
        module: module.to_string(),
        reason,
    };

    let registration = match registrations {
        [one] => *one,
        [] => return Err(resolution_error("no factory is registered".to_string())),
        many => {
            let names: Vec<_> = many.iter().map(|r| r.type_name).collect();
            return Err(resolution_error(format!(
                "{} factories are registered ({}), expected exactly one",
                many.len(),
                names.join(", ")
            )));
        }
    };

    if registration.generation != host.generation {
        return Err(resolution_error(format!(
            "factory {} targets {}, but the host activated {}",
            registration.type_name, registration.generation, host.generation
        )));
    }

    Ok(registration)
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::HostModule;
    use crate::test_support::{
        hosted_engine, ExampleBaFactory, FailingFactory, LatestCoreBaFactory,
    };
    use mba_host_sdk::RuntimeGeneration;

    fn latest() -> HostDescriptor {
        HostDescriptor::for_module(HostModule::DncHostLatest)
    }

    fn loader_with(module: &str, registrations: &[FactoryRegistration]) -> FactoryLoader {
        let registry = Arc::new(ModuleRegistry::new());
        registry.declare(module);
        for registration in registrations {
            registry.register(module, *registration);
        }
        FactoryLoader::new(registry)
    }

    #[test]
    fn test_resolve_single_registration() {
        let loader = loader_with(
            "Example.LatestCoreMBA",
            &[FactoryRegistration::of::<LatestCoreBaFactory>(RuntimeGeneration::CoreLatest)],
        );

        let handle = loader
            .load(&ModuleRef::Registered("Example.LatestCoreMBA".into()), &latest())
            .unwrap();
        assert!(handle.type_name().ends_with("LatestCoreBaFactory"));
        assert_eq!(handle.module().name, "Example.LatestCoreMBA");
    }

    #[test]
    fn test_zero_registrations() {
        let loader = loader_with("Empty", &[]);

        let err = loader
            .load(&ModuleRef::Registered("Empty".into()), &latest())
            .unwrap_err();
        assert!(matches!(err, HostError::FactoryResolution { .. }));
        assert!(err.to_string().contains("no factory"));
    }

    #[test]
    fn test_multiple_registrations() {
        let loader = loader_with(
            "Twice",
            &[
                FactoryRegistration::of::<ExampleBaFactory>(RuntimeGeneration::CoreLatest),
                FactoryRegistration::of::<LatestCoreBaFactory>(RuntimeGeneration::CoreLatest),
            ],
        );

        let err = loader
            .load(&ModuleRef::Registered("Twice".into()), &latest())
            .unwrap_err();
        assert!(matches!(err, HostError::FactoryResolution { .. }));
        assert!(err.to_string().contains("2 factories"));
    }

    #[test]
    fn test_generation_mismatch() {
        let loader = loader_with(
            "Old",
            &[FactoryRegistration::of::<ExampleBaFactory>(RuntimeGeneration::LegacyFrameworkV2)],
        );

        let err = loader
            .load(&ModuleRef::Registered("Old".into()), &latest())
            .unwrap_err();
        assert!(matches!(err, HostError::FactoryResolution { .. }));
    }

    #[test]
    fn test_unknown_module_and_missing_library() {
        let loader = FactoryLoader::new(Arc::new(ModuleRegistry::new()));

        let err = loader
            .load(&ModuleRef::Registered("Nope".into()), &latest())
            .unwrap_err();
        assert!(matches!(err, HostError::ModuleLoad { .. }));

        let err = loader
            .load(
                &ModuleRef::Library(PathBuf::from("/nonexistent/libexample_ba.so")),
                &latest(),
            )
            .unwrap_err();
        assert!(matches!(err, HostError::ModuleLoad { .. }));
    }

    #[test]
    fn test_create_emits_loading_line_first() {
        let loader = loader_with(
            "Example",
            &[FactoryRegistration::of::<ExampleBaFactory>(RuntimeGeneration::CoreLatest)],
        );
        let handle = loader
            .load(&ModuleRef::Registered("Example".into()), &latest())
            .unwrap();

        let (_native, engine) = hosted_engine();
        let _ba = handle.create(&engine, &BootstrapperCommand::default()).unwrap();

        assert_eq!(engine.trace().snapshot(), vec![LOADING_MESSAGE]);
    }

    #[test]
    fn test_create_failure_is_instantiation_error() {
        let loader = loader_with(
            "Failing",
            &[FactoryRegistration::of::<FailingFactory>(RuntimeGeneration::CoreLatest)],
        );
        let handle = loader
            .load(&ModuleRef::Registered("Failing".into()), &latest())
            .unwrap();

        let (_native, engine) = hosted_engine();
        let err = match handle.create(&engine, &BootstrapperCommand::default()) {
            Ok(_) => panic!("create should fail"),
            Err(e) => e,
        };
        assert!(matches!(err, HostError::BaInstantiation { .. }));
        assert!(err.to_string().contains("no UI available"));
        // The loading line is written before create is attempted.
        assert_eq!(engine.trace().snapshot(), vec![LOADING_MESSAGE]);
    }

    /// Path of the C library this test binary is linked against
    #[cfg(target_os = "linux")]
    fn mapped_libc() -> Option<PathBuf> {
        let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
        maps.lines()
            .filter_map(|line| line.split_whitespace().nth(5))
            .find(|path| path.contains("/libc.so") || path.contains("/libc-"))
            .map(PathBuf::from)
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_registration_table() {
        // Statically linked test binaries map no libc.
        let Some(libc) = mapped_libc() else { return };
        let loader = FactoryLoader::new(Arc::new(ModuleRegistry::new()));

        let err = loader.load(&ModuleRef::Library(libc), &latest()).unwrap_err();
        assert!(matches!(err, HostError::FactoryResolution { .. }));
        assert!(err.to_string().contains("no factory is registered"));
    }

    #[test]
    #[ignore = "builds demos/example-ba with cargo"]
    fn test_load_example_ba_library() {
        use crate::coordinator::ExecutionCoordinator;
        use crate::trace::{RunId, CREATING_THREAD_MESSAGE};
        use mba_host_sdk::{ShutdownAction, ShutdownResult};

        let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let demo = manifest_dir.join("../../demos/example-ba/Cargo.toml");
        let target = tempfile::tempdir().unwrap();

        let status = std::process::Command::new(env!("CARGO"))
            .args(["build", "--manifest-path"])
            .arg(&demo)
            .arg("--target-dir")
            .arg(target.path())
            .status()
            .unwrap();
        assert!(status.success());

        let library = target
            .path()
            .join("debug")
            .join(libloading::library_filename("example_ba"));
        let loader = FactoryLoader::new(Arc::new(ModuleRegistry::new()));
        let handle = loader.load(&ModuleRef::Library(library), &latest()).unwrap();
        assert!(handle.type_name().ends_with("ExampleBaFactory"));

        let (native, engine) = hosted_engine();
        let ba = handle.create(&engine, &BootstrapperCommand::default()).unwrap();
        let result = ExecutionCoordinator::new(RunId::new(), engine.clone())
            .start(ba, Some(handle.module().clone()))
            .unwrap()
            .wait(std::time::Duration::from_secs(10))
            .unwrap();

        assert_eq!(result, ShutdownResult::requested(ShutdownAction::ReloadBootstrapper, 0));
        assert_eq!(
            engine.trace().snapshot(),
            vec![
                LOADING_MESSAGE,
                CREATING_THREAD_MESSAGE,
                "ExampleBA",
                "Shutdown,ReloadBootstrapper,0"
            ]
        );
        assert!(native.get_variable("ExampleBAShutdown").is_some());
    }
}
