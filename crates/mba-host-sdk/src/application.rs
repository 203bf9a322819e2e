//! Bootstrapper application and factory contracts
//!
//! A BA module declares exactly one factory in a registration table. For a
//! dynamic module the table is exported under [`REGISTRATION_SYMBOL`] by the
//! [`bootstrapper_application_factory!`](crate::bootstrapper_application_factory)
//! macro; statically linked modules hand the same [`FactoryRegistration`]
//! values to the host's module registry.
//!
//! # Example
//!
//! ```ignore
//! use mba_host_sdk::prelude::*;
//!
//! struct ExampleBa {
//!     engine: EngineHandle,
//! }
//!
//! impl BootstrapperApplication for ExampleBa {
//!     fn run(&mut self) -> Result<(), BaError> {
//!         self.engine.log(LogLevel::Standard, "ExampleBA");
//!         self.engine.shutdown(ShutdownAction::ReloadBootstrapper, 0);
//!         Ok(())
//!     }
//! }
//!
//! #[derive(Default)]
//! struct ExampleBaFactory;
//!
//! impl BootstrapperApplicationFactory for ExampleBaFactory {
//!     fn create(
//!         &self,
//!         engine: EngineHandle,
//!         _command: &BootstrapperCommand,
//!     ) -> Result<Box<dyn BootstrapperApplication>, BaError> {
//!         Ok(Box::new(ExampleBa { engine }))
//!     }
//! }
//!
//! mba_host_sdk::bootstrapper_application_factory!(CoreLatest => ExampleBaFactory);
//! ```

use crate::command::BootstrapperCommand;
use crate::engine::EngineHandle;
use crate::error::BaError;
use crate::runtime::RuntimeGeneration;
use crate::shutdown::ShutdownResult;

/// Name of the registration table symbol a dynamic BA module exports
pub const REGISTRATION_SYMBOL: &[u8] = b"mba_factory_registrations";

/// Signature of the exported registration table
///
/// The table lives in the module's static data and stays valid for as long
/// as the module is loaded.
pub type RegistrationTableFn = extern "Rust" fn() -> &'static [FactoryRegistration];

/// A bootstrapper application instance
///
/// `run` is invoked once, on a thread the host dedicates to this BA. The
/// engine handle given to the factory is how the BA logs and requests
/// shutdown.
pub trait BootstrapperApplication: Send {
    /// Run the application until it is done
    fn run(&mut self) -> Result<(), BaError>;

    /// Called on the BA thread once the run's outcome is known
    fn on_shutdown(&mut self, _result: &ShutdownResult) {}
}

/// Produces the bootstrapper application for a run
pub trait BootstrapperApplicationFactory: Send + Sync {
    fn create(
        &self,
        engine: EngineHandle,
        command: &BootstrapperCommand,
    ) -> Result<Box<dyn BootstrapperApplication>, BaError>;
}

/// One entry in a module's registration table
#[derive(Debug, Clone, Copy)]
pub struct FactoryRegistration {
    /// Name of the factory type, for diagnostics
    pub type_name: &'static str,

    /// Runtime generation the module was built against
    pub generation: RuntimeGeneration,

    /// Instantiates the factory
    pub construct: fn() -> Box<dyn BootstrapperApplicationFactory>,
}

impl FactoryRegistration {
    pub const fn new(
        type_name: &'static str,
        generation: RuntimeGeneration,
        construct: fn() -> Box<dyn BootstrapperApplicationFactory>,
    ) -> Self {
        Self {
            type_name,
            generation,
            construct,
        }
    }

    /// Registration for a default-constructible factory type
    pub fn of<F>(generation: RuntimeGeneration) -> Self
    where
        F: BootstrapperApplicationFactory + Default + 'static,
    {
        Self::new(std::any::type_name::<F>(), generation, construct_factory::<F>)
    }

    /// Instantiate the registered factory
    pub fn instantiate(&self) -> Box<dyn BootstrapperApplicationFactory> {
        (self.construct)()
    }
}

/// Boxed default constructor used by registrations
pub fn construct_factory<F>() -> Box<dyn BootstrapperApplicationFactory>
where
    F: BootstrapperApplicationFactory + Default + 'static,
{
    Box::new(F::default())
}

/// Export the registration table of a dynamic BA module
///
/// A module must register exactly one factory; the host rejects modules
/// whose table is empty or lists more than one.
///
/// ```ignore
/// bootstrapper_application_factory!(CoreEarliest => EarliestCoreBaFactory);
/// ```
#[macro_export]
macro_rules! bootstrapper_application_factory {
    ($($generation:ident => $factory:ty),+ $(,)?) => {
        #[no_mangle]
        pub extern "Rust" fn mba_factory_registrations(
        ) -> &'static [$crate::application::FactoryRegistration] {
            static REGISTRATIONS: &[$crate::application::FactoryRegistration] = &[
                $(
                    $crate::application::FactoryRegistration::new(
                        stringify!($factory),
                        $crate::runtime::RuntimeGeneration::$generation,
                        $crate::application::construct_factory::<$factory>,
                    )
                ),+
            ];
            REGISTRATIONS
        }
    };
}
