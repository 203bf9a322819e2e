//! Bootstrapper applications and helpers shared by the unit tests

use std::sync::Arc;

use mba_host_sdk::prelude::*;

use crate::engine::{HostedEngine, StandaloneEngine};
use crate::shutdown::ShutdownProtocol;
use crate::trace::{RunId, Trace};

/// A hosted engine over a fresh standalone engine
pub(crate) fn hosted_engine() -> (Arc<StandaloneEngine>, Arc<HostedEngine>) {
    let native = Arc::new(StandaloneEngine::new());
    let trace = Trace::new();
    let protocol = ShutdownProtocol::new(RunId::new(), trace.clone());
    let hosted = Arc::new(HostedEngine::new(native.clone(), trace, protocol));
    (native, hosted)
}

/// Announces its name, then optionally requests shutdown or panics
pub(crate) struct AnnouncingBa {
    engine: EngineHandle,
    name: &'static str,
    request: Option<(ShutdownAction, i32)>,
    panic: bool,
}

impl BootstrapperApplication for AnnouncingBa {
    fn run(&mut self) -> Result<(), BaError> {
        self.engine.log(LogLevel::Standard, self.name);
        if self.panic {
            panic!("{} crashed", self.name);
        }
        if let Some((action, exit_code)) = self.request {
            self.engine.shutdown(action, exit_code);
        }
        Ok(())
    }
}

macro_rules! announcing_factory {
    ($factory:ident, $name:literal, $request:expr, $panic:expr) => {
        #[derive(Default)]
        pub(crate) struct $factory;

        impl BootstrapperApplicationFactory for $factory {
            fn create(
                &self,
                engine: EngineHandle,
                _command: &BootstrapperCommand,
            ) -> Result<Box<dyn BootstrapperApplication>, BaError> {
                Ok(Box::new(AnnouncingBa {
                    engine,
                    name: $name,
                    request: $request,
                    panic: $panic,
                }))
            }
        }
    };
    ($factory:ident, $name:literal) => {
        announcing_factory!(
            $factory,
            $name,
            Some((ShutdownAction::ReloadBootstrapper, 0)),
            false
        );
    };
}

announcing_factory!(ExampleBaFactory, "ExampleBA");
announcing_factory!(FullFramework2BaFactory, "FullFramework2BA");
announcing_factory!(FullFramework4BaFactory, "FullFramework4BA");
announcing_factory!(EarliestCoreBaFactory, "EarliestCoreBA");
announcing_factory!(LatestCoreBaFactory, "LatestCoreBA");
announcing_factory!(SilentBaFactory, "SilentBA", None, false);
announcing_factory!(PanickingBaFactory, "PanickingBA", None, true);

/// Factory whose `create` fails
#[derive(Default)]
pub(crate) struct FailingFactory;

impl BootstrapperApplicationFactory for FailingFactory {
    fn create(
        &self,
        _engine: EngineHandle,
        _command: &BootstrapperCommand,
    ) -> Result<Box<dyn BootstrapperApplication>, BaError> {
        Err(BaError::Create("no UI available".into()))
    }
}

/// Factory that asks for shutdown from inside `create`
#[derive(Default)]
pub(crate) struct EagerShutdownFactory;

impl BootstrapperApplicationFactory for EagerShutdownFactory {
    fn create(
        &self,
        engine: EngineHandle,
        _command: &BootstrapperCommand,
    ) -> Result<Box<dyn BootstrapperApplication>, BaError> {
        engine.shutdown(ShutdownAction::Restart, 1);
        Ok(Box::new(AnnouncingBa {
            engine,
            name: "EagerBA",
            request: None,
            panic: false,
        }))
    }
}
