//! Example bootstrapper application
//!
//! Built as a cdylib and named from `mbahost.yaml`:
//!
//! ```yaml
//! host:
//!   path: libexample_ba.so
//! ```
//!
//! It announces itself, records the launch action in an engine variable and
//! asks the engine to reload the bootstrapper.

use mba_host_sdk::prelude::*;

struct ExampleBa {
    engine: EngineHandle,
    action: LaunchAction,
}

impl BootstrapperApplication for ExampleBa {
    fn run(&mut self) -> Result<(), BaError> {
        self.engine.log(LogLevel::Standard, "ExampleBA");
        self.engine
            .set_variable("ExampleBALaunchAction", &format!("{:?}", self.action));
        self.engine.shutdown(ShutdownAction::ReloadBootstrapper, 0);
        Ok(())
    }

    fn on_shutdown(&mut self, result: &ShutdownResult) {
        self.engine
            .set_variable("ExampleBAShutdown", &result.trace_line());
    }
}

#[derive(Default)]
struct ExampleBaFactory;

impl BootstrapperApplicationFactory for ExampleBaFactory {
    fn create(
        &self,
        engine: EngineHandle,
        command: &BootstrapperCommand,
    ) -> Result<Box<dyn BootstrapperApplication>, BaError> {
        Ok(Box::new(ExampleBa {
            engine,
            action: command.action,
        }))
    }
}

mba_host_sdk::bootstrapper_application_factory!(CoreLatest => ExampleBaFactory);
