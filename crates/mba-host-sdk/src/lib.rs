//! MBA Host SDK - Types and traits for writing bootstrapper applications
//!
//! This crate provides the contract surface between the hosting bridge and a
//! bootstrapper application (BA): the engine capability handle, the command
//! describing the invocation, the BA and factory traits, and the registration
//! table a BA module exports so the host can find its factory.

pub mod application;
pub mod command;
pub mod engine;
pub mod error;
pub mod runtime;
pub mod schema;
pub mod shutdown;

pub mod prelude {
    //! Common imports for bootstrapper applications
    pub use crate::application::{
        BootstrapperApplication, BootstrapperApplicationFactory, FactoryRegistration,
    };
    pub use crate::command::{BootstrapperCommand, Display, LaunchAction, RelationType, Restart};
    pub use crate::engine::{Engine, EngineHandle, LogLevel};
    pub use crate::error::BaError;
    pub use crate::runtime::RuntimeGeneration;
    pub use crate::shutdown::{ShutdownAction, ShutdownResult, TerminationCause};
}

// Re-export key types at crate root
pub use application::{
    construct_factory, BootstrapperApplication, BootstrapperApplicationFactory,
    FactoryRegistration, RegistrationTableFn, REGISTRATION_SYMBOL,
};
pub use command::BootstrapperCommand;
pub use engine::{Engine, EngineHandle, LogLevel};
pub use error::BaError;
pub use runtime::RuntimeGeneration;
pub use shutdown::{ShutdownAction, ShutdownResult, TerminationCause};
