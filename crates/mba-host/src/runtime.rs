//! Runtime selection
//!
//! Each host module variant activates exactly one runtime generation. The
//! mapping is a fixed table; activation happens once per host and is never
//! changed afterwards.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use mba_host_sdk::RuntimeGeneration;

use crate::error::HostError;

/// Host module variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostModule {
    MbaHostFramework2,
    MbaHostFramework4,
    DncHostEarliest,
    DncHostLatest,
}

impl HostModule {
    pub const ALL: [HostModule; 4] = [
        HostModule::MbaHostFramework2,
        HostModule::MbaHostFramework4,
        HostModule::DncHostEarliest,
        HostModule::DncHostLatest,
    ];

    /// File stem the host module is shipped under
    pub fn file_stem(&self) -> &'static str {
        match self {
            HostModule::MbaHostFramework2 => "mbahost2",
            HostModule::MbaHostFramework4 => "mbahost",
            HostModule::DncHostEarliest => "dnchost-earliest",
            HostModule::DncHostLatest => "dnchost",
        }
    }

    /// The runtime generation this variant activates
    pub fn generation(&self) -> RuntimeGeneration {
        match self {
            HostModule::MbaHostFramework2 => RuntimeGeneration::LegacyFrameworkV2,
            HostModule::MbaHostFramework4 => RuntimeGeneration::LegacyFrameworkV4,
            HostModule::DncHostEarliest => RuntimeGeneration::CoreEarliest,
            HostModule::DncHostLatest => RuntimeGeneration::CoreLatest,
        }
    }
}

impl fmt::Display for HostModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_stem())
    }
}

impl FromStr for HostModule {
    type Err = HostError;

    /// Accepts a bare stem (`dnchost`) or a library file name
    /// (`dnchost.dll`, `libdnchost.so`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stem = Path::new(s.trim())
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let stem = stem.strip_prefix("lib").unwrap_or(stem);

        HostModule::ALL
            .into_iter()
            .find(|module| module.file_stem().eq_ignore_ascii_case(stem))
            .ok_or_else(|| HostError::RuntimeActivation(format!("unknown host module '{}'", s)))
    }
}

/// The runtime a host has committed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostDescriptor {
    pub module: HostModule,
    pub generation: RuntimeGeneration,
}

impl HostDescriptor {
    pub fn for_module(module: HostModule) -> Self {
        Self {
            module,
            generation: module.generation(),
        }
    }
}

/// Activates the runtime generation for a host, once
#[derive(Debug)]
pub struct RuntimeSelector {
    installed: Vec<RuntimeGeneration>,
    active: OnceLock<HostDescriptor>,
}

impl RuntimeSelector {
    pub fn new(installed: Vec<RuntimeGeneration>) -> Self {
        Self {
            installed,
            active: OnceLock::new(),
        }
    }

    /// Activate the runtime for `module`
    ///
    /// Repeated activation of the same generation returns the existing
    /// descriptor. Asking for a different generation after one is active is
    /// a version mismatch and leaves the active one untouched.
    pub fn activate(&self, module: HostModule) -> Result<HostDescriptor, HostError> {
        let wanted = HostDescriptor::for_module(module);

        if self.active.get().is_none() && !self.installed.contains(&wanted.generation) {
            return Err(HostError::RuntimeActivation(format!(
                "runtime {} is not installed",
                wanted.generation
            )));
        }

        let active = *self.active.get_or_init(|| {
            tracing::info!(
                host_module = %wanted.module,
                generation = %wanted.generation,
                "Activated runtime"
            );
            wanted
        });

        if active.generation != wanted.generation {
            return Err(HostError::RuntimeActivation(format!(
                "runtime {} is already active, cannot activate {}",
                active.generation, wanted.generation
            )));
        }

        Ok(active)
    }

    pub fn active(&self) -> Option<HostDescriptor> {
        self.active.get().copied()
    }
}
