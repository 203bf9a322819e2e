//! Runtime generations a bootstrapper application can be built against

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A runtime generation supported by the host
///
/// Generations are mutually incompatible: a module built for one generation
/// can only be hosted by the host module variant that activates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeGeneration {
    LegacyFrameworkV2,
    LegacyFrameworkV4,
    CoreEarliest,
    CoreLatest,
}

impl RuntimeGeneration {
    /// Every supported generation, oldest first
    pub const ALL: [RuntimeGeneration; 4] = [
        RuntimeGeneration::LegacyFrameworkV2,
        RuntimeGeneration::LegacyFrameworkV4,
        RuntimeGeneration::CoreEarliest,
        RuntimeGeneration::CoreLatest,
    ];

    /// Stable identifier used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeGeneration::LegacyFrameworkV2 => "legacy-framework-v2",
            RuntimeGeneration::LegacyFrameworkV4 => "legacy-framework-v4",
            RuntimeGeneration::CoreEarliest => "core-earliest",
            RuntimeGeneration::CoreLatest => "core-latest",
        }
    }
}

impl fmt::Display for RuntimeGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a generation identifier is not recognised
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown runtime generation: {0}")]
pub struct UnknownRuntimeGeneration(pub String);

impl FromStr for RuntimeGeneration {
    type Err = UnknownRuntimeGeneration;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        RuntimeGeneration::ALL
            .into_iter()
            .find(|generation| generation.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownRuntimeGeneration(wanted.to_string()))
    }
}
