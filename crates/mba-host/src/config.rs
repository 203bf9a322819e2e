//! Host configuration

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use mba_host_sdk::RuntimeGeneration;

/// Host configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Directory the host module lives in; the host manifest is read from here
    pub app_base: PathBuf,

    /// Identity of the host module variant (e.g. `dnchost`, `mbahost.dll`)
    pub host_module: String,

    /// Runtime generations available on this machine
    pub installed_runtimes: Vec<RuntimeGeneration>,

    /// How long the native caller waits for the BA thread, in seconds
    pub wait_timeout_secs: u64,

    /// How many times the engine simulator relaunches on ReloadBootstrapper
    pub max_reloads: u32,
}

impl HostConfig {
    /// Configuration with defaults for everything but the location and host identity
    pub fn new(app_base: impl Into<PathBuf>, host_module: impl Into<String>) -> Self {
        Self {
            app_base: app_base.into(),
            host_module: host_module.into(),
            installed_runtimes: RuntimeGeneration::ALL.to_vec(),
            wait_timeout_secs: 300,
            max_reloads: 3,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::new(".", "dnchost");

        Self {
            app_base: env::var("MBAHOST_APP_BASE")
                .map(PathBuf::from)
                .unwrap_or(defaults.app_base),

            host_module: env::var("MBAHOST_HOST_MODULE").unwrap_or(defaults.host_module),

            installed_runtimes: env::var("MBAHOST_INSTALLED_RUNTIMES")
                .map(|list| parse_runtimes(&list))
                .unwrap_or(defaults.installed_runtimes),

            wait_timeout_secs: env::var("MBAHOST_WAIT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.wait_timeout_secs),

            max_reloads: env::var("MBAHOST_MAX_RELOADS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_reloads),
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Parse a comma separated list of runtime generations, skipping unknown entries
fn parse_runtimes(list: &str) -> Vec<RuntimeGeneration> {
    list.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match entry.parse() {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring installed runtime entry");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runtimes() {
        assert_eq!(
            parse_runtimes("core-latest, legacy-framework-v4,,bogus"),
            vec![RuntimeGeneration::CoreLatest, RuntimeGeneration::LegacyFrameworkV4]
        );
        assert!(parse_runtimes("").is_empty());
    }

    #[test]
    fn test_defaults() {
        let config = HostConfig::new("/opt/bundle", "mbahost");
        assert_eq!(config.installed_runtimes.len(), 4);
        assert_eq!(config.wait_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_reloads, 3);
    }
}
