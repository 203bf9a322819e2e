//! Host manifest parsing
//!
//! Parses the `mbahost.yaml` file that sits next to the host module and names
//! the bootstrapper application module to load, with environment variable
//! substitution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::loader::ModuleRef;

/// File name of the manifest inside the app base directory
pub const MANIFEST_FILE_NAME: &str = "mbahost.yaml";

/// The host manifest (mbahost.yaml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostManifest {
    pub host: HostSection,
}

/// Which bootstrapper application module to load
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSection {
    /// Name of a module registered in-process
    #[serde(default)]
    pub module: Option<String>,

    /// Path to a dynamic library, relative to the app base
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

impl HostManifest {
    /// Parse a manifest from YAML content
    pub fn parse(yaml: &str) -> Result<Self> {
        let expanded = expand_env_vars(yaml);

        let manifest: Self =
            serde_yaml::from_str(&expanded).context("Failed to parse host manifest")?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Load the manifest from an app base directory
    pub fn load<P: AsRef<Path>>(app_base: P) -> Result<Self> {
        let path = app_base.as_ref().join(MANIFEST_FILE_NAME);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read host manifest: {:?}", path))?;
        Self::parse(&content)
    }

    /// Validate the manifest
    pub fn validate(&self) -> Result<()> {
        match (&self.host.module, &self.host.path) {
            (Some(_), Some(_)) => anyhow::bail!("host.module and host.path are mutually exclusive"),
            (None, None) => anyhow::bail!("host.module or host.path is required"),
            (Some(module), None) if module.trim().is_empty() => {
                anyhow::bail!("host.module must not be empty")
            }
            (None, Some(path)) if path.as_os_str().is_empty() => {
                anyhow::bail!("host.path must not be empty")
            }
            _ => Ok(()),
        }
    }

    /// The module this manifest points at, resolving relative paths against `app_base`
    pub fn module_ref(&self, app_base: &Path) -> ModuleRef {
        match (&self.host.module, &self.host.path) {
            (_, Some(path)) if path.is_absolute() => ModuleRef::Library(path.clone()),
            (_, Some(path)) => ModuleRef::Library(app_base.join(path)),
            (Some(module), None) => ModuleRef::Registered(module.trim().to_string()),
            // Rejected by `validate`.
            (None, None) => ModuleRef::Registered(String::new()),
        }
    }
}

/// Expand environment variables in a string
/// Supports: ${VAR}, ${VAR:-default}, $VAR
fn expand_env_vars(input: &str) -> String {
    let mut result = input.to_string();

    // Pattern: ${VAR:-default} or ${VAR}
    let re = regex_lite::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("static pattern");
    result = re
        .replace_all(&result, |caps: &regex_lite::Captures| {
            let var_name = &caps[1];
            let default = caps.get(2).map(|m| m.as_str());

            std::env::var(var_name).unwrap_or_else(|_| default.unwrap_or("").to_string())
        })
        .to_string();

    // Pattern: $VAR (simple)
    let re = regex_lite::Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("static pattern");
    result = re
        .replace_all(&result, |caps: &regex_lite::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_default()
        })
        .to_string();

    result
}
