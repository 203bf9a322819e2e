//! Invocation context handed to the factory

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Action the engine was launched to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LaunchAction {
    #[default]
    Unknown,
    Help,
    Layout,
    Uninstall,
    Cache,
    Install,
    Modify,
    Repair,
    UpdateReplace,
    UpdateReplaceEmbedded,
}

/// How much UI the bootstrapper application should show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Display {
    #[default]
    Unknown,
    Embedded,
    None,
    Passive,
    Full,
}

/// Restart policy requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Restart {
    #[default]
    Unknown,
    Never,
    Prompt,
    Automatic,
    Always,
}

/// Relationship of this bundle to the bundle that launched it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RelationType {
    #[default]
    None,
    Detect,
    Upgrade,
    Addon,
    Patch,
    Dependent,
    Update,
}

/// Immutable description of the current invocation
///
/// Built once by the host from the native inputs and passed by reference to
/// the factory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapperCommand {
    pub action: LaunchAction,
    pub display: Display,
    pub restart: Restart,
    /// Raw command line as the engine received it
    pub command_line: String,
    /// Native splash screen window handle, if one is showing
    pub splash_screen: Option<u64>,
    pub relation_type: RelationType,
    pub passthrough: bool,
    pub layout_directory: Option<PathBuf>,
}

impl BootstrapperCommand {
    pub fn new(action: LaunchAction) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }

    pub fn with_display(mut self, display: Display) -> Self {
        self.display = display;
        self
    }

    pub fn with_restart(mut self, restart: Restart) -> Self {
        self.restart = restart;
        self
    }

    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = command_line.into();
        self
    }

    pub fn with_splash_screen(mut self, handle: u64) -> Self {
        self.splash_screen = Some(handle);
        self
    }

    pub fn with_relation(mut self, relation_type: RelationType, passthrough: bool) -> Self {
        self.relation_type = relation_type;
        self.passthrough = passthrough;
        self
    }

    pub fn with_layout_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layout_directory = Some(dir.into());
        self
    }

    /// Split the raw command line into arguments
    ///
    /// Arguments are separated by whitespace. Double quotes group text that
    /// contains whitespace and `\"` is a literal quote. An unterminated quote
    /// runs to the end of the line.
    pub fn command_line_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let mut current = String::new();
        let mut in_arg = false;
        let mut quoted = false;
        let mut chars = self.command_line.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                    in_arg = true;
                }
                '"' => {
                    quoted = !quoted;
                    in_arg = true;
                }
                c if c.is_whitespace() && !quoted => {
                    if in_arg {
                        args.push(std::mem::take(&mut current));
                        in_arg = false;
                    }
                }
                c => {
                    current.push(c);
                    in_arg = true;
                }
            }
        }
        if in_arg {
            args.push(current);
        }

        args
    }
}
