//! Error types for bootstrapper applications

use thiserror::Error;

/// Errors a bootstrapper application or its factory can report to the host
#[derive(Error, Debug)]
pub enum BaError {
    #[error("Failed to create bootstrapper application: {0}")]
    Create(String),

    #[error("Bootstrapper application failed: {0}")]
    Run(String),
}
