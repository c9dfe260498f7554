//! Runtime errors raised while assembling the host configuration or
//! installing the tracing subscriber.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Inconsistent or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A capability the host declared (or the pipeline requires) was not injected
    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    /// The global subscriber could not be installed
    #[error("Logging error: {0}")]
    Logging(String),
}

impl Error {
    /// Name of the missing capability, if that is what went wrong.
    pub fn missing_capability(&self) -> Option<&str> {
        match self {
            Self::CapabilityMissing { capability, .. } => Some(capability),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
