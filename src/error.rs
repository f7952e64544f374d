//! Application-wide error types.
//!
//! [`AppError`] covers startup and channel plumbing.  [`GatewayError`] is the
//! request-path taxonomy produced by pipeline stages and capabilities.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("logger error: {0}")]
    Logger(String),

    #[error("comms error: {0}")]
    Comms(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while a request travels through the pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A capability failed while doing its work. Never retried.
    #[error("capability '{capability}' failed: {message}")]
    Execution { capability: String, message: String },

    /// No registered capability scored above zero for the request.
    #[error("no capability matched the request")]
    NoCapabilityMatched,

    /// The history store or repository could not serve the operation.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl GatewayError {
    pub fn execution(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            capability: capability.into(),
            message: message.into(),
        }
    }
}
