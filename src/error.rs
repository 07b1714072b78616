//! Error taxonomy for monitors and delivery
//!
//! Monitor bodies return `anyhow::Result`; these typed errors are the
//! leaves that get wrapped with context on the way up to the poller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// RPC or GraphQL call failed, or returned data we could not parse.
    /// Always recovered by the poller's reset delay.
    #[error("data source error: {0}")]
    TransientSource(String),

    /// Missing inputs to an operation (e.g. LP math without pool reserves).
    /// Fatal to the single operation only.
    #[error("invalid input: {0}")]
    Configuration(String),

    /// A notification could not be handed to the chat service
    #[error("transport error: {0}")]
    Transport(String),
}

impl MonitorError {
    pub fn source_err(msg: impl Into<String>) -> Self {
        MonitorError::TransientSource(msg.into())
    }

    pub fn config_err(msg: impl Into<String>) -> Self {
        MonitorError::Configuration(msg.into())
    }
}
