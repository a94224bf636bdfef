//! Error types shared across subsystems.

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Failure observed on a pipeline (transport or application side).
///
/// Handlers only ever observe these; they are forwarded along the pipeline
/// unchanged.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The connection is gone; nothing more can be written.
    #[error("channel closed")]
    Closed,

    /// An application handler failed while processing a message.
    #[error("{0}")]
    Handler(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChannelError {
    /// Stable short name used for the `error.kind` span log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelError::Closed => "closed",
            ChannelError::Handler(_) => "handler",
            ChannelError::Io(_) => "io",
        }
    }
}

/// Startup failures of the telemetry stack.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to build metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
