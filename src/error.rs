use std::path::PathBuf;

use thiserror::Error;

/// Error taxonomy for the flow router and its learning loop.
///
/// Configuration and shape errors are surfaced before any simulation work
/// begins. Numerical anomalies abort the current epoch with the particle
/// and step that tripped them instead of killing the process.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{what}: expected {expected}, got {actual}")]
    Shape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("numerical invariant violated at step {step}, particle {particle}: {message}")]
    Invariant {
        particle: usize,
        step: u64,
        message: String,
    },
}

impl FlowError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FlowError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        FlowError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
