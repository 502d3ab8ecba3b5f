//! Telemetry error types
//!
//! None of these ever reach the instrumented caller. They are produced by the
//! fallible steps inside a sample or logger and turned into warnings at the
//! public boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while collecting identity or delivering a sample
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to spawn telemetry log command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("telemetry log command `{command}` returned non-zero exit code {code}")]
    ExitStatus { command: String, code: i32 },

    #[error("telemetry log command `{command}` was terminated by a signal")]
    Signaled { command: String },

    #[error("empty telemetry log command")]
    EmptyCommand,

    #[error("failed to open telemetry log file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write telemetry log file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode telemetry sample: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("{0}")]
    Identity(String),
}
